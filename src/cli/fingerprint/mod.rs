//! Fingerprint command

use clap::Args;

use crate::domain::NormalizedQuery;

#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Query text; multiple words are joined with spaces
    #[arg(required = true)]
    pub text: Vec<String>,
}

pub fn run(args: FingerprintArgs) -> anyhow::Result<()> {
    println!("{}", render(&args.text.join(" "))?);
    Ok(())
}

fn render(text: &str) -> anyhow::Result<String> {
    let query = NormalizedQuery::parse(text)?;
    Ok(format!(
        "normalized:  {}\nfingerprint: {}",
        query.normalized(),
        query.fingerprint()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_normalizes() {
        let a = render("  What is   AAPL trading at ").unwrap();
        let b = render("what is aapl trading at").unwrap();

        assert_eq!(a, b);
        assert!(a.starts_with("normalized:  what is aapl trading at\n"));
    }

    #[test]
    fn test_render_rejects_blank() {
        assert!(render(" \t ").is_err());
    }
}
