//! Cache domain - exact-match caching used to memoize tool calls

mod key;
mod repository;

pub use key::{canonical_json, ToolKey, TOOL_KEY_PREFIX};
pub use repository::{glob_to_regex, Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
