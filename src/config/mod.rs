//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, EmbedderConfig, EngineConfig, LogFormat, LoggingConfig, ServerConfig,
    TtlClassesConfig, WorkflowsConfig,
};
