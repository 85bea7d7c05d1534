mod settings;

pub use settings::{
    DatabaseConfig, JwtConfig, LogConfig, ServerConfig, Settings, TemplateStoreConfig,
};
