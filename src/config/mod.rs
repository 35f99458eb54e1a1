mod settings;

pub use settings::{
    DatabaseConfig, IntegrationsConfig, LogFormat, LoggingConfig, MqttConfig, ServerConfig,
    Settings,
};
