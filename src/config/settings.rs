use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker address, e.g. `tcp://localhost:1883`
    #[serde(default = "default_mqtt_server")]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// QoS level used for every publish (0, 1 or 2)
    #[serde(default)]
    pub qos: u8,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
    /// Upper bound for one publish call
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,
    /// Upper bound for a clean disconnect on close
    #[serde(default = "default_disconnect_timeout")]
    pub disconnect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationsConfig {
    /// Age after which cached per-application backends are reloaded (0 = never)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Timeout for one webhook request
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "postgres://localhost/loraserver_as".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_mqtt_server() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_client_id() -> String {
    "lora-app-notify".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_publish_timeout() -> u64 {
    5_000
}

fn default_disconnect_timeout() -> u64 {
    2_000
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // LORA_NOTIFY_MQTT__SERVER, LORA_NOTIFY_DATABASE__URL, etc.
            .add_source(
                Environment::with_prefix("LORA_NOTIFY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: default_mqtt_server(),
            username: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            qos: 0,
            keep_alive_seconds: default_keep_alive(),
            publish_timeout_ms: default_publish_timeout(),
            disconnect_timeout_ms: default_disconnect_timeout(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let mqtt = MqttConfig::default();
        assert_eq!(mqtt.server, "tcp://localhost:1883");
        assert_eq!(mqtt.qos, 0);

        let integrations = IntegrationsConfig::default();
        assert_eq!(integrations.cache_ttl_seconds, 60);
        assert_eq!(integrations.http_timeout_seconds, 10);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let settings: Settings = Config::builder()
            .set_override("mqtt.server", "tcp://broker:1883")
            .unwrap()
            .set_override("logging.format", "json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.mqtt.server, "tcp://broker:1883");
        assert_eq!(settings.mqtt.client_id, "lora-app-notify");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
    }
}
