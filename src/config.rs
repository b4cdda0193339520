use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Construction-time server settings, fixed for the server's lifetime.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
/// Durations are written in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,

    /// Number of connection workers. Connections beyond this wait in the
    /// accept queue.
    pub max_connections: usize,

    /// Idle limit for every read from a connection.
    #[serde(rename = "request_timeout_ms", deserialize_with = "deserialize_millis")]
    pub request_timeout: Duration,

    /// Limit on a single handler invocation.
    #[serde(rename = "handler_timeout_ms", deserialize_with = "deserialize_millis")]
    pub handler_timeout: Duration,

    /// Budget shared by the request line, headers and body of one request.
    pub max_request_bytes: usize,

    pub content_type: String,
    pub max_requests_per_minute: u32,

    /// Removed from request paths before route lookup.
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            max_connections: 20,

            request_timeout: Duration::from_secs(5),
            handler_timeout: Duration::from_secs(60),

            max_request_bytes: 1024 * 1024, // 1 MB

            content_type: "application/json".to_string(),
            max_requests_per_minute: 600,
            base_path: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("Fail to read {}: {err}", path);
                log::warn!("Fall back to default config");
                return ServerConfig::default();
            }
        };

        match Self::from_toml(&content) {
            Ok(server_config) => server_config,
            Err(err) => {
                log::warn!("Fail to deserialize config file {}: {err}", path);
                log::warn!("Fall back to default config");
                ServerConfig::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<ServerConfig>(content)
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}
