use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default Redis / Valkey server port.
pub const DEFAULT_PORT: u16 = 6379;

/// Socket read / connect timeout when none is configured.
pub const DEFAULT_TIMEOUT_MILLIS: i64 = 3000;

/// Connection timeout used while probing Sentinel servers.
pub const DEFAULT_SENTINEL_TIMEOUT_MILLIS: i64 = 100;

/// Maximum number of bytes written to the socket in a single send.
pub const CMDBUF_SIZE: usize = 8192;

/// Receive chunk size.
pub const RCVBUF_SIZE: usize = 8192;

/// RESP protocol version to negotiate with `HELLO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Resp2,
    Resp3,
}

impl Protocol {
    pub fn version(self) -> i64 {
        match self {
            Protocol::Resp2 => 2,
            Protocol::Resp3 => 3,
        }
    }

    pub fn from_version(version: i64) -> Option<Protocol> {
        match version {
            2 => Some(Protocol::Resp2),
            3 => Some(Protocol::Resp3),
            _ => None,
        }
    }
}

/// Connection settings shared by all channels of a server instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_index: i64,
    /// Socket timeout in milliseconds.
    pub timeout_millis: i64,
    pub protocol: Protocol,
    /// Whether to greet the server with `HELLO`. Enabled once a protocol is
    /// requested explicitly.
    pub hello: bool,
    /// `COUNT` hint for `SCAN` style queries, <= 0 for the server default.
    pub scan_count: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            db_index: 0,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            protocol: Protocol::default(),
            hello: false,
            scan_count: 0,
        }
    }
}

impl Config {
    /// Creates a configuration for `host`, which may carry a `:port` suffix.
    pub fn new(host: &str) -> Self {
        let mut config = Config::default();

        match host.rsplit_once(':') {
            Some((h, p)) if !h.contains(':') => match p.parse::<u16>() {
                Ok(port) => {
                    config.host = h.to_string();
                    config.port = port;
                }
                Err(_) => config.host = host.to_string(),
            },
            _ => config.host = host.to_string(),
        }

        config
    }

    pub fn timeout(&self) -> Duration {
        let millis = if self.timeout_millis > 0 {
            self.timeout_millis
        } else {
            DEFAULT_TIMEOUT_MILLIS
        };
        Duration::from_millis(millis as u64)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
