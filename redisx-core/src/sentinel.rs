//! High-availability server configurations, where a set of Sentinel servers
//! tells which node is the current master of a service.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::Channel;
use crate::config::{Config, DEFAULT_PORT, DEFAULT_SENTINEL_TIMEOUT_MILLIS};
use crate::redis::parse_info;
use crate::{Error, Redis, Resp, RespType, Result, invalid_argument};

/// A server address. Port 0 stands for the default port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        if self.port > 0 { self.port } else { DEFAULT_PORT }
    }
}

pub(crate) struct SentinelConfig {
    pub(crate) service: String,
    pub(crate) servers: Vec<Server>,
    pub(crate) timeout_millis: i64,
}

impl SentinelConfig {
    fn timeout(&self) -> Duration {
        let millis = if self.timeout_millis > 0 {
            self.timeout_millis
        } else {
            DEFAULT_SENTINEL_TIMEOUT_MILLIS
        };
        Duration::from_millis(millis as u64)
    }

    fn set_top(&mut self, index: usize) {
        if index > 0 && index < self.servers.len() {
            let server = self.servers.remove(index);
            self.servers.insert(0, server);
        }
    }

    /// Moves the master to the top of the list, adding it if unknown.
    fn include_master(&mut self, host: &str, port: u16) {
        match self
            .servers
            .iter()
            .position(|s| s.port() == port && s.host == host)
        {
            Some(index) => self.set_top(index),
            None => {
                debug!("adding master {host}:{port} to the Sentinel list");
                self.servers.insert(0, Server::new(host, port));
            }
        }
    }
}

/// Checks a Sentinel configuration: a non-empty service name and at least
/// one server, the first of which must have a host name.
pub fn validate_sentinel(service: &str, servers: &[Server]) -> Result<()> {
    if service.is_empty() {
        return invalid_argument!("empty Sentinel service name");
    }
    match servers.first() {
        None => invalid_argument!("no Sentinel servers"),
        Some(server) if server.host.is_empty() => {
            invalid_argument!("first Sentinel server has no host name")
        }
        Some(_) => Ok(()),
    }
}

impl Redis {
    /// Creates an instance whose master is looked up from the given
    /// Sentinel servers when connecting.
    pub fn new_sentinel(service: &str, servers: &[Server]) -> Result<Redis> {
        validate_sentinel(service, servers)?;

        let first = &servers[0];
        let redis = Redis::from_config(Config {
            host: first.host.clone(),
            port: first.port(),
            ..Config::default()
        });

        *redis.inner.sentinel.lock() = Some(SentinelConfig {
            service: service.to_string(),
            servers: servers.to_vec(),
            timeout_millis: DEFAULT_SENTINEL_TIMEOUT_MILLIS,
        });

        Ok(redis)
    }

    pub fn is_sentinel(&self) -> bool {
        self.inner.sentinel.lock().is_some()
    }

    /// Sets the connection timeout used while probing Sentinel servers, <= 0
    /// for the default.
    pub fn set_sentinel_timeout(&self, millis: i64) -> Result<()> {
        match self.inner.sentinel.lock().as_mut() {
            Some(sentinel) => {
                sentinel.timeout_millis = if millis > 0 {
                    millis
                } else {
                    DEFAULT_SENTINEL_TIMEOUT_MILLIS
                };
                Ok(())
            }
            None => Err(Error::NoService(
                "Redis was not configured for Sentinel".to_string(),
            )),
        }
    }

    /// The Sentinel servers, in the order they will be tried.
    pub fn sentinel_servers(&self) -> Vec<Server> {
        self.inner
            .sentinel
            .lock()
            .as_ref()
            .map(|s| s.servers.clone())
            .unwrap_or_default()
    }

    /// Finds the master and connects its interactive client. A node that
    /// turns out not to be the master triggers one more discovery round.
    pub(crate) fn connect_sentinel_master(&self) -> Result<()> {
        for _ in 0..2 {
            self.discover_sentinel()?;
            self.connect_client(Channel::Interactive)?;

            if self.confirm_master_role()? {
                return Ok(());
            }

            warn!(server = %self.id(), "server is a replica, not the master");
            self.client(Channel::Interactive).lock().close();
        }

        Err(Error::NoService(
            "Sentinel master could not be confirmed".to_string(),
        ))
    }

    /// Points the instance at the current master, as told by the first
    /// reachable Sentinel server.
    fn discover_sentinel(&self) -> Result<()> {
        let (service, servers, timeout) = match self.inner.sentinel.lock().as_ref() {
            Some(s) => (s.service.clone(), s.servers.clone(), s.timeout()),
            None => return Err(Error::NoService("no Sentinel configuration".to_string())),
        };

        debug!(service = %service, "looking for the Sentinel master");

        for (index, server) in servers.iter().enumerate() {
            self.set_server(&server.host, server.port());

            if let Err(e) = self.connect_client_with(Channel::Interactive, timeout) {
                debug!(server = %self.id(), "Sentinel server unavailable: {e}");
                continue;
            }

            let found = match self.confirm_master_role() {
                Ok(true) => Ok(None),
                _ => self.query_master(&service).map(Some),
            };

            self.client(Channel::Interactive).lock().close();

            match found {
                Ok(master) => {
                    if let Some((host, port)) = master {
                        self.set_server(&host, port);
                        if let Some(s) = self.inner.sentinel.lock().as_mut() {
                            s.set_top(index);
                        }
                    }
                    info!(service = %service, master = %self.id(), "found Sentinel master");
                    return Ok(());
                }
                Err(e) => debug!(server = %server.host, "Sentinel query failed: {e}"),
            }
        }

        Err(Error::NoService("no Sentinel server available".to_string()))
    }

    fn query_master(&self, service: &str) -> Result<(String, u16)> {
        let reply = self.request("SENTINEL", &["get-master-addr-by-name", service])?;
        reply.check(Some(RespType::Array), 2)?;

        let parts = reply.into_array().unwrap_or_default();
        let host = parts[0].as_text().unwrap_or_default();
        let port = parts[1]
            .as_text()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .or_else(|| parts[1].as_integer().and_then(|p| u16::try_from(p).ok()));

        match port {
            Some(port) if !host.is_empty() => Ok((host, port)),
            _ => Err(Error::UnexpectedResp {
                expected: "master address".to_string(),
                got: format!("{}:{:?}", host, parts[1]),
            }),
        }
    }

    /// Checks that the connected server is the master, with `ROLE` or, on
    /// servers without it, `INFO replication`. A confirmed master moves to
    /// the top of the Sentinel list.
    pub(crate) fn confirm_master_role(&self) -> Result<bool> {
        let reply = self.request("ROLE", &[])?;

        let is_master = match reply {
            Resp::Array(items) => match items.first() {
                Some(role) => role.as_bytes() == Some(b"master"),
                None => {
                    return Err(Error::UnexpectedArraySize {
                        expected: 1,
                        got: 0,
                    });
                }
            },
            _ => {
                let info = parse_info(&self.request("INFO", &["replication"])?)?;
                info.get("role").is_some_and(|role| role == "master")
            }
        };

        if is_master {
            let config = self.config();
            debug!(server = %config.address(), "confirmed master");
            if let Some(s) = self.inner.sentinel.lock().as_mut() {
                s.include_master(&config.host, config.port);
            }
        }

        Ok(is_master)
    }
}
