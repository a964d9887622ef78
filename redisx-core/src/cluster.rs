//! Redis cluster support: hash slots, shard discovery with `CLUSTER SLOTS`
//! and the lookup of the shard serving a key.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{Config, Error, Redis, Resp, RespType, Result, invalid_argument};

/// Number of hash slots in a cluster.
pub const HASH_SLOTS: u16 = 16384;

const CRC16_TABLE: [u16; 256] = crc16_table();

// CRC16/XMODEM, polynomial 0x1021
const fn crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC16 (XMODEM) checksum, as used for cluster key hashing.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &b| {
        (crc << 8) ^ CRC16_TABLE[(((crc >> 8) as u8) ^ b) as usize]
    })
}

/// The hash slot of a key. When the key has a non-empty hash tag, i.e.
/// text between the first `{` and the following `}`, only the tag is
/// hashed.
pub fn hash_slot(key: &[u8]) -> u16 {
    let tagged = key
        .iter()
        .position(|&b| b == b'{')
        .and_then(|from| {
            let rest = &key[from + 1..];
            rest.iter().position(|&b| b == b'}').map(|to| &rest[..to])
        })
        .filter(|tag| !tag.is_empty());

    crc16(tagged.unwrap_or(key)) & (HASH_SLOTS - 1)
}

/// A `MOVED` or `ASK` redirection to another shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// `ASK`: the key is migrating, and `ASKING` must precede the retry.
    pub ask: bool,
    pub slot: u16,
    pub address: String,
}

/// Recognizes `MOVED` and `ASK` error replies.
pub fn parse_redirect(reply: &Resp) -> Option<Redirect> {
    match reply.redirect()? {
        Error::Moved { slot, address } => Some(Redirect {
            ask: false,
            slot,
            address,
        }),
        Error::Ask { slot, address } => Some(Redirect {
            ask: true,
            slot,
            address,
        }),
        _ => None,
    }
}

struct Shard {
    start: u16,
    end: u16,
    servers: Vec<Redis>,
}

impl Shard {
    fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    fn disconnect(&self) {
        for server in &self.servers {
            server.disconnect();
        }
    }
}

struct ClusterShared {
    shards: Mutex<Vec<Shard>>,
    use_pipeline: bool,
    reconfiguring: AtomicBool,
}

/// A Redis cluster, made of shards each serving a range of hash slots.
///
/// Dropping the cluster disconnects all of its servers.
pub struct Cluster {
    inner: Arc<ClusterShared>,
}

fn slot_bound(resp: &Resp) -> Result<u16> {
    resp.check(Some(RespType::Integer), 0)?;
    let value = resp.as_integer().unwrap_or(-1);
    u16::try_from(value)
        .ok()
        .filter(|slot| *slot < HASH_SLOTS)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid hash slot {value}")))
}

fn parse_server(node: &Resp, template: &Config) -> Result<Redis> {
    let items = match node {
        Resp::Array(items) if items.len() >= 2 => items,
        _ => {
            return Err(Error::UnexpectedResp {
                expected: "[host, port, ...]".to_string(),
                got: node.resp_type().to_string(),
            });
        }
    };

    let host = match items[0].as_text() {
        Some(host) if !host.is_empty() && host != "?" => host,
        _ => template.host.clone(),
    };
    let port = items[1]
        .as_integer()
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| Error::InvalidArgument("invalid cluster node port".to_string()))?;

    Ok(Redis::from_config(Config {
        host,
        port,
        db_index: 0,
        ..template.clone()
    }))
}

/// Parses a `CLUSTER SLOTS` reply. Servers inherit the node's credentials,
/// timeout and protocol.
fn parse_slots(reply: Resp, template: &Config) -> Result<Vec<Shard>> {
    reply.check(Some(RespType::Array), 0)?;

    let mut shards = Vec::new();
    for entry in reply.into_array().unwrap_or_default() {
        let desc = match entry {
            Resp::Array(desc) if desc.len() >= 3 => desc,
            other => {
                return Err(Error::UnexpectedResp {
                    expected: "[start, end, server...]".to_string(),
                    got: format!("{} of size {}", other.resp_type(), other.size()),
                });
            }
        };

        let servers = desc[2..]
            .iter()
            .map(|node| parse_server(node, template))
            .collect::<Result<Vec<_>>>()?;

        shards.push(Shard {
            start: slot_bound(&desc[0])?,
            end: slot_bound(&desc[1])?,
            servers,
        });
    }

    Ok(shards)
}

fn discover(node: &Redis) -> Result<Vec<Shard>> {
    let was_connected = node.is_connected();
    if !was_connected {
        node.connect(false)?;
    }

    let result = node
        .request("CLUSTER", &["SLOTS"])
        .and_then(|reply| parse_slots(reply, &node.config()));

    if !was_connected {
        node.disconnect();
    }

    let shards = result?;
    if shards.is_empty() {
        return Err(Error::NoService("no cluster shards".to_string()));
    }

    debug!(node = %node.id(), "discovered {} cluster shards", shards.len());
    Ok(shards)
}

impl Cluster {
    /// Configures a cluster from one of its nodes. The node is connected
    /// for the discovery if needed, and left the way it was found.
    pub fn new(node: &Redis) -> Result<Cluster> {
        let shards = discover(node)?;
        info!(node = %node.id(), shards = shards.len(), "configured Redis cluster");

        Ok(Cluster {
            inner: Arc::new(ClusterShared {
                shards: Mutex::new(shards),
                use_pipeline: node.has_pipeline(),
                reconfiguring: AtomicBool::new(false),
            }),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.inner.shards.lock().len()
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.inner.reconfiguring.load(Ordering::Acquire)
    }

    /// The server of the shard serving a key, connecting it if necessary.
    pub fn shard(&self, key: &str) -> Result<Redis> {
        if key.is_empty() {
            return invalid_argument!("empty key");
        }

        let slot = hash_slot(key.as_bytes());

        // Connecting may block, so it happens outside the shards lock.
        let candidates: Vec<Redis> = self
            .inner
            .shards
            .lock()
            .iter()
            .filter(|s| s.contains(slot))
            .flat_map(|s| s.servers.iter().cloned())
            .collect();

        for server in candidates {
            if !server.is_connected() {
                match server.connect(self.inner.use_pipeline) {
                    Ok(()) | Err(Error::AlreadyConnected) => {}
                    Err(e) => {
                        debug!(server = %server.id(), "shard server unavailable: {e}");
                        continue;
                    }
                }
            }
            return Ok(server);
        }

        Err(Error::NoService(format!("no server found for hash slot {slot}")))
    }

    /// Connects all servers of all shards. Returns the first error, after
    /// trying every server.
    pub fn connect(&self) -> Result<()> {
        let mut status = Ok(());

        for shard in self.inner.shards.lock().iter() {
            for server in &shard.servers {
                match server.connect(self.inner.use_pipeline) {
                    Ok(()) | Err(Error::AlreadyConnected) => {}
                    Err(e) => {
                        warn!(server = %server.id(), "failed to connect shard server: {e}");
                        if status.is_ok() {
                            status = Err(e);
                        }
                    }
                }
            }
        }

        status
    }

    pub fn disconnect(&self) {
        for shard in self.inner.shards.lock().iter() {
            shard.disconnect();
        }
    }

    /// Rediscovers the cluster layout in the background, e.g. after a
    /// `MOVED` redirection. Does nothing if a refresh is already under way.
    pub fn refresh(&self) -> Result<()> {
        if self.inner.reconfiguring.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name("redisx-cluster".to_string())
            .spawn(move || inner.refresh());

        if let Err(e) = spawned {
            self.inner.reconfiguring.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }
}

impl ClusterShared {
    fn refresh(&self) {
        let nodes: Vec<Redis> = self
            .shards
            .lock()
            .iter()
            .flat_map(|s| s.servers.iter().cloned())
            .collect();

        for node in &nodes {
            match discover(node) {
                Ok(shards) => {
                    let old = std::mem::replace(&mut *self.shards.lock(), shards);
                    for shard in &old {
                        shard.disconnect();
                    }
                    info!(node = %node.id(), "reconfigured Redis cluster");
                    break;
                }
                Err(e) => debug!(node = %node.id(), "cluster discovery failed: {e}"),
            }
        }

        self.reconfiguring.store(false, Ordering::Release);
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.disconnect();
    }
}
