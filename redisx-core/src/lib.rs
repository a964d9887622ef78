/*!
 * # RedisX - A Redis / Valkey client library
 *
 * RedisX talks to Redis-compatible servers over blocking TCP sockets, with
 * background threads for the traffic that does not fit the request / reply
 * pattern:
 * - Three connections per server: interactive, pipeline and subscription
 * - RESP2 and RESP3, negotiated with `HELLO`
 * - PUB/SUB with callbacks filtered by channel stem
 * - Pipelined requests, consumed by a background listener
 * - Transactions, LUA scripts, hash tables and key scans
 * - Sentinel master discovery and cluster shard lookup
 *
 * ## Core Modules
 *
 * ### Protocol (`resp3`, `format`)
 * - `Resp`: a decoded RESP value of any type
 * - `Resp::parse()` / `Resp::encode()`: wire format conversions
 * - `Resp::check()`: validation of replies, turning error replies into errors
 * - Pretty, delimited and JSON renderings
 *
 * ### Connections (`redis`, `client`, `hooks`)
 * - `Redis`: a server instance, its configuration and its connections
 * - `Client` / `ClientGuard`: exclusive access to one connection
 * - Connect and disconnect hooks
 *
 * ### Higher level access (`tab`, `sub`, `script`)
 * Key / value and hash table helpers, PUB/SUB and scripting.
 *
 * ### High availability (`sentinel`, `cluster`)
 * Discovering the master from Sentinel servers and routing keys to cluster
 * shards.
 *
 */

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod format;
pub mod hooks;
pub mod redis;
pub mod resp3;
pub mod script;
pub mod sentinel;
pub mod sub;
pub mod tab;

pub use client::*;
pub use cluster::*;
pub use config::*;
pub use error::*;
pub use format::*;
pub use hooks::Hook;
pub use redis::*;
pub use resp3::*;
pub use sentinel::*;
pub use sub::*;
pub use tab::*;
