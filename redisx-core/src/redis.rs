use std::collections::HashMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::client::{Channel, Client, ClientGuard};
use crate::config::{Config, Protocol};
use crate::hooks::{self, Hook};
use crate::sentinel::SentinelConfig;
use crate::sub::Subscription;
use crate::{Error, Resp, RespType, Result, invalid_argument};

/// Receives the replies of the pipeline channel, other than simple string
/// confirmations.
pub type PipelineConsumer = Arc<dyn Fn(&Resp) + Send + Sync>;

/// Receives RESP3 push messages arriving on the interactive or pipeline
/// channels.
pub type PushProcessor = Arc<dyn Fn(Channel, &Resp) + Send + Sync>;

/// Called with the channel and the failed operation (`"send"` or `"read"`)
/// when a client loses its connection.
pub type TransmitErrorHandler = Arc<dyn Fn(&Redis, Channel, &str) + Send + Sync>;

/// Run state of a background listener thread. Only the most recently
/// started thread is current; older ones exit at their next check.
#[derive(Default)]
pub(crate) struct Listener {
    enabled: AtomicBool,
    generation: AtomicU64,
}

impl Listener {
    pub(crate) fn start(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.enabled.store(true, Ordering::Release);
        generation
    }

    pub(crate) fn stop(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::Acquire) == generation
    }

    /// Marks the listener stopped, unless a newer one took over already.
    pub(crate) fn finish(&self, generation: u64) {
        if self.generation.load(Ordering::Acquire) == generation {
            self.stop();
        }
    }
}

pub(crate) struct Shared {
    pub(crate) config: RwLock<Config>,
    /// Serializes connecting and disconnecting.
    pub(crate) connection: Mutex<()>,
    pub(crate) clients: [Client; 3],
    pub(crate) hello_data: Mutex<Option<Resp>>,
    pub(crate) sentinel: Mutex<Option<SentinelConfig>>,
    pub(crate) connect_hooks: Mutex<Vec<Hook>>,
    pub(crate) disconnect_hooks: Mutex<Vec<Hook>>,
    pub(crate) subscriptions: Mutex<Vec<Subscription>>,
    pub(crate) pipeline_consumer: RwLock<Option<PipelineConsumer>>,
    pub(crate) push_processor: RwLock<Option<PushProcessor>>,
    pub(crate) error_handler: RwLock<Option<TransmitErrorHandler>>,
    pub(crate) pipeline_listener: Listener,
    pub(crate) subscription_listener: Listener,
    db_hook: Hook,
}

/// A Redis / Valkey server instance, with its interactive, pipeline and
/// subscription connections.
///
/// `Redis` is a cheap handle: clones refer to the same instance.
#[derive(Clone)]
pub struct Redis {
    pub(crate) inner: Arc<Shared>,
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// The name a client announces with `CLIENT SETNAME`.
pub(crate) fn client_id(channel: Channel) -> String {
    format!("{}:pid-{}:{}", hostname(), std::process::id(), channel)
}

fn open_socket(config: &Config, channel: Channel, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;

    for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                if channel != Channel::Pipeline {
                    stream.set_nodelay(true)?;
                }
                if channel == Channel::Interactive {
                    stream.set_read_timeout(Some(timeout))?;
                }
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    match last_err {
        Some(e) => Err(e.into()),
        None => Err(Error::NoService(format!(
            "no address for {}",
            config.address()
        ))),
    }
}

/// Connect hook switching the clients to the configured database.
fn affirm_db(redis: &Redis) {
    let index = redis.inner.config.read().db_index;
    if let Err(e) = redis.switch_db(index) {
        warn!(server = %redis.id(), "failed to select database {index}: {e}");
    }
}

impl Redis {
    /// Creates an unconnected instance for a host name or IP address, which
    /// may carry a `:port` suffix.
    pub fn new(host: &str) -> Redis {
        Redis::from_config(Config::new(host))
    }

    pub fn from_config(config: Config) -> Redis {
        let inner = Arc::new_cyclic(|owner| Shared {
            config: RwLock::new(config),
            connection: Mutex::new(()),
            clients: Channel::ALL.map(|channel| Client::new(channel, owner.clone())),
            hello_data: Mutex::new(None),
            sentinel: Mutex::new(None),
            connect_hooks: Mutex::new(Vec::new()),
            disconnect_hooks: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            pipeline_consumer: RwLock::new(None),
            push_processor: RwLock::new(None),
            error_handler: RwLock::new(None),
            pipeline_listener: Listener::default(),
            subscription_listener: Listener::default(),
            db_hook: Arc::new(affirm_db),
        });

        Redis { inner }
    }

    /// `host:port` of the server currently configured.
    pub fn id(&self) -> String {
        self.inner.config.read().address()
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.inner.config.read().clone()
    }

    /// The protocol in use, as confirmed by `HELLO` when connected.
    pub fn protocol(&self) -> Protocol {
        self.inner.config.read().protocol
    }

    /// The server properties returned by `HELLO`, if any.
    pub fn hello_data(&self) -> Option<Resp> {
        self.inner.hello_data.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.client(Channel::Interactive).is_enabled()
    }

    pub fn has_pipeline(&self) -> bool {
        self.client(Channel::Pipeline).is_enabled()
    }

    pub fn client(&self, channel: Channel) -> &Client {
        &self.inner.clients[channel.index()]
    }

    /// Locks the client of a channel, if it is connected.
    pub fn locked_connected_client(&self, channel: Channel) -> Result<ClientGuard<'_>> {
        self.client(channel).lock_connected()
    }

    fn ensure_disconnected(&self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        Ok(())
    }

    pub fn set_user(&self, username: &str) -> Result<()> {
        self.ensure_disconnected()?;
        self.inner.config.write().username = Some(username.to_string());
        Ok(())
    }

    pub fn set_password(&self, password: &str) -> Result<()> {
        self.ensure_disconnected()?;
        self.inner.config.write().password = Some(password.to_string());
        Ok(())
    }

    pub fn set_hostname(&self, host: &str) -> Result<()> {
        self.ensure_disconnected()?;
        if self.is_sentinel() {
            return invalid_argument!("server is selected by Sentinel");
        }
        if host.is_empty() {
            return invalid_argument!("empty host name");
        }
        self.inner.config.write().host = host.to_string();
        Ok(())
    }

    pub fn set_port(&self, port: u16) -> Result<()> {
        self.ensure_disconnected()?;
        if self.is_sentinel() {
            return invalid_argument!("server is selected by Sentinel");
        }
        self.inner.config.write().port = port;
        Ok(())
    }

    /// Sets the socket timeout in milliseconds, <= 0 for the default. Takes
    /// effect with the next connection.
    pub fn set_socket_timeout(&self, millis: i64) -> Result<()> {
        self.inner.config.write().timeout_millis = millis;
        Ok(())
    }

    /// Requests a protocol version, to be negotiated with `HELLO` on the
    /// next connection.
    pub fn set_protocol(&self, protocol: Protocol) -> Result<()> {
        let mut config = self.inner.config.write();
        config.protocol = protocol;
        config.hello = true;
        Ok(())
    }

    pub fn set_scan_count(&self, count: i64) -> Result<()> {
        self.inner.config.write().scan_count = count;
        Ok(())
    }

    pub fn scan_count(&self) -> i64 {
        self.inner.config.read().scan_count
    }

    pub fn set_transmit_error_handler(&self, handler: Option<TransmitErrorHandler>) -> Result<()> {
        *self.inner.error_handler.write() = handler;
        Ok(())
    }

    pub fn set_pipeline_consumer(&self, consumer: Option<PipelineConsumer>) -> Result<()> {
        *self.inner.pipeline_consumer.write() = consumer;
        Ok(())
    }

    pub fn set_push_processor(&self, processor: Option<PushProcessor>) -> Result<()> {
        *self.inner.push_processor.write() = processor;
        Ok(())
    }

    /// Points the instance at another server. Used during Sentinel
    /// discovery.
    pub(crate) fn set_server(&self, host: &str, port: u16) {
        let mut config = self.inner.config.write();
        config.host = host.to_string();
        config.port = port;
    }

    /// Connects the client of a channel and greets the server.
    pub(crate) fn connect_client(&self, channel: Channel) -> Result<()> {
        let timeout = self.inner.config.read().timeout();
        self.connect_client_with(channel, timeout)
    }

    pub(crate) fn connect_client_with(&self, channel: Channel, timeout: Duration) -> Result<()> {
        let config = self.config();
        let client = self.client(channel);
        let mut guard = client.lock();

        if guard.is_enabled() {
            return Ok(());
        }

        debug!(server = %config.address(), %channel, "connecting");
        let stream = open_socket(&config, channel, timeout)?;
        guard.attach(stream)?;

        if let Err(e) = self.greet(&mut guard, &config) {
            guard.close();
            return Err(e);
        }

        info!(server = %config.address(), %channel, "connected");
        Ok(())
    }

    fn greet(&self, guard: &mut ClientGuard<'_>, config: &Config) -> Result<()> {
        let channel = guard.channel();
        let id = client_id(channel);

        if config.hello {
            match self.hello(guard, config, &id) {
                Ok(()) => return Ok(()),
                Err(e) if !guard.is_enabled() => return Err(e),
                Err(e) => {
                    warn!(server = %config.address(), "HELLO failed, falling back to RESP2: {e}");
                    let mut config = self.inner.config.write();
                    config.hello = false;
                    config.protocol = Protocol::Resp2;
                }
            }
        }

        if let Some(password) = &config.password {
            match &config.username {
                Some(user) => guard.send_request("AUTH", &[user, password])?,
                None => guard.send_request("AUTH", &[password])?,
            }
            guard
                .read_reply()?
                .check(Some(RespType::SimpleString), 0)?;
        }

        guard.skip_reply()?;
        guard.send_request("CLIENT", &["SETNAME", &id])
    }

    fn hello(&self, guard: &mut ClientGuard<'_>, config: &Config, id: &str) -> Result<()> {
        let version = config.protocol.version().to_string();
        let mut args = vec![version.as_str()];

        if let Some(password) = &config.password {
            args.push("AUTH");
            args.push(config.username.as_deref().unwrap_or("default"));
            args.push(password);
        }
        args.push("SETNAME");
        args.push(id);

        guard.send_request("HELLO", &args)?;
        let reply = guard.read_reply()?;

        if matches!(reply, Resp::Array(_)) {
            reply.check(Some(RespType::Array), 0)?;
        } else {
            reply.check(Some(RespType::Map), 0)?;
        }

        let data = match reply.into_map_pairs() {
            Some(pairs) => Resp::Map(pairs),
            None => {
                return Err(Error::UnexpectedResp {
                    expected: RespType::Map.to_string(),
                    got: RespType::Array.to_string(),
                });
            }
        };

        let negotiated = data
            .keyword_entry("proto")
            .and_then(Resp::as_integer)
            .and_then(Protocol::from_version);

        if let Some(protocol) = negotiated {
            self.inner.config.write().protocol = protocol;
        }

        if guard.channel() == Channel::Interactive {
            *self.inner.hello_data.lock() = Some(data);
        }
        Ok(())
    }

    /// Connects to the server: the interactive channel always, and the
    /// pipeline channel if `use_pipeline` is set. Connect hooks run once all
    /// requested channels are up.
    pub fn connect(&self, use_pipeline: bool) -> Result<()> {
        let _connection = self.inner.connection.lock();
        self.connect_locked(use_pipeline)
    }

    fn connect_locked(&self, use_pipeline: bool) -> Result<()> {
        self.ensure_disconnected()?;

        if self.is_sentinel() {
            self.connect_sentinel_master()?;
        } else {
            self.connect_client(Channel::Interactive)?;
        }

        if use_pipeline {
            if let Err(e) = self.connect_client(Channel::Pipeline) {
                self.client(Channel::Interactive).lock().close();
                return Err(e);
            }
            self.start_pipeline_listener()?;
        }

        info!(server = %self.id(), pipeline = use_pipeline, "connected to Redis");
        hooks::run(self, &self.inner.connect_hooks);
        Ok(())
    }

    /// Closes all connections of the instance and runs the disconnect hooks.
    pub fn disconnect(&self) {
        let _connection = self.inner.connection.lock();
        self.disconnect_locked();
    }

    pub(crate) fn disconnect_locked(&self) {
        self.inner.pipeline_listener.stop();
        self.inner.subscription_listener.stop();

        let order = [Channel::Subscription, Channel::Pipeline, Channel::Interactive];
        for channel in order {
            self.client(channel).shutdown();
        }
        for channel in order {
            self.client(channel).lock().close();
        }

        info!(server = %self.id(), "disconnected from Redis");
        hooks::run(self, &self.inner.disconnect_hooks);
    }

    pub fn reconnect(&self, use_pipeline: bool) -> Result<()> {
        let _connection = self.inner.connection.lock();
        self.disconnect_locked();
        self.connect_locked(use_pipeline)
    }

    fn start_pipeline_listener(&self) -> Result<()> {
        let generation = self.inner.pipeline_listener.start();
        let redis = self.clone();

        thread::Builder::new()
            .name("redisx-pipeline".to_string())
            .spawn(move || redis.pipeline_listener(generation))?;
        Ok(())
    }

    fn pipeline_listener(&self, generation: u64) {
        let client = self.client(Channel::Pipeline);
        let listener = &self.inner.pipeline_listener;
        debug!(server = %self.id(), "pipeline listener started");

        while client.is_enabled() && listener.is_current(generation) {
            match client.read_reply() {
                // confirmations
                Ok(Resp::SimpleString(_)) => {}
                Ok(reply) => {
                    let consumer = self.inner.pipeline_consumer.read().clone();
                    if let Some(consumer) = consumer {
                        consumer(&reply);
                    }
                }
                Err(e) => {
                    if listener.is_current(generation) {
                        error!(server = %self.id(), "pipeline listener: {e}");
                    }
                    break;
                }
            }
        }

        let pending = client.pending_requests();
        if pending > 0 {
            warn!(server = %self.id(), "pipeline listener exited with {pending} replies pending");
        }

        listener.finish(generation);
        debug!(server = %self.id(), "pipeline listener stopped");
    }

    /// Sends a request on the interactive channel and returns the reply.
    pub fn request(&self, command: &str, args: &[&str]) -> Result<Resp> {
        let mut guard = self.locked_connected_client(Channel::Interactive)?;
        guard.send_request(command, args)?;
        guard.read_reply()
    }

    /// Sends a request of binary safe arguments, the first of which is the
    /// command, on the interactive channel and returns the reply.
    pub fn array_request<A: AsRef<[u8]>>(&self, args: &[A]) -> Result<Resp> {
        if args.is_empty() {
            return invalid_argument!("empty request");
        }
        let mut guard = self.locked_connected_client(Channel::Interactive)?;
        guard.send_array_request(args)?;
        guard.read_reply()
    }

    /// Pings the server, optionally with a message that is echoed back.
    pub fn ping(&self, message: Option<&str>) -> Result<()> {
        let args: Vec<&str> = message.into_iter().collect();
        let reply = self.request("PING", &args)?;

        let (expected_type, expected) = match message {
            Some(msg) => (RespType::BulkString, msg),
            None => (RespType::SimpleString, "PONG"),
        };
        reply.check(Some(expected_type), 0)?;

        if reply.as_bytes() != Some(expected.as_bytes()) {
            return Err(Error::UnexpectedResp {
                expected: expected.to_string(),
                got: reply.as_text().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// The server's clock, as time elapsed since the UNIX epoch.
    pub fn get_time(&self) -> Result<Duration> {
        let reply = self.request("TIME", &[])?;
        reply.check(Some(RespType::Array), 2)?;

        let parts = reply.into_array().unwrap_or_default();
        let mut values = [0u64; 2];
        for (value, part) in values.iter_mut().zip(&parts) {
            part.check(Some(RespType::BulkString), 0)?;
            let text = part.as_text().unwrap_or_default();
            *value = match text.trim().parse::<u64>() {
                Ok(v) => v,
                Err(_) => return crate::parser_error!(format!("invalid time value `{text}`"), 0),
            };
        }

        Ok(Duration::from_secs(values[0]) + Duration::from_micros(values[1]))
    }

    /// Switches to another database. The choice is remembered and applied
    /// again whenever the instance (re)connects. Subscription connections
    /// cannot be switched.
    pub fn select_db(&self, index: i64) -> Result<()> {
        if index < 0 {
            return invalid_argument!(format!("invalid database index {index}"));
        }

        {
            let mut config = self.inner.config.write();
            if config.db_index == index {
                return Ok(());
            }
            config.db_index = index;
        }

        if index != 0 {
            hooks::add(&self.inner.connect_hooks, self.inner.db_hook.clone());
        } else {
            hooks::remove(&self.inner.connect_hooks, &self.inner.db_hook);
        }

        if !self.is_connected() {
            return Ok(());
        }
        self.switch_db(index)
    }

    fn switch_db(&self, index: i64) -> Result<()> {
        let arg = index.to_string();
        let mut status = Ok(());

        for channel in Channel::ALL {
            let Ok(mut guard) = self.locked_connected_client(channel) else {
                continue;
            };

            let result = match channel {
                Channel::Interactive => guard.send_request("SELECT", &[&arg]).and_then(|_| {
                    let reply = guard.read_reply()?;
                    reply.check(Some(RespType::SimpleString), 0)?;
                    if reply.as_bytes() != Some(b"OK") {
                        return Err(Error::UnexpectedResp {
                            expected: "OK".to_string(),
                            got: reply.as_text().unwrap_or_default(),
                        });
                    }
                    Ok(())
                }),
                Channel::Pipeline => guard
                    .skip_reply()
                    .and_then(|_| guard.send_request("SELECT", &[&arg])),
                Channel::Subscription => {
                    warn!(server = %self.id(), "cannot switch database of the subscription channel");
                    Err(Error::InvalidChannel)
                }
            };

            if let Err(e) = result {
                status = Err(e);
            }
        }

        status
    }

    /// Sends `RESET` on the client of a channel.
    pub fn reset_client(&self, channel: Channel) -> Result<()> {
        self.locked_connected_client(channel)?.reset()
    }

    /// Runs `INFO [section]` and returns the `key:value` properties.
    pub fn info(&self, section: Option<&str>) -> Result<HashMap<String, String>> {
        let args: Vec<&str> = section.into_iter().collect();
        let reply = self.request("INFO", &args)?;
        parse_info(&reply)
    }
}

pub(crate) fn parse_info(reply: &Resp) -> Result<HashMap<String, String>> {
    if !matches!(reply, Resp::BulkString(_) | Resp::VerbatimString { .. }) {
        reply.check(Some(RespType::BulkString), 0)?;
    }

    let text = reply.as_text().unwrap_or_default();
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}
