//! A small in-memory Redis stand-in, served by tokio on a thread of its own,
//! so that the blocking client can be tested without a real server.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::TcpListener as StdListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use glob::Pattern;
use libredisx::{Error, Resp};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Replication role reported by `ROLE` and `INFO`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Master,
    Replica,
    Sentinel,
}

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    pub password: Option<String>,
    /// Answer `HELLO` as an unknown command, like servers before 6.0.
    pub no_hello: bool,
    pub role: Role,
    /// Master address returned by `SENTINEL get-master-addr-by-name`.
    pub master: Option<(String, u16)>,
    /// Reply to `CLUSTER SLOTS`.
    pub slots: Option<Resp>,
}

enum Value {
    Str(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
}

type Keyspace = BTreeMap<String, Value>;

struct State {
    options: MockOptions,
    dbs: Mutex<HashMap<usize, Keyspace>>,
    scripts: Mutex<HashMap<String, String>>,
    client_names: Mutex<Vec<String>>,
    commands: Mutex<Vec<Vec<String>>>,
    subscriptions: AtomicUsize,
    connections: AtomicUsize,
    messages: broadcast::Sender<(String, Vec<u8>)>,
}

pub struct MockServer {
    pub port: u16,
    state: Arc<State>,
    shutdown: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start() -> Self {
        Self::with_options(MockOptions::default())
    }

    pub fn with_options(options: MockOptions) -> Self {
        let listener = StdListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("mock server address").port();
        listener.set_nonblocking(true).expect("non-blocking listener");

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let (messages, _) = broadcast::channel(256);

        let state = Arc::new(State {
            options,
            dbs: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            client_names: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            subscriptions: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            messages,
        });

        let handle = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .expect("mock server runtime");
                runtime.block_on(serve(listener, state, shutdown_rx));
            })
        };

        Self {
            port,
            state,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Every command received so far, with its arguments.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.commands.lock().clone()
    }

    /// Number of received commands named `name`, case insensitive.
    pub fn count(&self, name: &str) -> usize {
        self.state
            .commands
            .lock()
            .iter()
            .filter(|c| c.first().is_some_and(|c| c.eq_ignore_ascii_case(name)))
            .count()
    }

    pub fn client_names(&self) -> Vec<String> {
        self.state.client_names.lock().clone()
    }

    /// Number of open client connections.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn set(&self, db: usize, key: &str, value: &str) {
        self.state
            .dbs
            .lock()
            .entry(db)
            .or_default()
            .insert(key.to_string(), Value::Str(value.as_bytes().to_vec()));
    }

    pub fn get(&self, db: usize, key: &str) -> Option<Vec<u8>> {
        match self.state.dbs.lock().get(&db)?.get(key)? {
            Value::Str(v) => Some(v.clone()),
            Value::Hash(_) => None,
        }
    }

    /// Number of channels and patterns currently subscribed.
    pub fn subscription_count(&self) -> usize {
        self.state.subscriptions.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` channels or patterns are subscribed.
    pub fn wait_for_subscriptions(&self, n: usize) -> bool {
        wait_until(Duration::from_secs(3), || {
            self.state.subscriptions.load(Ordering::SeqCst) >= n
        })
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Polls `condition` until it holds or the timeout expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

async fn serve(listener: StdListener, state: Arc<State>, mut shutdown: broadcast::Receiver<()>) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            Ok((socket, _)) = listener.accept() => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_client(socket, state).await;
                });
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, state: Arc<State>) {
    state.connections.fetch_add(1, Ordering::SeqCst);

    let mut conn = Connection::default();
    session(&mut stream, &state, &mut conn).await;

    let subscribed = conn.channels.len() + conn.patterns.len();
    state.subscriptions.fetch_sub(subscribed, Ordering::SeqCst);
    state.connections.fetch_sub(1, Ordering::SeqCst);
}

async fn session(stream: &mut TcpStream, state: &State, conn: &mut Connection) {
    let mut messages = state.messages.subscribe();
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let subscribed = conn.is_subscribed();

        tokio::select! {
            read = stream.read(&mut chunk) => {
                let n = match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                buffer.extend_from_slice(&chunk[..n]);

                let mut out = Vec::new();
                loop {
                    match Resp::parse(&buffer) {
                        Ok((request, consumed)) => {
                            buffer.drain(..consumed);
                            if let Some(reply) = conn.execute(state, to_args(request)) {
                                out.extend_from_slice(&reply);
                            }
                        }
                        Err(Error::Incomplete) => break,
                        Err(_) => return,
                    }
                }

                if !out.is_empty() && stream.write_all(&out).await.is_err() {
                    break;
                }
            }
            message = messages.recv(), if subscribed => {
                match message {
                    Ok((channel, payload)) => {
                        let out = conn.deliver(&channel, &payload);
                        if !out.is_empty() && stream.write_all(&out).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        }
    }
}

fn to_args(request: Resp) -> Vec<Vec<u8>> {
    request
        .into_array()
        .unwrap_or_default()
        .into_iter()
        .map(|arg| arg.as_bytes().map(<[u8]>::to_vec).unwrap_or_default())
        .collect()
}

fn text(arg: &[u8]) -> String {
    String::from_utf8_lossy(arg).to_string()
}

fn bulk(data: impl AsRef<[u8]>) -> Resp {
    Resp::BulkString(data.as_ref().to_vec())
}

fn ok() -> Resp {
    Resp::SimpleString("OK".to_string())
}

fn err(msg: &str) -> Resp {
    Resp::Error(msg.to_string())
}

fn wrong_args(command: &str) -> Resp {
    Resp::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        command.to_lowercase()
    ))
}

fn matches(pattern: Option<&Pattern>, name: &str) -> bool {
    pattern.is_none_or(|p| p.matches(name))
}

/// The `SCAN` family returns two items per batch, and repeats the last item
/// of the previous batch, the way a real server may when rehashing.
fn scan_batch<T: Clone>(items: &[T], cursor: usize, count: usize) -> (usize, Vec<T>) {
    let start = cursor.saturating_sub(1).min(items.len());
    let end = (cursor + count).min(items.len());
    let next = if end >= items.len() { 0 } else { end };
    (next, items[start..end].to_vec())
}

fn scan_options(args: &[Vec<u8>]) -> (Option<Pattern>, usize) {
    let mut pattern = None;
    let mut count = 2;
    let mut i = 0;
    while i + 1 < args.len() {
        match text(&args[i]).to_uppercase().as_str() {
            "MATCH" => pattern = Pattern::new(&text(&args[i + 1])).ok(),
            "COUNT" => count = text(&args[i + 1]).parse().unwrap_or(count),
            _ => {}
        }
        i += 2;
    }
    (pattern, count.max(1))
}

fn sha1_of(script: &str) -> String {
    // not a real SHA1, only needs to be stable and 40 characters long
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in script.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}{:024x}", script.len())
}

struct Connection {
    proto: i64,
    db: usize,
    authenticated: bool,
    skip_next: bool,
    /// Client side caching: writes are followed by invalidation pushes.
    tracking: bool,
    queued: Option<Vec<Vec<Vec<u8>>>>,
    channels: Vec<String>,
    patterns: Vec<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            proto: 2,
            db: 0,
            authenticated: false,
            skip_next: false,
            tracking: false,
            queued: None,
            channels: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl Connection {
    fn is_subscribed(&self) -> bool {
        !self.channels.is_empty() || !self.patterns.is_empty()
    }

    /// Adapts RESP3 replies for RESP2 connections.
    fn downgrade(&self, reply: Resp) -> Resp {
        if self.proto >= 3 {
            return reply;
        }
        match reply {
            Resp::Map(pairs) => Resp::Array(
                pairs
                    .into_iter()
                    .flat_map(|(k, v)| [self.downgrade(k), self.downgrade(v)])
                    .collect(),
            ),
            Resp::Push(items) | Resp::Set(items) | Resp::Array(items) => {
                Resp::Array(items.into_iter().map(|i| self.downgrade(i)).collect())
            }
            other => other,
        }
    }

    fn push(&self, items: Vec<Resp>) -> Vec<u8> {
        self.downgrade(Resp::Push(items)).encode()
    }

    fn execute(&mut self, state: &State, args: Vec<Vec<u8>>) -> Option<Vec<u8>> {
        let Some(first) = args.first() else {
            return Some(err("ERR empty command").encode());
        };
        let command = text(first).to_uppercase();
        state
            .commands
            .lock()
            .push(args.iter().map(|a| text(a)).collect());

        if command == "CLIENT"
            && args.len() == 3
            && text(&args[1]).eq_ignore_ascii_case("REPLY")
            && text(&args[2]).eq_ignore_ascii_case("SKIP")
        {
            self.skip_next = true;
            return None;
        }
        let silent = std::mem::take(&mut self.skip_next);

        if let Some(queued) = self.queued.as_mut()
            && !matches!(command.as_str(), "EXEC" | "DISCARD" | "MULTI")
        {
            queued.push(args);
            return (!silent).then(|| Resp::SimpleString("QUEUED".to_string()).encode());
        }

        let out = match command.as_str() {
            "SUBSCRIBE" | "PSUBSCRIBE" | "UNSUBSCRIBE" | "PUNSUBSCRIBE" => {
                self.subscription(state, &command, &args[1..])
            }
            "MULTI" => {
                if self.queued.is_some() {
                    err("ERR MULTI calls can not be nested").encode()
                } else {
                    self.queued = Some(Vec::new());
                    ok().encode()
                }
            }
            "EXEC" => match self.queued.take() {
                Some(queued) => {
                    let results = queued
                        .into_iter()
                        .map(|args| self.command(state, args))
                        .collect();
                    self.downgrade(Resp::Array(results)).encode()
                }
                None => err("ERR EXEC without MULTI").encode(),
            },
            "DISCARD" => match self.queued.take() {
                Some(_) => ok().encode(),
                None => err("ERR DISCARD without MULTI").encode(),
            },
            _ => {
                let invalidated = self.invalidated_keys(&command, &args[1..]);
                let mut out = Vec::new();
                if !invalidated.is_empty() {
                    let keys = invalidated.into_iter().map(bulk).collect();
                    out.extend(self.push(vec![bulk("invalidate"), Resp::Array(keys)]));
                }
                let reply = self.command(state, args);
                out.extend(self.downgrade(reply).encode());
                out
            }
        };

        (!silent).then_some(out)
    }

    /// Keys a write invalidates while tracking is on. Invalidations are
    /// only sent in-band on RESP3 connections.
    fn invalidated_keys<'a>(&self, command: &str, params: &'a [Vec<u8>]) -> &'a [Vec<u8>] {
        if !self.tracking || self.proto < 3 {
            return &[];
        }
        match (command, params) {
            ("DEL", keys) => keys,
            ("SET" | "HSET" | "HMSET" | "HDEL", [key, ..]) => std::slice::from_ref(key),
            _ => &[],
        }
    }

    fn subscription(&mut self, state: &State, command: &str, names: &[Vec<u8>]) -> Vec<u8> {
        let kind = command.to_lowercase();
        let mut out = Vec::new();

        let names: Vec<String> = if names.is_empty() {
            match command {
                "UNSUBSCRIBE" => self.channels.clone(),
                "PUNSUBSCRIBE" => self.patterns.clone(),
                _ => return wrong_args(command).encode(),
            }
        } else {
            names.iter().map(|n| text(n)).collect()
        };

        for name in names {
            let list = match command {
                "SUBSCRIBE" | "UNSUBSCRIBE" => &mut self.channels,
                _ => &mut self.patterns,
            };
            let known = list.contains(&name);

            match command {
                "SUBSCRIBE" | "PSUBSCRIBE" if !known => {
                    list.push(name.clone());
                    state.subscriptions.fetch_add(1, Ordering::SeqCst);
                }
                "UNSUBSCRIBE" | "PUNSUBSCRIBE" if known => {
                    list.retain(|n| n != &name);
                    state.subscriptions.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }

            let count = (self.channels.len() + self.patterns.len()) as i64;
            out.extend(self.push(vec![bulk(&kind), bulk(&name), Resp::Integer(count)]));
        }

        out
    }

    fn deliver(&self, channel: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();

        if self.channels.iter().any(|c| c == channel) {
            out.extend(self.push(vec![bulk("message"), bulk(channel), bulk(payload)]));
        }
        for pattern in &self.patterns {
            if Pattern::new(pattern).is_ok_and(|p| p.matches(channel)) {
                out.extend(self.push(vec![
                    bulk("pmessage"),
                    bulk(pattern),
                    bulk(channel),
                    bulk(payload),
                ]));
            }
        }

        out
    }

    fn hello(&mut self, state: &State, args: &[Vec<u8>]) -> Resp {
        if state.options.no_hello {
            return err("ERR unknown command 'HELLO'");
        }

        let proto = match args.first().map(|a| text(a).parse::<i64>()) {
            None => self.proto,
            Some(Ok(p @ (2 | 3))) => p,
            Some(_) => return err("NOPROTO unsupported protocol version"),
        };

        let mut i = 1;
        while i < args.len() {
            match text(&args[i]).to_uppercase().as_str() {
                "AUTH" if i + 2 < args.len() => {
                    if state.options.password.as_deref() != Some(text(&args[i + 2]).as_str()) {
                        return err("WRONGPASS invalid username-password pair");
                    }
                    self.authenticated = true;
                    i += 3;
                }
                "SETNAME" if i + 1 < args.len() => {
                    state.client_names.lock().push(text(&args[i + 1]));
                    i += 2;
                }
                _ => return err("ERR syntax error in HELLO option"),
            }
        }

        if state.options.password.is_some() && !self.authenticated {
            return err("NOAUTH HELLO must be called with the client already authenticated");
        }

        self.proto = proto;
        Resp::Map(vec![
            (bulk("server"), bulk("redis")),
            (bulk("version"), bulk("7.2.4")),
            (bulk("proto"), Resp::Integer(proto)),
            (bulk("id"), Resp::Integer(state.connections.load(Ordering::SeqCst) as i64)),
            (bulk("mode"), bulk("standalone")),
            (bulk("role"), bulk("master")),
            (bulk("modules"), Resp::Array(Vec::new())),
        ])
    }

    fn command(&mut self, state: &State, args: Vec<Vec<u8>>) -> Resp {
        let command = text(&args[0]).to_uppercase();
        let params = &args[1..];

        match command.as_str() {
            "HELLO" => return self.hello(state, params),
            "AUTH" => {
                let password = params.last().map(|p| text(p));
                return match (&state.options.password, password) {
                    (Some(expected), Some(given)) if *expected == given => {
                        self.authenticated = true;
                        ok()
                    }
                    (None, _) => err("ERR AUTH called without any password configured"),
                    _ => err("WRONGPASS invalid username-password pair"),
                };
            }
            "RESET" => {
                *self = Connection::default();
                return Resp::SimpleString("RESET".to_string());
            }
            _ => {}
        }

        if state.options.password.is_some() && !self.authenticated {
            return err("NOAUTH Authentication required.");
        }

        let mut dbs = state.dbs.lock();
        let keys = dbs.entry(self.db).or_default();

        match (command.as_str(), params) {
            ("PING", []) => Resp::SimpleString("PONG".to_string()),
            ("PING" | "ECHO", [msg]) => bulk(msg),
            ("CLIENT", [sub, name]) if text(sub).eq_ignore_ascii_case("SETNAME") => {
                state.client_names.lock().push(text(name));
                ok()
            }
            ("CLIENT", [sub, mode]) if text(sub).eq_ignore_ascii_case("TRACKING") => {
                self.tracking = text(mode).eq_ignore_ascii_case("ON");
                ok()
            }
            ("SELECT", [index]) => match text(index).parse::<usize>() {
                Ok(index) if index < 16 => {
                    self.db = index;
                    ok()
                }
                _ => err("ERR DB index is out of range"),
            },
            ("SET", [key, value]) => {
                keys.insert(text(key), Value::Str(value.clone()));
                ok()
            }
            ("GET", [key]) => match keys.get(&text(key)) {
                Some(Value::Str(v)) => bulk(v),
                Some(Value::Hash(_)) => err(WRONGTYPE),
                None => Resp::Null,
            },
            ("HSET" | "HMSET", [table, fields @ ..]) if !fields.is_empty() && fields.len() % 2 == 0 => {
                let entry = keys
                    .entry(text(table))
                    .or_insert_with(|| Value::Hash(BTreeMap::new()));
                let Value::Hash(hash) = entry else {
                    return err(WRONGTYPE);
                };
                let mut added = 0;
                for pair in fields.chunks(2) {
                    if hash.insert(text(&pair[0]), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                if command == "HMSET" { ok() } else { Resp::Integer(added) }
            }
            ("HGET", [table, field]) => match keys.get(&text(table)) {
                Some(Value::Hash(hash)) => hash.get(&text(field)).map_or(Resp::Null, bulk),
                Some(Value::Str(_)) => err(WRONGTYPE),
                None => Resp::Null,
            },
            ("HGETALL", [table]) => match keys.get(&text(table)) {
                Some(Value::Hash(hash)) => Resp::Map(
                    hash.iter()
                        .map(|(k, v)| (bulk(k), bulk(v)))
                        .collect(),
                ),
                Some(Value::Str(_)) => err(WRONGTYPE),
                None => Resp::Map(Vec::new()),
            },
            ("HKEYS", [table]) => match keys.get(&text(table)) {
                Some(Value::Hash(hash)) => Resp::Array(hash.keys().map(bulk).collect()),
                Some(Value::Str(_)) => err(WRONGTYPE),
                None => Resp::Array(Vec::new()),
            },
            ("HDEL", [table, fields @ ..]) if !fields.is_empty() => match keys.get_mut(&text(table)) {
                Some(Value::Hash(hash)) => {
                    let removed = fields
                        .iter()
                        .filter(|f| hash.remove(&text(f)).is_some())
                        .count();
                    if hash.is_empty() {
                        keys.remove(&text(table));
                    }
                    Resp::Integer(removed as i64)
                }
                Some(Value::Str(_)) => err(WRONGTYPE),
                None => Resp::Integer(0),
            },
            ("DEL", names) if !names.is_empty() => Resp::Integer(
                names
                    .iter()
                    .filter(|n| keys.remove(&text(n)).is_some())
                    .count() as i64,
            ),
            ("KEYS", [pattern]) => {
                let pattern = Pattern::new(&text(pattern)).ok();
                Resp::Array(
                    keys.keys()
                        .filter(|k| matches(pattern.as_ref(), k))
                        .map(bulk)
                        .collect(),
                )
            }
            ("SCAN", [cursor, options @ ..]) => {
                let (pattern, count) = scan_options(options);
                let names: Vec<&String> = keys.keys().collect();
                let cursor = text(cursor).parse().unwrap_or(0);
                let (next, batch) = scan_batch(&names, cursor, count);
                Resp::Array(vec![
                    bulk(next.to_string()),
                    Resp::Array(
                        batch
                            .into_iter()
                            .filter(|k| matches(pattern.as_ref(), k))
                            .map(bulk)
                            .collect(),
                    ),
                ])
            }
            ("HSCAN", [table, cursor, options @ ..]) => {
                let hash = match keys.get(&text(table)) {
                    Some(Value::Hash(hash)) => hash,
                    Some(Value::Str(_)) => return err(WRONGTYPE),
                    None => {
                        return Resp::Array(vec![bulk("0"), Resp::Array(Vec::new())]);
                    }
                };
                let (pattern, count) = scan_options(options);
                let fields: Vec<(&String, &Vec<u8>)> = hash.iter().collect();
                let cursor = text(cursor).parse().unwrap_or(0);
                let (next, batch) = scan_batch(&fields, cursor, count);
                Resp::Array(vec![
                    bulk(next.to_string()),
                    Resp::Array(
                        batch
                            .into_iter()
                            .filter(|(k, _)| matches(pattern.as_ref(), k))
                            .flat_map(|(k, v)| [bulk(k), bulk(v)])
                            .collect(),
                    ),
                ])
            }
            ("TIME", []) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default();
                Resp::Array(vec![
                    bulk(now.as_secs().to_string()),
                    bulk(now.subsec_micros().to_string()),
                ])
            }
            ("SCRIPT", [sub, script]) if text(sub).eq_ignore_ascii_case("LOAD") => {
                let script = text(script);
                let sha = sha1_of(&script);
                state.scripts.lock().insert(sha.clone(), script);
                bulk(sha)
            }
            // Replies with the keys followed by the arguments it was given
            ("EVALSHA", [sha, nkeys, rest @ ..]) => {
                if !state.scripts.lock().contains_key(&text(sha)) {
                    return err("NOSCRIPT No matching script. Please use EVAL.");
                }
                match text(nkeys).parse::<usize>() {
                    Ok(n) if n <= rest.len() => Resp::Array(rest.iter().map(bulk).collect()),
                    _ => err("ERR Number of keys can't be greater than number of args"),
                }
            }
            ("PUBLISH", [channel, message]) => {
                let receivers = state
                    .messages
                    .send((text(channel), message.clone()))
                    .unwrap_or(0);
                Resp::Integer(receivers as i64)
            }
            ("ROLE", []) => match state.options.role {
                Role::Master => Resp::Array(vec![bulk("master"), Resp::Integer(0), Resp::Array(Vec::new())]),
                Role::Replica => Resp::Array(vec![
                    bulk("slave"),
                    bulk("127.0.0.1"),
                    Resp::Integer(6379),
                    bulk("connected"),
                    Resp::Integer(0),
                ]),
                Role::Sentinel => Resp::Array(vec![
                    bulk("sentinel"),
                    Resp::Array(vec![bulk("mymaster")]),
                ]),
            },
            ("INFO", _) => {
                let role = match state.options.role {
                    Role::Master => "master",
                    Role::Replica => "slave",
                    Role::Sentinel => "sentinel",
                };
                bulk(format!(
                    "# Replication\r\nrole:{role}\r\nconnected_slaves:0\r\n\r\n# Keyspace\r\ndb0:keys={}\r\n",
                    keys.len()
                ))
            }
            ("CLUSTER", [sub]) if text(sub).eq_ignore_ascii_case("SLOTS") => match &state.options.slots {
                Some(slots) => slots.clone(),
                None => err("ERR This instance has cluster support disabled"),
            },
            ("SENTINEL", [sub, _service]) if text(sub).eq_ignore_ascii_case("get-master-addr-by-name") => {
                match (&state.options.role, &state.options.master) {
                    (Role::Sentinel, Some((host, port))) => {
                        Resp::Array(vec![bulk(host), bulk(port.to_string())])
                    }
                    (Role::Sentinel, None) => Resp::Null,
                    _ => err("ERR unknown command 'SENTINEL'"),
                }
            }
            (
                "PING" | "ECHO" | "SELECT" | "SET" | "GET" | "HSET" | "HMSET" | "HGET" | "HGETALL"
                | "HKEYS" | "HDEL" | "DEL" | "KEYS" | "SCAN" | "HSCAN" | "TIME" | "EVALSHA"
                | "PUBLISH" | "ROLE",
                _,
            ) => wrong_args(&command),
            _ => Resp::Error(format!("ERR unknown command '{}'", text(&args[0]))),
        }
    }
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
