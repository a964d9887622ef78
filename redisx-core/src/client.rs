use std::fmt;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::config::{CMDBUF_SIZE, RCVBUF_SIZE};
use crate::redis::{Redis, Shared};
use crate::{Error, FrameScanner, Resp, RespType, Result, invalid_argument};

const SKIP_REPLY: &[u8] = b"*3\r\n$6\r\nCLIENT\r\n$5\r\nREPLY\r\n$4\r\nSKIP\r\n";

/// The three connections kept to every server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Request / reply traffic.
    Interactive = 0,
    /// Bulk requests whose replies are handed to a background consumer.
    Pipeline = 1,
    /// Pub/sub messages.
    Subscription = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Interactive, Channel::Pipeline, Channel::Subscription];

    pub fn from_index(index: usize) -> Result<Channel> {
        match index {
            0 => Ok(Channel::Interactive),
            1 => Ok(Channel::Pipeline),
            2 => Ok(Channel::Subscription),
            _ => Err(Error::InvalidChannel),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Interactive => "interactive",
            Channel::Pipeline => "pipeline",
            Channel::Subscription => "subscription",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default)]
struct Writer {
    stream: Option<TcpStream>,
    /// Set after `CLIENT REPLY SKIP`, so the next request is not counted as
    /// pending.
    skip_next: bool,
}

#[derive(Default)]
struct Reader {
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
    frame: FrameScanner,
}

impl Reader {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
            buffer: Vec::with_capacity(RCVBUF_SIZE),
            frame: FrameScanner::default(),
        }
    }

    /// Reads until the buffer holds a whole value, then decodes it once.
    fn read_resp(&mut self) -> Result<Resp> {
        loop {
            if let Some(end) = self.frame.scan(&self.buffer)? {
                let (resp, consumed) = Resp::parse(&self.buffer[..end])?;
                self.buffer.drain(..consumed);
                return Ok(resp);
            }

            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            let mut chunk = [0u8; RCVBUF_SIZE];
            let n = stream.read(&mut chunk)?;
            trace!("read {n} bytes");
            if n == 0 {
                // Remote end closed the connection.
                return Err(Error::IncompleteTransfer);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// A single connection to a server.
///
/// Sending is serialized by the client's lock (see [`Client::lock`]), while
/// replies are read under a separate read lock, which lets the background
/// listeners consume replies while requests are being sent.
pub struct Client {
    channel: Channel,
    enabled: AtomicBool,
    pending: AtomicI32,
    writer: Mutex<Writer>,
    reader: Mutex<Reader>,
    control: Mutex<Option<TcpStream>>,
    attributes: Mutex<Option<Resp>>,
    owner: Weak<Shared>,
}

impl Client {
    pub(crate) fn new(channel: Channel, owner: Weak<Shared>) -> Self {
        Self {
            channel,
            enabled: AtomicBool::new(false),
            pending: AtomicI32::new(0),
            writer: Mutex::new(Writer::default()),
            reader: Mutex::new(Reader::default()),
            control: Mutex::new(None),
            attributes: Mutex::new(None),
            owner,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Number of requests sent whose replies have not been read yet.
    pub fn pending_requests(&self) -> i32 {
        self.pending.load(Ordering::Acquire)
    }

    /// The RESP3 attributes that arrived with the last reply, if any.
    pub fn attributes(&self) -> Option<Resp> {
        self.attributes.lock().clone()
    }

    pub fn clear_attributes(&self) {
        *self.attributes.lock() = None;
    }

    /// Obtains exclusive access to the client for sending requests and reading
    /// their replies. The lock is released when the guard is dropped.
    pub fn lock(&self) -> ClientGuard<'_> {
        ClientGuard {
            client: self,
            writer: self.writer.lock(),
        }
    }

    /// Like [`Client::lock`], but fails with `Error::NotConnected` if the
    /// client is not connected.
    pub fn lock_connected(&self) -> Result<ClientGuard<'_>> {
        let guard = self.lock();
        if !self.is_enabled() {
            return Err(Error::NotConnected);
        }
        Ok(guard)
    }

    /// Reads the next reply.
    ///
    /// Attributes are stored and push messages on the interactive and
    /// pipeline channels go to the push processor; reading continues until a
    /// regular reply arrives.
    pub(crate) fn read_reply(&self) -> Result<Resp> {
        loop {
            let resp = self.read_resp()?;

            match resp {
                Resp::Attribute(_) => {
                    *self.attributes.lock() = Some(resp);
                }
                Resp::Push(_) if self.channel != Channel::Subscription => {
                    self.process_push(&resp);
                }
                resp => {
                    let _ = self
                        .pending
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                            Some(if n > 0 { n - 1 } else { 0 })
                        });
                    return Ok(resp);
                }
            }
        }
    }

    fn read_resp(&self) -> Result<Resp> {
        if !self.is_enabled() {
            return Err(Error::NotConnected);
        }

        let result = self.reader.lock().read_resp();
        if let Err(e) = &result {
            self.transmit_error("read", e);
        }
        result
    }

    fn process_push(&self, push: &Resp) {
        let Some(inner) = self.owner.upgrade() else {
            return;
        };

        let processor = inner.push_processor.read().clone();
        match processor {
            Some(f) => f(self.channel, push),
            None => debug!(channel = %self.channel, "ignoring push message"),
        }
    }

    /// Disables the client after a socket or protocol failure and notifies the
    /// transmit error handler. The handler runs on its own thread, so it may
    /// reconnect.
    fn transmit_error(&self, op: &'static str, err: &Error) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }

        let Some(inner) = self.owner.upgrade() else {
            return;
        };
        let redis = Redis { inner };

        warn!(
            server = %redis.id(),
            channel = %self.channel,
            "{op} failed: {err}"
        );

        let handler = redis.inner.error_handler.read().clone();
        if let Some(handler) = handler {
            let channel = self.channel;
            let spawned = thread::Builder::new()
                .name("redisx-error".to_string())
                .spawn(move || handler(&redis, channel, op));
            if let Err(e) = spawned {
                warn!("failed to start transmit error handler: {e}");
            }
        }
    }

    /// Stops all traffic on the client without waiting for its locks. Blocked
    /// reads return immediately.
    pub(crate) fn shutdown(&self) {
        self.enabled.store(false, Ordering::Release);
        if let Some(stream) = self.control.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Exclusive access to a [`Client`].
pub struct ClientGuard<'a> {
    client: &'a Client,
    writer: MutexGuard<'a, Writer>,
}

impl ClientGuard<'_> {
    pub fn client(&self) -> &Client {
        self.client
    }

    pub fn channel(&self) -> Channel {
        self.client.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    /// Takes ownership of a freshly connected socket.
    pub(crate) fn attach(&mut self, stream: TcpStream) -> Result<()> {
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;

        *self.client.reader.lock() = Reader::new(reader);
        *self.client.control.lock() = Some(control);
        self.writer.stream = Some(stream);
        self.writer.skip_next = false;

        self.client.pending.store(0, Ordering::Release);
        self.client.enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Shuts down and releases the socket, resetting the client state.
    pub(crate) fn close(&mut self) {
        self.client.shutdown();

        self.writer.stream = None;
        self.writer.skip_next = false;
        *self.client.reader.lock() = Reader::default();
        *self.client.control.lock() = None;
        *self.client.attributes.lock() = None;
        self.client.pending.store(0, Ordering::Release);
    }

    fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        if !self.client.is_enabled() {
            return Err(Error::NotConnected);
        }

        let stream = self.writer.stream.as_mut().ok_or(Error::NotConnected)?;
        if let Err(e) = stream.write_all(data) {
            let e = Error::from(e);
            self.client.transmit_error("send", &e);
            return Err(e);
        }
        Ok(())
    }

    fn count_request(&mut self) {
        if self.writer.skip_next {
            self.writer.skip_next = false;
        } else {
            self.client.pending.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Sends a command with string arguments.
    pub fn send_request(&mut self, command: &str, args: &[&str]) -> Result<()> {
        let mut all: Vec<&[u8]> = Vec::with_capacity(args.len() + 1);
        all.push(command.as_bytes());
        all.extend(args.iter().map(|a| a.as_bytes()));
        self.send_array_request(&all)
    }

    /// Sends a request made of binary safe arguments, the first of which is
    /// the command. The request is written in chunks of at most
    /// `CMDBUF_SIZE` bytes, except for single arguments that are larger.
    pub fn send_array_request<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        if args.is_empty() {
            return invalid_argument!("empty request");
        }

        let mut buf: Vec<u8> = Vec::with_capacity(CMDBUF_SIZE);
        buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());

        for arg in args {
            let arg = arg.as_ref();
            buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());

            if buf.len() + arg.len() + 2 > CMDBUF_SIZE {
                self.send_bytes(&buf)?;
                buf.clear();

                if arg.len() + 2 > CMDBUF_SIZE {
                    self.send_bytes(arg)?;
                    buf.extend_from_slice(b"\r\n");
                    continue;
                }
            }

            buf.extend_from_slice(arg);
            buf.extend_from_slice(b"\r\n");
        }

        if !buf.is_empty() {
            self.send_bytes(&buf)?;
        }

        self.count_request();
        debug!(
            channel = %self.client.channel,
            command = %String::from_utf8_lossy(args[0].as_ref()),
            "sent request"
        );
        Ok(())
    }

    /// Reads the next reply from the server.
    pub fn read_reply(&mut self) -> Result<Resp> {
        self.client.read_reply()
    }

    /// Reads and discards the next reply.
    pub fn ignore_reply(&mut self) -> Result<()> {
        self.read_reply().map(|_| ())
    }

    /// Instructs the server not to reply to the next request.
    pub fn skip_reply(&mut self) -> Result<()> {
        self.send_bytes(SKIP_REPLY)?;
        self.writer.skip_next = true;
        Ok(())
    }

    /// Reads replies until none are pending, returning the last one.
    fn drain_replies(&mut self) -> Result<Resp> {
        loop {
            let reply = self.read_reply()?;
            if self.client.pending_requests() <= 0 {
                return Ok(reply);
            }
        }
    }

    /// Starts a transaction block with `MULTI`. The acknowledgements of the
    /// commands that follow need not be read; they are consumed by
    /// [`ClientGuard::exec_block`] or [`ClientGuard::abort_block`].
    pub fn start_block(&mut self) -> Result<()> {
        self.send_request("MULTI", &[])
    }

    /// Discards the transaction block with `DISCARD`.
    pub fn abort_block(&mut self) -> Result<()> {
        self.send_request("DISCARD", &[])?;
        self.drain_replies().map(|_| ())
    }

    /// Executes the transaction block with `EXEC`, skipping the queued
    /// acknowledgements, and returns the array of results.
    pub fn exec_block(&mut self) -> Result<Resp> {
        self.send_request("EXEC", &[])?;

        match self.drain_replies()? {
            reply @ Resp::Array(_) => Ok(reply),
            Resp::Error(msg) => Err(Error::Redis(msg)),
            Resp::Null => Err(Error::Null),
            other => Err(Error::UnexpectedResp {
                expected: RespType::Array.to_string(),
                got: other.resp_type().to_string(),
            }),
        }
    }

    /// Resets the connection state on the server with `RESET`.
    pub fn reset(&mut self) -> Result<()> {
        self.send_request("RESET", &[])?;
        let reply = self.read_reply()?;
        reply.check(Some(RespType::SimpleString), 0)?;

        if reply.as_bytes() != Some(b"RESET") {
            return Err(Error::UnexpectedResp {
                expected: "RESET".to_string(),
                got: reply.as_text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}
