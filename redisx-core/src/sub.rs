//! PUB/SUB messaging: publishing, subscribing and the dispatch of incoming
//! messages to subscriber callbacks.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, warn};

use crate::client::{Channel, ClientGuard};
use crate::tab::is_glob_pattern;
use crate::{Redis, Resp, Result, invalid_argument};

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The pattern that matched, for pattern subscriptions.
    pub pattern: Option<String>,
    pub channel: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).to_string()
    }
}

/// A callback receiving subscription messages.
pub type Subscriber = Arc<dyn Fn(&Message) + Send + Sync>;

pub(crate) struct Subscription {
    callback: Subscriber,
    stem: Option<String>,
}

impl Subscription {
    fn accepts(&self, channel: &str) -> bool {
        self.stem
            .as_deref()
            .is_none_or(|stem| channel.starts_with(stem))
    }
}

fn text_of(resp: &Resp) -> String {
    resp.as_text().unwrap_or_default()
}

fn payload_of(resp: &Resp) -> Vec<u8> {
    resp.as_bytes().map(<[u8]>::to_vec).unwrap_or_default()
}

/// Decodes a `message` or `pmessage` frame. Other frames, such as
/// subscription confirmations, yield `None`.
pub(crate) fn decode_message(reply: Resp) -> Option<Message> {
    let items = match reply {
        Resp::Array(items) | Resp::Push(items) => items,
        other => {
            warn!("unexpected subscriber response type: {}", other.resp_type());
            return None;
        }
    };

    let kind = items.first().and_then(Resp::as_text).unwrap_or_default();
    match (kind.as_str(), items.as_slice()) {
        ("message", [_, channel, payload]) => Some(Message {
            pattern: None,
            channel: text_of(channel),
            payload: payload_of(payload),
        }),
        ("pmessage", [_, pattern, channel, payload]) => Some(Message {
            pattern: Some(text_of(pattern)),
            channel: text_of(channel),
            payload: payload_of(payload),
        }),
        ("message" | "pmessage", _) => {
            warn!("unexpected {kind} dimension: {}", items.len());
            None
        }
        _ => {
            debug!("subscription {kind}");
            None
        }
    }
}

impl ClientGuard<'_> {
    /// Publishes a message, telling the server not to reply.
    pub fn publish(&mut self, channel: &str, data: &[u8]) -> Result<()> {
        if channel.is_empty() {
            return invalid_argument!("empty channel name");
        }

        self.skip_reply()?;
        self.send_array_request(&[&b"PUBLISH"[..], channel.as_bytes(), data])
    }
}

impl Redis {
    /// Publishes a message on a PUB/SUB channel, over the interactive
    /// connection.
    pub fn publish(&self, channel: &str, data: &[u8]) -> Result<()> {
        if channel.is_empty() {
            return invalid_argument!("empty channel name");
        }
        self.locked_connected_client(Channel::Interactive)?
            .publish(channel, data)
    }

    /// Publishes a text message.
    pub fn notify(&self, channel: &str, text: &str) -> Result<()> {
        self.publish(channel, text.as_bytes())
    }

    /// Subscribes to a channel, or to channels matching a glob pattern. The
    /// subscription connection and its listener are started as needed.
    ///
    /// Messages are delivered to the callbacks added with
    /// [`Redis::add_subscriber`].
    pub fn subscribe(&self, pattern: &str) -> Result<()> {
        if pattern.is_empty() {
            return invalid_argument!("empty subscription pattern");
        }

        {
            let _connection = self.inner.connection.lock();
            self.connect_client(Channel::Subscription)?;
            if !self.inner.subscription_listener.is_running() {
                self.start_subscription_listener()?;
            }
        }

        let command = if is_glob_pattern(pattern) {
            "PSUBSCRIBE"
        } else {
            "SUBSCRIBE"
        };

        self.locked_connected_client(Channel::Subscription)?
            .send_request(command, &[pattern])
    }

    /// Unsubscribes from a channel or pattern, or from everything.
    pub fn unsubscribe(&self, pattern: Option<&str>) -> Result<()> {
        let mut guard = self.locked_connected_client(Channel::Subscription)?;

        match pattern {
            Some(p) if is_glob_pattern(p) => guard.send_request("PUNSUBSCRIBE", &[p]),
            Some(p) => guard.send_request("UNSUBSCRIBE", &[p]),
            None => {
                guard.send_request("UNSUBSCRIBE", &[])?;
                guard.send_request("PUNSUBSCRIBE", &[])
            }
        }
    }

    /// Unsubscribes from everything, stops the listener and closes the
    /// subscription connection.
    pub fn end_subscription(&self) -> Result<()> {
        let _connection = self.inner.connection.lock();

        if let Err(e) = self.unsubscribe(None) {
            debug!("unsubscribe: {e}");
        }

        self.inner.subscription_listener.stop();
        let client = self.client(Channel::Subscription);
        client.shutdown();
        client.lock().close();
        Ok(())
    }

    /// Adds a subscriber callback for channels starting with `stem`, or for
    /// all channels. The same callback with the same stem is added only
    /// once.
    pub fn add_subscriber(&self, stem: Option<&str>, callback: Subscriber) {
        let mut subscriptions = self.inner.subscriptions.lock();

        if subscriptions
            .iter()
            .any(|s| Arc::ptr_eq(&s.callback, &callback) && s.stem.as_deref() == stem)
        {
            debug!("subscriber already listed for stem {stem:?}");
            return;
        }

        subscriptions.push(Subscription {
            callback,
            stem: stem.map(str::to_string),
        });
    }

    /// Removes every registration of a callback, returning how many were
    /// removed.
    pub fn remove_subscribers(&self, callback: &Subscriber) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| !Arc::ptr_eq(&s.callback, callback));
        before - subscriptions.len()
    }

    pub fn clear_subscribers(&self) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock();
        let n = subscriptions.len();
        subscriptions.clear();
        n
    }

    fn deliver(&self, message: &Message) {
        let callbacks: Vec<Subscriber> = self
            .inner
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.accepts(&message.channel))
            .map(|s| s.callback.clone())
            .collect();

        for callback in callbacks {
            callback(message);
        }
    }

    fn start_subscription_listener(&self) -> Result<()> {
        let generation = self.inner.subscription_listener.start();
        let redis = self.clone();

        thread::Builder::new()
            .name("redisx-subscription".to_string())
            .spawn(move || redis.subscription_listener(generation))?;
        Ok(())
    }

    fn subscription_listener(&self, generation: u64) {
        let client = self.client(Channel::Subscription);
        let listener = &self.inner.subscription_listener;
        debug!(server = %self.id(), "subscription listener started");

        while client.is_enabled() && listener.is_current(generation) {
            match client.read_reply() {
                Ok(reply) => {
                    if let Some(message) = decode_message(reply) {
                        self.deliver(&message);
                    }
                }
                Err(e) => {
                    if listener.is_current(generation) {
                        error!(server = %self.id(), "subscription listener: {e}");
                    }
                    break;
                }
            }
        }

        listener.finish(generation);
        debug!(server = %self.id(), "subscription listener stopped");
    }
}
