use std::sync::Arc;

use parking_lot::Mutex;

use crate::Redis;

/// A callback run after connecting to or disconnecting from a server.
pub type Hook = Arc<dyn Fn(&Redis) + Send + Sync>;

pub(crate) fn add(hooks: &Mutex<Vec<Hook>>, hook: Hook) {
    let mut hooks = hooks.lock();
    if !hooks.iter().any(|h| Arc::ptr_eq(h, &hook)) {
        hooks.push(hook);
    }
}

pub(crate) fn remove(hooks: &Mutex<Vec<Hook>>, hook: &Hook) {
    hooks.lock().retain(|h| !Arc::ptr_eq(h, hook));
}

/// Runs the hooks in the order they were added, outside the registry lock.
pub(crate) fn run(redis: &Redis, hooks: &Mutex<Vec<Hook>>) {
    let hooks = hooks.lock().clone();
    for hook in hooks {
        hook(redis);
    }
}

impl Redis {
    /// Adds a hook to run every time the instance connects. Adding the same
    /// hook again has no effect.
    pub fn add_connect_hook(&self, hook: Hook) {
        add(&self.inner.connect_hooks, hook);
    }

    pub fn remove_connect_hook(&self, hook: &Hook) {
        remove(&self.inner.connect_hooks, hook);
    }

    pub fn clear_connect_hooks(&self) {
        self.inner.connect_hooks.lock().clear();
    }

    /// Adds a hook to run every time the instance disconnects. Adding the
    /// same hook again has no effect.
    pub fn add_disconnect_hook(&self, hook: Hook) {
        add(&self.inner.disconnect_hooks, hook);
    }

    pub fn remove_disconnect_hook(&self, hook: &Hook) {
        remove(&self.inner.disconnect_hooks, hook);
    }

    pub fn clear_disconnect_hooks(&self) {
        self.inner.disconnect_hooks.lock().clear();
    }
}
