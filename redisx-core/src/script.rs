use crate::client::{Channel, ClientGuard};
use crate::{Redis, Resp, RespType, Result, invalid_argument};

impl ClientGuard<'_> {
    /// Sends `EVALSHA sha1 nkeys keys... params...` without reading the reply,
    /// e.g. on the pipeline channel.
    pub fn send_script(&mut self, sha1: &str, keys: &[&str], params: &[&str]) -> Result<()> {
        if sha1.is_empty() {
            return invalid_argument!("empty script SHA1");
        }

        let nkeys = keys.len().to_string();
        let mut args: Vec<&str> = Vec::with_capacity(3 + keys.len() + params.len());
        args.push("EVALSHA");
        args.push(sha1);
        args.push(&nkeys);
        args.extend_from_slice(keys);
        args.extend_from_slice(params);

        self.send_array_request(&args)
    }
}

impl Redis {
    /// Loads a LUA script into the server's script cache, returning its SHA1
    /// hash.
    pub fn load_script(&self, script: &str) -> Result<String> {
        if script.is_empty() {
            return invalid_argument!("empty script");
        }

        let reply = self.request("SCRIPT", &["LOAD", script])?;
        reply.check(Some(RespType::BulkString), 0)?;
        Ok(reply.as_text().unwrap_or_default())
    }

    /// Runs a cached script with the given keys and parameters, returning the
    /// raw reply.
    pub fn run_script(&self, sha1: &str, keys: &[&str], params: &[&str]) -> Result<Resp> {
        let mut guard = self.locked_connected_client(Channel::Interactive)?;
        guard.send_script(sha1, keys, params)?;
        guard.read_reply()
    }
}
