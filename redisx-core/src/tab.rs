//! Key / value access to plain keys and hash tables.

use glob::Pattern;
use tracing::debug;

use crate::client::{Channel, ClientGuard};
use crate::{Error, Redis, Resp, RespType, Result, invalid_argument};

/// A field of a hash table (or a plain key) with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
}

impl Entry {
    pub fn new(key: &str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// True if `s` contains glob special characters (`*`, `?` or `[`).
pub fn is_glob_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn check_table(table: Option<&str>) -> Result<()> {
    if table.is_some_and(str::is_empty) {
        return invalid_argument!("empty table name");
    }
    Ok(())
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return invalid_argument!("empty key");
    }
    Ok(())
}

fn expect_ok(reply: &Resp) -> Result<()> {
    if let Resp::Error(msg) = reply {
        return Err(Error::Redis(msg.clone()));
    }
    reply.check(Some(RespType::SimpleString), 0)?;
    if reply.as_bytes() != Some(b"OK") {
        return Err(Error::Redis(reply.as_text().unwrap_or_default()));
    }
    Ok(())
}

fn bulk_text(resp: &Resp) -> Result<String> {
    match resp {
        Resp::BulkString(_) | Resp::SimpleString(_) | Resp::VerbatimString { .. } => {
            Ok(resp.as_text().unwrap_or_default())
        }
        _ => {
            resp.check(Some(RespType::BulkString), 0)?;
            Ok(String::new())
        }
    }
}

fn to_entries(pairs: Vec<(Resp, Resp)>) -> Result<Vec<Entry>> {
    pairs
        .into_iter()
        .map(|(key, value)| {
            let key = bulk_text(&key)?;
            let value = match value {
                Resp::BulkString(b) => b,
                other => other.as_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
            };
            Ok(Entry { key, value })
        })
        .collect()
}

impl ClientGuard<'_> {
    /// Sets a plain key (`SET`) or a table field (`HSET`). Without
    /// confirmation the server is told to skip the reply.
    pub fn set_value(
        &mut self,
        table: Option<&str>,
        key: &str,
        value: &[u8],
        confirm: bool,
    ) -> Result<()> {
        check_table(table)?;
        check_key(key)?;

        if !confirm {
            self.skip_reply()?;
        }

        match table {
            None => self.send_array_request(&[&b"SET"[..], key.as_bytes(), value])?,
            Some(table) => self.send_array_request(&[
                &b"HSET"[..],
                table.as_bytes(),
                key.as_bytes(),
                value,
            ])?,
        }
        debug!(table = table.unwrap_or(""), key, "set value");

        if confirm {
            let reply = self.read_reply()?;
            match table {
                None => expect_ok(&reply)?,
                Some(_) => reply.check(Some(RespType::Integer), 0)?,
            }
        }
        Ok(())
    }

    /// Sets several fields of a table at once with `HMSET`.
    pub fn multi_set(&mut self, table: &str, entries: &[Entry], confirm: bool) -> Result<()> {
        check_table(Some(table))?;
        if entries.is_empty() {
            return invalid_argument!("no entries to set");
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(2 + 2 * entries.len());
        args.push(b"HMSET");
        args.push(table.as_bytes());
        for entry in entries {
            check_key(&entry.key)?;
            args.push(entry.key.as_bytes());
            args.push(&entry.value);
        }

        if !confirm {
            self.skip_reply()?;
        }
        self.send_array_request(&args)?;

        if confirm {
            expect_ok(&self.read_reply()?)?;
        }
        Ok(())
    }
}

impl Redis {
    /// Sets a plain key (`table` is `None`) or a field of a hash table.
    pub fn set_value(&self, table: Option<&str>, key: &str, value: &[u8], confirm: bool) -> Result<()> {
        self.locked_connected_client(Channel::Interactive)?
            .set_value(table, key, value, confirm)
    }

    /// Returns the raw reply to `GET key` or `HGET table key`.
    pub fn get_value(&self, table: Option<&str>, key: &str) -> Result<Resp> {
        check_table(table)?;
        check_key(key)?;

        match table {
            None => self.request("GET", &[key]),
            Some(table) => self.request("HGET", &[table, key]),
        }
    }

    /// Like [`Redis::get_value`], for values that must exist.
    pub fn get_string_value(&self, table: Option<&str>, key: &str) -> Result<Vec<u8>> {
        let reply = self.get_value(table, key)?;
        reply.check(Some(RespType::BulkString), 0)?;
        match reply {
            Resp::BulkString(b) => Ok(b),
            _ => Ok(Vec::new()),
        }
    }

    /// All fields of a hash table.
    pub fn get_table(&self, table: &str) -> Result<Vec<Entry>> {
        check_table(Some(table))?;

        let reply = self.request("HGETALL", &[table])?;
        if !reply.is_map() {
            reply.check(Some(RespType::Array), 0)?;
        }

        match reply.into_map_pairs() {
            Some(pairs) => to_entries(pairs),
            None => Err(Error::UnexpectedArraySize {
                expected: 0,
                got: -1,
            }),
        }
    }

    pub fn multi_set(&self, table: &str, entries: &[Entry], confirm: bool) -> Result<()> {
        self.locked_connected_client(Channel::Interactive)?
            .multi_set(table, entries, confirm)
    }

    /// The field names of a table, or all keys (`KEYS *`) without a table.
    pub fn get_keys(&self, table: Option<&str>) -> Result<Vec<String>> {
        check_table(table)?;

        let reply = match table {
            Some(table) => self.request("HKEYS", &[table])?,
            None => self.request("KEYS", &["*"])?,
        };
        if !matches!(reply, Resp::Set(_)) {
            reply.check(Some(RespType::Array), 0)?;
        }

        reply
            .into_array()
            .unwrap_or_default()
            .iter()
            .map(bulk_text)
            .collect()
    }

    /// Runs a `SCAN` style query to completion, returning the collected
    /// elements of every batch.
    fn scan(&self, prefix: &[&str], pattern: Option<&str>) -> Result<Vec<Resp>> {
        let count = self.scan_count().to_string();
        let mut cursor = "0".to_string();
        let mut found = Vec::new();

        loop {
            let mut args: Vec<&str> = prefix.to_vec();
            args.push(&cursor);
            if let Some(pattern) = pattern {
                args.push("MATCH");
                args.push(pattern);
            }
            if self.scan_count() > 0 {
                args.push("COUNT");
                args.push(&count);
            }

            let reply = self.array_request(&args)?;
            reply.check(Some(RespType::Array), 2)?;

            let mut parts = reply.into_array().unwrap_or_default().into_iter();
            let (Some(next), Some(batch)) = (parts.next(), parts.next()) else {
                return Err(Error::UnexpectedArraySize {
                    expected: 2,
                    got: 0,
                });
            };

            next.check(Some(RespType::BulkString), 0)?;
            batch.check(Some(RespType::Array), 0)?;

            found.extend(batch.into_array().unwrap_or_default());
            cursor = next.as_text().unwrap_or_default();

            if cursor == "0" {
                break;
            }
        }

        Ok(found)
    }

    /// All keys matching an optional glob pattern, using `SCAN`. The result
    /// is sorted and free of duplicates.
    pub fn scan_keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut keys = self
            .scan(&["SCAN"], pattern)?
            .iter()
            .map(bulk_text)
            .collect::<Result<Vec<_>>>()?;

        keys.sort();
        keys.dedup();
        debug!("scanned {} keys", keys.len());
        Ok(keys)
    }

    /// The fields of a table matching an optional glob pattern, using
    /// `HSCAN`. The result is sorted by key and free of duplicates.
    pub fn scan_table(&self, table: &str, pattern: Option<&str>) -> Result<Vec<Entry>> {
        check_table(Some(table))?;

        let items = self.scan(&["HSCAN", table], pattern)?;
        if items.len() % 2 != 0 {
            return Err(Error::UnexpectedArraySize {
                expected: items.len() as i64 + 1,
                got: items.len() as i64,
            });
        }

        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            pairs.push((key, value));
        }

        let mut entries = to_entries(pairs)?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.dedup_by(|a, b| a.key == b.key);
        Ok(entries)
    }

    /// Deletes keys, or table fields, matching `table[:field]`, where both
    /// parts may be glob patterns. Without a field part matching keys are
    /// deleted whole; otherwise the matching fields of every matching table
    /// are. Returns the number of keys or fields removed.
    pub fn delete_entries(&self, pattern: &str) -> Result<usize> {
        if pattern.is_empty() {
            return invalid_argument!("empty pattern");
        }

        let (root, field) = match pattern.split_once(':') {
            Some((root, field)) => (root, Some(field)),
            None => (pattern, None),
        };
        if root.is_empty() {
            return invalid_argument!("empty table pattern");
        }

        let tables = if is_glob_pattern(root) {
            self.scan_keys(Some(root))?
        } else {
            vec![root.to_string()]
        };

        let mut removed = 0;

        let Some(field) = field.filter(|f| !f.is_empty()) else {
            for table in &tables {
                if self.request("DEL", &[table.as_str()])?.as_integer().unwrap_or(0) > 0 {
                    removed += 1;
                }
            }
            return Ok(removed);
        };

        let matcher = Pattern::new(field)
            .map_err(|e| Error::InvalidArgument(format!("bad field pattern `{field}`: {e}")))?;

        for table in &tables {
            let entries = match self.scan_table(table, Some(field)) {
                Ok(entries) => entries,
                // not a hash table
                Err(Error::Redis(msg)) => {
                    debug!(table = %table, "skipping: {msg}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for entry in entries.iter().filter(|e| matcher.matches(&e.key)) {
                if self
                    .request("HDEL", &[table.as_str(), entry.key.as_str()])?
                    .as_integer()
                    .unwrap_or(0)
                    > 0
                {
                    removed += 1;
                }
            }
        }

        debug!(pattern, removed, "deleted entries");
        Ok(removed)
    }
}
