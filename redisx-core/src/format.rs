//! Human readable, delimited and JSON renderings of RESP values.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::Resp;

/// Number of digits needed to print the largest 1-based index of `count`
/// items.
fn index_width(count: usize) -> usize {
    count.to_string().len()
}

/// Trims trailing fractional zeros (and a dangling dot) from a decimal.
fn trim_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Formats a double with 6 significant digits, in the manner of `%g`.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "nan".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if d == 0.0 {
        return "0".to_string();
    }

    // The notation follows the exponent of the value rounded to 6 digits.
    let sci = format!("{d:.5e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs())
    } else {
        let decimals = (5 - exp) as usize;
        trim_zeros(&format!("{d:.decimals$}"))
    }
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).to_string()
}

/// Renders `resp` starting at column `indent`.
fn render(out: &mut String, indent: usize, resp: &Resp) {
    if let Resp::Attribute(_) = resp {
        out.push_str("(attributes) ");
    }

    match resp {
        Resp::Null => out.push_str("null"),
        Resp::Integer(i) => {
            let _ = write!(out, "(integer) {i}");
        }
        Resp::Double(d) => {
            let _ = write!(out, "(double) {}", format_double(*d));
        }
        Resp::BigNumber(n) => {
            let _ = write!(out, "(big number) {n}");
        }
        Resp::Boolean(b) => {
            let _ = write!(out, "({b})");
        }
        Resp::SimpleString(s) | Resp::Error(s) => out.push_str(s),
        Resp::BulkString(b) | Resp::BlobError(b) => {
            let _ = write!(out, "\"{}\"", lossy(b));
        }
        Resp::VerbatimString { text, .. } => {
            let _ = write!(out, "\"{}\"", lossy(text));
        }
        Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => {
            if items.is_empty() {
                out.push_str("(empty array)");
                return;
            }

            let w = index_width(items.len());
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(indent));
                }
                let prefix = format!("{:>w$}) ", i + 1);
                out.push_str(&prefix);
                render(out, indent + prefix.len(), item);
                if i + 1 < items.len() {
                    out.push('\n');
                }
            }
        }
        Resp::Map(entries) | Resp::Attribute(entries) => {
            if entries.is_empty() {
                out.push_str("(empty map)");
                return;
            }

            let w = index_width(entries.len());
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(indent));
                }
                let prefix = format!("{:>w$}# ", i + 1);
                out.push_str(&prefix);

                let mut k = String::new();
                render(&mut k, indent + w + 2, key);
                let key_width = k.rsplit('\n').next().map_or(0, |l| l.chars().count());
                out.push_str(&k);
                out.push_str(" => ");

                render(out, indent + prefix.len() + key_width + 4, value);
                if i + 1 < entries.len() {
                    out.push('\n');
                }
            }
        }
    }
}

fn write_delimited(out: &mut String, resp: &Resp, delim: &str, group_prefix: &str) {
    if let Resp::Attribute(_) = resp {
        out.push_str("\n<attributes>\n");
    }

    match resp {
        Resp::Null => out.push_str(delim),
        Resp::Integer(i) => {
            let _ = write!(out, "{i}{delim}");
        }
        Resp::Boolean(b) => {
            let _ = write!(out, "{b}{delim}");
        }
        Resp::Double(d) => {
            let _ = write!(out, "{}{delim}", format_double(*d));
        }
        Resp::SimpleString(s) | Resp::Error(s) | Resp::BigNumber(s) => {
            let _ = write!(out, "{s}{delim}");
        }
        Resp::BulkString(b) | Resp::BlobError(b) => {
            let _ = write!(out, "{}{delim}", lossy(b));
        }
        Resp::VerbatimString { text, .. } => {
            let _ = write!(out, "{}{delim}", lossy(text));
        }
        Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => {
            if items.is_empty() {
                out.push_str(delim);
                return;
            }
            if items.len() > 1 {
                out.push_str(group_prefix);
            }
            for item in items {
                write_delimited(out, item, delim, group_prefix);
            }
        }
        Resp::Map(entries) | Resp::Attribute(entries) => {
            if entries.is_empty() {
                out.push_str(delim);
                return;
            }
            if entries.len() > 1 {
                out.push_str(group_prefix);
            }
            for (key, value) in entries {
                write_delimited(out, key, delim, group_prefix);
                write_delimited(out, value, delim, group_prefix);
            }
        }
    }
}

impl Resp {
    /// Renders the value the way `redis-cli` prints replies.
    ///
    /// ```rust
    /// use libredisx::Resp;
    ///
    /// let reply = Resp::Array(vec![Resp::Integer(1), Resp::BulkString(b"two".to_vec())]);
    /// assert_eq!(reply.pretty(), "1) (integer) 1\n2) \"two\"");
    /// ```
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        render(&mut out, 0, self);
        out
    }

    /// Renders the value in raw form, with each element followed by `delim`
    /// and aggregates of more than one element preceded by `group_prefix`.
    pub fn delimited(&self, delim: &str, group_prefix: &str) -> String {
        let mut out = String::new();
        write_delimited(&mut out, self, delim, group_prefix);
        out
    }

    /// Renders the value as a pretty printed JSON object, with the value
    /// stored under `name`.
    pub fn to_json(&self, name: &str) -> String {
        let mut wrapper = BTreeMap::new();
        wrapper.insert(name, self);
        serde_json::to_string_pretty(&wrapper).unwrap_or_else(|_| format!("{{\"{name}\": null}}"))
    }
}

/// Prints a value to the standard output, `redis-cli` style.
pub fn print_resp(resp: &Resp) {
    println!("{}", resp.pretty());
}

/// Prints a value to the standard output using delimiters only.
pub fn print_delimited(resp: &Resp, delim: &str, group_prefix: &str) {
    print!("{}", resp.delimited(delim, group_prefix));
}

/// Prints a value as a JSON object to the standard output.
pub fn print_json(name: &str, resp: &Resp) {
    println!("{}", resp.to_json(name));
}

#[derive(serde::Serialize)]
struct KeyValue<'a> {
    key: &'a Resp,
    value: &'a Resp,
}

struct NonStringKeys<'a>(Vec<(&'a Resp, &'a Resp)>);

impl Serialize for NonStringKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (i, &(key, value)) in self.0.iter().enumerate() {
            map.serialize_entry(&format!(".{}", i + 1), &KeyValue { key, value })?;
        }
        map.end()
    }
}

/// Null becomes `null`, scalars their JSON counterparts, text values
/// strings and arrays JSON arrays. Maps become objects keyed by their string
/// keys; entries with other key types are listed under `.non-string-keys`.
impl Serialize for Resp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Resp::Null => serializer.serialize_none(),
            Resp::Boolean(b) => serializer.serialize_bool(*b),
            Resp::Integer(i) => serializer.serialize_i64(*i),
            Resp::Double(d) if d.is_finite() => serializer.serialize_f64(*d),
            Resp::Double(_) => serializer.serialize_none(),
            Resp::SimpleString(s) | Resp::Error(s) | Resp::BigNumber(s) => {
                serializer.serialize_str(s)
            }
            Resp::BulkString(b) | Resp::BlobError(b) => serializer.serialize_str(&lossy(b)),
            Resp::VerbatimString { text, .. } => serializer.serialize_str(&lossy(text)),
            Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => {
                serializer.collect_seq(items)
            }
            Resp::Map(entries) | Resp::Attribute(entries) => {
                let mut map = serializer.serialize_map(None)?;
                let mut others = Vec::new();

                for (key, value) in entries {
                    match key.as_text() {
                        Some(k) if key.is_string() => map.serialize_entry(&k, value)?,
                        _ => others.push((key, value)),
                    }
                }

                if !others.is_empty() {
                    map.serialize_entry(".non-string-keys", &NonStringKeys(others))?;
                }
                map.end()
            }
        }
    }
}
