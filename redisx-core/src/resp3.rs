// Redis Serialization Protocol v2 / v3.0

use crate::{Error, Result, parser_error};

/// Produces a Vec of byte representation of a `RespType::Array` of bulk
/// strings from any collection of byte-like values.
///
/// # Examples
/// ```rust
/// use libredisx::array;
///
/// let names = vec!["Mike".to_string()];
/// let arr = array!(names);
/// assert_eq!(arr, b"*1\r\n$4\r\nMike\r\n".to_vec());
/// ```
#[macro_export]
macro_rules! array {
    ($data:expr) => {{
        let mut arr: Vec<u8> = Vec::new();
        let delimeter = b"\r\n";

        arr.push(b'*');
        arr.extend_from_slice($data.len().to_string().as_bytes());
        arr.extend_from_slice(delimeter);

        for entry in $data {
            let entry: &[u8] = entry.as_ref();
            arr.push(b'$');
            arr.extend_from_slice(entry.len().to_string().as_bytes());
            arr.extend_from_slice(delimeter);
            arr.extend_from_slice(entry);
            arr.extend_from_slice(delimeter);
        }

        arr
    }};
}

/// Converts a byte-like expression if one is provided, to a Vec of byte
/// representation of the `RespType::BulkString` and a RESP2 null if none is
/// provided.
///
/// # Examples
/// ```rust
/// use libredisx::bulkstring;
///
/// let name = "Mike";
/// let bulk_string = bulkstring!(Some(name));
/// assert_eq!(bulk_string, b"$4\r\nMike\r\n".to_vec());
///
/// let non_string = bulkstring!(None::<&str>);
/// assert_eq!(non_string, b"$-1\r\n".to_vec());
/// ```
#[macro_export]
macro_rules! bulkstring {
    ($data:expr) => {
        match $data {
            Some(rsp) => {
                let rsp: &[u8] = rsp.as_ref();
                let mut s: Vec<u8> = Vec::with_capacity(rsp.len() + 16);
                s.push(b'$');
                s.extend_from_slice(rsp.len().to_string().as_bytes());
                s.extend_from_slice(b"\r\n");
                s.extend_from_slice(rsp);
                s.extend_from_slice(b"\r\n");

                s
            }
            None => $crate::null!(),
        }
    };
}

/// Produces a Vec of byte representation of the RESP2 null bulk string.
///
/// # Examples
/// ```rust
/// use libredisx::null;
///
/// let n = null!();
/// assert_eq!(n, b"$-1\r\n".to_vec());
/// ```
#[macro_export]
macro_rules! null {
    () => {
        b"$-1\r\n".to_vec()
    };
}

/// Converts a Bool expression to a Vec of byte representation of the
/// `RespType::Boolean`
///
/// # Examples
/// ```rust
/// use libredisx::boolean;
///
/// let t = boolean!(true);
/// assert_eq!(t, b"#t\r\n".to_vec());
///
/// let f = boolean!(false);
/// assert_eq!(f, b"#f\r\n".to_vec());
/// ```
#[macro_export]
macro_rules! boolean {
    ($b:expr) => {
        if $b {
            b"#t\r\n".to_vec()
        } else {
            b"#f\r\n".to_vec()
        }
    };
}

/// Converts an integer expression to a Vec of byte representation of the
/// `RespType::Integer`
///
/// # Examples
/// ```rust
/// use libredisx::integer;
///
/// let n_bytes = integer!(10);
/// assert_eq!(n_bytes, b":10\r\n".to_vec());
///
/// let n_bytes = integer!(-10);
/// assert_eq!(n_bytes, b":-10\r\n".to_vec());
/// ```
#[macro_export]
macro_rules! integer {
    ($i:expr) => {
        format!(":{}\r\n", $i).as_bytes().to_vec()
    };
}

/// Encodes a command and its arguments as a RESP array of bulk strings.
/// Arguments are binary safe.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    array!(args)
}

/// Identifies the different RESP types by their first byte on the wire.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[repr(u8)]
pub enum RespType {
    SimpleString = b'+',
    Error = b'-',
    Integer = b':',
    BulkString = b'$',
    Array = b'*',
    Null = b'_',
    Boolean = b'#',
    Double = b',',
    BigNumber = b'(',
    BlobError = b'!',
    VerbatimString = b'=',
    Map = b'%',
    Set = b'~',
    Push = b'>',
    Attribute = b'|',
}

impl RespType {
    /// The prefix byte of the type on the wire.
    pub fn prefix(self) -> u8 {
        self as u8
    }

    /// Matches a provided byte to a known RESP type.
    pub fn from_prefix(byte: u8) -> Option<RespType> {
        let t = match byte {
            b'+' => RespType::SimpleString,
            b'-' => RespType::Error,
            b':' => RespType::Integer,
            b'$' => RespType::BulkString,
            b'*' => RespType::Array,
            b'_' => RespType::Null,
            b'#' => RespType::Boolean,
            b',' => RespType::Double,
            b'(' => RespType::BigNumber,
            b'!' => RespType::BlobError,
            b'=' => RespType::VerbatimString,
            b'%' => RespType::Map,
            b'~' => RespType::Set,
            b'>' => RespType::Push,
            b'|' => RespType::Attribute,
            _ => return None,
        };
        Some(t)
    }
}

impl std::fmt::Display for RespType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RespType::SimpleString => write!(f, "SimpleString"),
            RespType::Error => write!(f, "Error"),
            RespType::Integer => write!(f, "Integer"),
            RespType::BulkString => write!(f, "BulkString"),
            RespType::Array => write!(f, "Array"),
            RespType::Null => write!(f, "Null"),
            RespType::Boolean => write!(f, "Boolean"),
            RespType::Double => write!(f, "Double"),
            RespType::BigNumber => write!(f, "BigNumber"),
            RespType::BlobError => write!(f, "BlobError"),
            RespType::VerbatimString => write!(f, "VerbatimString"),
            RespType::Map => write!(f, "Map"),
            RespType::Set => write!(f, "Set"),
            RespType::Push => write!(f, "Push"),
            RespType::Attribute => write!(f, "Attribute"),
        }
    }
}

/// A value received from (or sent to) a Redis server.
///
/// RESP2 null bulk strings (`$-1`) and null arrays (`*-1`) are both
/// represented as `Resp::Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resp {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Vec<u8>),
    Array(Vec<Resp>),
    Null,
    Boolean(bool),
    Double(f64),
    BigNumber(String),
    BlobError(Vec<u8>),
    VerbatimString { format: String, text: Vec<u8> },
    Map(Vec<(Resp, Resp)>),
    Set(Vec<Resp>),
    Push(Vec<Resp>),
    Attribute(Vec<(Resp, Resp)>),
}

/// Aggregates nested deeper than this are rejected as malformed.
pub const MAX_NESTING: usize = 512;

/// Finds the CRLF terminated line at the start of `data`.
/// Returns the line content (without the terminator) and the number of bytes
/// consumed including the terminator.
fn read_line(data: &[u8], byte_offset: usize) -> Result<(&[u8], usize)> {
    let mut i = 0;
    while i < data.len() && data[i] != b'\r' {
        i += 1;
    }

    if i + 1 >= data.len() {
        return Err(Error::Incomplete);
    }
    if data[i + 1] != b'\n' {
        return parser_error!("No proper termination", byte_offset + i);
    }

    Ok((&data[..i], i + 2))
}

fn parse_length(line: &[u8], byte_offset: usize) -> Result<i64> {
    let s = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(_e) => return parser_error!("Length field contains non-utf8 characters", byte_offset),
    };
    match s.parse::<i64>() {
        Ok(len) => Ok(len),
        Err(_e) => parser_error!("Failed to parse the `length` field from ascii", byte_offset),
    }
}

/// Reads the length-prefixed payload shared by bulk strings, blob errors and
/// verbatim strings: `<prefix><length>\r\n<data>\r\n`.
/// A negative length yields `None`.
fn read_blob<'re>(
    data: &'re [u8],
    byte_offset: &mut usize,
) -> Result<(Option<&'re [u8]>, usize)> {
    let (line, mut i) = read_line(&data[1..], *byte_offset + 1)?;
    let length = parse_length(line, *byte_offset + 1)?;
    i += 1;

    if length < 0 {
        *byte_offset += i;
        return Ok((None, i));
    }

    let length = length as usize;
    if i + length + 2 > data.len() {
        return Err(Error::Incomplete);
    }

    let content = &data[i..i + length];
    if data[i + length] != b'\r' || data[i + length + 1] != b'\n' {
        return parser_error!("No proper termination", *byte_offset + i + length);
    }

    i += length + 2;
    *byte_offset += i;
    Ok((Some(content), i))
}

/// Parse a series of bytes into `Resp::SimpleString`
/// The format of simplestring bytes representation is:
///     +<data>\r\n
///
/// The plus sign (+) as the first byte.
/// The data.
/// A final CRLF terminator.
fn parse_simple_strings(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;
    let value = String::from_utf8_lossy(line).to_string();

    *byte_offset += consumed + 1;
    Ok((Resp::SimpleString(value), consumed + 1))
}

/// Parse a series of bytes into `Resp::Error`
/// The format of simpleerror bytes representation is:
///     -<data>\r\n
///
/// The minus sign (-) as the first byte.
/// The data.
/// A final CRLF terminator.
fn parse_simple_errors(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;
    let value = String::from_utf8_lossy(line).to_string();

    *byte_offset += consumed + 1;
    Ok((Resp::Error(value), consumed + 1))
}

/// Parse a series of bytes into a `Resp::Integer`
/// The format of bytes representation is:
///     :[<+|->]<value>\r\n
///
/// The colon (:) as the first byte.
/// An optional plus (+) or minus (-) as the sign.
/// One or more decimal digits (0..9) as the integer's unsigned, base-10 value.
/// The CRLF terminator.
fn parse_integers(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;

    let value = match std::str::from_utf8(line).ok().and_then(|s| s.parse::<i64>().ok()) {
        Some(v) => v,
        None => return parser_error!("Invalid integer value", *byte_offset + 1),
    };

    *byte_offset += consumed + 1;
    Ok((Resp::Integer(value), consumed + 1))
}

/// Parse a series of bytes into `Resp::BulkString`
/// The format of bulkstring bytes representation is:
///     $<0..9>\r\n<data>\r\n
///
/// The dollar sign ($) as the first byte.
/// One or more decimal digits (0..9) as the string's length, in bytes,
/// as an unsigned, base-10 value.
/// The CRLF terminator.
/// The data.
/// A final CRLF.
///
/// The RESP2 null bulk string `$-1\r\n` parses to `Resp::Null`.
fn parse_bulk_strings(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (content, consumed) = read_blob(data, byte_offset)?;
    match content {
        Some(content) => Ok((Resp::BulkString(content.to_vec()), consumed)),
        None => Ok((Resp::Null, consumed)),
    }
}

/// Parse a series of bytes into `Resp::BlobError`
/// The format of bulkerror bytes representation is:
///     !<0..9>\r\n<data>\r\n
///
/// An exclamation mark (!) as the first byte.
/// One or more decimal digits (0..9) as the string's length, in bytes,
/// as an unsigned, base-10 value.
/// The CRLF terminator.
/// The data.
/// A final CRLF.
fn parse_bulk_errors(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (content, consumed) = read_blob(data, byte_offset)?;
    match content {
        Some(content) => Ok((Resp::BlobError(content.to_vec()), consumed)),
        None => Ok((Resp::Null, consumed)),
    }
}

/// Parse a series of bytes into `Resp::VerbatimString`
/// The format of verbatimstring bytes representation is:
///     =<length>\r\n<encoding>:<data>\r\n
///
/// An equal sign (=) as the first byte.
/// One or more decimal digits (0..9) as the string's length, in bytes,
/// as an unsigned, base-10 value.
/// The CRLF terminator.
/// Exactly three (3) bytes representing the data's encoding, e.g. `txt` or
/// `mkd`.
/// The colon (:) character separates the encoding and data.
/// The data.
/// A final CRLF.
fn parse_verbatim_strings(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let start = *byte_offset;
    let (content, consumed) = read_blob(data, byte_offset)?;

    let content = match content {
        Some(content) => content,
        None => return Ok((Resp::Null, consumed)),
    };

    if content.len() < 4 || content[3] != b':' {
        return parser_error!("Missing verbatim string encoding", start);
    }

    Ok((
        Resp::VerbatimString {
            format: String::from_utf8_lossy(&content[..3]).to_string(),
            text: content[4..].to_vec(),
        },
        consumed,
    ))
}

/// Parses the `<count>` elements that follow an aggregate header.
fn parse_elements(
    data: &[u8],
    count: usize,
    byte_offset: &mut usize,
    depth: usize,
) -> Result<(Vec<Resp>, usize)> {
    let mut i = 0;
    let mut elements = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
        let (element, consumed) = match_parser_against_datatype(&data[i..], byte_offset, depth)?;
        elements.push(element);
        i += consumed;
    }

    Ok((elements, i))
}

/// Reads an aggregate header `<prefix><count>\r\n`.
/// Returns `None` for the negative (null) count.
fn read_count(data: &[u8], byte_offset: &mut usize) -> Result<(Option<usize>, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;
    let count = parse_length(line, *byte_offset + 1)?;

    *byte_offset += consumed + 1;
    if count < 0 {
        return Ok((None, consumed + 1));
    }
    Ok((Some(count as usize), consumed + 1))
}

/// Parse a series of bytes into `Resp::Array`, `Resp::Set` or `Resp::Push`
/// The format of the bytes representation is:
///     *<number-of-elements>\r\n<element-1>...<element-n>
///
/// An asterisk (*), tilde (~) or greater-than sign (>) as the first byte.
/// One or more decimal digits (0..9) as the number of elements as an
/// unsigned, base-10 value.
/// The CRLF terminator.
/// An additional RESP type for every element.
///
/// The RESP2 null array `*-1\r\n` parses to `Resp::Null`.
fn parse_arrays(data: &[u8], byte_offset: &mut usize, depth: usize) -> Result<(Resp, usize)> {
    if depth >= MAX_NESTING {
        return parser_error!("Nesting too deep", *byte_offset);
    }
    let kind = data[0];
    let (count, header) = read_count(data, byte_offset)?;

    let count = match count {
        Some(count) => count,
        None => return Ok((Resp::Null, header)),
    };

    let (elements, consumed) = parse_elements(&data[header..], count, byte_offset, depth + 1)?;
    let value = match kind {
        b'~' => Resp::Set(elements),
        b'>' => Resp::Push(elements),
        _ => Resp::Array(elements),
    };

    Ok((value, header + consumed))
}

/// Parse a series of bytes into `Resp::Map` or `Resp::Attribute`
/// The format of map bytes representation is:
///     %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
///
/// A percentage sign (%) or a pipe (|) for attributes as the first byte.
/// One or more decimal digits (0..9) as the number of entries as an
/// unsigned, base-10 value.
/// The CRLF terminator.
/// An additional RESP type for every key and value of the map. Keys may be
/// of any type.
fn parse_maps(data: &[u8], byte_offset: &mut usize, depth: usize) -> Result<(Resp, usize)> {
    if depth >= MAX_NESTING {
        return parser_error!("Nesting too deep", *byte_offset);
    }
    let kind = data[0];
    let (count, header) = read_count(data, byte_offset)?;

    let count = match count {
        Some(count) => count,
        None => return Ok((Resp::Null, header)),
    };

    let (elements, consumed) = parse_elements(&data[header..], count.saturating_mul(2), byte_offset, depth + 1)?;
    let entries = pairs(elements);

    let value = match kind {
        b'|' => Resp::Attribute(entries),
        _ => Resp::Map(entries),
    };

    Ok((value, header + consumed))
}

/// Parse a series of bytes into `Resp::Null`
/// The format of null bytes representation is:
///     _\r\n
///
/// The underscore sign (_) as the first byte.
/// A final CRLF terminator.
fn parse_null(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;
    if !line.is_empty() {
        return parser_error!("Invalid null format", *byte_offset + 1);
    }

    *byte_offset += consumed + 1;
    Ok((Resp::Null, consumed + 1))
}

/// Parse a series of bytes into `Resp::Boolean`
/// The format of boolean bytes representation is:
///     #<t|f>\r\n
///
/// The hash sign (#) as the first byte.
/// A data value which is either 't' for `true` or 'f' for `false`.
/// A final CRLF terminator.
fn parse_booleans(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;

    let value = match line {
        b"t" => true,
        b"f" => false,
        _ => return parser_error!("Invalid boolean format", *byte_offset + 1),
    };

    *byte_offset += consumed + 1;
    Ok((Resp::Boolean(value), consumed + 1))
}

/// Parse a series of bytes into `Resp::Double`
/// The format of double bytes representation is:
///     ,[<+|->]<integral>[.<fractional>][<E|e>[sign]<exponent>]\r\n
///     ,[<+|->]inf\r\n
///     ,nan\r\n
///
/// An comma (,) as the first byte.
/// An optional plus(+) of minus(-) sign.
/// One or more decimal digits (0..9) as the integral part.
/// An optional dot(.) followed by one or more decimal digits(0..9).
/// An optional 'E' or 'e', an optional sign and the exponent digits.
/// The CRLF terminator.
fn parse_doubles(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;

    let text = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(_e) => return parser_error!("Double contains non-utf8 characters", *byte_offset + 1),
    };

    let value = match text {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        "nan" | "-nan" => f64::NAN,
        _ => match text.parse::<f64>() {
            Ok(v) => v,
            Err(_e) => return parser_error!("Invalid double value", *byte_offset + 1),
        },
    };

    *byte_offset += consumed + 1;
    Ok((Resp::Double(value), consumed + 1))
}

/// Parse a series of bytes into `Resp::BigNumber`
/// The format of bignumber bytes representation is:
///     ([+|-]<number>\r\n
///
/// An opening parenthesis '(' as the first byte.
/// An optional plus(+) of minus(-) sign.
/// One or more decimal digits (0..9) as the data.
/// The CRLF terminator.
fn parse_big_numbers(data: &[u8], byte_offset: &mut usize) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&data[1..], *byte_offset + 1)?;

    let digits = match line.first() {
        Some(b'+') | Some(b'-') => &line[1..],
        _ => line,
    };
    if digits.is_empty() || !digits.iter().all(|b| b.is_ascii_digit()) {
        return parser_error!("Invalid big number", *byte_offset + 1);
    }

    *byte_offset += consumed + 1;
    Ok((
        Resp::BigNumber(String::from_utf8_lossy(line).to_string()),
        consumed + 1,
    ))
}

/// Pass data to the correct parser according the data's first byte which
/// represents the data type.
/// On success, Returns the value represented by the data and the total
/// consumed bytes (Resp, Consumed).
fn match_parser_against_datatype(
    data: &[u8],
    current_offset: &mut usize,
    depth: usize,
) -> Result<(Resp, usize)> {
    if data.is_empty() {
        return Err(Error::Incomplete);
    }

    match RespType::from_prefix(data[0]) {
        Some(RespType::SimpleString) => parse_simple_strings(data, current_offset),
        Some(RespType::Error) => parse_simple_errors(data, current_offset),
        Some(RespType::Integer) => parse_integers(data, current_offset),
        Some(RespType::BulkString) => parse_bulk_strings(data, current_offset),
        Some(RespType::BlobError) => parse_bulk_errors(data, current_offset),
        Some(RespType::VerbatimString) => parse_verbatim_strings(data, current_offset),
        Some(RespType::Array) | Some(RespType::Set) | Some(RespType::Push) => {
            parse_arrays(data, current_offset, depth)
        }
        Some(RespType::Map) | Some(RespType::Attribute) => {
            parse_maps(data, current_offset, depth)
        }
        Some(RespType::Null) => parse_null(data, current_offset),
        Some(RespType::Boolean) => parse_booleans(data, current_offset),
        Some(RespType::Double) => parse_doubles(data, current_offset),
        Some(RespType::BigNumber) => parse_big_numbers(data, current_offset),
        None => parser_error!(
            format!("Unknown data type `{}`", data[0].escape_ascii()),
            *current_offset
        ),
    }
}

/// Finds where the first complete value in a growing receive buffer ends,
/// without decoding it.
///
/// Progress is kept between calls, so bytes that were already scanned are
/// not looked at again when more data arrives. Once a value is complete the
/// scanner starts over for the next one.
#[derive(Debug, Default)]
pub struct FrameScanner {
    offset: usize,
    /// Elements still expected by each open aggregate, innermost last.
    remaining: Vec<usize>,
}

impl FrameScanner {
    pub fn reset(&mut self) {
        self.offset = 0;
        self.remaining.clear();
    }

    /// Returns the length of the first value in `data` once all of it is
    /// buffered, or `None` if more bytes are needed.
    ///
    /// Input that cannot be framed (an unknown type byte) is reported as
    /// complete so that [`Resp::parse`] produces the error.
    pub fn scan(&mut self, data: &[u8]) -> Result<Option<usize>> {
        let scanned = self.advance(data);
        if scanned.is_err() {
            self.reset();
        }
        scanned
    }

    fn advance(&mut self, data: &[u8]) -> Result<Option<usize>> {
        while self.offset < data.len() {
            let rest = &data[self.offset..];

            let kind = match RespType::from_prefix(rest[0]) {
                Some(kind) => kind,
                None => {
                    self.reset();
                    return Ok(Some(data.len()));
                }
            };

            let start = self.offset;
            let (line, consumed) = match read_line(&rest[1..], start + 1) {
                Ok(found) => found,
                Err(Error::Incomplete) => return Ok(None),
                Err(e) => return Err(e),
            };
            let header = consumed + 1;

            // Negative lengths and counts stand for null values.
            let (size, children) = match kind {
                RespType::BulkString | RespType::BlobError | RespType::VerbatimString => {
                    let size = match usize::try_from(parse_length(line, start + 1)?) {
                        Ok(length) => header.saturating_add(length).saturating_add(2),
                        Err(_) => header,
                    };
                    (size, 0)
                }
                RespType::Array | RespType::Set | RespType::Push => {
                    let count = parse_length(line, start + 1)?;
                    (header, usize::try_from(count).unwrap_or(0))
                }
                RespType::Map | RespType::Attribute => {
                    let count = parse_length(line, start + 1)?;
                    (header, usize::try_from(count).unwrap_or(0).saturating_mul(2))
                }
                _ => (header, 0),
            };

            if size > rest.len() {
                return Ok(None);
            }
            self.offset += size;

            if children > 0 {
                if self.remaining.len() >= MAX_NESTING {
                    return parser_error!("Nesting too deep", start);
                }
                self.remaining.push(children);
                continue;
            }

            loop {
                match self.remaining.last_mut() {
                    None => {
                        let end = self.offset;
                        self.reset();
                        return Ok(Some(end));
                    }
                    Some(left) => {
                        *left -= 1;
                        if *left > 0 {
                            break;
                        }
                        self.remaining.pop();
                    }
                }
            }
        }
        Ok(None)
    }
}

fn pairs(elements: Vec<Resp>) -> Vec<(Resp, Resp)> {
    let mut entries = Vec::with_capacity(elements.len() / 2);
    let mut iter = elements.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        entries.push((key, value));
    }
    entries
}

fn write_header(out: &mut Vec<u8>, prefix: u8, n: usize) {
    out.push(prefix);
    out.extend_from_slice(n.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_blob(out: &mut Vec<u8>, prefix: u8, data: &[u8]) {
    write_header(out, prefix, data.len());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

impl Resp {
    /// Transform a series of bytes into exactly one RESP value.
    ///
    /// Returns the value and the number of bytes it occupied. When `data`
    /// ends before the value is complete, `Error::Incomplete` is returned so
    /// that the caller can read more and try again.
    pub fn parse(data: &[u8]) -> Result<(Resp, usize)> {
        // Track the current cursor byte position across parsing stages
        // for improved error messages
        let mut current_offset = 0usize;
        match_parser_against_datatype(data, &mut current_offset, 0)
    }

    /// Serializes the value in its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Resp::SimpleString(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Resp::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Resp::Integer(i) => out.extend_from_slice(&integer!(i)),
            Resp::BulkString(b) => out.extend_from_slice(&bulkstring!(Some(b))),
            Resp::BlobError(b) => write_blob(out, b'!', b),
            Resp::VerbatimString { format, text } => {
                write_header(out, b'=', text.len() + 4);
                out.extend_from_slice(format.as_bytes());
                out.push(b':');
                out.extend_from_slice(text);
                out.extend_from_slice(b"\r\n");
            }
            Resp::Null => out.extend_from_slice(b"_\r\n"),
            Resp::Boolean(b) => out.extend_from_slice(&boolean!(*b)),
            Resp::Double(d) => {
                let text = if d.is_nan() {
                    "nan".to_string()
                } else if d.is_infinite() {
                    let sign = if *d > 0.0 { "" } else { "-" };
                    format!("{sign}inf")
                } else {
                    d.to_string()
                };
                out.push(b',');
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Resp::BigNumber(n) => {
                out.push(b'(');
                out.extend_from_slice(n.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => {
                write_header(out, self.resp_type().prefix(), items.len());
                for item in items {
                    item.encode_into(out);
                }
            }
            Resp::Map(entries) | Resp::Attribute(entries) => {
                write_header(out, self.resp_type().prefix(), entries.len());
                for (key, value) in entries {
                    key.encode_into(out);
                    value.encode_into(out);
                }
            }
        }
    }

    pub fn resp_type(&self) -> RespType {
        match self {
            Resp::SimpleString(_) => RespType::SimpleString,
            Resp::Error(_) => RespType::Error,
            Resp::Integer(_) => RespType::Integer,
            Resp::BulkString(_) => RespType::BulkString,
            Resp::Array(_) => RespType::Array,
            Resp::Null => RespType::Null,
            Resp::Boolean(_) => RespType::Boolean,
            Resp::Double(_) => RespType::Double,
            Resp::BigNumber(_) => RespType::BigNumber,
            Resp::BlobError(_) => RespType::BlobError,
            Resp::VerbatimString { .. } => RespType::VerbatimString,
            Resp::Map(_) => RespType::Map,
            Resp::Set(_) => RespType::Set,
            Resp::Push(_) => RespType::Push,
            Resp::Attribute(_) => RespType::Attribute,
        }
    }

    /// The size of the value: the value itself for integers, 0 or 1 for
    /// booleans, the number of bytes for strings and the number of
    /// components for aggregates. Null and doubles report -1 and 0.
    pub fn size(&self) -> i64 {
        match self {
            Resp::Integer(i) => *i,
            Resp::Boolean(b) => *b as i64,
            Resp::Null => -1,
            Resp::Double(_) => 0,
            Resp::SimpleString(s) | Resp::Error(s) | Resp::BigNumber(s) => s.len() as i64,
            Resp::BulkString(b) | Resp::BlobError(b) => b.len() as i64,
            Resp::VerbatimString { text, .. } => text.len() as i64 + 4,
            Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => items.len() as i64,
            Resp::Map(entries) | Resp::Attribute(entries) => entries.len() as i64,
        }
    }

    /// Checks that the value is of the expected type (if any) and, when
    /// `expected_size` is positive, of the expected size.
    ///
    /// Cluster redirections are reported as `Error::Moved` and `Error::Ask`,
    /// other error replies as `Error::Redis` unless an error was expected.
    /// For booleans `expected_size` selects the expected value.
    pub fn check(&self, expected: Option<RespType>, expected_size: i64) -> Result<()> {
        if let Some(redirect) = self.redirect() {
            return Err(redirect);
        }

        if let Resp::Boolean(b) = self {
            if *b != (expected_size != 0) {
                return Err(Error::UnexpectedResp {
                    expected: (expected_size != 0).to_string(),
                    got: b.to_string(),
                });
            }
        }

        let Some(expected) = expected else {
            return Ok(());
        };

        let got = self.resp_type();
        if got != expected {
            return match self {
                Resp::Null => Err(Error::Null),
                Resp::Error(_) | Resp::BlobError(_)
                    if expected != RespType::Error && expected != RespType::BlobError =>
                {
                    Err(Error::Redis(self.as_text().unwrap_or_default()))
                }
                _ => Err(Error::UnexpectedResp {
                    expected: expected.to_string(),
                    got: got.to_string(),
                }),
            };
        }

        if expected_size > 0 && got != RespType::Boolean && self.size() != expected_size {
            return Err(Error::UnexpectedArraySize {
                expected: expected_size,
                got: self.size(),
            });
        }

        Ok(())
    }

    /// Parses a `MOVED <slot> <address>` or `ASK <slot> <address>` error
    /// reply into the matching error.
    pub fn redirect(&self) -> Option<Error> {
        let Resp::Error(msg) = self else {
            return None;
        };

        let mut parts = msg.split_whitespace();
        let kind = parts.next()?;
        let slot = parts.next()?.parse::<u16>().ok()?;
        let address = parts.next()?.to_string();

        match kind {
            "MOVED" => Some(Error::Moved { slot, address }),
            "ASK" => Some(Error::Ask { slot, address }),
            _ => None,
        }
    }

    /// Splits two-component text values.
    ///
    /// Verbatim strings split into their 3 letter format and the text.
    /// Error replies split into the error code (the first word) and the
    /// remaining message, if any.
    pub fn split_text(&self) -> Result<(String, Option<String>)> {
        match self {
            Resp::VerbatimString { format, text } => Ok((
                format.clone(),
                Some(String::from_utf8_lossy(text).to_string()),
            )),
            Resp::Error(_) | Resp::BlobError(_) => {
                let text = self.as_text().unwrap_or_default();
                let text = text.trim_start();
                match text.split_once([' ', '\t', '\r', '\n']) {
                    Some((code, message)) if !message.is_empty() => {
                        Ok((code.to_string(), Some(message.to_string())))
                    }
                    Some((code, _)) => Ok((code.to_string(), None)),
                    None => Ok((text.to_string(), None)),
                }
            }
            _ => Err(Error::UnexpectedResp {
                expected: RespType::VerbatimString.to_string(),
                got: self.resp_type().to_string(),
            }),
        }
    }

    /// Integers, booleans, doubles and null.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Resp::Integer(_) | Resp::Boolean(_) | Resp::Double(_) | Resp::Null
        )
    }

    /// Values carrying text or bytes.
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Resp::SimpleString(_)
                | Resp::Error(_)
                | Resp::BulkString(_)
                | Resp::BlobError(_)
                | Resp::VerbatimString { .. }
                | Resp::BigNumber(_)
        )
    }

    /// Arrays, sets and pushes.
    pub fn is_array(&self) -> bool {
        matches!(self, Resp::Array(_) | Resp::Set(_) | Resp::Push(_))
    }

    /// Maps and attributes.
    pub fn is_map(&self) -> bool {
        matches!(self, Resp::Map(_) | Resp::Attribute(_))
    }

    /// Non-empty aggregates.
    pub fn has_components(&self) -> bool {
        (self.is_array() || self.is_map()) && self.size() > 0
    }

    /// Appends the content of `part` to this value. Both must be of the same
    /// type, and scalar values cannot be extended. Appending null or an
    /// empty part is a no-op.
    pub fn append(&mut self, part: Resp) -> Result<()> {
        if matches!(part, Resp::Null) || part.size() <= 0 {
            return Ok(());
        }

        if self.resp_type() != part.resp_type() {
            return Err(Error::UnexpectedResp {
                expected: self.resp_type().to_string(),
                got: part.resp_type().to_string(),
            });
        }

        match (self, part) {
            (Resp::SimpleString(a), Resp::SimpleString(b))
            | (Resp::Error(a), Resp::Error(b))
            | (Resp::BigNumber(a), Resp::BigNumber(b)) => a.push_str(&b),
            (Resp::BulkString(a), Resp::BulkString(b))
            | (Resp::BlobError(a), Resp::BlobError(b)) => a.extend_from_slice(&b),
            (Resp::VerbatimString { text: a, .. }, Resp::VerbatimString { text: b, .. }) => {
                a.extend_from_slice(&b)
            }
            (Resp::Array(a), Resp::Array(b))
            | (Resp::Set(a), Resp::Set(b))
            | (Resp::Push(a), Resp::Push(b)) => a.extend(b),
            (Resp::Map(a), Resp::Map(b)) | (Resp::Attribute(a), Resp::Attribute(b)) => {
                a.extend(b)
            }
            (this, _) => {
                return Err(Error::UnexpectedResp {
                    expected: "an appendable type".to_string(),
                    got: this.resp_type().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Looks up an entry of a map or attribute value by its key.
    pub fn map_entry(&self, key: &Resp) -> Option<&Resp> {
        match self {
            Resp::Map(entries) | Resp::Attribute(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Looks up an entry of a map or attribute value by a string keyword.
    /// Only string-typed keys are matched.
    pub fn keyword_entry(&self, key: &str) -> Option<&Resp> {
        match self {
            Resp::Map(entries) | Resp::Attribute(entries) => entries
                .iter()
                .find(|(k, _)| k.is_string() && k.as_bytes() == Some(key.as_bytes()))
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// The raw bytes of string-typed values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Resp::SimpleString(s) | Resp::Error(s) | Resp::BigNumber(s) => Some(s.as_bytes()),
            Resp::BulkString(b) | Resp::BlobError(b) => Some(b),
            Resp::VerbatimString { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The text of string-typed values, with invalid UTF-8 replaced.
    pub fn as_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Resp::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The components of array-type values.
    pub fn into_array(self) -> Option<Vec<Resp>> {
        match self {
            Resp::Array(items) | Resp::Set(items) | Resp::Push(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of map-type values. RESP2 servers send dictionaries as
    /// flat `[key, value, ...]` arrays, which are converted to pairs when
    /// their length is even.
    pub fn into_map_pairs(self) -> Option<Vec<(Resp, Resp)>> {
        match self {
            Resp::Map(entries) | Resp::Attribute(entries) => Some(entries),
            Resp::Array(items) if items.len() % 2 == 0 => Some(pairs(items)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod resp3_tests {
    use super::*;

    fn parse_all(data: &[u8]) -> Resp {
        let (value, consumed) = Resp::parse(data).unwrap();
        assert_eq!(consumed, data.len());
        value
    }

    #[test]
    fn t_parse_string() {
        assert_eq!(parse_all(b"+OK\r\n"), Resp::SimpleString("OK".into()));
    }

    #[test]
    fn t_parse_errors() {
        assert_eq!(
            parse_all(b"-ERR unknown command\r\n"),
            Resp::Error("ERR unknown command".into())
        );
    }

    #[test]
    fn t_parse_integers() {
        assert_eq!(parse_all(b":1000\r\n"), Resp::Integer(1000));
        assert_eq!(parse_all(b":-42\r\n"), Resp::Integer(-42));
        assert_eq!(parse_all(b":+7\r\n"), Resp::Integer(7));
        assert!(matches!(
            Resp::parse(b":12a\r\n"),
            Err(Error::Parser { .. })
        ));
    }

    #[test]
    fn t_parse_bstrings() {
        assert_eq!(parse_all(b"$5\r\nhello\r\n"), Resp::BulkString(b"hello".to_vec()));
        assert_eq!(parse_all(b"$0\r\n\r\n"), Resp::BulkString(vec![]));
        assert_eq!(parse_all(b"$-1\r\n"), Resp::Null);
        assert_eq!(
            parse_all(b"$4\r\na\r\nb\r\n"),
            Resp::BulkString(b"a\r\nb".to_vec())
        );
    }

    #[test]
    fn t_parse_arrays() {
        assert_eq!(parse_all(b"*0\r\n"), Resp::Array(vec![]));
        assert_eq!(parse_all(b"*-1\r\n"), Resp::Null);
        assert_eq!(
            parse_all(b"*2\r\n$3\r\nfoo\r\n:1\r\n"),
            Resp::Array(vec![Resp::BulkString(b"foo".to_vec()), Resp::Integer(1)])
        );
        assert_eq!(
            parse_all(b"*2\r\n*1\r\n+a\r\n*1\r\n_\r\n"),
            Resp::Array(vec![
                Resp::Array(vec![Resp::SimpleString("a".into())]),
                Resp::Array(vec![Resp::Null]),
            ])
        );
    }

    #[test]
    fn t_parse_resp3_scalars() {
        assert_eq!(parse_all(b"_\r\n"), Resp::Null);
        assert_eq!(parse_all(b"#t\r\n"), Resp::Boolean(true));
        assert_eq!(parse_all(b"#f\r\n"), Resp::Boolean(false));
        assert_eq!(parse_all(b",1.23\r\n"), Resp::Double(1.23));
        assert_eq!(parse_all(b",-1.5e3\r\n"), Resp::Double(-1500.0));
        assert_eq!(parse_all(b",10\r\n"), Resp::Double(10.0));
        assert_eq!(parse_all(b",inf\r\n"), Resp::Double(f64::INFINITY));
        assert_eq!(parse_all(b",-inf\r\n"), Resp::Double(f64::NEG_INFINITY));
        match parse_all(b",nan\r\n") {
            Resp::Double(d) => assert!(d.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            parse_all(b"(3492890328409238509324850943850943825024385\r\n"),
            Resp::BigNumber("3492890328409238509324850943850943825024385".into())
        );
    }

    #[test]
    fn t_parse_blob_and_verbatim() {
        assert_eq!(
            parse_all(b"!21\r\nSYNTAX invalid syntax\r\n"),
            Resp::BlobError(b"SYNTAX invalid syntax".to_vec())
        );
        assert_eq!(
            parse_all(b"=15\r\ntxt:Some string\r\n"),
            Resp::VerbatimString {
                format: "txt".into(),
                text: b"Some string".to_vec()
            }
        );
        assert!(matches!(
            Resp::parse(b"=3\r\ntxt\r\n"),
            Err(Error::Parser { .. })
        ));
    }

    #[test]
    fn t_parse_maps_sets_pushes() {
        assert_eq!(
            parse_all(b"%2\r\n+first\r\n:1\r\n+second\r\n:2\r\n"),
            Resp::Map(vec![
                (Resp::SimpleString("first".into()), Resp::Integer(1)),
                (Resp::SimpleString("second".into()), Resp::Integer(2)),
            ])
        );
        assert_eq!(
            parse_all(b"%1\r\n:1\r\n#t\r\n"),
            Resp::Map(vec![(Resp::Integer(1), Resp::Boolean(true))])
        );
        assert_eq!(
            parse_all(b"~2\r\n+a\r\n+b\r\n"),
            Resp::Set(vec![
                Resp::SimpleString("a".into()),
                Resp::SimpleString("b".into())
            ])
        );
        assert_eq!(
            parse_all(b">3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$2\r\nhi\r\n"),
            Resp::Push(vec![
                Resp::BulkString(b"message".to_vec()),
                Resp::BulkString(b"ch".to_vec()),
                Resp::BulkString(b"hi".to_vec()),
            ])
        );
        assert_eq!(
            parse_all(b"|1\r\n+ttl\r\n:3600\r\n"),
            Resp::Attribute(vec![(Resp::SimpleString("ttl".into()), Resp::Integer(3600))])
        );
    }

    #[test]
    fn t_parse_incomplete() {
        let cases: [&[u8]; 7] = [
            b"",
            b"+OK",
            b"+OK\r",
            b"$5\r\nhel",
            b"$5\r\nhello\r",
            b"*2\r\n:1\r\n",
            b"%1\r\n+a\r\n",
        ];
        for data in cases {
            assert!(
                Resp::parse(data).unwrap_err().is_incomplete(),
                "{:?}",
                data.escape_ascii().to_string()
            );
        }
    }

    #[test]
    fn t_parse_garbage() {
        match Resp::parse(b"*1\r\n?what\r\n") {
            Err(Error::Parser { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Resp::parse(b"$3\r\nabcd\r\n"),
            Err(Error::Parser { .. })
        ));
        assert!(matches!(
            Resp::parse(b"#x\r\n"),
            Err(Error::Parser { .. })
        ));
    }

    #[test]
    fn t_parse_nesting_limit() {
        let nested = |depth: usize| {
            let mut data = b"*1\r\n".repeat(depth);
            data.extend_from_slice(b":1\r\n");
            data
        };

        let (value, _) = Resp::parse(&nested(MAX_NESTING)).unwrap();
        assert!(value.is_array());

        match Resp::parse(&nested(MAX_NESTING + 1)) {
            Err(Error::Parser { offset, .. }) => assert_eq!(offset, 4 * MAX_NESTING),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Resp::parse(&nested(200_000)),
            Err(Error::Parser { .. })
        ));

        let mut maps = b"%1\r\n+k\r\n".repeat(MAX_NESTING + 1);
        maps.extend_from_slice(b"_\r\n");
        assert!(matches!(Resp::parse(&maps), Err(Error::Parser { .. })));
    }

    #[test]
    fn t_frame_scanner() {
        let data = b"*3\r\n$5\r\nhello\r\n%1\r\n+a\r\n~0\r\n$-1\r\n:9\r\n";
        let frame = data.len() - 4;

        let mut scanner = FrameScanner::default();
        for end in 0..frame {
            assert_eq!(scanner.scan(&data[..end]).unwrap(), None, "{end}");
        }
        assert_eq!(scanner.scan(&data[..frame]).unwrap(), Some(frame));
        assert_eq!(scanner.scan(&data[frame..]).unwrap(), Some(4));

        let mut scanner = FrameScanner::default();
        assert_eq!(scanner.scan(b"*-1\r\n").unwrap(), Some(5));
        assert_eq!(scanner.scan(b"|1\r\n+ttl\r\n:1\r\n").unwrap(), Some(14));
        assert_eq!(scanner.scan(b"?what\r\n").unwrap(), Some(7));
        assert!(matches!(
            scanner.scan(b"$x\r\n"),
            Err(Error::Parser { .. })
        ));

        let deep = b"*1\r\n".repeat(MAX_NESTING + 1);
        assert!(matches!(scanner.scan(&deep), Err(Error::Parser { .. })));
        assert_eq!(scanner.scan(b"+OK\r\n").unwrap(), Some(5));
    }

    #[test]
    fn t_parse_consumes_one_value() {
        let data = b"+OK\r\n:1\r\n";
        let (value, consumed) = Resp::parse(data).unwrap();
        assert_eq!(value, Resp::SimpleString("OK".into()));
        assert_eq!(consumed, 5);
        let (value, _) = Resp::parse(&data[consumed..]).unwrap();
        assert_eq!(value, Resp::Integer(1));
    }

    #[test]
    fn t_encode_command() {
        assert_eq!(
            encode_command(&["SET", "key", "value"]),
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n".to_vec()
        );
        let binary = vec![&b"PUBLISH"[..], &b"ch"[..], &b"\x00\r\n"[..]];
        assert_eq!(
            encode_command(&binary),
            b"*3\r\n$7\r\nPUBLISH\r\n$2\r\nch\r\n$3\r\n\x00\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn t_encode_parses_back() {
        let value = Resp::Map(vec![
            (
                Resp::SimpleString("list".into()),
                Resp::Array(vec![Resp::Integer(1), Resp::Double(2.5), Resp::Null]),
            ),
            (
                Resp::BulkString(b"text".to_vec()),
                Resp::VerbatimString {
                    format: "mkd".into(),
                    text: b"# hi".to_vec(),
                },
            ),
        ]);
        assert_eq!(parse_all(&value.encode()), value);
    }

    #[test]
    fn t_check() {
        let ok = Resp::SimpleString("OK".into());
        assert!(ok.check(Some(RespType::SimpleString), 0).is_ok());
        assert!(ok.check(Some(RespType::SimpleString), 2).is_ok());
        assert!(matches!(
            ok.check(Some(RespType::SimpleString), 3),
            Err(Error::UnexpectedArraySize { expected: 3, got: 2 })
        ));
        assert!(matches!(
            ok.check(Some(RespType::Integer), 0),
            Err(Error::UnexpectedResp { .. })
        ));
        assert!(matches!(
            Resp::Null.check(Some(RespType::BulkString), 0),
            Err(Error::Null)
        ));
        assert!(matches!(
            Resp::Error("ERR wrong".into()).check(Some(RespType::Integer), 0),
            Err(Error::Redis(msg)) if msg == "ERR wrong"
        ));
        assert!(Resp::Boolean(true).check(Some(RespType::Boolean), 1).is_ok());
        assert!(Resp::Boolean(false).check(Some(RespType::Boolean), 0).is_ok());
        assert!(Resp::Boolean(false).check(Some(RespType::Boolean), 1).is_err());
        assert!(Resp::Integer(5).check(None, 0).is_ok());
    }

    #[test]
    fn t_check_redirects() {
        let moved = Resp::Error("MOVED 3999 127.0.0.1:6381".into());
        match moved.check(Some(RespType::BulkString), 0) {
            Err(Error::Moved { slot, address }) => {
                assert_eq!(slot, 3999);
                assert_eq!(address, "127.0.0.1:6381");
            }
            other => panic!("unexpected {other:?}"),
        }
        let ask = Resp::Error("ASK 3999 127.0.0.1:6381".into());
        assert!(matches!(ask.check(None, 0), Err(Error::Ask { slot: 3999, .. })));
        assert!(Resp::Error("ERR MOVED".into()).redirect().is_none());
    }

    #[test]
    fn t_split_text() {
        let v = Resp::VerbatimString {
            format: "txt".into(),
            text: b"hello".to_vec(),
        };
        assert_eq!(
            v.split_text().unwrap(),
            ("txt".to_string(), Some("hello".to_string()))
        );

        let e = Resp::Error("WRONGTYPE Operation against a key".into());
        assert_eq!(
            e.split_text().unwrap(),
            (
                "WRONGTYPE".to_string(),
                Some("Operation against a key".to_string())
            )
        );
        assert_eq!(
            Resp::BlobError(b"ERR".to_vec()).split_text().unwrap(),
            ("ERR".to_string(), None)
        );
        assert!(Resp::Integer(1).split_text().is_err());
    }

    #[test]
    fn t_type_predicates() {
        assert!(Resp::Integer(1).is_scalar());
        assert!(Resp::Null.is_scalar());
        assert!(!Resp::Null.is_string());
        assert!(Resp::BigNumber("1".into()).is_string());
        assert!(Resp::Push(vec![]).is_array());
        assert!(Resp::Attribute(vec![]).is_map());
        assert!(!Resp::Array(vec![]).has_components());
        assert!(Resp::Set(vec![Resp::Null]).has_components());
        assert!(!Resp::BulkString(b"x".to_vec()).has_components());
    }

    #[test]
    fn t_append() {
        let mut a = Resp::BulkString(b"hello ".to_vec());
        a.append(Resp::BulkString(b"world".to_vec())).unwrap();
        assert_eq!(a, Resp::BulkString(b"hello world".to_vec()));

        let mut arr = Resp::Array(vec![Resp::Integer(1)]);
        arr.append(Resp::Array(vec![Resp::Integer(2)])).unwrap();
        assert_eq!(arr, Resp::Array(vec![Resp::Integer(1), Resp::Integer(2)]));

        arr.append(Resp::Null).unwrap();
        assert_eq!(arr.size(), 2);

        assert!(arr.append(Resp::Set(vec![Resp::Integer(3)])).is_err());

        let mut i = Resp::Integer(1);
        assert!(i.append(Resp::Integer(2)).is_err());
    }

    #[test]
    fn t_map_lookup() {
        let map = Resp::Map(vec![
            (Resp::SimpleString("server".into()), Resp::BulkString(b"redis".to_vec())),
            (Resp::Integer(7), Resp::Boolean(true)),
            (Resp::BulkString(b"proto".to_vec()), Resp::Integer(3)),
        ]);
        assert_eq!(map.keyword_entry("proto"), Some(&Resp::Integer(3)));
        assert_eq!(
            map.keyword_entry("server"),
            Some(&Resp::BulkString(b"redis".to_vec()))
        );
        assert_eq!(map.keyword_entry("7"), None);
        assert_eq!(map.map_entry(&Resp::Integer(7)), Some(&Resp::Boolean(true)));
        assert_eq!(Resp::Integer(1).keyword_entry("x"), None);
    }

    #[test]
    fn t_resp2_map_pairs() {
        let arr = Resp::Array(vec![
            Resp::BulkString(b"a".to_vec()),
            Resp::BulkString(b"1".to_vec()),
        ]);
        let pairs = arr.into_map_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, Resp::BulkString(b"1".to_vec()));

        assert!(Resp::Array(vec![Resp::Null]).into_map_pairs().is_none());
    }

    #[test]
    fn t_resp_type_prefixes() {
        for b in b"+-:$*_#,(!=%~>|" {
            assert_eq!(RespType::from_prefix(*b).unwrap().prefix(), *b);
        }
        assert_eq!(RespType::from_prefix(b'?'), None);
    }
}
