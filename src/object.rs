use std::fmt;

use crate::dictionary::Dictionary;
use crate::error::Error;
use crate::stream::Stream;
use crate::{ObjectId, Result};

/// A PDF object, per ISO 32000-1 §7.3.
#[derive(Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// A `/Name`, already `#hh`-unescaped.
    Name(Vec<u8>),
    /// A `(...)`-delimited string literal, already escape-decoded.
    String(Vec<u8>, StringFormat),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    /// `N G R`.
    Reference(u32, u16),
}

/// How a byte string was spelled in the source, and how it should be
/// re-emitted by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hexadecimal,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "Null"),
            Object::Boolean(b) => write!(f, "Boolean({b})"),
            Object::Integer(i) => write!(f, "Integer({i})"),
            Object::Real(r) => write!(f, "Real({r})"),
            Object::Name(n) => write!(f, "Name({:?})", String::from_utf8_lossy(n)),
            Object::String(s, fmt_) => write!(f, "String({:?}, {:?})", String::from_utf8_lossy(s), fmt_),
            Object::Array(a) => write!(f, "Array({a:?})"),
            Object::Dictionary(d) => write!(f, "Dictionary({d:?})"),
            Object::Stream(_) => write!(f, "Stream(..)"),
            Object::Reference(n, g) => write!(f, "Reference({n}, {g})"),
        }
    }
}

impl Object {
    pub fn string_literal<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringFormat::Literal)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            _ => Err(Error::UnexpectedType("Boolean")),
        }
    }

    /// Accepts both `Integer` and `Real` (truncating) the way numeric
    /// PDF fields are commonly read loosely (e.g. `/Length`).
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(i) => Ok(*i),
            Object::Real(r) => Ok(*r as i64),
            _ => Err(Error::UnexpectedType("Integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r),
            _ => Err(Error::UnexpectedType("Real")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(n) => Ok(n),
            _ => Err(Error::UnexpectedType("Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        self.as_name()
            .and_then(|n| std::str::from_utf8(n).map_err(|_| Error::UnexpectedType("Name")))
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(s, _) => Ok(s),
            _ => Err(Error::UnexpectedType("String")),
        }
    }

    pub fn as_str_mut(&mut self) -> Result<&mut Vec<u8>> {
        match self {
            Object::String(s, _) => Ok(s),
            _ => Err(Error::UnexpectedType("String")),
        }
    }

    pub fn as_array(&self) -> Result<&[Object]> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::UnexpectedType("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::UnexpectedType("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&s.dict),
            _ => Err(Error::UnexpectedType("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&mut s.dict),
            _ => Err(Error::UnexpectedType("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::UnexpectedType("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::UnexpectedType("Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(n, g) => Ok((*n, *g)),
            _ => Err(Error::UnexpectedType("Reference")),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(..) => "Reference",
        }
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Boolean(v)
    }
}
impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::Integer(v)
    }
}
impl From<i32> for Object {
    fn from(v: i32) -> Self {
        Object::Integer(v as i64)
    }
}
impl From<u32> for Object {
    fn from(v: u32) -> Self {
        Object::Integer(v as i64)
    }
}
impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::Real(v)
    }
}
impl From<f32> for Object {
    fn from(v: f32) -> Self {
        Object::Real(v as f64)
    }
}
impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Object::Name(v.as_bytes().to_vec())
    }
}
impl From<String> for Object {
    fn from(v: String) -> Self {
        Object::Name(v.into_bytes())
    }
}
impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Object::Array(v)
    }
}
impl From<Dictionary> for Object {
    fn from(v: Dictionary) -> Self {
        Object::Dictionary(v)
    }
}
impl From<Stream> for Object {
    fn from(v: Stream) -> Self {
        Object::Stream(v)
    }
}
impl From<ObjectId> for Object {
    fn from(v: ObjectId) -> Self {
        Object::Reference(v.0, v.1)
    }
}

#[cfg(feature = "chrono")]
mod datetime {
    use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};

    use super::*;

    impl Object {
        /// Parse a `D:YYYYMMDDHHmmSSOHH'mm'` PDF date string.
        pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
            let raw = self.as_str().ok()?;
            let s = std::str::from_utf8(raw).ok()?;
            let s = s.strip_prefix("D:").unwrap_or(s);
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.len() < 4 {
                return None;
            }
            let year: i32 = digits.get(0..4)?.parse().ok()?;
            let month: u32 = digits.get(4..6).unwrap_or("01").parse().ok()?;
            let day: u32 = digits.get(6..8).unwrap_or("01").parse().ok()?;
            let hour: u32 = digits.get(8..10).unwrap_or("00").parse().ok()?;
            let minute: u32 = digits.get(10..12).unwrap_or("00").parse().ok()?;
            let second: u32 = digits.get(12..14).unwrap_or("00").parse().ok()?;

            let rest = &s[digits.len()..];
            let offset = parse_offset(rest).unwrap_or(FixedOffset::east_opt(0)?);
            offset
                .with_ymd_and_hms(year, month, day, hour, minute, second)
                .single()
        }
    }

    fn parse_offset(rest: &str) -> Option<FixedOffset> {
        let rest = rest.trim_end_matches('\'');
        if rest.starts_with('Z') || rest.is_empty() {
            return FixedOffset::east_opt(0);
        }
        let sign = if rest.starts_with('-') { -1 } else { 1 };
        let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
        let hh: i32 = digits.get(0..2)?.parse().ok()?;
        let mm: i32 = digits.get(2..4).unwrap_or("00").parse().ok()?;
        FixedOffset::east_opt(sign * (hh * 3600 + mm * 60))
    }

    impl<Tz: TimeZone> From<DateTime<Tz>> for Object {
        fn from(dt: DateTime<Tz>) -> Self {
            let offset_minutes = dt.offset().fix().local_minus_utc() / 60;
            let (sign, abs) = if offset_minutes >= 0 { ('+', offset_minutes) } else { ('-', -offset_minutes) };
            let s = format!(
                "D:{:04}{:02}{:02}{:02}{:02}{:02}{}{:02}'{:02}'",
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second(),
                sign,
                abs / 60,
                abs % 60,
            );
            Object::string_literal(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_reject_wrong_variant() {
        let obj = Object::Integer(5);
        assert!(obj.as_bool().is_err());
        assert_eq!(obj.as_i64().unwrap(), 5);
    }

    #[test]
    fn real_truncates_for_as_i64() {
        assert_eq!(Object::Real(3.9).as_i64().unwrap(), 3);
    }

    #[test]
    fn type_name_reports_variant() {
        assert_eq!(Object::Null.type_name(), "Null");
        assert_eq!(Object::Array(vec![]).type_name(), "Array");
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn datetime_round_trips() {
        use chrono::{FixedOffset, TimeZone};
        let dt = FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
        let obj: Object = dt.into();
        let parsed = obj.as_datetime().unwrap();
        assert_eq!(parsed.timestamp(), dt.timestamp());
    }
}
