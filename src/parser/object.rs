//! Recursive-descent parsing of the PDF object grammar over a raw byte
//! slice. Operates purely on `&[u8]` and returns how many bytes were
//! consumed; [`super`] wraps this for the `nom_locate`-tracked entry
//! points the reader calls into.

use std::collections::HashSet;

use crate::dictionary::Dictionary;
use crate::error::ParseError;
use crate::lexer::{self, Token};
use crate::object::{Object, StringFormat};
use crate::reader::Reader;
use crate::stream::Stream;
use crate::{ObjectId, Result, ValidationMode};

/// Parse one object (atom, array, dict/stream, or `N G R` reference)
/// starting at `data[0]`. Returns the object and the number of bytes
/// consumed, not counting trailing whitespace.
///
/// `reader`/`already_seen` are only consulted when the object turns out
/// to be a stream whose `/Length` is an indirect reference (see
/// [`parse_stream_or_dict`]); pass `None` when no reader context is
/// available (e.g. parsing inside an object stream, where `/Length`
/// cannot be indirect per ISO 32000-1 §7.5.7). `validation` governs
/// duplicate-key and unresolved-`/Length` strictness (spec §4.2, §4.6).
pub fn parse_object(
    data: &[u8], base_offset: usize, reader: Option<(&Reader, &mut HashSet<ObjectId>)>, validation: ValidationMode,
) -> Result<(Object, usize)> {
    let skip = lexer::skip_trivia(data);
    let rest = &data[skip..];
    let (token, len) = lexer::next_token(rest, base_offset + skip)?;

    let (object, mut consumed) = match token {
        Token::Integer(n) => {
            // Could be the start of `N G R`.
            if let Some((obj, total)) = try_parse_reference(rest, n, base_offset + skip)? {
                return Ok((obj, skip + total));
            }
            (Object::Integer(n), len)
        }
        Token::Real(r) => (Object::Real(r), len),
        Token::Name(n) => (Object::Name(n), len),
        Token::LiteralString(s) => (Object::String(s, StringFormat::Literal), len),
        Token::HexString(s) => (Object::String(s, StringFormat::Hexadecimal), len),
        Token::True => (Object::Boolean(true), len),
        Token::False => (Object::Boolean(false), len),
        Token::Null => (Object::Null, len),
        Token::ArrayStart => {
            let (items, total) = parse_array_items(&rest[len..], base_offset + skip + len, validation)?;
            (Object::Array(items), len + total)
        }
        Token::DictStart => {
            let (dict, total) = parse_dict_body(&rest[len..], base_offset + skip + len, validation)?;
            let after_dict = len + total;
            return parse_stream_or_dict(rest, after_dict, dict, base_offset + skip, reader, validation)
                .map(|(o, c)| (o, skip + c));
        }
        Token::Keyword(_) | Token::ArrayEnd | Token::DictEnd => {
            return Err(ParseError::UnexpectedKeyword(base_offset + skip).into());
        }
    };
    consumed = skip + consumed;
    Ok((object, consumed))
}

fn try_parse_reference(data: &[u8], first: i64, offset: usize) -> Result<Option<(Object, usize)>> {
    if first < 0 {
        return Ok(None);
    }
    let after_first = lexer::next_token(data, offset)?.1;
    let mut pos = after_first;
    let skip1 = lexer::skip_trivia(&data[pos..]);
    pos += skip1;
    let Ok((Token::Integer(gen), len2)) = lexer::next_token(&data[pos..], offset + pos) else {
        return Ok(None);
    };
    if gen < 0 {
        return Ok(None);
    }
    let mut pos2 = pos + len2;
    let skip2 = lexer::skip_trivia(&data[pos2..]);
    pos2 += skip2;
    match lexer::next_token(&data[pos2..], offset + pos2) {
        Ok((Token::Keyword(kw), len3)) if kw == b"R" => {
            Ok(Some((Object::Reference(first as u32, gen as u16), pos2 + len3)))
        }
        _ => Ok(None),
    }
}

fn parse_array_items(data: &[u8], base_offset: usize, validation: ValidationMode) -> Result<(Vec<Object>, usize)> {
    let mut items = Vec::new();
    let mut pos = 0;
    loop {
        let skip = lexer::skip_trivia(&data[pos..]);
        pos += skip;
        let rest = &data[pos..];
        if rest.first() == Some(&b']') {
            pos += 1;
            return Ok((items, pos));
        }
        if rest.is_empty() {
            return Err(ParseError::UnclosedArray.into());
        }
        let (obj, consumed) = parse_object(rest, base_offset + pos, None, validation)?;
        items.push(obj);
        pos += consumed;
    }
}

/// Parse the `N G obj` header, returning the object id and bytes
/// consumed (including trailing whitespace up to the body).
pub fn parse_indirect_header(data: &[u8], base_offset: usize) -> Result<(ObjectId, usize)> {
    let skip = lexer::skip_trivia(data);
    let mut pos = skip;
    let (num_tok, l1) = lexer::next_token(&data[pos..], base_offset + pos)?;
    let Token::Integer(num) = num_tok else {
        return Err(ParseError::InvalidXref.into());
    };
    pos += l1;
    pos += lexer::skip_trivia(&data[pos..]);
    let (gen_tok, l2) = lexer::next_token(&data[pos..], base_offset + pos)?;
    let Token::Integer(gen) = gen_tok else {
        return Err(ParseError::InvalidXref.into());
    };
    pos += l2;
    pos += lexer::skip_trivia(&data[pos..]);
    let (kw_tok, l3) = lexer::next_token(&data[pos..], base_offset + pos)?;
    match kw_tok {
        Token::Keyword(kw) if kw == b"obj" => {
            pos += l3;
            Ok(((num as u32, gen as u16), pos))
        }
        _ => Err(ParseError::MissingObjKeyword(num as u32, gen as u16).into()),
    }
}

/// Parse the value following an `N G obj` header, consuming up to and
/// including `endobj` when present (tolerating its absence, which some
/// producers omit).
pub fn parse_indirect_body(
    data: &[u8], base_offset: usize, reader: Option<(&Reader, &mut HashSet<ObjectId>)>, validation: ValidationMode,
) -> Result<(Object, usize)> {
    let (object, consumed) = parse_object(data, base_offset, reader, validation)?;
    let mut pos = consumed;
    pos += lexer::skip_trivia(&data[pos..]);
    if data[pos..].starts_with(b"endobj") {
        pos += b"endobj".len();
    }
    Ok((object, pos))
}

fn parse_dict_body(data: &[u8], base_offset: usize, validation: ValidationMode) -> Result<(Dictionary, usize)> {
    let mut dict = Dictionary::new();
    let mut pos = 0;
    loop {
        let skip = lexer::skip_trivia(&data[pos..]);
        pos += skip;
        let rest = &data[pos..];
        if rest.starts_with(b">>") {
            pos += 2;
            return Ok((dict, pos));
        }
        if rest.is_empty() {
            return Err(ParseError::UnclosedDictionary.into());
        }
        let (key_token, key_len) = lexer::next_token(rest, base_offset + pos)?;
        let Token::Name(key) = key_token else {
            return Err(ParseError::UnclosedDictionary.into());
        };
        pos += key_len;
        let (value, consumed) = parse_object(&data[pos..], base_offset + pos, None, validation)?;
        if dict.has(&key) {
            if validation.is_strict() {
                return Err(ParseError::DuplicateKey(key).into());
            }
            // Relaxed/None: last value wins, matching most readers in the wild.
        }
        dict.set(key, value);
        pos += consumed;
    }
}

/// After a `<< ... >>` dictionary, check for a following `stream`
/// keyword; if present, capture the raw payload using `/Length`
/// (falling back to scanning for `endstream` when `/Length` is an
/// unresolved indirect reference).
fn parse_stream_or_dict(
    full_input: &[u8], after_dict: usize, dict: Dictionary, base_offset: usize,
    reader: Option<(&Reader, &mut HashSet<ObjectId>)>, validation: ValidationMode,
) -> Result<(Object, usize)> {
    let skip = lexer::skip_trivia(&full_input[after_dict..]);
    let rest = &full_input[after_dict + skip..];
    if !rest.starts_with(b"stream") {
        return Ok((Object::Dictionary(dict), after_dict));
    }
    let mut pos = after_dict + skip + b"stream".len();

    // Exactly one EOL (CRLF or LF) follows the `stream` keyword.
    match full_input.get(pos..pos + 2) {
        Some(b"\r\n") => pos += 2,
        _ => match full_input.get(pos) {
            Some(b'\n') => pos += 1,
            _ => return Err(ParseError::MissingEndstream.into()),
        },
    }

    let length = match dict.get(b"Length") {
        Ok(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
        Ok(Object::Reference(num, gen)) => {
            let resolved = reader.and_then(|(reader, already_seen)| {
                reader
                    .get_object((*num, *gen), already_seen)
                    .ok()
                    .and_then(|o| o.as_i64().ok())
                    .filter(|n| *n >= 0)
                    .map(|n| n as usize)
            });
            if resolved.is_none() && validation.is_strict() {
                return Err(ParseError::UnresolvedLength.into());
            }
            resolved
        }
        _ => None,
    };

    let (payload, payload_len) = match length {
        Some(len) if pos + len <= full_input.len() => (full_input[pos..pos + len].to_vec(), len),
        _ => scan_to_endstream(&full_input[pos..], base_offset + pos)?,
    };
    pos += payload_len;

    let skip2 = lexer::skip_trivia(&full_input[pos..]);
    pos += skip2;
    if !full_input[pos..].starts_with(b"endstream") {
        return Err(ParseError::MissingEndstream.into());
    }
    pos += b"endstream".len();

    let mut stream = Stream::new(dict, payload);
    stream.start_position = None;
    Ok((Object::Stream(stream), pos))
}

fn scan_to_endstream(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    const NEEDLE: &[u8] = b"endstream";
    let pos = data
        .windows(NEEDLE.len())
        .position(|w| w == NEEDLE)
        .ok_or(ParseError::MissingEndstream)
        .map_err(|e| {
            let _ = offset;
            e
        })?;
    // Trim the single EOL that conventionally precedes `endstream`.
    let mut end = pos;
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }
    Ok((data[..end].to_vec(), pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELAXED: ValidationMode = ValidationMode::Relaxed;
    const STRICT: ValidationMode = ValidationMode::Strict;

    #[test]
    fn parses_scalars() {
        assert_eq!(parse_object(b"true", 0, None, RELAXED).unwrap().0, Object::Boolean(true));
        assert_eq!(parse_object(b"42", 0, None, RELAXED).unwrap().0, Object::Integer(42));
        assert_eq!(parse_object(b"-1.5", 0, None, RELAXED).unwrap().0, Object::Real(-1.5));
        assert_eq!(parse_object(b"null", 0, None, RELAXED).unwrap().0, Object::Null);
    }

    #[test]
    fn parses_indirect_reference() {
        let (obj, consumed) = parse_object(b"12 0 R", 0, None, RELAXED).unwrap();
        assert_eq!(obj, Object::Reference(12, 0));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn integer_followed_by_non_reference_stays_an_integer() {
        let (obj, consumed) = parse_object(b"12 /Foo", 0, None, RELAXED).unwrap();
        assert_eq!(obj, Object::Integer(12));
        assert_eq!(consumed, 2);
    }

    #[test]
    fn parses_array_and_dict() {
        let (obj, _) = parse_object(b"[1 2 3]", 0, None, RELAXED).unwrap();
        assert_eq!(obj, Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)]));

        let (obj, _) = parse_object(b"<< /Type /Catalog >>", 0, None, RELAXED).unwrap();
        assert!(obj.as_dict().unwrap().has_type(b"Catalog"));
    }

    #[test]
    fn parses_a_stream_with_explicit_length() {
        let data = b"<< /Length 5 >>\nstream\r\nhello\r\nendstream";
        let (obj, _) = parse_object(data, 0, None, RELAXED).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
    }

    #[test]
    fn falls_back_to_scanning_when_length_is_unavailable() {
        let data = b"<< /Length 99999 >>\nstream\nhello\nendstream";
        let (obj, _) = parse_object(data, 0, None, RELAXED).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.content, b"hello");
    }

    #[test]
    fn parses_an_indirect_object() {
        let data = b"3 0 obj\n(hi)\nendobj";
        let (id, header_len) = parse_indirect_header(data, 0).unwrap();
        assert_eq!(id, (3, 0));
        let (obj, _) = parse_indirect_body(&data[header_len..], header_len, None, RELAXED).unwrap();
        assert_eq!(obj, Object::String(b"hi".to_vec(), StringFormat::Literal));
    }

    #[test]
    fn strict_mode_rejects_duplicate_dictionary_keys() {
        let err = parse_object(b"<< /Type /Catalog /Type /Page >>", 0, None, STRICT).unwrap_err();
        assert!(matches!(err, crate::Error::Parse(ParseError::DuplicateKey(_))));
    }

    #[test]
    fn relaxed_mode_keeps_the_last_value_for_duplicate_keys() {
        let (obj, _) = parse_object(b"<< /Type /Catalog /Type /Page >>", 0, None, RELAXED).unwrap();
        assert!(obj.as_dict().unwrap().has_type(b"Page"));
    }

    #[test]
    fn strict_mode_rejects_an_unresolved_indirect_length() {
        let data = b"<< /Length 5 0 R >>\nstream\r\nhello\r\nendstream";
        let err = parse_object(data, 0, None, STRICT).unwrap_err();
        assert!(matches!(err, crate::Error::Parse(ParseError::UnresolvedLength)));
    }
}
