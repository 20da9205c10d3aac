//! The indirect-object grammar: header, binary comment, `startxref`
//! pointer, cross-reference sections, and `N G obj ... endobj` bodies.
//!
//! [`ParserInput`] carries the whole document buffer plus a byte
//! offset (via `nom_locate`), matching the way the reader hands the
//! entry points below a full-buffer span and a separate start offset
//! rather than re-slicing on every call.

pub mod object;
pub(crate) mod xref;

use std::collections::HashSet;

use log::warn;
use nom_locate::LocatedSpan;

use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError};
use crate::lexer::{self, Token};
use crate::object::Object;
use crate::reader::Reader;
use crate::xref::Xref;
use crate::{ObjectId, Result};

pub type ParserInput<'a> = LocatedSpan<&'a [u8], &'static str>;

/// Parse the `%PDF-n.m` header at the very start of the buffer,
/// returning the version string (e.g. `"1.7"`).
pub fn header(input: ParserInput) -> Option<String> {
    let data = *input.fragment();
    let rest = data.strip_prefix(b"%PDF-")?;
    let end = rest.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).ok().map(|s| s.trim().to_string())
}

/// Parse the optional binary-marker comment on the second line (a `%`
/// followed by four or more bytes >= 0x80), returning its raw bytes
/// without the leading `%`.
pub fn binary_mark(input: ParserInput) -> Option<Vec<u8>> {
    let data = *input.fragment();
    let rest = data.strip_prefix(b"%")?;
    let end = rest.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_vec())
}

/// Parse `startxref\n<offset>` positioned at `input[0]`.
pub fn xref_start(input: ParserInput) -> Option<i64> {
    let data = *input.fragment();
    let rest = data.strip_prefix(b"startxref")?;
    let skip = lexer::skip_trivia(rest);
    match lexer::next_token(&rest[skip..], 0).ok()? {
        (Token::Integer(n), _) => Some(n),
        _ => None,
    }
}

/// Parse the indirect object starting at byte `offset` within the
/// buffer carried by `input`. In strict mode, `expected_id` must match
/// the id actually found in the file; in relaxed/no validation, a
/// mismatch is only logged and the id found in the file wins, matching
/// how producers occasionally get this wrong without making the whole
/// document unreadable.
pub fn indirect_object(
    input: ParserInput, offset: usize, expected_id: Option<ObjectId>, reader: &Reader,
    already_seen: &mut HashSet<ObjectId>,
) -> Result<(ObjectId, Object)> {
    let data = *input.fragment();
    if offset > data.len() {
        return Err(Error::InvalidOffset(offset));
    }
    let (id, header_len) = object::parse_indirect_header(&data[offset..], offset)?;
    if let Some(expected) = expected_id {
        if expected != id {
            if reader.validation.is_strict() {
                return Err(ParseError::ObjectIdMismatch { expected, found: id }.into());
            }
            warn!("object id mismatch at offset {offset}: expected {expected:?}, found {id:?}");
        }
    }
    let body_offset = offset + header_len;
    let (obj, _) = object::parse_indirect_body(
        &data[body_offset..],
        body_offset,
        Some((reader, already_seen)),
        reader.validation,
    )?;
    Ok((id, obj))
}

/// Parse one link of the cross-reference chain, starting at
/// `input[0]`: either a classic `xref`/`trailer` pair or a single
/// `/Type /XRef` stream object, whose dictionary doubles as the
/// trailer.
pub fn xref_and_trailer(input: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let data = *input.fragment();
    let offset = input.location_offset();
    let skip = lexer::skip_trivia(data);
    let rest = &data[skip..];

    if rest.starts_with(b"xref") {
        let mut pos = skip + b"xref".len();
        let (mut table, consumed) = xref::parse_classic_table(&data[pos..], offset + pos)?;
        pos += consumed;
        let (trailer, _) = xref::parse_trailer_dict(&data[pos..], offset + pos, reader.validation)?;
        if table.size == 0 {
            table.size = table.max_id() + 1;
        }
        return Ok((table, trailer));
    }

    let mut already_seen = HashSet::new();
    let (_, obj) = indirect_object(input, skip, None, reader, &mut already_seen)?;
    let stream = obj.as_stream().map_err(|_| Error::Parse(ParseError::InvalidXref))?;
    xref::parse_xref_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_version() {
        let input = ParserInput::new_extra(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n", "header");
        assert_eq!(header(input), Some("1.7".to_string()));
    }

    #[test]
    fn parses_binary_mark() {
        let input = ParserInput::new_extra(b"%\xe2\xe3\xcf\xd3\n1 0 obj", "binary_mark");
        let mark = binary_mark(input).unwrap();
        assert!(mark.iter().all(|&b| b >= 128));
    }

    #[test]
    fn parses_xref_start_pointer() {
        let input = ParserInput::new_extra(b"startxref\n1234\n%%EOF", "xref");
        assert_eq!(xref_start(input), Some(1234));
    }
}
