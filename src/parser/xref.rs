//! Parsing of both cross-reference representations: the classic
//! plain-text table (ISO 32000-1 §7.5.4) and the compressed xref stream
//! (§7.5.8).

use crate::dictionary::Dictionary;
use crate::error::{ParseError, XrefError};
use crate::lexer::{self, Token};
use crate::object::Object;
use crate::stream::Stream;
use crate::xref::{Xref, XrefEntry};
use crate::{Result, ValidationMode};

/// Parse `xref\n` subsections up to (and including) the `trailer`
/// keyword. Returns the table and the number of bytes consumed.
pub fn parse_classic_table(data: &[u8], base_offset: usize) -> Result<(Xref, usize)> {
    let mut pos = 0;
    let mut xref = Xref::new(0);
    loop {
        pos += lexer::skip_trivia(&data[pos..]);
        if data[pos..].starts_with(b"trailer") {
            pos += b"trailer".len();
            return Ok((xref, pos));
        }
        if data[pos..].is_empty() {
            return Err(ParseError::InvalidXref.into());
        }

        let (first, len) = expect_integer(data, pos, base_offset)?;
        pos += len;
        pos += lexer::skip_trivia(&data[pos..]);
        let (count, len) = expect_integer(data, pos, base_offset)?;
        pos += len;

        for i in 0..count {
            pos += lexer::skip_trivia(&data[pos..]);
            let (offset, len) = expect_integer(data, pos, base_offset)?;
            pos += len;
            pos += lexer::skip_trivia(&data[pos..]);
            let (generation, len) = expect_integer(data, pos, base_offset)?;
            pos += len;
            pos += lexer::skip_trivia(&data[pos..]);
            let (token, len) = lexer::next_token(&data[pos..], base_offset + pos)?;
            pos += len;

            let obj_num = (first + i) as u32;
            let generation = generation as u16;
            match token {
                Token::Keyword(kw) if kw == b"n" => {
                    xref.insert(obj_num, XrefEntry::Normal { offset: offset as u32, generation });
                }
                Token::Keyword(kw) if kw == b"f" => {
                    if obj_num != 0 && generation == 65535 {
                        xref.insert(obj_num, XrefEntry::UnusableFree);
                    } else {
                        xref.insert(obj_num, XrefEntry::Free { next: offset as u32, generation });
                    }
                }
                _ => return Err(ParseError::InvalidXref.into()),
            }
        }
        if xref.max_id() + 1 > xref.size {
            xref.size = xref.max_id() + 1;
        }
    }
}

fn expect_integer(data: &[u8], pos: usize, base_offset: usize) -> Result<(i64, usize)> {
    match lexer::next_token(&data[pos..], base_offset + pos)? {
        (Token::Integer(n), len) => Ok((n, len)),
        _ => Err(ParseError::InvalidXref.into()),
    }
}

/// Parse the trailer dictionary following the `trailer` keyword.
/// Returns the dictionary and bytes consumed.
pub fn parse_trailer_dict(data: &[u8], base_offset: usize, validation: ValidationMode) -> Result<(Dictionary, usize)> {
    let mut pos = lexer::skip_trivia(data);
    let (object, consumed) = crate::parser::object::parse_object(&data[pos..], base_offset + pos, None, validation)?;
    pos += consumed;
    match object {
        Object::Dictionary(dict) => Ok((dict, pos)),
        _ => Err(ParseError::InvalidXref.into()),
    }
}

/// Decode a `/Type /XRef` stream's rows into a table. The stream's own
/// dictionary doubles as the trailer (it carries `/Root`, `/Size`,
/// `/Prev`, `/ID`, ...).
pub fn parse_xref_stream(stream: &Stream) -> Result<(Xref, Dictionary)> {
    let dict = stream.dict.clone();
    let content = stream.decode()?;

    let w = dict.get(b"W").map_err(|_| XrefError::MissingWidths)?.as_array()?;
    if w.len() != 3 {
        return Err(XrefError::InvalidWidths.into());
    }
    let widths: Vec<usize> =
        w.iter().map(|o| o.as_i64().map(|n| n.max(0) as usize)).collect::<Result<_>>()?;
    let row_len = widths[0] + widths[1] + widths[2];
    if row_len == 0 {
        return Err(XrefError::InvalidWidths.into());
    }

    let size = dict.get(b"Size")?.as_i64()? as u32;
    let index: Vec<(u32, u32)> = match dict.get(b"Index") {
        Ok(Object::Array(items)) => items
            .chunks(2)
            .map(|pair| {
                let start = pair.first().ok_or(XrefError::IndexMismatch)?.as_i64()? as u32;
                let count = pair.get(1).ok_or(XrefError::IndexMismatch)?.as_i64()? as u32;
                Ok((start, count))
            })
            .collect::<Result<_>>()?,
        _ => vec![(0, size)],
    };

    let mut xref = Xref::new(size);
    let mut pos = 0;
    for (start, count) in index {
        for i in 0..count {
            if pos + row_len > content.len() {
                return Err(XrefError::IndexMismatch.into());
            }
            let row = &content[pos..pos + row_len];
            pos += row_len;

            let field_type = if widths[0] == 0 { 1 } else { read_be(&row[..widths[0]]) };
            let f2 = read_be(&row[widths[0]..widths[0] + widths[1]]);
            let f3 = read_be(&row[widths[0] + widths[1]..row_len]);
            let obj_num = start + i;

            match field_type {
                0 => xref.insert(obj_num, XrefEntry::Free { next: f2 as u32, generation: f3 as u16 }),
                1 => xref.insert(obj_num, XrefEntry::Normal { offset: f2 as u32, generation: f3 as u16 }),
                2 => xref.insert(obj_num, XrefEntry::Compressed { container: f2 as u32, index: f3 as u16 }),
                _ => {}
            }
        }
    }
    Ok((xref, dict))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_classic_table() {
        let data = b"xref\n0 2\n0000000000 65535 f \n0000000017 00000 n \ntrailer\n<< /Size 2 >>";
        let (xref, consumed) = parse_classic_table(data, 0).unwrap();
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 17, generation: 0 }));
        let (trailer, _) = parse_trailer_dict(&data[consumed..], consumed, ValidationMode::Relaxed).unwrap();
        assert_eq!(trailer.get(b"Size").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn decodes_an_xref_stream() {
        // type 1 (normal), offset 0x100, generation 0 - widths [1,2,1]
        let row = vec![1u8, 0x01, 0x00, 0x00];
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XRef".to_vec()));
        dict.set("W", Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(1)]));
        dict.set("Size", Object::Integer(1));
        let stream = Stream::new(dict, row);
        let (xref, _) = parse_xref_stream(&stream).unwrap();
        assert_eq!(xref.get(0), Some(&XrefEntry::Normal { offset: 0x100, generation: 0 }));
    }
}
