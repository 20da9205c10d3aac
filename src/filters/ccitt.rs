//! CCITT Group 3/4 fax decompression, as used by scanned-page PDFs.
//!
//! Decoding only — spec.md lists no CCITTFaxDecode encoder, and producing
//! a compliant encoder is out of scope for the object layer.

use crate::dictionary::Dictionary;
use crate::error::FilterError;
use crate::Result;

#[derive(Debug, Clone, Copy)]
struct Params {
    k: i64,
    columns: u16,
    rows: Option<u16>,
    black_is_1: bool,
    byte_align: bool,
}

fn params_from_dict(params: &Dictionary) -> Params {
    Params {
        k: params.get(b"K").and_then(|o| o.as_i64()).unwrap_or(0),
        columns: params.get(b"Columns").and_then(|o| o.as_i64()).unwrap_or(1728).clamp(1, u16::MAX as i64) as u16,
        rows: params.get(b"Rows").and_then(|o| o.as_i64()).ok().filter(|&r| r > 0).map(|r| r as u16),
        black_is_1: params.get(b"BlackIs1").and_then(|o| o.as_bool()).unwrap_or(false),
        byte_align: params.get(b"EncodedByteAlign").and_then(|o| o.as_bool()).unwrap_or(false),
    }
}

pub fn decode(data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    let p = params_from_dict(params);
    let row_bytes = (p.columns as usize).div_ceil(8);
    let mut rows: Vec<u8> = Vec::new();
    let mut row_count = 0usize;

    let options = fax::Options {
        columns: p.columns as u32,
        byte_align: p.byte_align,
        ..Default::default()
    };

    let decode_result = if p.k < 0 {
        fax::decoder::decode_g4(data.iter().copied(), p.columns as u32, p.rows.map(|r| r as u32), |transitions| {
            push_row(&mut rows, transitions, p.columns, row_bytes);
            row_count += 1;
        })
    } else if p.k == 0 {
        fax::decoder::decode_g3_1d(data.iter().copied(), p.columns as u32, |transitions| {
            push_row(&mut rows, transitions, p.columns, row_bytes);
            row_count += 1;
        })
    } else {
        fax::decoder::decode_g3_2d(data.iter().copied(), options, |transitions| {
            push_row(&mut rows, transitions, p.columns, row_bytes);
            row_count += 1;
        })
    };

    if let Err(e) = decode_result {
        return Err(FilterError::BadParameters(format!("CCITT: {e:?}")).into());
    }

    if let Some(expected) = p.rows {
        if row_count < expected as usize {
            return Err(FilterError::TruncatedInput.into());
        }
    }

    if !p.black_is_1 {
        for byte in rows.iter_mut() {
            *byte = !*byte;
        }
    }

    Ok(rows)
}

fn push_row(rows: &mut Vec<u8>, transitions: &[u16], columns: u16, row_bytes: usize) {
    let mut row = vec![0u8; row_bytes];
    let mut color_is_black = false;
    let mut prev = 0u16;
    for &pos in transitions {
        let pos = pos.min(columns);
        if color_is_black {
            for px in prev..pos {
                row[(px / 8) as usize] |= 0x80 >> (px % 8);
            }
        }
        color_is_black = !color_is_black;
        prev = pos;
    }
    rows.extend_from_slice(&row);
}
