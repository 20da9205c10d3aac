use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::predictor::{self, Predictor, RowLayout};
use crate::dictionary::Dictionary;
use crate::error::FilterError;
use crate::Result;

fn row_layout(params: &Dictionary) -> RowLayout {
    RowLayout {
        colors: params.get(b"Colors").and_then(|o| o.as_i64()).unwrap_or(1).max(1) as usize,
        bits_per_component: params.get(b"BitsPerComponent").and_then(|o| o.as_i64()).unwrap_or(8).max(1) as usize,
        columns: params.get(b"Columns").and_then(|o| o.as_i64()).unwrap_or(1).max(1) as usize,
    }
}

pub fn decode(data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FilterError::BadParameters(format!("zlib: {e}")))?;

    let predictor_code = params.get(b"Predictor").and_then(|o| o.as_i64()).unwrap_or(1);
    let predictor = Predictor::from_code(predictor_code);
    if predictor == Predictor::None {
        return Ok(out);
    }
    predictor::undo(predictor, row_layout(params), &out)
}

pub fn encode(data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    let predictor_code = params.get(b"Predictor").and_then(|o| o.as_i64()).unwrap_or(1);
    let predictor = Predictor::from_code(predictor_code);
    let predicted = if predictor == Predictor::None {
        data.to_vec()
    } else {
        predictor::apply(predictor, row_layout(params), data)?
    };

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&predicted)
        .map_err(|e| FilterError::BadParameters(format!("zlib: {e}")))?;
    encoder.finish().map_err(|e| FilterError::BadParameters(format!("zlib: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_predictor() {
        let params = Dictionary::new();
        let data = b"hello\nworld".to_vec();
        let encoded = encode(&data, &params).unwrap();
        let decoded = decode(&encoded, &params).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_payload_round_trips_to_empty() {
        let params = Dictionary::new();
        let encoded = encode(&[], &params).unwrap();
        let decoded = decode(&encoded, &params).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn png_predictor_round_trips() {
        let mut params = Dictionary::new();
        params.set("Predictor", 15);
        params.set("Colors", 1);
        params.set("Columns", 4);
        let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let encoded = encode(&data, &params).unwrap();
        let decoded = decode(&encoded, &params).unwrap();
        assert_eq!(decoded, data);
    }
}
