//! The stream-filter pipeline: an ordered list of named filter stages,
//! each able to decode and (where the PDF spec defines one) encode a
//! byte payload.

mod ascii85;
mod asciihex;
mod ccitt;
mod dct;
mod flate;
mod lzw;
mod predictor;
mod runlength;

use crate::dictionary::Dictionary;
use crate::error::{Error, FilterError, ParseError};
use crate::object::Object;
use crate::Result;

/// One entry in a stream's filter pipeline: a filter name plus its
/// (possibly empty) decode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub name: Vec<u8>,
    pub params: Dictionary,
}

impl FilterStage {
    pub fn new<N: Into<Vec<u8>>>(name: N) -> Self {
        FilterStage { name: name.into(), params: Dictionary::new() }
    }

    pub fn with_params<N: Into<Vec<u8>>>(name: N, params: Dictionary) -> Self {
        FilterStage { name: name.into(), params }
    }
}

/// Read `/Filter` and `/DecodeParms` off a stream dictionary into an
/// ordered pipeline. A bare `/Filter /Name` becomes a single-element
/// pipeline; `/Filter [...]` pairs element-wise with `/DecodeParms`,
/// where a `null` entry (or a short array) means "no parameters".
pub fn pipeline_from_dict(dict: &Dictionary) -> Result<Vec<FilterStage>> {
    let filter = match dict.get(b"Filter") {
        Ok(f) => f,
        Err(_) => return Ok(Vec::new()),
    };

    let names: Vec<Vec<u8>> = match filter {
        Object::Name(n) => vec![n.clone()],
        Object::Array(items) => items
            .iter()
            .map(|o| o.as_name().map(|n| n.to_vec()))
            .collect::<Result<_>>()?,
        _ => return Err(ParseError::InvalidXref.into()),
    };

    let params_list: Vec<Dictionary> = match dict.get(b"DecodeParms").or_else(|_| dict.get(b"DP")) {
        Ok(Object::Dictionary(d)) => vec![d.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .map(|o| match o {
                Object::Dictionary(d) => Ok(d.clone()),
                Object::Null => Ok(Dictionary::new()),
                _ => Err(ParseError::FilterParamsLengthMismatch),
            })
            .collect::<std::result::Result<_, _>>()?,
        _ => Vec::new(),
    };

    if !params_list.is_empty() && params_list.len() != names.len() {
        return Err(ParseError::FilterParamsLengthMismatch.into());
    }

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterStage::with_params(name, params_list.get(i).cloned().unwrap_or_default()))
        .collect())
}

/// Write a pipeline's `/Filter` and `/DecodeParms` back onto a
/// dictionary, collapsing a single stage with empty parameters to the
/// bare `/Filter /Name` form most PDFs use.
pub fn set_pipeline_on_dict(dict: &mut Dictionary, pipeline: &[FilterStage]) {
    if pipeline.is_empty() {
        dict.remove(b"Filter");
        dict.remove(b"DecodeParms");
        return;
    }
    if pipeline.len() == 1 && pipeline[0].params.is_empty() {
        dict.set("Filter", Object::Name(pipeline[0].name.clone()));
        dict.remove(b"DecodeParms");
        return;
    }
    dict.set(
        "Filter",
        Object::Array(pipeline.iter().map(|s| Object::Name(s.name.clone())).collect()),
    );
    dict.set(
        "DecodeParms",
        Object::Array(
            pipeline
                .iter()
                .map(|s| {
                    if s.params.is_empty() {
                        Object::Null
                    } else {
                        Object::Dictionary(s.params.clone())
                    }
                })
                .collect(),
        ),
    );
}

pub fn decode_pipeline(pipeline: &[FilterStage], data: &[u8]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for stage in pipeline {
        current = decode_one(&stage.name, &current, &stage.params)?;
    }
    Ok(current)
}

pub fn encode_pipeline(pipeline: &[FilterStage], data: &[u8]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for stage in pipeline.iter().rev() {
        current = encode_one(&stage.name, &current, &stage.params)?;
    }
    Ok(current)
}

fn decode_one(name: &[u8], data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    match name {
        b"FlateDecode" | b"Fl" => flate::decode(data, params),
        b"LZWDecode" | b"LZW" => lzw::decode(data, params),
        b"ASCII85Decode" | b"A85" => ascii85::decode(data),
        b"ASCIIHexDecode" | b"AHx" => asciihex::decode(data),
        b"RunLengthDecode" | b"RL" => runlength::decode(data),
        b"CCITTFaxDecode" | b"CCF" => ccitt::decode(data, params),
        b"DCTDecode" | b"DCT" => dct::decode(data),
        b"Crypt" => Ok(data.to_vec()),
        other => Err(Error::Filter(FilterError::UnsupportedFilter(String::from_utf8_lossy(other).into_owned()))),
    }
}

fn encode_one(name: &[u8], data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    match name {
        b"FlateDecode" | b"Fl" => flate::encode(data, params),
        b"ASCII85Decode" | b"A85" => ascii85::encode(data),
        b"ASCIIHexDecode" | b"AHx" => asciihex::encode(data),
        b"RunLengthDecode" | b"RL" => runlength::encode(data),
        b"DCTDecode" | b"DCT" => dct::encode(data),
        b"Crypt" => Ok(data.to_vec()),
        other => Err(Error::Filter(FilterError::UnsupportedFilter(String::from_utf8_lossy(other).into_owned()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_round_trips_through_flate_then_ascii85() {
        let pipeline = vec![FilterStage::new("ASCII85Decode"), FilterStage::new("FlateDecode")];
        let data = b"hello\nworld".to_vec();
        let encoded = encode_pipeline(&pipeline, &data).unwrap();
        let decoded = decode_pipeline(&pipeline, &encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn single_filter_collapses_to_bare_name() {
        let mut dict = Dictionary::new();
        set_pipeline_on_dict(&mut dict, &[FilterStage::new("FlateDecode")]);
        assert!(matches!(dict.get(b"Filter"), Ok(Object::Name(n)) if n == b"FlateDecode"));
        assert!(!dict.has(b"DecodeParms"));
    }

    #[test]
    fn unsupported_filter_name_is_reported() {
        let err = decode_one(b"JPXDecode", &[], &Dictionary::new()).unwrap_err();
        assert!(matches!(err, Error::Filter(FilterError::UnsupportedFilter(_))));
    }

    #[test]
    fn mismatched_params_length_is_rejected() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Array(vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"ASCII85Decode".to_vec())]));
        dict.set("DecodeParms", Object::Array(vec![Object::Null]));
        assert!(pipeline_from_dict(&dict).is_err());
    }
}
