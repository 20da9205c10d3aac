//! DCTDecode (JPEG) is carried through opaque: spec.md explicitly scopes
//! glyph/image rasterization out of the object layer, so this filter's
//! "decode" is the identity — callers that need pixels hand the payload
//! to an image crate themselves.

use crate::Result;

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    Ok(data.to_vec())
}

pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_the_identity() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(decode(&data).unwrap(), data);
        assert_eq!(encode(&data).unwrap(), data);
    }
}
