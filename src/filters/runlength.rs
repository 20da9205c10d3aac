use crate::error::FilterError;
use crate::Result;

const EOD: u8 = 128;

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        if length == EOD {
            break;
        }
        if length < 128 {
            let count = length as usize + 1;
            let end = i + count;
            if end > data.len() {
                return Err(FilterError::TruncatedInput.into());
            }
            out.extend_from_slice(&data[i..end]);
            i = end;
        } else {
            if i >= data.len() {
                return Err(FilterError::TruncatedInput.into());
            }
            let count = 257 - length as usize;
            let byte = data[i];
            i += 1;
            out.extend(std::iter::repeat_n(byte, count));
        }
    }
    Ok(out)
}

pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        // Look for a run of identical bytes.
        let mut run_len = 1;
        while i + run_len < data.len() && data[i + run_len] == data[i] && run_len < 128 {
            run_len += 1;
        }

        if run_len >= 2 {
            out.push((257 - run_len) as u8);
            out.push(data[i]);
            i += run_len;
            continue;
        }

        // Accumulate a literal run until a repeat of length >= 2 appears.
        let start = i;
        i += 1;
        while i < data.len() && i - start < 128 {
            let remaining = data.len() - i;
            if remaining >= 2 && data[i] == data[i + 1] {
                break;
            }
            i += 1;
        }
        let len = i - start;
        out.push((len - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out.push(EOD);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_content() {
        let data = b"aaaaaaaaaabcdefghij".to_vec();
        let encoded = encode(&data).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_round_trips_to_empty() {
        let encoded = encode(&[]).unwrap();
        assert_eq!(encoded, vec![EOD]);
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn eod_128_terminates_early() {
        let decoded = decode(&[0, b'x', 128, 0, b'y']).unwrap();
        assert_eq!(decoded, b"x");
    }
}
