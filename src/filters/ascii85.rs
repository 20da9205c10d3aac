use crate::error::FilterError;
use crate::Result;

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut bytes = data.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        match byte {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b if b.is_ascii_whitespace() => continue,
            b'!'..=b'u' => {
                group[count] = byte - b'!';
                count += 1;
                if count == 5 {
                    decode_group(&group, 5, &mut out)?;
                    count = 0;
                }
            }
            other => return Err(FilterError::BadParameters(format!("invalid ASCII85 byte 0x{other:02x}")).into()),
        }
    }

    if count > 0 {
        if count == 1 {
            return Err(FilterError::TruncatedInput.into());
        }
        for slot in group.iter_mut().skip(count) {
            *slot = 84;
        }
        decode_group(&group, count, &mut out)?;
    }

    Ok(out)
}

fn decode_group(group: &[u8; 5], used: usize, out: &mut Vec<u8>) -> Result<()> {
    let mut value: u32 = 0;
    for &digit in group {
        value = value
            .checked_mul(85)
            .and_then(|v| v.checked_add(digit as u32))
            .ok_or(FilterError::BadParameters("ASCII85 group overflow".into()))?;
    }
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[..used - 1]);
    Ok(())
}

pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in data.chunks(4) {
        if chunk.len() == 4 && chunk == [0, 0, 0, 0] {
            out.push(b'z');
            continue;
        }
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(buf);

        let mut digits = [0u8; 5];
        let mut v = value;
        for i in (0..5).rev() {
            digits[i] = (v % 85) as u8;
            v /= 85;
        }
        let used = chunk.len() + 1;
        for &d in &digits[..used] {
            out.push(d + b'!');
        }
    }
    out.extend_from_slice(b"~>");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let data = b"Man is distinguished".to_vec();
        let encoded = encode(&data).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn z_shorthand_round_trips() {
        let data = vec![0u8; 8];
        let encoded = encode(&data).unwrap();
        assert!(encoded.starts_with(b"zz"));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_round_trips_to_empty() {
        let encoded = encode(&[]).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
