//! PNG/TIFF row predictors applied on top of Flate or LZW payloads.

use crate::error::FilterError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    None,
    Tiff,
    PngNone,
    PngSub,
    PngUp,
    PngAverage,
    PngPaeth,
    /// PNG "Optimum": the encoder picks per row; the decoder must accept
    /// any of the five PNG filter types on each row (the leading tag
    /// byte selects it).
    PngOptimum,
}

impl Predictor {
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => Predictor::Tiff,
            10 => Predictor::PngNone,
            11 => Predictor::PngSub,
            12 => Predictor::PngUp,
            13 => Predictor::PngAverage,
            14 => Predictor::PngPaeth,
            15 => Predictor::PngOptimum,
            _ => Predictor::None,
        }
    }

    pub fn is_png(self) -> bool {
        matches!(
            self,
            Predictor::PngNone
                | Predictor::PngSub
                | Predictor::PngUp
                | Predictor::PngAverage
                | Predictor::PngPaeth
                | Predictor::PngOptimum
        )
    }
}

/// Row geometry shared by both predictor families.
#[derive(Debug, Clone, Copy)]
pub struct RowLayout {
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl RowLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component) + 7) / 8
    }

    pub fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns + 7) / 8
    }
}

pub fn undo(predictor: Predictor, layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    match predictor {
        Predictor::None => Ok(data.to_vec()),
        Predictor::Tiff => undo_tiff(layout, data),
        _ => undo_png(layout, data),
    }
}

pub fn apply(predictor: Predictor, layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    match predictor {
        Predictor::None => Ok(data.to_vec()),
        Predictor::Tiff => apply_tiff(layout, data),
        // Always emit the PNG "Up" filter for PNG-family predictors;
        // "Optimum" only constrains the decoder, not what an encoder
        // must choose.
        _ => apply_png_up(layout, data),
    }
}

fn undo_tiff(layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    if layout.bits_per_component != 8 {
        // Sub-byte TIFF prediction is rare in practice; pass through
        // unmodified rather than guess at bit-packing semantics.
        return Ok(data.to_vec());
    }
    let row_bytes = layout.row_bytes();
    if row_bytes == 0 || !data.len().is_multiple_of(row_bytes) {
        return Err(FilterError::PredictorMismatch.into());
    }
    let bpp = layout.bytes_per_pixel();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(out)
}

fn apply_tiff(layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    if layout.bits_per_component != 8 {
        return Ok(data.to_vec());
    }
    let row_bytes = layout.row_bytes();
    if row_bytes == 0 || !data.len().is_multiple_of(row_bytes) {
        return Err(FilterError::PredictorMismatch.into());
    }
    let bpp = layout.bytes_per_pixel();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in (bpp..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - bpp]);
        }
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i32, b as i32, c as i32);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn undo_png(layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    let row_bytes = layout.row_bytes();
    if row_bytes == 0 {
        return Err(FilterError::PredictorMismatch.into());
    }
    let stride = row_bytes + 1;
    if !data.len().is_multiple_of(stride) {
        return Err(FilterError::TruncatedInput.into());
    }
    let bpp = layout.bytes_per_pixel();
    let mut out = Vec::with_capacity(data.len() / stride * row_bytes);
    let mut prev = vec![0u8; row_bytes];

    for chunk in data.chunks(stride) {
        let tag = chunk[0];
        let mut row = chunk[1..].to_vec();
        for i in 0..row.len() {
            let a = if i >= bpp { row[i - bpp] } else { 0 };
            let b = prev[i];
            let c = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = match tag {
                0 => row[i],
                1 => row[i].wrapping_add(a),
                2 => row[i].wrapping_add(b),
                3 => row[i].wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(a, b, c)),
                other => return Err(FilterError::BadParameters(format!("unknown PNG filter tag {other}")).into()),
            };
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn apply_png_up(layout: RowLayout, data: &[u8]) -> Result<Vec<u8>> {
    let row_bytes = layout.row_bytes();
    if row_bytes == 0 || !data.len().is_multiple_of(row_bytes) {
        return Err(FilterError::PredictorMismatch.into());
    }
    let mut out = Vec::with_capacity(data.len() + data.len() / row_bytes);
    let mut prev = vec![0u8; row_bytes];
    for row in data.chunks(row_bytes) {
        out.push(2); // Up
        for i in 0..row.len() {
            out.push(row[i].wrapping_sub(prev[i]));
        }
        prev.copy_from_slice(row);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> RowLayout {
        RowLayout { colors: 1, bits_per_component: 8, columns: 4 }
    }

    #[test]
    fn png_up_round_trips() {
        let data = vec![10u8, 20, 30, 5, 6, 7, 8, 9];
        let encoded = apply(Predictor::PngUp, layout(), &data).unwrap();
        let decoded = undo(Predictor::PngUp, layout(), &encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn tiff_round_trips() {
        let data = vec![10u8, 20, 30, 5, 6, 7, 8, 9];
        let encoded = apply(Predictor::Tiff, layout(), &data).unwrap();
        let decoded = undo(Predictor::Tiff, layout(), &encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn png_optimum_accepts_mixed_row_tags() {
        // Two rows, tagged None then Sub.
        let mut encoded = vec![0u8, 1, 2, 3, 4];
        encoded.extend_from_slice(&[1u8, 1, 1, 1, 1]);
        let decoded = undo(Predictor::PngOptimum, layout(), &encoded).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4, 2, 3, 4, 5]);
    }
}
