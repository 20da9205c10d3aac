//! Serializing a [`Document`] back to bytes: classic or xref-stream
//! cross-reference section, optional `/ObjStm` packing, optional
//! re-encryption under the document's already-authenticated
//! [`crate::encryption::EncryptionState`].

use std::collections::BTreeMap;
use std::io::Write;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::encryption;
use crate::error::Error;
use crate::object::{Object, StringFormat};
use crate::object_stream::{ObjectStreamBuilder, ObjectStreamConfig};
use crate::stream::Stream;
use crate::xref::XrefEntry;
use crate::{ObjectId, Result};

/// Line ending used between the header, object bodies, and the
/// trailer/xref section. `Crlf` matches what most existing PDF writers
/// emit; `Lf` is smaller and equally conformant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Lf,
    Crlf,
}

impl Eol {
    pub(crate) fn bytes(self) -> &'static [u8] {
        match self {
            Eol::Lf => b"\n",
            Eol::Crlf => b"\r\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub eol: Eol,
    /// Write a `/Type /XRef` cross-reference stream instead of the
    /// classic plain-text table (requires PDF 1.5+ readers).
    pub use_xref_streams: bool,
    /// Pack non-stream objects into `/ObjStm` object streams.
    pub use_object_streams: bool,
    pub object_stream_config: ObjectStreamConfig,
    /// Re-encrypt written objects under `document.encryption_state`, if
    /// one is set. Has no effect on a document that was never
    /// authenticated or built without encryption.
    pub encrypt: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            eol: Eol::Lf,
            use_xref_streams: false,
            use_object_streams: false,
            object_stream_config: ObjectStreamConfig::default(),
            encrypt: true,
        }
    }
}

impl SaveOptions {
    pub fn builder() -> SaveOptionsBuilder {
        SaveOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptionsBuilder {
    options: SaveOptions,
}

impl SaveOptionsBuilder {
    pub fn eol(mut self, eol: Eol) -> Self {
        self.options.eol = eol;
        self
    }

    pub fn use_xref_streams(mut self, yes: bool) -> Self {
        self.options.use_xref_streams = yes;
        self
    }

    pub fn use_object_streams(mut self, yes: bool) -> Self {
        self.options.use_object_streams = yes;
        self
    }

    pub fn object_stream_config(mut self, config: ObjectStreamConfig) -> Self {
        self.options.object_stream_config = config;
        self
    }

    pub fn encrypt(mut self, yes: bool) -> Self {
        self.options.encrypt = yes;
        self
    }

    pub fn build(self) -> SaveOptions {
        self.options
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Direct(u16, u32),
    Compressed(u32, u16),
    Free(u16),
}

fn free_next(free_nums: &[u32], num: u32) -> u32 {
    let pos = free_nums.iter().position(|&n| n == num).expect("num is a free slot");
    free_nums[(pos + 1) % free_nums.len()]
}

fn bytes_needed(value: u64) -> usize {
    let mut n = 1;
    let mut v = value >> 8;
    while v > 0 {
        n += 1;
        v >>= 8;
    }
    n
}

fn write_be(buf: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        buf.push(((value >> (8 * i)) & 0xFF) as u8);
    }
}

pub struct Writer {
    options: SaveOptions,
}

impl Writer {
    pub fn new(options: SaveOptions) -> Self {
        Writer { options }
    }

    pub fn write<W: Write>(&self, document: &mut Document, target: &mut W) -> Result<()> {
        let objects = document.objects.clone();
        let (built, locations) = self.partition_for_packing(document, &objects);

        let mut next_num = objects.keys().map(|id| id.0 + 1).max().unwrap_or(1).max(document.max_id);
        let mut remap: BTreeMap<u32, u32> = BTreeMap::new();
        for (placeholder, _) in &built {
            remap.insert(placeholder.0, next_num);
            next_num += 1;
        }
        let containers: Vec<(ObjectId, Object)> =
            built.into_iter().map(|(placeholder, obj)| ((remap[&placeholder.0], 0u16), obj)).collect();
        let compressed: BTreeMap<ObjectId, (u32, u16)> =
            locations.into_iter().map(|(member, (idx, row))| (member, (remap[&idx], row))).collect();

        let mut direct: BTreeMap<ObjectId, Object> =
            objects.into_iter().filter(|(id, _)| !compressed.contains_key(id)).collect();
        for (id, obj) in containers {
            direct.insert(id, obj);
        }

        if self.options.encrypt {
            if let Some(state) = document.encryption_state.clone() {
                let encrypt_id = document.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());
                for (id, obj) in direct.iter_mut() {
                    if Some(*id) == encrypt_id {
                        continue;
                    }
                    encryption::encrypt_object(&state, *id, obj)?;
                    if let Object::Stream(stream) = obj {
                        let len = stream.content.len() as i64;
                        stream.dict.set("Length", len);
                    }
                }
            }
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(format!("%PDF-{}", document.version).as_bytes());
        buf.extend_from_slice(self.options.eol.bytes());
        buf.push(b'%');
        if document.binary_mark.is_empty() {
            buf.extend_from_slice(&[0xE2, 0xE3, 0xCF, 0xD3]);
        } else {
            buf.extend_from_slice(&document.binary_mark);
        }
        buf.extend_from_slice(self.options.eol.bytes());

        let mut direct_by_num: BTreeMap<u32, (u16, u32)> = BTreeMap::new();
        for (id, obj) in &direct {
            let offset = buf.len() as u32;
            direct_by_num.insert(id.0, (id.1, offset));
            write_indirect_object(&mut buf, *id, obj, self.options.eol)?;
        }
        let compressed_by_num: BTreeMap<u32, (u32, u16)> =
            compressed.iter().map(|(id, &(c, r))| (id.0, (c, r))).collect();

        let max_num = direct_by_num
            .keys()
            .copied()
            .chain(compressed_by_num.keys().copied())
            .chain(document.reference_table.entries.keys().copied())
            .max()
            .unwrap_or(0);
        let size = max_num + 1;

        let mut slots = Vec::with_capacity(size as usize);
        for num in 0..size {
            if let Some(&(gen, offset)) = direct_by_num.get(&num) {
                slots.push(Slot::Direct(gen, offset));
            } else if let Some(&(container, row)) = compressed_by_num.get(&num) {
                slots.push(Slot::Compressed(container, row));
            } else {
                let generation = match document.reference_table.get(num) {
                    Some(XrefEntry::Normal { generation, .. }) => generation.saturating_add(1),
                    Some(XrefEntry::Free { generation, .. }) => *generation,
                    _ => if num == 0 { 65535 } else { 0 },
                };
                slots.push(Slot::Free(generation));
            }
        }
        let free_nums: Vec<u32> = (0..size).filter(|&n| matches!(slots[n as usize], Slot::Free(_))).collect();

        let mut trailer = document.trailer.clone();
        trailer.set("Size", size as i64);
        trailer.remove(b"Prev");
        trailer.remove(b"XRefStm");

        if self.options.use_xref_streams {
            self.write_xref_stream(&mut buf, &slots, &free_nums, size, trailer)?;
        } else {
            self.write_classic_xref(&mut buf, &slots, &free_nums, size, &trailer)?;
        }

        target.write_all(&buf)?;
        Ok(())
    }

    /// Pack everything eligible (non-stream objects, excluding the
    /// `/Encrypt` dictionary itself) into `/ObjStm` streams, returning
    /// the built containers (under placeholder ids `(0,0)..`) and the
    /// member-id-to-(container index, row) map. Returns empty
    /// collections when object-stream packing is disabled.
    fn partition_for_packing(
        &self, document: &Document, objects: &BTreeMap<ObjectId, Object>,
    ) -> (Vec<(ObjectId, Object)>, BTreeMap<ObjectId, (u32, u16)>) {
        if !self.options.use_object_streams {
            return (Vec::new(), BTreeMap::new());
        }
        let encrypt_id = document.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());
        let packable: BTreeMap<ObjectId, Object> =
            objects.iter().filter(|(id, _)| Some(**id) != encrypt_id).map(|(id, obj)| (*id, obj.clone())).collect();
        let builder = ObjectStreamBuilder::new(self.options.object_stream_config);
        let (built, locations, _loose_streams) = builder.build_object_streams(&packable);
        (built, locations)
    }

    fn write_classic_xref(
        &self, buf: &mut Vec<u8>, slots: &[Slot], free_nums: &[u32], size: u32, trailer: &Dictionary,
    ) -> Result<()> {
        let xref_offset = buf.len() as u32;
        buf.extend_from_slice(b"xref");
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(format!("0 {size}").as_bytes());
        buf.extend_from_slice(self.options.eol.bytes());
        for (num, slot) in slots.iter().enumerate() {
            let num = num as u32;
            match slot {
                Slot::Direct(gen, offset) => {
                    buf.extend_from_slice(format!("{offset:010} {gen:05} n \r\n").as_bytes())
                }
                Slot::Compressed(..) => {
                    return Err(Error::Validation(
                        "classic xref cannot represent a compressed entry; enable xref streams".to_string(),
                    ))
                }
                Slot::Free(gen) => {
                    let next = free_next(free_nums, num);
                    buf.extend_from_slice(format!("{next:010} {gen:05} f \r\n").as_bytes());
                }
            }
        }
        buf.extend_from_slice(b"trailer");
        buf.extend_from_slice(self.options.eol.bytes());
        write_dict(buf, trailer)?;
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(b"startxref");
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(xref_offset.to_string().as_bytes());
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(b"%%EOF");
        Ok(())
    }

    fn write_xref_stream(
        &self, buf: &mut Vec<u8>, slots: &[Slot], free_nums: &[u32], size: u32, trailer: Dictionary,
    ) -> Result<()> {
        let xref_obj_num = size;
        let xref_offset = buf.len() as u32;

        let mut all_slots = slots.to_vec();
        all_slots.push(Slot::Direct(0, xref_offset));

        let max_field2 = all_slots
            .iter()
            .enumerate()
            .map(|(num, slot)| match slot {
                Slot::Direct(_, offset) => *offset as u64,
                Slot::Compressed(container, _) => *container as u64,
                Slot::Free(_) => free_next(free_nums, num as u32) as u64,
            })
            .max()
            .unwrap_or(0);
        let max_field3 = all_slots
            .iter()
            .map(|slot| match slot {
                Slot::Direct(gen, _) => *gen as u64,
                Slot::Compressed(_, row) => *row as u64,
                Slot::Free(gen) => *gen as u64,
            })
            .max()
            .unwrap_or(0);

        let (w1, w2, w3) = (1usize, bytes_needed(max_field2), bytes_needed(max_field3));

        let mut content = Vec::with_capacity(all_slots.len() * (w1 + w2 + w3));
        for (num, slot) in all_slots.iter().enumerate() {
            let num = num as u32;
            match slot {
                Slot::Direct(gen, offset) => {
                    write_be(&mut content, 1, w1);
                    write_be(&mut content, *offset as u64, w2);
                    write_be(&mut content, *gen as u64, w3);
                }
                Slot::Compressed(container, row) => {
                    write_be(&mut content, 2, w1);
                    write_be(&mut content, *container as u64, w2);
                    write_be(&mut content, *row as u64, w3);
                }
                Slot::Free(gen) => {
                    write_be(&mut content, 0, w1);
                    write_be(&mut content, free_next(free_nums, num) as u64, w2);
                    write_be(&mut content, *gen as u64, w3);
                }
            }
        }

        let mut xref_dict = trailer;
        xref_dict.set("Type", "XRef");
        xref_dict.set("Size", (size + 1) as i64);
        xref_dict.set("W", Object::Array(vec![Object::Integer(w1 as i64), Object::Integer(w2 as i64), Object::Integer(w3 as i64)]));

        let stream = Stream::new(xref_dict, content);
        write_indirect_object(buf, (xref_obj_num, 0), &Object::Stream(stream), self.options.eol)?;

        buf.extend_from_slice(b"startxref");
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(xref_offset.to_string().as_bytes());
        buf.extend_from_slice(self.options.eol.bytes());
        buf.extend_from_slice(b"%%EOF");
        Ok(())
    }
}

pub(crate) fn write_indirect_object(buf: &mut Vec<u8>, id: ObjectId, obj: &Object, eol: Eol) -> Result<()> {
    buf.extend_from_slice(format!("{} {} obj", id.0, id.1).as_bytes());
    buf.extend_from_slice(eol.bytes());
    match obj {
        Object::Stream(stream) => {
            write_dict(buf, &stream.dict)?;
            buf.extend_from_slice(eol.bytes());
            buf.extend_from_slice(b"stream");
            buf.extend_from_slice(eol.bytes());
            buf.extend_from_slice(&stream.content);
            buf.extend_from_slice(eol.bytes());
            buf.extend_from_slice(b"endstream");
        }
        other => write_object(buf, other)?,
    }
    buf.extend_from_slice(eol.bytes());
    buf.extend_from_slice(b"endobj");
    buf.extend_from_slice(eol.bytes());
    Ok(())
}

/// Serialize a non-stream-bearing object in place. Called directly by
/// [`crate::object_stream::ObjectStreamBuilder`] when packing objects
/// into an `/ObjStm` body, where a bare stream would be illegal.
pub(crate) fn write_object(buf: &mut Vec<u8>, obj: &Object) -> Result<()> {
    match obj {
        Object::Null => buf.extend_from_slice(b"null"),
        Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
        Object::Name(n) => write_name(buf, n),
        Object::String(s, StringFormat::Literal) => write_literal_string(buf, s),
        Object::String(s, StringFormat::Hexadecimal) => write_hex_string(buf, s),
        Object::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_object(buf, item)?;
            }
            buf.push(b']');
        }
        Object::Dictionary(dict) => write_dict(buf, dict)?,
        Object::Stream(_) => {
            return Err(Error::Validation("a stream cannot appear nested inside another object".to_string()))
        }
        Object::Reference(n, g) => buf.extend_from_slice(format!("{n} {g} R").as_bytes()),
    }
    Ok(())
}

pub(crate) fn write_dict(buf: &mut Vec<u8>, dict: &Dictionary) -> Result<()> {
    buf.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        buf.push(b' ');
        write_name(buf, key);
        buf.push(b' ');
        write_object(buf, value)?;
    }
    buf.extend_from_slice(b" >>");
    Ok(())
}

fn write_name(buf: &mut Vec<u8>, name: &[u8]) {
    buf.push(b'/');
    for &byte in name {
        let needs_escape = !byte.is_ascii_graphic()
            || matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#');
        if needs_escape {
            buf.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            buf.push(byte);
        }
    }
}

fn write_literal_string(buf: &mut Vec<u8>, s: &[u8]) {
    buf.push(b'(');
    for &byte in s {
        match byte {
            b'(' | b')' | b'\\' => {
                buf.push(b'\\');
                buf.push(byte);
            }
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            _ => buf.push(byte),
        }
    }
    buf.push(b')');
}

fn write_hex_string(buf: &mut Vec<u8>, s: &[u8]) {
    buf.push(b'<');
    for &byte in s {
        buf.extend_from_slice(format!("{byte:02X}").as_bytes());
    }
    buf.push(b'>');
}

fn format_real(r: f64) -> String {
    if r.fract() == 0.0 && r.abs() < 1e15 {
        return format!("{}", r as i64);
    }
    let mut s = format!("{r:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    #[test]
    fn writes_null_and_booleans() {
        let mut buf = Vec::new();
        write_object(&mut buf, &Object::Null).unwrap();
        write_object(&mut buf, &Object::Boolean(true)).unwrap();
        assert_eq!(buf, b"nulltrue");
    }

    #[test]
    fn escapes_parens_in_literal_strings() {
        let mut buf = Vec::new();
        write_object(&mut buf, &Object::string_literal(&b"a(b)c"[..])).unwrap();
        assert_eq!(buf, b"(a\\(b\\)c)".to_vec());
    }

    #[test]
    fn formats_integral_reals_without_a_decimal_point() {
        assert_eq!(format_real(3.0), "3");
        assert_eq!(format_real(3.5), "3.5");
    }

    #[test]
    fn round_trips_a_minimal_document_through_the_classic_writer() {
        let mut doc = Document::new();
        let catalog = dictionary! { "Type" => "Catalog" };
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("%PDF-"));
        assert!(text.contains("obj"));
        assert!(text.contains("trailer"));
        assert!(text.contains("startxref"));
        assert!(text.ends_with("%%EOF"));
    }

    #[test]
    fn xref_stream_save_produces_a_type_xref_stream() {
        let mut doc = Document::new();
        let catalog = dictionary! { "Type" => "Catalog" };
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        let options = SaveOptions::builder().use_xref_streams(true).build();
        doc.save_with_options(&mut out, options).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/Type /XRef"));
    }
}
