//! Incremental updates: append new or changed objects to the end of an
//! already-loaded file instead of rewriting it whole, so every object
//! number untouched by the edit keeps its original byte offset (spec
//! §4.7 "preserving object numbers").

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::document::Document;
use crate::object::Object;
use crate::writer::{write_dict, write_indirect_object, Eol};
use crate::xref::XrefEntry;
use crate::{ObjectId, Result};

/// A loaded document paired with the bytes it was loaded from, so an
/// edit session can append a fresh cross-reference section onto the
/// original file rather than serializing the whole object graph again.
pub struct IncrementalDocument {
    original: Vec<u8>,
    pub document: Document,
    modified: BTreeSet<ObjectId>,
    freed: BTreeSet<ObjectId>,
}

impl IncrementalDocument {
    /// Pair an already-loaded `document` with the exact bytes it was
    /// parsed from. `document.xref_start` becomes the `/Prev` target
    /// for the next incremental save.
    pub fn create_from(buffer: Vec<u8>, document: Document) -> Self {
        IncrementalDocument { original: buffer, document, modified: BTreeSet::new(), freed: BTreeSet::new() }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Allocate a new object and mark it for inclusion in the next
    /// incremental save.
    pub fn add_object(&mut self, obj: impl Into<Object>) -> ObjectId {
        let id = self.document.add_object(obj);
        self.modified.insert(id);
        id
    }

    /// Overwrite an existing object id with new content, marking it
    /// for inclusion in the next incremental save.
    pub fn set_object(&mut self, id: ObjectId, obj: impl Into<Object>) -> ObjectId {
        let id = self.document.insert_object(id, obj);
        self.modified.insert(id);
        id
    }

    /// Free an object, recording it so the next incremental save emits
    /// a type-0 (free) row for it.
    pub fn free_object(&mut self, id: ObjectId) {
        self.document.free_object(id);
        self.modified.remove(&id);
        self.freed.insert(id);
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.save_to(&mut file)
    }

    /// Write the original bytes unchanged, followed by every modified
    /// or freed object and a fresh classic xref section whose trailer
    /// chains back to the original file via `/Prev`.
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        let eol = Eol::Lf;
        let base = self.original.len();

        target.write_all(&self.original)?;

        let mut buf = Vec::new();
        let mut offsets: BTreeMap<u32, (u16, u32)> = BTreeMap::new();
        for &id in &self.modified {
            let obj = self.document.get_object(id)?.clone();
            let offset = base as u32 + buf.len() as u32;
            offsets.insert(id.0, (id.1, offset));
            write_indirect_object(&mut buf, id, &obj, eol)?;
        }

        let mut rows: BTreeMap<u32, XrefEntry> = BTreeMap::new();
        for (&num, &(generation, offset)) in &offsets {
            rows.insert(num, XrefEntry::Normal { offset, generation });
        }
        for &id in &self.freed {
            let entry = match self.document.reference_table.get(id.0) {
                Some(XrefEntry::UnusableFree) => XrefEntry::Free { next: 0, generation: 65535 },
                Some(entry @ XrefEntry::Free { .. }) => *entry,
                _ => XrefEntry::Free { next: 0, generation: id.1.saturating_add(1) },
            };
            rows.insert(id.0, entry);
        }

        if rows.is_empty() {
            target.write_all(&buf)?;
            return Ok(());
        }

        let xref_offset = base as u32 + buf.len() as u32;
        write_xref_subsections(&mut buf, eol, &rows);

        let mut trailer = self.document.trailer.clone();
        trailer.set("Size", self.document.max_id as i64);
        trailer.set("Prev", self.document.xref_start as i64);

        buf.extend_from_slice(b"trailer");
        buf.extend_from_slice(eol.bytes());
        write_dict(&mut buf, &trailer)?;
        buf.extend_from_slice(eol.bytes());
        buf.extend_from_slice(b"startxref");
        buf.extend_from_slice(eol.bytes());
        buf.extend_from_slice(xref_offset.to_string().as_bytes());
        buf.extend_from_slice(eol.bytes());
        buf.extend_from_slice(b"%%EOF");

        target.write_all(&buf)?;
        self.document.xref_start = xref_offset as usize;
        self.modified.clear();
        self.freed.clear();
        Ok(())
    }
}

/// Write `rows` as one or more `xref` subsections of contiguous object
/// numbers, each `first count` followed by its 20-byte records — the
/// classic table restricted to the numbers an incremental update
/// actually touched (spec §6.2).
fn write_xref_subsections(buf: &mut Vec<u8>, eol: Eol, rows: &BTreeMap<u32, XrefEntry>) {
    buf.extend_from_slice(b"xref");
    buf.extend_from_slice(eol.bytes());

    let nums: Vec<u32> = rows.keys().copied().collect();
    let mut i = 0;
    while i < nums.len() {
        let start = nums[i];
        let mut j = i + 1;
        while j < nums.len() && nums[j] == nums[j - 1] + 1 {
            j += 1;
        }
        let count = j - i;
        buf.extend_from_slice(format!("{start} {count}").as_bytes());
        buf.extend_from_slice(eol.bytes());
        for &num in &nums[i..j] {
            match rows[&num] {
                XrefEntry::Normal { offset, generation } => {
                    buf.extend_from_slice(format!("{offset:010} {generation:05} n \r\n").as_bytes())
                }
                XrefEntry::Free { next, generation } => {
                    buf.extend_from_slice(format!("{next:010} {generation:05} f \r\n").as_bytes())
                }
                XrefEntry::Compressed { .. } | XrefEntry::UnusableFree => {
                    buf.extend_from_slice(b"0000000000 65535 f \r\n")
                }
            }
        }
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn minimal_pdf() -> Vec<u8> {
        b"%PDF-1.5\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj\n3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>endobj\nxref\n0 4\n0000000000 65535 f \n0000000009 00000 n \n0000000052 00000 n \n0000000101 00000 n \ntrailer\n<</Root 1 0 R/Size 4>>\nstartxref\n164\n%%EOF".to_vec()
    }

    #[test]
    fn save_appends_only_modified_objects() {
        let document = Document::load_mem(&minimal_pdf()).unwrap();
        let original_len = minimal_pdf().len();
        let mut incremental = IncrementalDocument::create_from(minimal_pdf(), document);

        let new_id = incremental.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" });

        let mut out = Vec::new();
        incremental.save_to(&mut out).unwrap();

        assert!(out.len() > original_len);
        assert_eq!(&out[..original_len], minimal_pdf().as_slice());

        let reloaded = Document::load_mem(&out).unwrap();
        assert_eq!(reloaded.get_object(new_id).unwrap().as_dict().unwrap().get(b"BaseFont").unwrap().as_name_str().unwrap(), "Helvetica");
        assert_eq!(reloaded.max_id, 5);
    }

    #[test]
    fn set_object_overwrites_an_existing_object_in_place() {
        let document = Document::load_mem(&minimal_pdf()).unwrap();
        let mut incremental = IncrementalDocument::create_from(minimal_pdf(), document);

        let page = incremental.document().trailer.get(b"Root").unwrap().clone();
        incremental.set_object(page.as_reference().unwrap(), dictionary! { "Type" => "Catalog", "Pages" => 2 });

        let mut out = Vec::new();
        incremental.save_to(&mut out).unwrap();
        let reloaded = Document::load_mem(&out).unwrap();
        assert_eq!(reloaded.trailer.get(b"Root").unwrap().as_reference().unwrap(), (1, 0));
    }

    #[test]
    fn free_object_emits_a_free_row() {
        let document = Document::load_mem(&minimal_pdf()).unwrap();
        let mut incremental = IncrementalDocument::create_from(minimal_pdf(), document);
        incremental.free_object((3, 0));

        let mut out = Vec::new();
        incremental.save_to(&mut out).unwrap();
        let reloaded = Document::load_mem(&out).unwrap();
        assert!(reloaded.get_object((3, 0)).is_err());
    }
}
