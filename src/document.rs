//! [`Document`]: the in-memory object graph a [`crate::reader::Reader`]
//! populates and a [`crate::writer::Writer`] serializes back out.
//!
//! A `Document` owns every indirect object reachable from its trailer,
//! addressed by `(object number, generation)`. Unlike a handle that
//! keeps the source bytes pinned for later lazy parsing, this crate
//! follows the eager-load model already used by the reader (see
//! `reader/mod.rs`): every in-use object is parsed once while building
//! the document, and `dereference`/`get_object` are then pure
//! in-memory lookups. `ObjectStream`'s cached parse plus the reader's
//! one-shot per-entry loading play the role spec.md's lazy latch
//! describes, without keeping a borrowed byte source alive past load.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::dictionary::Dictionary;
use crate::encryption::{EncryptSetup, EncryptionState};
use crate::error::{Error, Warning};
use crate::object::{Object, StringFormat};
use crate::writer::{SaveOptions, Writer};
use crate::xref::{Xref, XrefEntry};
use crate::{ObjectId, Result};

#[derive(Debug, Clone)]
pub struct Document {
    /// The header's `%PDF-M.N` version, possibly overridden by the
    /// catalog's `/Version` name (spec §4.6 step 3).
    pub version: String,
    /// One past the highest object number ever assigned; matches the
    /// trailer's `/Size` on a freshly loaded document.
    pub max_id: u32,
    /// Byte offset of the file's cross-reference section (the value a
    /// `startxref` keyword resolved to while loading), or 0 for a
    /// document built in memory.
    pub xref_start: usize,
    /// The binary-marker comment bytes (without the leading `%`), if
    /// the source document carried one.
    pub binary_mark: Vec<u8>,
    pub trailer: Dictionary,
    pub reference_table: Xref,
    pub objects: BTreeMap<ObjectId, Object>,
    /// Set once a password has successfully authenticated an
    /// `/Encrypt` dictionary; consumed by `save_with_options` when the
    /// caller asks to re-encrypt on write.
    pub encryption_state: Option<EncryptionState>,
    /// Validation warnings accumulated by relaxed-mode repair (spec §7).
    pub warnings: Vec<Warning>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// A fresh, empty document: an un-rooted object table whose free
    /// list already closes on object 0, per spec.md's invariant.
    pub fn new() -> Self {
        let mut reference_table = Xref::new(1);
        reference_table.insert(0, XrefEntry::Free { next: 0, generation: 65535 });
        Document {
            version: "1.7".to_string(),
            max_id: 0,
            xref_start: 0,
            binary_mark: Vec::new(),
            trailer: Dictionary::new(),
            reference_table,
            objects: BTreeMap::new(),
            encryption_state: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(Warning { message: message.into(), offset: None });
    }

    /// Look up an indirect object by id. Never follows references —
    /// use [`Document::dereference`] for that.
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::MissingObject(id))
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::MissingObject(id))
    }

    pub fn get_dictionary(&self, id: ObjectId) -> Result<&Dictionary> {
        self.get_object(id)?.as_dict()
    }

    /// Resolve `obj` through the object table: an [`Object::Reference`]
    /// is followed (repeatedly, in case it points at another
    /// reference) until a non-reference value is reached; anything
    /// else is returned unchanged. Object number 0 resolves to `Null`,
    /// and a reference cycle is broken by returning `Null` the second
    /// time a given id is visited, matching spec.md §4.4 and §8.
    pub fn dereference(&self, obj: &Object) -> Result<(ObjectId, Object)> {
        let mut current = obj.clone();
        let mut current_id: ObjectId = (0, 0);
        let mut seen = HashSet::new();
        loop {
            match current {
                Object::Reference(0, _) => return Ok(((0, 0), Object::Null)),
                Object::Reference(num, gen) => {
                    let id = (num, gen);
                    if !seen.insert(id) {
                        return Ok((id, Object::Null));
                    }
                    current_id = id;
                    current = self.get_object(id)?.clone();
                }
                other => return Ok((current_id, other)),
            }
        }
    }

    /// Dereference `obj`, then run its filter pipeline end to end,
    /// returning the decoded payload (spec §4.4 `resolve_stream`).
    pub fn resolve_stream(&self, obj: &Object) -> Result<Vec<u8>> {
        let (_, resolved) = self.dereference(obj)?;
        resolved.as_stream()?.decode()
    }

    /// Authenticate `password` against the trailer's `/Encrypt`
    /// dictionary without mutating the document.
    pub fn authenticate_password(&self, password: &str) -> Result<()> {
        EncryptionState::decode(self, password).map(|_| ())
    }

    /// Run every stream's filter pipeline once without keeping the
    /// result, purely so decode failures and sizes surface through the
    /// `log` facade at load time instead of on first use
    /// ([`crate::LoadOptions::eager_decode`]).
    pub fn decode_all_streams_eagerly(&self) {
        for (id, obj) in self.objects.iter() {
            if let Object::Stream(stream) = obj {
                match stream.decode() {
                    Ok(decoded) => {
                        log::trace!("eagerly decoded stream {} {}: {} bytes", id.0, id.1, decoded.len())
                    }
                    Err(e) => log::warn!("eager decode of stream {} {} failed: {e}", id.0, id.1),
                }
            }
        }
    }

    /// Allocate the next free object number (preferring the free list)
    /// and store `obj` there. A slot reused from the free list keeps
    /// the incremented generation `Xref::allocate` already gave it; a
    /// brand-new slot starts at generation 0.
    pub fn add_object(&mut self, obj: impl Into<Object>) -> ObjectId {
        let num = self.reference_table.allocate();
        let generation = match self.reference_table.get(num) {
            Some(XrefEntry::Normal { generation, .. }) => *generation,
            _ => 0,
        };
        let id = (num, generation);
        self.objects.insert(id, obj.into());
        self.max_id = self.max_id.max(num + 1);
        id
    }

    /// Store `obj` at a known id, claiming that slot in the
    /// cross-reference table if it wasn't already in use.
    pub fn insert_object(&mut self, id: ObjectId, obj: impl Into<Object>) -> ObjectId {
        self.objects.insert(id, obj.into());
        self.reference_table.insert(id.0, XrefEntry::Normal { offset: 0, generation: id.1 });
        self.max_id = self.max_id.max(id.0 + 1);
        id
    }

    /// Remove an object and return its slot to the free list with an
    /// incremented generation (spec §3 Lifecycles).
    pub fn free_object(&mut self, id: ObjectId) {
        self.objects.remove(&id);
        self.reference_table.free(id.0);
    }

    /// Encrypt this document in place (spec §6.3's "target encryption"
    /// write option): derive a fresh `/Encrypt` dictionary and file key
    /// from `setup`, store it as a new indirect object, and point the
    /// trailer at it. A fresh `/ID` is generated if the document
    /// doesn't already carry one. `save_with_options` with
    /// `SaveOptions::encrypt(true)` then re-encrypts every object's
    /// strings and stream bodies with the resulting key on write.
    pub fn encrypt(&mut self, setup: EncryptSetup) -> Result<()> {
        let file_id = match self.trailer.get(b"ID").ok().and_then(|o| o.as_array().ok()).and_then(|a| a.first()) {
            Some(existing) => existing.as_str()?.to_vec(),
            None => {
                let mut id = [0u8; 16];
                rand::RngCore::fill_bytes(&mut rand::rng(), &mut id);
                let id = id.to_vec();
                self.trailer.set(
                    "ID",
                    Object::Array(vec![
                        Object::String(id.clone(), StringFormat::Hexadecimal),
                        Object::String(id.clone(), StringFormat::Hexadecimal),
                    ]),
                );
                id
            }
        };

        let (state, encrypt_dict) = EncryptionState::new_for_encryption(&setup, &file_id);
        let encrypt_id = self.add_object(encrypt_dict);
        self.trailer.set("Encrypt", encrypt_id);
        self.encryption_state = Some(state);
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.save_to(&mut file)
    }

    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.save_with_options(target, SaveOptions::default())
    }

    pub fn save_with_options<W: Write>(&mut self, target: &mut W, options: SaveOptions) -> Result<()> {
        Writer::new(options).write(self, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_a_rooted_free_list() {
        let doc = Document::new();
        assert_eq!(doc.reference_table.free_list(), Some(vec![0]));
    }

    #[test]
    fn add_object_allocates_and_stores() {
        let mut doc = Document::new();
        let id = doc.add_object(Object::Integer(42));
        assert_eq!(doc.get_object(id).unwrap(), &Object::Integer(42));
        assert_eq!(id.1, 0);
    }

    #[test]
    fn dereference_resolves_one_hop() {
        let mut doc = Document::new();
        let id = doc.add_object(Object::Integer(7));
        let resolved = doc.dereference(&Object::Reference(id.0, id.1)).unwrap();
        assert_eq!(resolved, (id, Object::Integer(7)));
    }

    #[test]
    fn dereference_passes_non_references_through() {
        let doc = Document::new();
        let (_, value) = doc.dereference(&Object::Boolean(true)).unwrap();
        assert_eq!(value, Object::Boolean(true));
    }

    #[test]
    fn dereference_object_zero_is_null() {
        let doc = Document::new();
        let (_, value) = doc.dereference(&Object::Reference(0, 65535)).unwrap();
        assert_eq!(value, Object::Null);
    }

    #[test]
    fn free_object_returns_slot_to_the_free_list() {
        let mut doc = Document::new();
        let id = doc.add_object(Object::Integer(1));
        doc.free_object(id);
        assert!(doc.get_object(id).is_err());
        let realloc = doc.add_object(Object::Integer(2));
        assert_eq!(realloc.0, id.0);
        assert_eq!(realloc.1, id.1 + 1);
    }
}
