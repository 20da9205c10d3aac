//! Object streams (ISO 32000-1 §7.5.7): a stream of type `/ObjStm`
//! packing several non-stream indirect objects into one compressed
//! payload, and the writer-side inverse that builds them back up.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::object::Object;
use crate::parser::object as grammar;
use crate::stream::Stream;
use crate::{dictionary, ObjectId, Result, ValidationMode};

/// The decoded contents of one `/ObjStm` stream.
pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    /// Decode `stream`'s `/N`/`/First` header rows and body into their
    /// constituent objects. `stream` is decompressed in place.
    pub fn new(stream: &mut Stream) -> Result<Self> {
        stream.type_check(b"ObjStm")?;
        let n = stream.dict.get(b"N")?.as_i64()? as usize;
        let first = stream.dict.get(b"First")?.as_i64()? as usize;
        let extends = stream.dict.get(b"Extends").and_then(|o| o.as_reference()).ok();

        let content = stream.decode()?;
        if first > content.len() {
            return Err(ParseError::InvalidXref.into());
        }
        let header = &content[..first];

        let mut offsets = Vec::with_capacity(n);
        let mut pos = 0;
        for _ in 0..n {
            pos += crate::lexer::skip_trivia(&header[pos..]);
            let (obj_num, len) = next_integer(header, pos)?;
            pos += len;
            pos += crate::lexer::skip_trivia(&header[pos..]);
            let (offset, len) = next_integer(header, pos)?;
            pos += len;
            offsets.push((obj_num as u32, offset as usize));
        }

        let mut objects = BTreeMap::new();
        for (i, &(obj_num, offset)) in offsets.iter().enumerate() {
            let start = first + offset;
            if start > content.len() {
                return Err(ParseError::InvalidXref.into());
            }
            let end = offsets.get(i + 1).map(|&(_, next)| first + next).unwrap_or(content.len());
            // Entries packed into an object stream are never streams
            // themselves (ISO 32000-1 §7.5.7), so there is no `/Length`
            // to resolve here; duplicate keys still follow the crate-wide
            // default rather than the container document's own mode,
            // since nothing upstream threads that context this deep.
            let (obj, _) =
                grammar::parse_object(&content[start..end.min(content.len())], start, None, ValidationMode::default())?;
            objects.insert((obj_num, 0), obj);
        }

        let _ = extends; // chained object streams are merged by the caller via Xref::merge
        Ok(ObjectStream { objects })
    }
}

fn next_integer(data: &[u8], pos: usize) -> Result<(i64, usize)> {
    match crate::lexer::next_token(&data[pos..], pos)? {
        (crate::lexer::Token::Integer(n), len) => Ok((n, len)),
        _ => Err(ParseError::InvalidXref.into()),
    }
}

/// Tuning knobs for packing objects into `/ObjStm` streams on save.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStreamConfig {
    /// Maximum number of objects per stream.
    pub max_objects_per_stream: usize,
}

impl Default for ObjectStreamConfig {
    fn default() -> Self {
        ObjectStreamConfig { max_objects_per_stream: 200 }
    }
}

/// Packs eligible objects (non-streams, not themselves the encryption
/// dictionary) into one or more `/ObjStm` streams.
pub struct ObjectStreamBuilder {
    config: ObjectStreamConfig,
}

impl ObjectStreamBuilder {
    pub fn new(config: ObjectStreamConfig) -> Self {
        ObjectStreamBuilder { config }
    }

    /// Build object streams for every entry in `objects` that is
    /// eligible for compression (streams, and objects referenced from
    /// the trailer directly, are never placed in an object stream and
    /// are returned untouched in `loose`).
    ///
    /// Returns the built `/ObjStm` streams (as `(object id, Object)`
    /// pairs) plus a map from each packed object's id to
    /// `(container id, index)`, and the set of objects left for the
    /// classic writer path.
    pub fn build_object_streams(
        &self, objects: &BTreeMap<ObjectId, Object>,
    ) -> (Vec<(ObjectId, Object)>, BTreeMap<ObjectId, (u32, u16)>, Vec<ObjectId>) {
        let mut streams = Vec::new();
        let mut locations = BTreeMap::new();
        let mut loose = Vec::new();

        let eligible: Vec<(ObjectId, &Object)> = objects
            .iter()
            .filter(|(_, obj)| !matches!(obj, Object::Stream(_)))
            .map(|(id, obj)| (*id, obj))
            .collect();

        for chunk in eligible.chunks(self.config.max_objects_per_stream.max(1)) {
            let mut header = Vec::new();
            let mut body = Vec::new();
            for (index, (id, obj)) in chunk.iter().enumerate() {
                let offset = body.len();
                header.extend(format!("{} {} ", id.0, offset).into_bytes());
                crate::writer::write_object(&mut body, obj).expect("packed objects contain no indirect streams");
                body.push(b'\n');
                locations.insert(*id, (0u32, index as u16));
            }
            let first = header.len();
            let mut content = header;
            content.extend(body);

            let dict = dictionary! {
                "Type" => "ObjStm",
                "N" => chunk.len() as i64,
                "First" => first as i64,
            };
            streams.push((Stream::new(dict, content), chunk.iter().map(|(id, _)| *id).collect::<Vec<_>>()));
        }

        // The container object ids are allocated by the caller (the
        // writer knows the next free object number); here we only
        // return the stream bodies and which original ids they hold,
        // in allocation order.
        let built: Vec<(ObjectId, Object)> = streams
            .into_iter()
            .enumerate()
            .map(|(i, (stream, member_ids))| {
                for id in member_ids {
                    locations.insert(id, (i as u32, locations.get(&id).map(|&(_, idx)| idx).unwrap_or(0)));
                }
                ((i as u32, 0), Object::Stream(stream))
            })
            .collect();

        for (id, obj) in objects {
            if matches!(obj, Object::Stream(_)) {
                loose.push(*id);
            }
        }

        (built, locations, loose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn decodes_two_packed_objects() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        dict.set("N", 2);
        dict.set("First", 8);
        let content = b"1 0 3 2 42 (hi)".to_vec();
        let mut stream = Stream::new(dict, content);
        let object_stream = ObjectStream::new(&mut stream).unwrap();
        assert_eq!(object_stream.objects.get(&(1, 0)), Some(&Object::Integer(42)));
        assert_eq!(object_stream.objects.get(&(3, 0)), Some(&Object::string_literal("hi".as_bytes())));
    }

    #[test]
    fn build_and_decode_round_trips() {
        let mut objects = BTreeMap::new();
        objects.insert((1, 0), Object::Integer(7));
        objects.insert((2, 0), Object::Name(b"Foo".to_vec()));
        let builder = ObjectStreamBuilder::new(ObjectStreamConfig::default());
        let (streams, locations, loose) = builder.build_object_streams(&objects);
        assert_eq!(streams.len(), 1);
        assert_eq!(locations.len(), 2);
        assert!(loose.is_empty());

        let (_, obj) = &streams[0];
        let mut stream = obj.as_stream().unwrap().clone();
        let decoded = ObjectStream::new(&mut stream).unwrap();
        assert_eq!(decoded.objects.get(&(1, 0)), Some(&Object::Integer(7)));
    }
}
