use crate::dictionary::Dictionary;
use crate::error::Error;
use crate::filters::{self, FilterStage};
use crate::object::Object;
use crate::Result;

/// A stream object: a dictionary plus a byte payload.
///
/// `content` holds whatever bytes the stream currently carries — encoded
/// bytes as read from the file until [`Stream::decompress`] or
/// [`Stream::decode`] is called, or freshly-set bytes a caller provided.
/// `start_position` is only meaningful for streams obtained from a parsed
/// file and is `None` for streams constructed in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
    /// Byte offset of the payload in the source buffer, set by the
    /// reader while the `/Length` may still be an unresolved indirect
    /// reference.
    pub start_position: Option<usize>,
    /// Set once [`Stream::decompress`] has replaced `content` with its
    /// decoded form, so callers and the writer don't decode twice or
    /// re-encode already-logical content.
    allows_compression: bool,
}

impl Stream {
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        let mut stream = Stream {
            dict,
            content,
            start_position: None,
            allows_compression: true,
        };
        stream.dict.set("Length", stream.content.len() as i64);
        stream
    }

    /// Replace the payload and refresh `/Length`. The caller is
    /// responsible for keeping the filter pipeline in the dictionary
    /// consistent with whatever encoding `content` is in.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set("Length", content.len() as i64);
        self.content = content;
    }

    pub fn set_plain_content(&mut self, content: Vec<u8>) {
        self.dict.remove(b"Filter");
        self.dict.remove(b"DecodeParms");
        self.allows_compression = true;
        self.set_content(content);
    }

    /// The ordered filter pipeline named by `/Filter` (and its matching
    /// `/DecodeParms`), resolved without touching the cross-reference
    /// table — indirect filter names are not supported here, matching
    /// spec.md's requirement that pipeline and parameter arrays have
    /// matching lengths once named objects are in hand.
    pub fn filter_pipeline(&self) -> Result<Vec<FilterStage>> {
        filters::pipeline_from_dict(&self.dict)
    }

    /// Run the stream's filter pipeline end to end, returning the
    /// decoded logical content. Does not mutate `self`.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let pipeline = self.filter_pipeline()?;
        filters::decode_pipeline(&pipeline, &self.content)
    }

    /// Decode in place, dropping the filter pipeline from the
    /// dictionary once the content is logical. Idempotent: calling it
    /// twice is a no-op the second time.
    pub fn decompress(&mut self) -> Result<()> {
        if !self.allows_compression {
            return Ok(());
        }
        let decoded = self.decode()?;
        self.content = decoded;
        self.dict.remove(b"Filter");
        self.dict.remove(b"DecodeParms");
        self.dict.remove(b"DL");
        self.dict.set("Length", self.content.len() as i64);
        self.allows_compression = false;
        Ok(())
    }

    /// Encode `content` through the given pipeline and store the result,
    /// setting `/Filter` and `/DecodeParms` to match.
    pub fn compress_with(&mut self, pipeline: &[FilterStage]) -> Result<()> {
        let encoded = filters::encode_pipeline(pipeline, &self.content)?;
        filters::set_pipeline_on_dict(&mut self.dict, pipeline);
        self.content = encoded;
        self.allows_compression = true;
        self.dict.set("Length", self.content.len() as i64);
        Ok(())
    }

    pub fn as_object(self) -> Object {
        Object::Stream(self)
    }

    pub(crate) fn type_check(&self, ty: &[u8]) -> Result<()> {
        if self.dict.has_type(ty) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "stream is not of type {:?}",
                String::from_utf8_lossy(ty)
            )))
        }
    }
}
