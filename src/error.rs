use std::fmt;

use thiserror::Error;

use crate::ObjectId;

/// Byte-level tokenization failures, always reported with the offset at
/// which they occurred.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated literal at offset {0}")]
    Unterminated(usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("invalid numeric literal at offset {0}")]
    InvalidNumber(usize),
    #[error("unexpected byte 0x{byte:02x} at offset {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },
}

/// Grammar-level parse failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid file header")]
    InvalidFileHeader,
    #[error("dictionary is missing its closing '>>'")]
    UnclosedDictionary,
    #[error("array is missing its closing ']'")]
    UnclosedArray,
    #[error("duplicate dictionary key {0:?}")]
    DuplicateKey(Vec<u8>),
    #[error("unexpected keyword at offset {0}")]
    UnexpectedKeyword(usize),
    #[error("stream is missing its 'endstream' keyword")]
    MissingEndstream,
    #[error("stream's /Length is an indirect reference that could not be resolved")]
    UnresolvedLength,
    #[error("object header {0} {1} is not followed by 'obj'")]
    MissingObjKeyword(u32, u16),
    #[error("object id mismatch: expected {expected:?}, found {found:?}")]
    ObjectIdMismatch { expected: ObjectId, found: ObjectId },
    #[error("invalid cross-reference table")]
    InvalidXref,
    #[error("a filter pipeline's /DecodeParms array length does not match /Filter")]
    FilterParamsLengthMismatch,
}

/// Cross-reference table and trailer-chain failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrefError {
    #[error("could not locate startxref")]
    Start,
    #[error("startxref points past the end of the file")]
    UnparseableOffset,
    #[error("/Prev offset is out of range")]
    PrevStart,
    #[error("/XRefStm offset is out of range")]
    StreamStart,
    #[error("xref stream is missing its /W array")]
    MissingWidths,
    #[error("xref stream /W array has the wrong number of fields")]
    InvalidWidths,
    #[error("xref subsection and /Index entries disagree on row count")]
    IndexMismatch,
    #[error("trailer is missing /Root")]
    MissingRoot,
    #[error("trailer is missing /Size")]
    MissingSize,
}

/// Stream-filter decode/encode failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unsupported filter {0:?}")]
    UnsupportedFilter(String),
    #[error("bad decode parameters: {0}")]
    BadParameters(String),
    #[error("input truncated before the filter's expected end")]
    TruncatedInput,
    #[error("predictor parameters do not match the declared row layout")]
    PredictorMismatch,
}

/// Standard security handler failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("the supplied password does not authenticate this document")]
    WrongPassword,
    #[error("unsupported security handler revision R={0}")]
    UnsupportedRevision(u8),
    #[error("the /Perms integrity block does not match /P")]
    IntegrityCheckFailed,
    #[error("the /Perms block length is wrong")]
    PermissionBlockMismatch,
}

/// A structural rule the active validation mode chose to warn about
/// instead of failing on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub offset: Option<usize>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (offset {})", self.message, offset),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Every failure surfaced at the crate boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("xref error: {0}")]
    Xref(#[from] XrefError),
    #[error("missing object {0:?}")]
    MissingObject(ObjectId),
    #[error("object has no cross-reference table entry")]
    MissingXrefEntry,
    #[error("offset {0} is outside the document buffer")]
    InvalidOffset(usize),
    #[error("invalid stream: {0}")]
    InvalidStream(String),
    #[error("numeric conversion failed: {0}")]
    NumericCast(String),
    #[error("decryption failed: {0}")]
    Decryption(CryptoError),
    #[error("the supplied password does not open this document")]
    InvalidPassword,
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("a reference cycle was detected while resolving object {0:?}")]
    ReferenceCycle(ObjectId),
    #[error("value of the wrong type (expected {0})")]
    UnexpectedType(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
