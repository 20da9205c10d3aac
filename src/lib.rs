//! `pdfcore`: the PDF object layer — lexer, parser, cross-reference
//! table, stream-filter pipeline, standard security handler, and
//! writer — underlying every higher-level PDF operation.
//!
//! This crate addresses ISO 32000-1:2008 (PDF 1.7) at the object-graph
//! level. It does not render pages, synthesize glyphs, or resolve font
//! metrics; it hands callers a typed [`Object`] graph reachable through
//! a [`Document`], and a [`Writer`] to serialize one back out.

pub mod dictionary;
pub mod document;
pub mod encryption;
pub mod error;
pub mod filters;
mod incremental;
pub mod lexer;
pub mod object;
pub mod object_stream;
pub mod optimizer;
pub mod parser;
pub mod reader;
pub mod stream;
pub mod writer;
pub mod xref;

pub use dictionary::Dictionary;
pub use document::Document;
pub use encryption::{CryptMethod, EncryptSetup, EncryptionState, Permissions};
pub use error::{CryptoError, Error, FilterError, LexError, ParseError, Result, Warning, XrefError};
pub use incremental::IncrementalDocument;
pub use object::{Object, StringFormat};
pub use object_stream::{ObjectStream, ObjectStreamBuilder, ObjectStreamConfig};
pub use reader::PdfMetadata;
pub use stream::Stream;
pub use writer::{Eol, SaveOptions, SaveOptionsBuilder, Writer};
pub use xref::{Xref, XrefEntry};

/// `(object number, generation number)` — addresses one entry in a
/// [`Xref`], per ISO 32000-1 §7.3.10.
pub type ObjectId = (u32, u16);

/// The validation posture the reader and writer operate under. See
/// spec §4.2 and §4.6 (the parser's `/Length`-fallback and duplicate
/// key handling; the reader's repair mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Duplicate dictionary keys and an unresolved `/Length` indirect
    /// reference are hard parse errors; a broken trailer chain fails
    /// the load.
    Strict,
    /// The default: recoverable structural problems are patched and
    /// recorded as a [`Warning`] on [`Document::warnings`].
    #[default]
    Relaxed,
    /// Like `Relaxed`, but the warnings are not recorded either — used
    /// by callers who have already decided they don't care.
    None,
}

impl ValidationMode {
    pub fn is_strict(self) -> bool {
        matches!(self, ValidationMode::Strict)
    }

    pub fn records_warnings(self) -> bool {
        matches!(self, ValidationMode::Relaxed)
    }
}

/// Options governing [`Document::load_with_options`] and the
/// `Reader`/`Document::load*` convenience wrappers built on it.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub validation: ValidationMode,
    pub password: Option<String>,
    /// Eagerly decode every stream's filter pipeline while loading,
    /// trading load time for the ability to log decoded sizes up
    /// front. The default (`false`) matches the teacher's lazy
    /// `Stream::decode`-on-demand behavior.
    pub eager_decode: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        LoadOptions::default()
    }

    pub fn strict(mut self) -> Self {
        self.validation = ValidationMode::Strict;
        self
    }

    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_mode_defaults_to_relaxed() {
        assert_eq!(ValidationMode::default(), ValidationMode::Relaxed);
        assert!(ValidationMode::Strict.is_strict());
        assert!(!ValidationMode::None.records_warnings());
    }

    #[test]
    fn load_options_builder_sets_password() {
        let opts = LoadOptions::new().with_password("secret").strict();
        assert_eq!(opts.password.as_deref(), Some("secret"));
        assert!(opts.validation.is_strict());
    }
}
