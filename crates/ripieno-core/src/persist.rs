//! Read/write hooks for external persistence.
//!
//! The engine defines no file format. Entities expose a serde document that
//! persistence code composes to and parses from JSON.

use crate::timeline::{Notation, NotationDocument, Pattern, PatternDocument, Wave, WaveMetadata};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Persist: Sized {
    type Document: Serialize + DeserializeOwned;

    fn to_document(&self) -> Self::Document;

    fn from_document(document: Self::Document) -> Result<Self>;

    fn compose(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    fn parse(text: &str) -> Result<Self> {
        Self::from_document(serde_json::from_str(text)?)
    }
}

impl Persist for Notation {
    type Document = NotationDocument;

    fn to_document(&self) -> NotationDocument {
        NotationDocument::from(self)
    }

    fn from_document(document: NotationDocument) -> Result<Self> {
        Ok(Notation::from(document))
    }
}

impl Persist for Pattern {
    type Document = PatternDocument;

    fn to_document(&self) -> PatternDocument {
        Pattern::to_document(self)
    }

    fn from_document(document: PatternDocument) -> Result<Self> {
        Pattern::from_document(&document)
    }
}

/// Only the metadata is persisted; a parsed wave starts without buffers.
impl Persist for Wave {
    type Document = WaveMetadata;

    fn to_document(&self) -> WaveMetadata {
        self.metadata()
    }

    fn from_document(document: WaveMetadata) -> Result<Self> {
        Ok(Wave::new(
            document.audio_channel,
            document.samplerate,
            document.buffer_size,
            document.format,
        ))
    }
}
