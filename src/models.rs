//! Core data models used throughout docchat.
//!
//! These types represent the extracted content, stored documents, chunks,
//! and chat turns that flow through the ingestion and question-answering
//! pipeline.

use serde::{Deserialize, Serialize};

/// The kind of content an extractor produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Table,
    ImageOcr,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Table => "table",
            ContentKind::ImageOcr => "image_ocr",
        }
    }

    pub fn parse(s: &str) -> Option<ContentKind> {
        match s {
            "text" => Some(ContentKind::Text),
            "table" => Some(ContentKind::Table),
            "image_ocr" => Some(ContentKind::ImageOcr),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw item produced by an extractor before storage. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub content: String,
    /// 1-based page number.
    pub page: u32,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Table number within the page, for `kind == Table`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
    /// Path of the saved image file, for `kind == ImageOcr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// Normalized document row stored in SQLite. One row per [`ContentItem`],
/// carrying provenance metadata (page, kind, source file).
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub page: u32,
    pub kind: ContentKind,
    pub table_number: Option<u32>,
    pub image_path: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub created_at: i64,
}

/// A chunk of a document's content text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned by the retriever, scored and joined with its
/// document's provenance metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f64,
    pub page: u32,
    pub kind: ContentKind,
    pub source: String,
}

/// A source citation attached to an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub page: u32,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub snippet: String,
}

/// Role of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the chat history. Append-only within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl RetrievedChunk {
    /// Citation for this chunk: page, kind, and a bounded snippet.
    pub fn to_source_ref(&self, snippet_chars: usize) -> SourceRef {
        let snippet: String = self.text.chars().take(snippet_chars).collect();
        SourceRef {
            page: self.page,
            kind: self.kind,
            snippet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_kind_round_trip() {
        for kind in [ContentKind::Text, ContentKind::Table, ContentKind::ImageOcr] {
            assert_eq!(ContentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ContentKind::parse("video"), None);
    }

    #[test]
    fn content_item_serializes_type_field() {
        let item = ContentItem {
            content: "Table 1 (Page 2):".to_string(),
            page: 2,
            kind: ContentKind::Table,
            table_number: Some(1),
            image_path: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["page"], 2);
        assert!(json.get("image_path").is_none());
    }

    #[test]
    fn source_ref_snippet_is_char_bounded() {
        let chunk = RetrievedChunk {
            chunk_id: "c1".to_string(),
            document_id: "d1".to_string(),
            text: "héllo wörld ".repeat(100),
            score: 0.5,
            page: 1,
            kind: ContentKind::Text,
            source: "doc.pdf".to_string(),
        };
        let source = chunk.to_source_ref(300);
        assert_eq!(source.snippet.chars().count(), 300);
    }
}
