//! Chunk records: the unit of retrieval.
//!
//! A [`Chunk`] is one contiguous passage of source text plus the provenance
//! needed to attribute it and to re-read it from its source document later.
//! The metadata artifact is a JSON array of chunks whose position `i` is
//! row `i` of the vector index.
//!
//! The JSON shape is flat: the variant tag lives in a `type` field next to
//! the common `source` / `text` fields and the variant's own fields.
//!
//! ```json
//! {
//!   "source": "data/2025/q1/lesson-01/lesson.json",
//!   "text": "In the beginning ...",
//!   "type": "lesson-section",
//!   "lesson_id": "leccion_1_enero_4_2025",
//!   "lesson_number": 1,
//!   "title": "The Creation",
//!   "day_index": 2,
//!   "day": "Domingo",
//!   "day_title": "Light",
//!   "day_date": "2024-12-29",
//!   "quote": ""
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Type tag of lesson day-section chunks.
pub const LESSON_SECTION: &str = "lesson-section";
/// Type tag of book item chunks.
pub const BOOK_SECTION: &str = "book-section";
/// Type tag of whole-file chunks read from flat JSON documents.
pub const JSON_FLAT: &str = "json-flat";

/// One indexable passage plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Path of the document this passage was read from.
    pub source: String,
    /// The text that was embedded at build time.
    pub text: String,
    #[serde(flatten)]
    pub kind: ChunkKind,
}

/// Variant-specific provenance, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChunkKind {
    #[serde(rename = "lesson-section")]
    LessonSection(LessonSection),
    #[serde(rename = "book-section")]
    BookSection(BookSection),
    #[serde(rename = "json-flat")]
    JsonFlat(JsonFlat),
}

/// One daily section of a lesson document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonSection {
    pub lesson_id: Option<String>,
    pub lesson_number: Option<i64>,
    pub title: Option<String>,
    /// 1-based position of the day within `daily_sections`.
    pub day_index: usize,
    pub day: Option<String>,
    pub day_title: String,
    pub day_date: Option<String>,
    /// Attached quotations joined with single spaces. Never embedded.
    pub quote: String,
}

/// One item of one section of a book document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookSection {
    pub book_title: String,
    pub book_author: String,
    pub section_number: Option<i64>,
    pub section_title: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub item_title: String,
    pub page_number: Option<i64>,
    /// Identifier of the item, unique within its book. May be empty.
    #[serde(rename = "book-section-id")]
    pub book_section_id: String,
}

/// A JSON document without sections, indexed as a single passage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFlat {
    /// File name without extension.
    pub file_name: String,
}

impl Chunk {
    /// The `type` tag this chunk serializes with.
    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }
}

impl ChunkKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ChunkKind::LessonSection(_) => LESSON_SECTION,
            ChunkKind::BookSection(_) => BOOK_SECTION,
            ChunkKind::JsonFlat(_) => JSON_FLAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_chunk() -> Chunk {
        Chunk {
            source: "books/steps.json".to_string(),
            text: "Faith is the hand".to_string(),
            kind: ChunkKind::BookSection(BookSection {
                book_title: "Steps".to_string(),
                book_author: "E. White".to_string(),
                section_number: Some(3),
                section_title: "Faith".to_string(),
                page_start: Some(40),
                page_end: Some(52),
                item_title: "The hand of faith".to_string(),
                page_number: Some(44),
                book_section_id: "Steps-EWhite-44-a1b2c3d4".to_string(),
            }),
        }
    }

    #[test]
    fn test_book_section_json_shape() {
        let value = serde_json::to_value(book_chunk()).unwrap();
        assert_eq!(value["type"], "book-section");
        assert_eq!(value["book-section-id"], "Steps-EWhite-44-a1b2c3d4");
        assert_eq!(value["page_number"], 44);
        assert_eq!(value["source"], "books/steps.json");
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_reads_legacy_record_with_missing_fields() {
        let json = r#"{
            "type": "lesson-section",
            "source": "data/lesson.json",
            "text": "Grace abounds",
            "day_index": 3,
            "day_title": "Tuesday"
        }"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.type_tag(), LESSON_SECTION);
        match chunk.kind {
            ChunkKind::LessonSection(ref s) => {
                assert_eq!(s.day_index, 3);
                assert_eq!(s.lesson_number, None);
                assert!(s.quote.is_empty());
            }
            _ => panic!("expected lesson section"),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"type": "error", "source": "", "text": ""}"#;
        assert!(serde_json::from_str::<Chunk>(json).is_err());
    }
}
