//! Document → chunk extraction and chunk → text reconstruction.
//!
//! Both directions operate on already-parsed JSON so they can be shared by
//! the index builder (which walks the corpus on disk) and by the search
//! path (which re-reads a hit's source document). File access lives in the
//! app crate.
//!
//! # Lesson documents
//!
//! ```json
//! { "lesson": { "id": "...", "lesson_number": 1, "title": "...",
//!   "daily_sections": [ { "day": "...", "date": "...", "title": "...",
//!                         "content": ["para", "para"],
//!                         "quotes": [ { "text": "..." } ] } ] } }
//! ```
//!
//! One chunk per daily section. Sections whose joined `content` is empty
//! are skipped even when they carry quotes.
//!
//! # Book documents
//!
//! ```json
//! { "title": "...", "author": "...",
//!   "sections": [ { "section_number": 1, "section_title": "...",
//!                   "page_start": 9, "page_end": 20,
//!                   "items": [ { "title": "...", "page": 9,
//!                                "content": "..." | ["..."],
//!                                "book-section-id": "..." } ] } ] }
//! ```
//!
//! One chunk per non-empty item. A book file without `sections` is read as
//! a single flat passage from its `content` (or `text`) field.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::models::{BookSection, Chunk, ChunkKind, JsonFlat, LessonSection};

/// Extract one chunk per non-empty daily section of a lesson document.
///
/// Fails if the document's structure is malformed; the caller decides
/// whether that skips the file.
pub fn lesson_chunks(doc: &Value, source: &str) -> Result<Vec<Chunk>> {
    let root = doc
        .as_object()
        .context("lesson document is not a JSON object")?;
    let lesson = match root.get("lesson") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(lesson)) => lesson,
        Some(_) => bail!("`lesson` is not an object"),
    };
    let sections = match lesson.get("daily_sections") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(sections)) => sections,
        Some(_) => bail!("`lesson.daily_sections` is not an array"),
    };

    let mut chunks = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        let day_index = i + 1;
        let section = section
            .as_object()
            .with_context(|| format!("daily section {} is not an object", day_index))?;

        let text = join_text(section.get("content"))
            .with_context(|| format!("daily section {} content", day_index))?;
        if text.is_empty() {
            continue;
        }
        let quote = join_quotes(section.get("quotes"))
            .with_context(|| format!("daily section {} quotes", day_index))?;

        chunks.push(Chunk {
            source: source.to_string(),
            text,
            kind: ChunkKind::LessonSection(LessonSection {
                lesson_id: str_field(lesson, "id"),
                lesson_number: number_field(lesson.get("lesson_number")),
                title: str_field(lesson, "title"),
                day_index,
                day: str_field(section, "day"),
                day_title: str_field(section, "title")
                    .unwrap_or_else(|| format!("Section {}", day_index)),
                day_date: str_field(section, "date"),
                quote,
            }),
        });
    }
    Ok(chunks)
}

/// Extract chunks from a book document.
///
/// With `sections`, yields one `book-section` chunk per non-empty item.
/// Without, yields at most one `json-flat` chunk named after `file_stem`.
pub fn book_chunks(doc: &Value, source: &str, file_stem: &str) -> Result<Vec<Chunk>> {
    let root = doc
        .as_object()
        .context("book document is not a JSON object")?;

    let Some(sections) = root.get("sections") else {
        let text = join_text(flat_field(root)).context("flat document content")?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![Chunk {
            source: source.to_string(),
            text,
            kind: ChunkKind::JsonFlat(JsonFlat {
                file_name: file_stem.to_string(),
            }),
        }]);
    };

    let sections = sections.as_array().context("`sections` is not an array")?;
    let book_title = str_field(root, "title").unwrap_or_default();
    let book_author = str_field(root, "author").unwrap_or_default();

    let mut chunks = Vec::new();
    for (s, section) in sections.iter().enumerate() {
        let section = section
            .as_object()
            .with_context(|| format!("section {} is not an object", s))?;
        let items = match section.get("items") {
            None => continue,
            Some(Value::Array(items)) => items,
            Some(_) => bail!("section {} `items` is not an array", s),
        };

        for (n, item) in items.iter().enumerate() {
            let item = item
                .as_object()
                .with_context(|| format!("section {} item {} is not an object", s, n))?;
            let text = join_text(item.get("content"))
                .with_context(|| format!("section {} item {} content", s, n))?;
            if text.is_empty() {
                continue;
            }

            chunks.push(Chunk {
                source: source.to_string(),
                text,
                kind: ChunkKind::BookSection(BookSection {
                    book_title: book_title.clone(),
                    book_author: book_author.clone(),
                    section_number: number_field(section.get("section_number")),
                    section_title: str_field(section, "section_title").unwrap_or_default(),
                    page_start: number_field(section.get("page_start")),
                    page_end: number_field(section.get("page_end")),
                    item_title: str_field(item, "title").unwrap_or_default(),
                    page_number: number_field(item.get("page")),
                    book_section_id: str_field(item, "book-section-id").unwrap_or_default(),
                }),
            });
        }
    }
    Ok(chunks)
}

/// Re-derive a chunk's passage from the current contents of its source
/// document.
///
/// Returns `None` when the chunk's locator fields no longer resolve to
/// non-empty content; callers fall back to the stored snapshot.
pub fn reconstruct(doc: &Value, chunk: &Chunk) -> Option<String> {
    let text = match &chunk.kind {
        ChunkKind::LessonSection(lesson) => {
            let idx = lesson.day_index.checked_sub(1)?;
            let section = doc.get("lesson")?.get("daily_sections")?.get(idx)?;
            join_text(section.get("content")).ok()?
        }
        ChunkKind::BookSection(book) => {
            let section = doc
                .get("sections")?
                .as_array()?
                .iter()
                .find(|s| number_field(s.get("section_number")) == book.section_number)?;
            let items = section.get("items")?.as_array()?;

            let by_id = if book.book_section_id.is_empty() {
                None
            } else {
                items.iter().find(|item| {
                    item.get("book-section-id").and_then(Value::as_str)
                        == Some(book.book_section_id.as_str())
                })
            };
            // Page numbers are not guaranteed unique; first match wins.
            let found = by_id.or_else(|| {
                let page = book.page_number?;
                items
                    .iter()
                    .find(|item| number_field(item.get("page")) == Some(page))
            })?;
            join_text(found.get("content")).ok()?
        }
        ChunkKind::JsonFlat(_) => join_text(flat_field(doc.as_object()?)).ok()?,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Join a string or list-of-strings field with single spaces and trim.
///
/// Missing and `null` fields yield an empty string. Lists containing
/// anything but strings are malformed.
pub fn join_text(value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Array(parts)) => {
            let mut pieces = Vec::with_capacity(parts.len());
            for part in parts {
                match part {
                    Value::String(s) => pieces.push(s.as_str()),
                    other => bail!("expected a string, found {}", kind_name(other)),
                }
            }
            Ok(pieces.join(" ").trim().to_string())
        }
        Some(Value::Object(_)) => bail!("expected a string or list, found object"),
        Some(other) => Ok(other.to_string()),
    }
}

/// Join quotations, given either as strings or as `{ "text": ... }` objects.
fn join_quotes(value: Option<&Value>) -> Result<String> {
    let quotes = match value {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Array(quotes)) => quotes,
        Some(Value::String(s)) => return Ok(s.trim().to_string()),
        Some(other) => bail!("expected a list of quotes, found {}", kind_name(other)),
    };

    let mut pieces = Vec::with_capacity(quotes.len());
    for quote in quotes {
        match quote {
            Value::String(s) => pieces.push(s.clone()),
            Value::Object(q) => match q.get("text") {
                Some(Value::String(s)) => pieces.push(s.clone()),
                Some(Value::Null) | None => bail!("quote without text"),
                Some(other) => pieces.push(other.to_string()),
            },
            other => bail!("expected a quote, found {}", kind_name(other)),
        }
    }
    Ok(pieces.join(" ").trim().to_string())
}

/// The `content` field of a flat document, or `text` when `content` is
/// absent or empty.
fn flat_field(root: &Map<String, Value>) -> Option<&Value> {
    root.get("content")
        .filter(|v| is_truthy(v))
        .or_else(|| root.get("text").filter(|v| is_truthy(v)))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Read an integer that may have been written as a number or a numeric string.
fn number_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lesson_doc() -> Value {
        json!({
            "lesson": {
                "id": "leccion_3_enero_18_2025",
                "lesson_number": "3",
                "title": "Justified",
                "daily_sections": [
                    {
                        "day": "Sábado",
                        "date": "2025-01-11",
                        "title": "Intro",
                        "content": ["Grace is", "unearned."],
                        "quotes": [{ "text": "First quote." }, { "text": "Second." }]
                    },
                    {
                        "day": "Domingo",
                        "content": [],
                        "quotes": [{ "text": "Only a quote." }]
                    },
                    {
                        "day": "Lunes",
                        "title": "Faith",
                        "content": ["  Justification by faith.  "],
                        "quotes": ["plain string quote"]
                    }
                ]
            }
        })
    }

    fn book_doc() -> Value {
        json!({
            "title": "Steps to Christ",
            "author": "Ellen White",
            "sections": [
                {
                    "section_number": 1,
                    "section_title": "God's Love",
                    "page_start": 9,
                    "page_end": 15,
                    "items": [
                        { "title": "Nature", "page": 9, "content": ["Nature and", "revelation."], "book-section-id": "s-9-a" },
                        { "title": "Empty", "page": 10, "content": "" },
                        { "title": "Second", "page": 11, "content": "Love speaks.", "book-section-id": "s-11-b" }
                    ]
                },
                {
                    "section_number": 2,
                    "section_title": "Repentance",
                    "items": [
                        { "title": "No id", "page": 23, "content": "Repent and live." }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_lesson_sections_become_chunks() {
        let chunks = lesson_chunks(&lesson_doc(), "lessons/3/lesson.json").unwrap();
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].text, "Grace is unearned.");
        match &chunks[0].kind {
            ChunkKind::LessonSection(s) => {
                assert_eq!(s.day_index, 1);
                assert_eq!(s.lesson_number, Some(3));
                assert_eq!(s.quote, "First quote. Second.");
                assert_eq!(s.day_title, "Intro");
                assert_eq!(s.day_date.as_deref(), Some("2025-01-11"));
            }
            other => panic!("unexpected kind {:?}", other),
        }

        assert_eq!(chunks[1].text, "Justification by faith.");
        match &chunks[1].kind {
            ChunkKind::LessonSection(s) => {
                assert_eq!(s.day_index, 3);
                assert_eq!(s.quote, "plain string quote");
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_quote_only_section_is_skipped() {
        let doc = json!({
            "lesson": { "daily_sections": [
                { "content": [], "quotes": [{ "text": "A quote alone." }] }
            ]}
        });
        assert!(lesson_chunks(&doc, "x").unwrap().is_empty());
    }

    #[test]
    fn test_missing_day_title_gets_placeholder() {
        let doc = json!({ "lesson": { "daily_sections": [ { "content": ["x"] } ] } });
        let chunks = lesson_chunks(&doc, "x").unwrap();
        match &chunks[0].kind {
            ChunkKind::LessonSection(s) => assert_eq!(s.day_title, "Section 1"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_malformed_lesson_is_an_error() {
        assert!(lesson_chunks(&json!([1, 2]), "x").is_err());
        assert!(lesson_chunks(&json!({ "lesson": { "daily_sections": 4 } }), "x").is_err());
        let bad_content = json!({ "lesson": { "daily_sections": [ { "content": [1] } ] } });
        assert!(lesson_chunks(&bad_content, "x").is_err());
    }

    #[test]
    fn test_book_items_become_chunks() {
        let chunks = book_chunks(&book_doc(), "books/steps.json", "steps").unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Nature and revelation.");
        assert_eq!(chunks[1].text, "Love speaks.");
        match &chunks[2].kind {
            ChunkKind::BookSection(b) => {
                assert_eq!(b.book_title, "Steps to Christ");
                assert_eq!(b.section_number, Some(2));
                assert_eq!(b.page_number, Some(23));
                assert_eq!(b.page_start, None);
                assert!(b.book_section_id.is_empty());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_flat_book_fallback() {
        let doc = json!({ "content": "", "text": ["whole", "file"] });
        let chunks = book_chunks(&doc, "books/notes.json", "notes").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "whole file");
        assert_eq!(chunks[0].type_tag(), crate::models::JSON_FLAT);

        let empty = json!({ "title": "nothing here" });
        assert!(book_chunks(&empty, "x", "x").unwrap().is_empty());
    }

    #[test]
    fn test_reconstruct_lesson_uses_one_based_index() {
        let doc = lesson_doc();
        let chunks = lesson_chunks(&doc, "x").unwrap();
        for chunk in &chunks {
            assert_eq!(reconstruct(&doc, chunk).as_deref(), Some(chunk.text.as_str()));
        }
    }

    #[test]
    fn test_reconstruct_sees_drifted_source() {
        let doc = lesson_doc();
        let chunks = lesson_chunks(&doc, "x").unwrap();
        let mut edited = doc.clone();
        edited["lesson"]["daily_sections"][2]["content"] = json!(["Edited text."]);
        assert_eq!(reconstruct(&edited, &chunks[1]).as_deref(), Some("Edited text."));

        edited["lesson"]["daily_sections"] = json!([]);
        assert_eq!(reconstruct(&edited, &chunks[1]), None);
    }

    #[test]
    fn test_reconstruct_book_by_id_then_page() {
        let doc = book_doc();
        let chunks = book_chunks(&doc, "x", "x").unwrap();
        for chunk in &chunks {
            assert_eq!(reconstruct(&doc, chunk).as_deref(), Some(chunk.text.as_str()));
        }

        let mut stale = chunks[1].clone();
        if let ChunkKind::BookSection(b) = &mut stale.kind {
            b.book_section_id = "gone".to_string();
        }
        assert_eq!(reconstruct(&doc, &stale).as_deref(), Some("Love speaks."));

        if let ChunkKind::BookSection(b) = &mut stale.kind {
            b.page_number = Some(999);
        }
        assert_eq!(reconstruct(&doc, &stale), None);
    }

    #[test]
    fn test_reconstruct_flat() {
        let doc = json!({ "content": ["a", "b"] });
        let chunks = book_chunks(&doc, "x", "x").unwrap();
        assert_eq!(reconstruct(&doc, &chunks[0]).as_deref(), Some("a b"));
        assert_eq!(reconstruct(&json!({}), &chunks[0]), None);
    }

    #[test]
    fn test_number_field_accepts_strings() {
        assert_eq!(number_field(Some(&json!(7))), Some(7));
        assert_eq!(number_field(Some(&json!("12"))), Some(12));
        assert_eq!(number_field(Some(&json!(3.0))), Some(3));
        assert_eq!(number_field(Some(&json!("iv"))), None);
        assert_eq!(number_field(None), None);
    }
}
