//! Search service and result presentation.
//!
//! [`SearchService`] binds the shared [`IndexStore`], the embedding provider
//! and the on-disk [`SourceReader`] to the core search algorithm. Filtering
//! by chunk type and ranking for display happen afterwards, on the caller's
//! copy of the results.

use anyhow::{bail, Result};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use study_retrieval_core::embedding::EmbeddingProvider;
use study_retrieval_core::error::SearchError;
use study_retrieval_core::models::{ChunkKind, BOOK_SECTION, LESSON_SECTION};
use study_retrieval_core::search::{self, SearchResult, TextSource};

use crate::artifacts::ArtifactPaths;
use crate::config::Config;
use crate::embedding;
use crate::reconstruct::SourceReader;
use crate::store::IndexStore;

pub struct SearchService {
    store: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    texts: Arc<dyn TextSource>,
}

impl SearchService {
    pub fn new(store: Arc<IndexStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_text_source(store, embedder, Arc::new(SourceReader))
    }

    pub fn with_text_source(
        store: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        texts: Arc<dyn TextSource>,
    ) -> Self {
        Self {
            store,
            embedder,
            texts,
        }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Nearest-first hits for `query` against the current snapshot.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let snapshot = self.store.snapshot();
        search::search(
            snapshot.as_deref(),
            self.embedder.as_ref(),
            self.texts.as_ref(),
            query,
            top_k,
        )
        .await
    }
}

/// Result filter accepted by the HTTP `type` parameter and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    #[default]
    All,
    Lesson,
    Book,
}

impl TypeFilter {
    /// Lenient parse: anything unrecognized means [`TypeFilter::All`].
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Lesson => "lesson",
            TypeFilter::Book => "book",
        }
    }

    pub fn matches(&self, result: &SearchResult) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Lesson => result.chunk.type_tag() == LESSON_SECTION,
            TypeFilter::Book => result.chunk.type_tag() == BOOK_SECTION,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TypeFilter::All),
            "lesson" => Ok(TypeFilter::Lesson),
            "book" => Ok(TypeFilter::Book),
            other => bail!("Unknown result type: {}. Use all, lesson, or book.", other),
        }
    }
}

/// Keep results matching `filter`, best `normalized_score` first.
///
/// The sort is stable, so equal scores keep their nearest-first order.
pub fn rank_for_display(results: Vec<SearchResult>, filter: TypeFilter) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = results.into_iter().filter(|r| filter.matches(r)).collect();
    kept.sort_by(|a, b| {
        b.normalized_score
            .partial_cmp(&a.normalized_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept
}

/// CLI `search`: load the artifacts, run one query, print ranked hits.
pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    filter: TypeFilter,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
    if top_k == 0 || top_k > config.retrieval.max_top_k {
        bail!(
            "--top-k must be between 1 and {}",
            config.retrieval.max_top_k
        );
    }

    let store = Arc::new(IndexStore::new(ArtifactPaths::from_config(&config.index)));
    if let Err(e) = store.load() {
        bail!("Index not loaded: {}. Run `study build` first.", e);
    }

    let provider: Arc<dyn EmbeddingProvider> = Arc::from(embedding::create_provider(&config.embedding)?);
    let service = SearchService::new(store, provider);

    let results = service.search(query, top_k).await?;
    let ranked = rank_for_display(results, filter);

    if ranked.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in ranked.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.normalized_score,
            result.chunk.type_tag(),
            display_title(result)
        );
        println!("    distance: {:.4}", result.score);
        println!("    source: {}", result.chunk.source);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.chunk.text, 240).replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

fn display_title(result: &SearchResult) -> String {
    match &result.chunk.kind {
        ChunkKind::LessonSection(l) => {
            let lesson = l.title.as_deref().unwrap_or("(untitled lesson)");
            format!("{} / {}", lesson, l.day_title)
        }
        ChunkKind::BookSection(b) => {
            let page = b
                .page_number
                .map(|p| format!(" (p. {})", p))
                .unwrap_or_default();
            format!("{} / {}{}", b.book_title, b.item_title, page)
        }
        ChunkKind::JsonFlat(f) => f.file_name.clone(),
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
