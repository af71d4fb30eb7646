//! services/api/src/adapters/books.rs
//!
//! This module contains the adapter for the Google Books volumes API.
//! It implements the `BookSearchService` port from the `core` crate. When no
//! API key is configured it serves a small built-in catalog instead, so the
//! search flow stays usable in development.

use async_trait::async_trait;
use serde::Deserialize;
use shelfmark_core::domain::{BookSearchHit, SearchOutcome, SearchSource};
use shelfmark_core::ports::{BookSearchService, PortError, PortResult};
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `BookSearchService` port against the
/// Google Books volumes endpoint.
#[derive(Clone)]
pub struct GoogleBooksAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksAdapter {
    /// Creates a new `GoogleBooksAdapter`.
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn search_live(
        &self,
        key: &str,
        query: &str,
        max_results: u32,
    ) -> PortResult<Vec<BookSearchHit>> {
        let url = format!("{}/volumes", self.base_url.trim_end_matches('/'));
        let max = max_results.clamp(1, 40).to_string();
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("maxResults", &max), ("key", key)])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Book search request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Book search returned status {}",
                response.status()
            )));
        }
        let body: VolumesResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Book search returned bad JSON: {}", e)))?;
        Ok(body
            .items
            .unwrap_or_default()
            .into_iter()
            .map(Volume::into_hit)
            .collect())
    }
}

//=========================================================================================
// `BookSearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl BookSearchService for GoogleBooksAdapter {
    async fn search(&self, query: &str, max_results: u32) -> PortResult<SearchOutcome> {
        match &self.api_key {
            Some(key) => {
                let hits = self.search_live(key, query, max_results).await?;
                Ok(SearchOutcome {
                    source: SearchSource::Live,
                    hits,
                })
            }
            None => {
                warn!("no books API key configured, serving the built-in catalog");
                Ok(SearchOutcome {
                    source: SearchSource::Fallback,
                    hits: fallback_hits(query, max_results),
                })
            }
        }
    }
}

//=========================================================================================
// Wire Types for the Volumes Response
//=========================================================================================

#[derive(Deserialize)]
struct VolumesResponse {
    items: Option<Vec<Volume>>,
}

#[derive(Deserialize)]
struct Volume {
    id: Option<String>,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    page_count: Option<i32>,
    #[serde(default)]
    categories: Vec<String>,
    average_rating: Option<f64>,
    image_links: Option<ImageLinks>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl Volume {
    fn into_hit(self) -> BookSearchHit {
        let info = self.volume_info;
        let mut isbn_13 = None;
        let mut isbn_10 = None;
        for id in info.industry_identifiers {
            match id.kind.as_str() {
                "ISBN_13" => isbn_13 = Some(id.identifier),
                "ISBN_10" => isbn_10 = Some(id.identifier),
                _ => {}
            }
        }
        let cover_url = info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail));
        BookSearchHit {
            external_id: self.id,
            title: info.title.unwrap_or_else(|| "Untitled".to_string()),
            authors: info.authors,
            cover_url,
            description: info.description,
            total_pages: info.page_count.filter(|pages| *pages > 0),
            published_date: info.published_date,
            publisher: info.publisher,
            isbn_13,
            isbn_10,
            categories: info.categories,
            average_rating: info.average_rating,
        }
    }
}

//=========================================================================================
// Built-in Fallback Catalog
//=========================================================================================

struct CatalogEntry {
    id: &'static str,
    title: &'static str,
    author: &'static str,
    genre: &'static str,
    pages: i32,
    year: &'static str,
    rating: f64,
    description: &'static str,
}

const FALLBACK_CATALOG: [CatalogEntry; 6] = [
    CatalogEntry {
        id: "fallback-midnight-library",
        title: "The Midnight Library",
        author: "Matt Haig",
        genre: "Fiction",
        pages: 288,
        year: "2020",
        rating: 4.2,
        description: "Between life and death there is a library, and within that library, \
            the shelves go on forever. Every book provides a chance to try another life \
            you could have lived.",
    },
    CatalogEntry {
        id: "fallback-project-hail-mary",
        title: "Project Hail Mary",
        author: "Andy Weir",
        genre: "Science Fiction",
        pages: 476,
        year: "2021",
        rating: 4.5,
        description: "Ryland Grace is the sole survivor on a desperate, last-chance \
            mission, and if he fails, humanity and the Earth itself will perish.",
    },
    CatalogEntry {
        id: "fallback-atomic-habits",
        title: "Atomic Habits",
        author: "James Clear",
        genre: "Self-Help",
        pages: 320,
        year: "2018",
        rating: 4.8,
        description: "No matter your goals, Atomic Habits offers a proven framework for \
            improving every day.",
    },
    CatalogEntry {
        id: "fallback-dune",
        title: "Dune",
        author: "Frank Herbert",
        genre: "Science Fiction",
        pages: 688,
        year: "1965",
        rating: 4.7,
        description: "Set on the desert planet Arrakis, Dune is the story of the boy Paul \
            Atreides, heir to a noble family tasked with ruling an inhospitable world.",
    },
    CatalogEntry {
        id: "fallback-the-alchemist",
        title: "The Alchemist",
        author: "Paulo Coelho",
        genre: "Fiction",
        pages: 197,
        year: "1988",
        rating: 4.6,
        description: "The mystical story of Santiago, an Andalusian shepherd boy who \
            yearns to travel in search of a worldly treasure.",
    },
    CatalogEntry {
        id: "fallback-sapiens",
        title: "Sapiens: A Brief History of Humankind",
        author: "Yuval Noah Harari",
        genre: "Non-Fiction",
        pages: 443,
        year: "2011",
        rating: 4.5,
        description: "Dr. Yuval Noah Harari spans the whole of human history, from the \
            very first humans to walk the earth to the breakthroughs of the Cognitive, \
            Agricultural, and Scientific Revolutions.",
    },
];

fn fallback_hits(query: &str, max_results: u32) -> Vec<BookSearchHit> {
    let needle = query.to_lowercase();
    FALLBACK_CATALOG
        .iter()
        .filter(|entry| {
            needle.is_empty()
                || entry.title.to_lowercase().contains(&needle)
                || entry.author.to_lowercase().contains(&needle)
        })
        .take(max_results.max(1) as usize)
        .map(|entry| BookSearchHit {
            external_id: Some(entry.id.to_string()),
            title: entry.title.to_string(),
            authors: vec![entry.author.to_string()],
            cover_url: None,
            description: Some(entry.description.to_string()),
            total_pages: Some(entry.pages),
            published_date: Some(entry.year.to_string()),
            publisher: None,
            isbn_13: None,
            isbn_10: None,
            categories: vec![entry.genre.to_string()],
            average_rating: Some(entry.rating),
        })
        .collect()
}
