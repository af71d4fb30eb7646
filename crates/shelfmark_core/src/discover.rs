//! crates/shelfmark_core/src/discover.rs
//!
//! Filter and sort policy for the discover page. The external catalog
//! returns hits in relevance order; everything else is derived here so
//! the behavior is identical for live and fallback results.

use crate::domain::BookSearchHit;
use crate::ports::PortError;

/// Genre chips offered by the discover page.
pub const DISCOVER_GENRES: [&str; 10] = [
    "Fiction",
    "Science Fiction",
    "Fantasy",
    "Mystery",
    "Romance",
    "Thriller",
    "Biography",
    "History",
    "Self-Help",
    "Poetry",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoverSort {
    #[default]
    Relevance,
    Rating,
    Newest,
    Oldest,
}

impl DiscoverSort {
    pub fn parse(value: &str) -> Result<Self, PortError> {
        match value {
            "relevance" => Ok(DiscoverSort::Relevance),
            "rating" => Ok(DiscoverSort::Rating),
            "newest" => Ok(DiscoverSort::Newest),
            "oldest" => Ok(DiscoverSort::Oldest),
            other => Err(PortError::Invalid(format!("unknown sort '{other}'"))),
        }
    }
}

/// Keeps hits whose category list mentions the genre, matched
/// case-insensitively as a substring so "Science Fiction" also matches
/// "Science Fiction / Space Opera".
pub fn filter_by_genre(hits: Vec<BookSearchHit>, genre: Option<&str>) -> Vec<BookSearchHit> {
    let Some(genre) = genre.filter(|g| !g.is_empty()) else {
        return hits;
    };
    let needle = genre.to_lowercase();
    hits.into_iter()
        .filter(|hit| {
            hit.categories
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Reorders hits in place. Relevance keeps the catalog's order; the
/// other sorts are stable, with unknown ratings and dates last.
pub fn sort_hits(hits: &mut [BookSearchHit], sort: DiscoverSort) {
    match sort {
        DiscoverSort::Relevance => {}
        DiscoverSort::Rating => hits.sort_by(|a, b| {
            b.average_rating
                .unwrap_or(f64::MIN)
                .total_cmp(&a.average_rating.unwrap_or(f64::MIN))
        }),
        // Published dates are ISO-shaped strings ("1965" or
        // "1965-08-01"); lexicographic order is chronological enough.
        DiscoverSort::Newest => hits.sort_by(|a, b| match (&a.published_date, &b.published_date) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        DiscoverSort::Oldest => hits.sort_by(|a, b| match (&a.published_date, &b.published_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, rating: Option<f64>, date: Option<&str>, categories: &[&str]) -> BookSearchHit {
        BookSearchHit {
            external_id: None,
            title: title.into(),
            authors: vec!["A".into()],
            cover_url: None,
            description: None,
            total_pages: None,
            published_date: date.map(str::to_string),
            publisher: None,
            isbn_13: None,
            isbn_10: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            average_rating: rating,
        }
    }

    #[test]
    fn genre_filter_matches_inside_category_strings() {
        let hits = vec![
            hit("a", None, None, &["Science Fiction / Space Opera"]),
            hit("b", None, None, &["History"]),
            hit("c", None, None, &["science fiction"]),
        ];
        let kept = filter_by_genre(hits, Some("Science Fiction"));
        let titles: Vec<_> = kept.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn no_genre_keeps_everything() {
        let hits = vec![hit("a", None, None, &[]), hit("b", None, None, &["X"])];
        assert_eq!(filter_by_genre(hits, None).len(), 2);
    }

    #[test]
    fn rating_sort_puts_unrated_last() {
        let mut hits = vec![
            hit("three", Some(3.0), None, &[]),
            hit("none", None, None, &[]),
            hit("five", Some(4.8), None, &[]),
        ];
        sort_hits(&mut hits, DiscoverSort::Rating);
        let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["five", "three", "none"]);
    }

    #[test]
    fn date_sorts_run_both_directions() {
        let mut hits = vec![
            hit("mid", None, Some("1990-01-01"), &[]),
            hit("old", None, Some("1965"), &[]),
            hit("new", None, Some("2020-05-01"), &[]),
            hit("unknown", None, None, &[]),
        ];
        sort_hits(&mut hits, DiscoverSort::Newest);
        let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old", "unknown"]);

        sort_hits(&mut hits, DiscoverSort::Oldest);
        let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["old", "mid", "new", "unknown"]);
    }

    #[test]
    fn sort_names_parse() {
        assert_eq!(DiscoverSort::parse("rating").unwrap(), DiscoverSort::Rating);
        assert!(DiscoverSort::parse("magic").is_err());
    }
}
