//! crates/shelfmark_core/src/shelf.rs
//!
//! Shelf presentation policy: bucketing entries by status and deriving
//! the progress figures the books pages show.

use crate::domain::{BookStatus, ShelfEntry};

/// The three buckets the books page and the shelves endpoint expose.
/// On-hold and dropped entries stay on the shelf but appear in none of
/// them.
#[derive(Debug, Default)]
pub struct ShelfPartition {
    pub currently_reading: Vec<ShelfEntry>,
    pub reading_list: Vec<ShelfEntry>,
    pub completed_books: Vec<ShelfEntry>,
}

/// Buckets shelf entries by status. Entries are ordered by most recent
/// progress first, with never-tracked entries after all tracked ones;
/// the order holds within every bucket.
pub fn partition_shelves(mut entries: Vec<ShelfEntry>) -> ShelfPartition {
    sort_by_last_progress(&mut entries);
    let mut partition = ShelfPartition::default();
    for entry in entries {
        match entry.entry.status {
            BookStatus::Reading => partition.currently_reading.push(entry),
            BookStatus::WantToRead => partition.reading_list.push(entry),
            BookStatus::Completed => partition.completed_books.push(entry),
            BookStatus::OnHold | BookStatus::Dropped => {}
        }
    }
    partition
}

/// Most recently tracked first; entries with no progress yet sort last.
pub fn sort_by_last_progress(entries: &mut [ShelfEntry]) {
    entries.sort_by(|a, b| match (a.entry.last_progress_at, b.entry.last_progress_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Percent of the book read, rounded to the nearest whole number and
/// capped at 100. `None` when the book's length is unknown.
pub fn progress_percent(current_page: Option<i32>, total_pages: Option<i32>) -> Option<u8> {
    let total = total_pages.filter(|t| *t > 0)?;
    let current = current_page.unwrap_or(0).clamp(0, total);
    let pct = (current as f64 / total as f64 * 100.0).round();
    Some(pct.clamp(0.0, 100.0) as u8)
}
