//! Pure derivations over a fetched snapshot: search, sort, filter and pagination.

use std::{fmt, str::FromStr};

use serde::de::DeserializeOwned;
use shared::domain::{Book, Library};
use thiserror::Error;

use crate::api::{BOOKS_PATH, LIBRARIES_PATH};

/// A record type that a list view can fetch and derive views from.
pub trait Resource: Clone + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION_PATH: &'static str;

    fn name(&self) -> &str;

    /// Quantity used by the count sorts.
    fn count(&self) -> u64;

    /// `needle` is already trimmed and lowercased.
    fn matches(&self, needle: &str) -> bool;
}

fn contains(field: &str, needle: &str) -> bool {
    field.to_lowercase().contains(needle)
}

impl Resource for Book {
    const COLLECTION_PATH: &'static str = BOOKS_PATH;

    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> u64 {
        self.quantity_in_library.map(u64::from).unwrap_or(0)
    }

    fn matches(&self, needle: &str) -> bool {
        contains(&self.name, needle)
            || contains(&self.author, needle)
            || self
                .publisher
                .as_deref()
                .is_some_and(|publisher| contains(publisher, needle))
    }
}

impl Resource for Library {
    const COLLECTION_PATH: &'static str = LIBRARIES_PATH;

    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> u64 {
        self.total_books
    }

    fn matches(&self, needle: &str) -> bool {
        contains(&self.name, needle)
            || self
                .address
                .as_deref()
                .is_some_and(|address| contains(address, needle))
    }
}

pub fn has_books(library: &Library) -> bool {
    library.total_books > 0
}

/// Case-insensitive substring search. A blank query yields the whole snapshot.
pub fn search<R: Resource>(records: &[R], query: &str) -> Vec<R> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| record.matches(&needle))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    NameAsc,
    CountAsc,
    CountDesc,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort `{0}` (expected name-asc, books-asc or books-desc)")]
pub struct UnknownSort(pub String);

impl FromStr for SortCriterion {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name-asc" => Ok(Self::NameAsc),
            "books-asc" => Ok(Self::CountAsc),
            "books-desc" => Ok(Self::CountDesc),
            other => Err(UnknownSort(other.to_string())),
        }
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NameAsc => "name-asc",
            Self::CountAsc => "books-asc",
            Self::CountDesc => "books-desc",
        })
    }
}

/// Stable in-place sort.
pub fn sort<R: Resource>(records: &mut [R], criterion: SortCriterion) {
    match criterion {
        SortCriterion::NameAsc => records.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
        }),
        SortCriterion::CountAsc => records.sort_by_key(|record| record.count()),
        SortCriterion::CountDesc => {
            records.sort_by(|a, b| b.count().cmp(&a.count()));
        }
    }
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

/// Maps any requested page into `1..=max(total, 1)`.
pub fn clamp_page(page: usize, total: usize) -> usize {
    page.clamp(1, total.max(1))
}

/// 1-based page slice. Out-of-range pages yield an empty slice.
pub fn paginate<R>(records: &[R], page_size: usize, page: usize) -> &[R] {
    let page_size = page_size.max(1);
    if page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= records.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(records.len());
    &records[start..end]
}

/// 1-based, inclusive positions of a page within the filtered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl PageWindow {
    pub fn new(total: usize, page_size: usize, page: usize) -> Option<Self> {
        let page_size = page_size.max(1);
        if page == 0 {
            return None;
        }
        let offset = (page - 1).checked_mul(page_size)?;
        if offset >= total {
            return None;
        }
        Some(Self {
            start: offset + 1,
            end: (offset + page_size).min(total),
            total,
        })
    }
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} of {}", self.start, self.end, self.total)
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
