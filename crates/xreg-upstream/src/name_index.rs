//! Name index (spec §4.8): an in-memory, atomically-swappable searchable
//! list of an adapter's resource identifiers, sourced from the upstream
//! bulk catalog at startup and refreshed on a schedule.
//!
//! Below 100k entries the index is a sorted `Vec<String>` (binary search
//! for prefix scans, linear regex scan for wildcard/substring); at or above
//! 100k entries a trigram posting-list index additionally narrows substring
//! queries before the regex confirms candidates, matching the size-based
//! branch spec §4.8 calls for explicitly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::fetcher::{Fetcher, UpstreamError};

/// Threshold above which the trigram posting list is built alongside the
/// sorted vector (spec §4.8).
pub const TRIGRAM_THRESHOLD: usize = 100_000;

#[derive(Debug, Clone)]
struct IndexSnapshot {
    /// Normalized names, sorted lexicographically; supports O(log n)
    /// prefix lookup and the pagination ordering the name phase needs.
    sorted: Vec<String>,
    /// trigram -> sorted positions into `sorted`, built only when
    /// `sorted.len() >= TRIGRAM_THRESHOLD`.
    trigrams: Option<HashMap<[u8; 3], Vec<u32>>>,
}

impl IndexSnapshot {
    fn build(mut names: Vec<String>) -> Self {
        names.sort();
        names.dedup();
        let trigrams = if names.len() >= TRIGRAM_THRESHOLD {
            Some(build_trigram_index(&names))
        } else {
            None
        };
        IndexSnapshot {
            sorted: names,
            trigrams,
        }
    }
}

fn build_trigram_index(names: &[String]) -> HashMap<[u8; 3], Vec<u32>> {
    let mut index: HashMap<[u8; 3], Vec<u32>> = HashMap::new();
    for (pos, name) in names.iter().enumerate() {
        let bytes = name.as_bytes();
        if bytes.len() < 3 {
            continue;
        }
        for window in bytes.windows(3) {
            let key = [window[0], window[1], window[2]];
            let postings = index.entry(key).or_default();
            if postings.last() != Some(&(pos as u32)) {
                postings.push(pos as u32);
            }
        }
    }
    index
}

/// A per-adapter searchable name list with atomic pointer-swap refresh.
/// Readers take a pointer snapshot at the start of a request (spec §5); a
/// single background refresher task is the only writer.
pub struct NameIndex {
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl NameIndex {
    pub fn new(names: Vec<String>) -> Self {
        NameIndex {
            snapshot: RwLock::new(Arc::new(IndexSnapshot::build(names))),
        }
    }

    pub fn empty() -> Self {
        NameIndex::new(Vec::new())
    }

    /// Atomically replace the live index with a freshly built one. The old
    /// index remains served to requests already holding a snapshot.
    pub fn swap(&self, names: Vec<String>) {
        let fresh = Arc::new(IndexSnapshot::build(names));
        *self.snapshot.write().unwrap() = fresh;
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap().sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All names with `prefix` (case-insensitive), via binary search into
    /// the sorted vector.
    pub fn prefix(&self, prefix: &str) -> Vec<String> {
        let snapshot = self.snapshot.read().unwrap().clone();
        let needle = prefix.to_lowercase();
        let start = snapshot
            .sorted
            .partition_point(|n| n.to_lowercase().as_str() < needle.as_str());
        snapshot.sorted[start..]
            .iter()
            .take_while(|n| n.to_lowercase().starts_with(&needle))
            .cloned()
            .collect()
    }

    /// All names matching a substring, case-insensitive. Uses the trigram
    /// posting list to shortlist candidates when the index is large enough
    /// to have built one, then confirms with a literal substring check.
    pub fn substring(&self, needle: &str) -> Vec<String> {
        let snapshot = self.snapshot.read().unwrap().clone();
        let needle_lower = needle.to_lowercase();
        if needle_lower.is_empty() {
            return snapshot.sorted.clone();
        }
        match &snapshot.trigrams {
            Some(trigrams) if needle_lower.len() >= 3 => {
                let candidates = candidate_positions(&needle_lower, trigrams);
                candidates
                    .into_iter()
                    .filter_map(|pos| snapshot.sorted.get(pos as usize))
                    .filter(|n| n.to_lowercase().contains(&needle_lower))
                    .cloned()
                    .collect()
            }
            _ => snapshot
                .sorted
                .iter()
                .filter(|n| n.to_lowercase().contains(&needle_lower))
                .cloned()
                .collect(),
        }
    }

    /// All names matching a `*`-wildcard pattern, compiled by the caller
    /// (typically `xreg_core::filter::compile_wildcard`) and handed in so
    /// this module stays regex-flavor agnostic.
    pub fn wildcard(&self, pattern: &Regex) -> Vec<String> {
        let snapshot = self.snapshot.read().unwrap().clone();
        snapshot
            .sorted
            .iter()
            .filter(|n| pattern.is_match(n))
            .cloned()
            .collect()
    }

    /// Exact membership test, used when mapping a resource id in a path
    /// segment back to a name-index entry before issuing an upstream fetch.
    pub fn contains(&self, name: &str) -> bool {
        let snapshot = self.snapshot.read().unwrap().clone();
        snapshot.sorted.binary_search(&name.to_string()).is_ok()
            || snapshot
                .sorted
                .iter()
                .any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> Vec<String> {
        self.snapshot.read().unwrap().sorted.clone()
    }
}

fn candidate_positions(needle: &str, trigrams: &HashMap<[u8; 3], Vec<u32>>) -> Vec<u32> {
    let bytes = needle.as_bytes();
    if bytes.len() < 3 {
        return Vec::new();
    }
    let mut postings: Option<Vec<u32>> = None;
    for window in bytes.windows(3) {
        let key = [window[0], window[1], window[2]];
        let Some(list) = trigrams.get(&key) else {
            return Vec::new();
        };
        postings = Some(match postings {
            None => list.clone(),
            Some(prev) => intersect_sorted(&prev, list),
        });
    }
    postings.unwrap_or_default()
}

fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// A pluggable source for the bulk catalog an adapter's name index is
/// seeded from (npm `_all`, PyPI simple index, Maven Central search, NuGet
/// catalog, OCI `_catalog`, MCP provider list). Abstracted behind a trait so
/// a production deployment can point it at the real bulk endpoint without
/// touching the index itself (spec §4.5).
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_names(&self, fetcher: &Fetcher) -> Result<Vec<String>, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NameIndex {
        NameIndex::new(vec![
            "express".into(),
            "expressive".into(),
            "fastify".into(),
            "react".into(),
        ])
    }

    #[test]
    fn prefix_search() {
        let idx = sample();
        let mut names = idx.prefix("express");
        names.sort();
        assert_eq!(names, vec!["express", "expressive"]);
    }

    #[test]
    fn substring_search_small_index() {
        let idx = sample();
        let mut names = idx.substring("act");
        names.sort();
        assert_eq!(names, vec!["react"]);
    }

    #[test]
    fn wildcard_search() {
        let idx = sample();
        let re = xreg_core::filter::compile_wildcard("express*");
        let mut names = idx.wildcard(&re);
        names.sort();
        assert_eq!(names, vec!["express", "expressive"]);
    }

    #[test]
    fn swap_replaces_live_index() {
        let idx = sample();
        assert_eq!(idx.len(), 4);
        idx.swap(vec!["newpkg".into()]);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains("newpkg"));
    }

    #[test]
    fn trigram_path_used_above_threshold() {
        let names: Vec<String> = (0..TRIGRAM_THRESHOLD + 10)
            .map(|i| format!("pkg-{i:06}"))
            .collect();
        let idx = NameIndex::new(names);
        let hits = idx.substring("pkg-000123");
        assert_eq!(hits, vec!["pkg-000123".to_string()]);
    }

    #[test]
    fn contains_is_case_insensitive_for_scoped_names() {
        let idx = NameIndex::new(vec!["@scope/pkg".into()]);
        assert!(idx.contains("@scope/pkg"));
        assert!(idx.contains("@SCOPE/PKG"));
    }
}
