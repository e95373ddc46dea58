use std::collections::{HashMap, HashSet};

use crate::error::{EnrichmentError, Result};

/// Element identifiers treated as missing and dropped during construction.
fn is_missing(id: &str) -> bool {
    let trimmed = id.trim();
    trimmed.is_empty() || trimmed == "NA"
}

/// A named collection of gene sets.
///
/// Set order follows insertion order. Within a set, elements are de-duplicated
/// keeping their first occurrence and missing identifiers (empty or `NA`) are
/// dropped. Sets left without any element are discarded.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetCollection {
    names: Vec<String>,
    elements: Vec<Vec<String>>,
}

impl SetCollection {
    pub fn new<I, N, E, S>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut elements = Vec::new();
        let mut seen_names = HashSet::new();

        for (name, members) in sets {
            let name: String = name.into();
            if is_missing(&name) {
                return Err(EnrichmentError::invalid(format!(
                    "gene set names must be non-missing; found '{}'",
                    name
                )));
            }
            if !seen_names.insert(name.clone()) {
                return Err(EnrichmentError::invalid(format!(
                    "duplicate gene set name '{}'",
                    name
                )));
            }

            let mut seen = HashSet::new();
            let cleaned: Vec<String> = members
                .into_iter()
                .filter(|id| !is_missing(id.as_ref()))
                .filter_map(|id| {
                    let id = id.as_ref().to_string();
                    seen.insert(id.clone()).then_some(id)
                })
                .collect();

            if cleaned.is_empty() {
                tracing::debug!(set = %name, "dropping gene set without valid elements");
                continue;
            }

            names.push(name);
            elements.push(cleaned);
        }

        Ok(Self { names, elements })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.elements[i].as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.elements.iter().map(Vec::as_slice))
    }

    /// Number of distinct elements per set
    pub fn sizes(&self) -> Vec<usize> {
        self.elements.iter().map(Vec::len).collect()
    }

    /// Flatten into one (set, element) pair per distinct membership.
    pub fn relation(&self) -> ElementRelation {
        let pairs = self
            .elements
            .iter()
            .enumerate()
            .flat_map(|(set_idx, members)| members.iter().map(move |e| (set_idx, e.clone())))
            .collect();

        ElementRelation {
            set_names: self.names.clone(),
            pairs,
        }
    }

    /// Keep sets whose size lies in `[min_size, max_size]`.
    ///
    /// When `universe` is given, sets are first restricted to elements of the
    /// universe and sizes are measured after the restriction.
    pub fn filter_by_size(
        &self,
        min_size: usize,
        max_size: usize,
        universe: Option<&[String]>,
    ) -> Result<SetCollection> {
        if min_size > max_size {
            return Err(EnrichmentError::invalid(format!(
                "min_size ({}) must not exceed max_size ({})",
                min_size, max_size
            )));
        }

        let universe: Option<HashSet<&str>> =
            universe.map(|u| u.iter().map(String::as_str).collect());

        let mut names = Vec::new();
        let mut elements = Vec::new();
        for (name, members) in self.iter() {
            let kept: Vec<String> = match &universe {
                Some(u) => members
                    .iter()
                    .filter(|e| u.contains(e.as_str()))
                    .cloned()
                    .collect(),
                None => members.to_vec(),
            };
            if !kept.is_empty() && (min_size..=max_size).contains(&kept.len()) {
                names.push(name.to_string());
                elements.push(kept);
            }
        }

        tracing::debug!(
            before = self.len(),
            after = names.len(),
            min_size,
            max_size,
            "filtered gene sets by size"
        );

        Ok(SetCollection { names, elements })
    }
}

/// Flattened (set, element) membership table.
#[derive(Debug, Clone)]
pub struct ElementRelation {
    set_names: Vec<String>,
    pairs: Vec<(usize, String)>,
}

impl ElementRelation {
    pub fn set_names(&self) -> &[String] {
        &self.set_names
    }

    /// (set index, element) pairs, grouped by set in collection order
    pub fn pairs(&self) -> &[(usize, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of elements per set, indexed like `set_names`
    pub fn set_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.set_names.len()];
        for (set_idx, _) in &self.pairs {
            sizes[*set_idx] += 1;
        }
        sizes
    }

    /// Keep only pairs whose element is in `universe`. Set names are kept even
    /// when a set loses all of its elements.
    pub fn restrict_to(&self, universe: &HashMap<&str, usize>) -> ElementRelation {
        ElementRelation {
            set_names: self.set_names.clone(),
            pairs: self
                .pairs
                .iter()
                .filter(|(_, e)| universe.contains_key(e.as_str()))
                .cloned()
                .collect(),
        }
    }
}
