use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

/// Weight returned for tags absent from the snapshot (including every tag
/// when the corpus was empty).
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Versioned snapshot of corpus-wide inverse-document-frequency weights.
///
/// Rebuilt wholesale from the profile corpus; never mutated in place.
/// Staleness between refreshes is accepted, not a correctness issue.
#[derive(Debug, Clone, Default)]
pub struct TagWeights {
    weights: HashMap<String, f64>,
    pub profile_count: usize,
    pub version: u64,
    pub computed_at: Option<DateTime<Utc>>,
}

impl TagWeights {
    /// Full pass over the corpus of canonical interest sets.
    ///
    /// `weight(tag) = ln((1 + N) / (1 + df(tag))) + 1`, which is >= 1 even
    /// for tags present in every profile. An empty corpus yields an empty
    /// mapping and every lookup falls back to [`DEFAULT_WEIGHT`].
    pub fn compute<'a, I>(corpus: I, version: u64) -> Self
    where
        I: IntoIterator<Item = &'a BTreeSet<String>>,
    {
        let mut document_freq: HashMap<&str, usize> = HashMap::new();
        let mut profile_count = 0usize;

        for interests in corpus {
            profile_count += 1;
            for tag in interests {
                *document_freq.entry(tag.as_str()).or_insert(0) += 1;
            }
        }

        let mut weights = HashMap::with_capacity(document_freq.len());
        if profile_count > 0 {
            let n = profile_count as f64;
            for (tag, df) in document_freq {
                let weight = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                weights.insert(tag.to_string(), weight);
            }
        }

        Self {
            weights,
            profile_count,
            version,
            computed_at: Some(Utc::now()),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_map(weights: HashMap<String, f64>) -> Self {
        Self {
            weights,
            profile_count: 0,
            version: 0,
            computed_at: None,
        }
    }

    /// Weight for a canonical tag; unseen tags default to 1.0.
    pub fn weight(&self, tag: &str) -> f64 {
        self.weights.get(tag).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn tag_count(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
