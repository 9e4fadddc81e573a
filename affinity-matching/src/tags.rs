use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Deterministic canonical form of a raw interest string: trim, casefold,
/// NFD-decompose and drop combining marks, collapse whitespace runs to a
/// single `_`, strip everything outside `[a-z0-9_]`.
///
/// Returns the empty string for input that normalizes to nothing; callers
/// must discard it, it is never stored as a tag.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;

    for c in lowered.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() {
            pending_sep = !out.is_empty();
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c);
        }
        // anything else is punctuation, dropped
    }

    out
}

/// Exact-match synonym folding table, applied post-normalization.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    // normalized synonym -> canonical representative
    folds: HashMap<String, String>,
}

/// Serializable form: canonical representative -> list of synonyms.
#[derive(Debug, Clone, Deserialize)]
pub struct SynonymEntries(pub HashMap<String, Vec<String>>);

impl SynonymTable {
    /// Builds a table from canonical -> synonyms entries. Both sides are
    /// normalized, so the lookup is case- and diacritic-insensitive by
    /// construction.
    pub fn from_entries(entries: &HashMap<String, Vec<String>>) -> Self {
        let mut folds = HashMap::new();
        for (canonical, synonyms) in entries {
            let canonical = normalize(canonical);
            if canonical.is_empty() {
                continue;
            }
            for synonym in synonyms {
                let synonym = normalize(synonym);
                if !synonym.is_empty() && synonym != canonical {
                    folds.insert(synonym, canonical.clone());
                }
            }
        }
        Self { folds }
    }

    pub fn empty() -> Self {
        Self { folds: HashMap::new() }
    }

    /// Maps an already-normalized tag to its canonical representative, or
    /// returns it unchanged when no entry exists.
    pub fn fold<'a>(&'a self, tag: &'a str) -> &'a str {
        self.folds.get(tag).map(String::as_str).unwrap_or(tag)
    }
}

impl Default for SynonymTable {
    /// Built-in table covering the common interest vocabulary.
    fn default() -> Self {
        let entries: [(&str, &[&str]); 10] = [
            ("musique", &["music", "son", "audio", "chant", "melody"]),
            ("sport", &["fitness", "exercice", "gym", "athletique"]),
            ("lecture", &["livre", "roman", "litterature", "lire"]),
            ("cinema", &["film", "movie", "serie", "tv"]),
            ("voyage", &["vacances", "tourisme", "exploration"]),
            ("cuisine", &["cooking", "food", "gastronomie", "chef"]),
            ("art", &["peinture", "dessin", "creativite", "artistic"]),
            ("technologie", &["tech", "informatique", "computer", "digital"]),
            ("jeu", &["gaming", "video_game", "game", "jouer"]),
            ("nature", &["outdoor", "randonnee", "camping", "ecologie"]),
        ];
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self::from_entries(&map)
    }
}

/// Normalizes and synonym-folds every entry, dropping empties and
/// duplicates. Order is not significant.
pub fn canonicalize_interests<S: AsRef<str>>(raw: &[S], synonyms: &SynonymTable) -> BTreeSet<String> {
    raw.iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|t| !t.is_empty())
        .map(|t| synonyms.fold(&t).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_normalization() {
        assert_eq!(normalize("  Randonnée en Forêt  "), "randonnee_en_foret");
        assert_eq!(normalize("Rock'n'Roll!"), "rocknroll");
        assert_eq!(normalize("jeu   vidéo"), "jeu_video");
        assert_eq!(normalize("ÉLÈVE"), "eleve");
    }

    #[test]
    fn empty_after_stripping() {
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["Randonnée en Forêt", "a !", "déjà_vu", "cral 😀 tag", "__x__"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn synonym_folding_collapses_variants() {
        let table = SynonymTable::default();
        let tags = canonicalize_interests(&["Musique", "MUSIC", " musique "], &table);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("musique"));
    }

    #[test]
    fn unknown_tags_pass_through() {
        let table = SynonymTable::default();
        let tags = canonicalize_interests(&["spéléologie", "musique", "film"], &table);
        assert!(tags.contains("speleologie"));
        assert!(tags.contains("musique"));
        // "film" folds into "cinema"
        assert!(tags.contains("cinema"));
        assert!(!tags.contains("film"));
    }

    #[test]
    fn empties_are_dropped() {
        let table = SynonymTable::empty();
        let tags = canonicalize_interests(&["!!!", "", "art"], &table);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("art"));
    }

    #[test]
    fn custom_table_normalizes_both_sides() {
        let mut entries = HashMap::new();
        entries.insert("Vélo".to_string(), vec!["Bicyclette".to_string(), "VTT".to_string()]);
        let table = SynonymTable::from_entries(&entries);
        assert_eq!(table.fold("bicyclette"), "velo");
        assert_eq!(table.fold("vtt"), "velo");
        assert_eq!(table.fold("velo"), "velo");
    }
}
