use std::collections::BTreeSet;

/// Normalized string similarity in [0, 1], symmetric and reflexive.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// A fuzzy pairing between a tag of set A and its best counterpart in set B.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyPair {
    pub tag_a: String,
    pub tag_b: String,
    pub score: f64,
}

/// Greedily pairs every tag of `set_a` with its highest-scoring tag in
/// `set_b` at or above `threshold`. A `set_b` tag may serve as best match
/// for several `set_a` tags; no bipartite exclusivity is enforced.
///
/// Iteration over the ordered sets makes tie-breaking deterministic: the
/// lexicographically smallest `set_b` tag wins equal scores.
pub fn best_fuzzy_matches(
    set_a: &BTreeSet<String>,
    set_b: &BTreeSet<String>,
    threshold: f64,
) -> Vec<FuzzyPair> {
    let mut pairs = Vec::new();

    for tag_a in set_a {
        let mut best: Option<(&String, f64)> = None;
        for tag_b in set_b {
            let score = similarity(tag_a, tag_b);
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((tag_b, score));
            }
        }
        if let Some((tag_b, score)) = best {
            pairs.push(FuzzyPair {
                tag_a: tag_a.clone(),
                tag_b: tag_b.clone(),
                score,
            });
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn reflexive_and_symmetric() {
        assert_eq!(similarity("musique", "musique"), 1.0);
        let ab = similarity("musique", "music");
        let ba = similarity("music", "musique");
        assert_eq!(ab, ba);
        assert!(ab > 0.0 && ab < 1.0);
    }

    #[test]
    fn bounded() {
        for (a, b) in [("", ""), ("a", ""), ("abc", "xyz"), ("randonnee", "randonee")] {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "similarity({a:?},{b:?}) = {s}");
        }
    }

    #[test]
    fn close_tags_pair_up() {
        let a = set(&["randonnee", "cuisine"]);
        let b = set(&["randonee", "sport"]);
        let pairs = best_fuzzy_matches(&a, &b, 0.8);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].tag_a, "randonnee");
        assert_eq!(pairs[0].tag_b, "randonee");
        assert!(pairs[0].score >= 0.8);
    }

    #[test]
    fn distant_tags_stay_unmatched() {
        let a = set(&["art", "lecture"]);
        let b = set(&["sport", "cuisine"]);
        assert!(best_fuzzy_matches(&a, &b, 0.8).is_empty());
    }

    #[test]
    fn b_tags_may_be_reused() {
        let a = set(&["gamer", "games"]);
        let b = set(&["game"]);
        let pairs = best_fuzzy_matches(&a, &b, 0.7);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.tag_b == "game"));
    }
}
