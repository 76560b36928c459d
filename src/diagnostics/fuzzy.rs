//! Edit-distance based "did you mean?" suggestions for unknown names.

/// Levenshtein distance between two strings, case-sensitive.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut cur = vec![0usize; m + 1];

    for i in 1..=n {
        cur[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[m]
}

/// Ranks `candidates` by edit distance to `target`, closest first.
pub fn suggestions(candidates: &[String], target: &str) -> Vec<String> {
    let mut ranked: Vec<(usize, &String)> = candidates
        .iter()
        .map(|c| (edit_distance(c, target), c))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    ranked.into_iter().map(|(_, c)| c.clone()).collect()
}

/// Returns the single closest candidate, if any exist and the distance is
/// small enough to plausibly be a typo rather than an unrelated name.
pub fn best_suggestion(candidates: &[String], target: &str) -> Option<String> {
    let ranked = suggestions(candidates, target);
    let best = ranked.into_iter().next()?;
    let threshold = (target.chars().count() / 2).max(2);
    if edit_distance(&best, target) <= threshold {
        Some(best)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let candidates = vec!["storageBucket".to_string(), "tableBucket".to_string()];
        assert_eq!(
            best_suggestion(&candidates, "strageBucket"),
            Some("storageBucket".to_string())
        );
    }

    #[test]
    fn unrelated_name_has_no_suggestion() {
        let candidates = vec!["foo".to_string()];
        assert_eq!(best_suggestion(&candidates, "completelyDifferentLongName"), None);
    }

    #[test]
    fn empty_candidates_has_no_suggestion() {
        assert_eq!(best_suggestion(&[], "foo"), None);
    }
}
