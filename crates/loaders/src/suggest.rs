//! "Did you mean" matching.

use regex::RegexBuilder;

const MIN_SIMILARITY: f64 = 0.6;

/// Find the candidate closest to `query`, if any is close enough.
///
/// Three passes, first hit wins:
/// 1. a candidate appearing inside the query (longest candidate preferred),
/// 2. the query appearing inside a candidate,
/// 3. the candidate sharing the longest in-order run of characters, if it
///    covers at least 60% of the longer string.
///
/// All comparisons ignore case.
pub fn suggest<'a>(candidates: impl IntoIterator<Item = &'a str>, query: &str) -> Option<String> {
    let mut candidates: Vec<&str> = candidates.into_iter().filter(|c| !c.is_empty()).collect();
    if query.is_empty() || candidates.is_empty() {
        return None;
    }
    // Leftmost-first alternation: longer candidates must come first to win.
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let alternation = candidates.iter().map(|c| regex::escape(c)).collect::<Vec<_>>().join("|");
    if let Ok(pattern) = RegexBuilder::new(&alternation).case_insensitive(true).build()
        && let Some(found) = pattern.find(query)
        && let Some(hit) = candidates.iter().find(|c| c.eq_ignore_ascii_case(found.as_str()))
    {
        return Some(hit.to_string());
    }

    if let Ok(pattern) = RegexBuilder::new(&regex::escape(query)).case_insensitive(true).build()
        && let Some(hit) = candidates.iter().find(|c| pattern.is_match(c))
    {
        return Some(hit.to_string());
    }

    candidates
        .iter()
        .map(|c| (similarity(c, query), *c))
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Longest common subsequence length over the longer length.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let mut previous = vec![0usize; b.len() + 1];
    for x in &a {
        let mut current = vec![0usize; b.len() + 1];
        for (j, y) in b.iter().enumerate() {
            current[j + 1] = match x == y {
                true => previous[j] + 1,
                false => previous[j + 1].max(current[j]),
            };
        }
        previous = current;
    }
    previous[b.len()] as f64 / a.len().max(b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const KNOWN: &[&str] = &["csv", "json", "yaml", "yml", "xlsx", "xls", "txt"];

    #[rstest]
    // Candidate inside the query
    #[case("data.csv", Some("csv"))]
    #[case("report.XLSX", Some("xlsx"))]
    // Query inside a candidate
    #[case("yam", Some("yaml"))]
    // Close spelling
    #[case("jsn", Some("json"))]
    #[case("zzz", None)]
    #[case("", None)]
    fn test_suggest(#[case] query: &str, #[case] expected: Option<&str>) {
        assert_eq!(suggest(KNOWN.iter().copied(), query).as_deref(), expected);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert_eq!(suggest(["a.b", "axb"], "a.b").as_deref(), Some("a.b"));
        assert_eq!(suggest(["(x)"], "(x)").as_deref(), Some("(x)"));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(suggest(std::iter::empty(), "csv"), None);
    }
}
