//! Keyword matching used when no vector is available.

use super::ScoredRow;

/// Splits text into lowercase alphanumeric tokens.
///
/// Single characters are dropped unless they are digits. Duplicates are removed,
/// keeping first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    {
        let keep = token.chars().count() > 1 || token.chars().all(|c| c.is_ascii_digit());
        if keep && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Scores candidate rows by how many query tokens their content contains.
///
/// Rows with no matching token are omitted. The score is the fraction of query
/// tokens found, so ranking by score equals ranking by match count.
pub fn keyword_matches<'a>(
    query: &str,
    candidates: impl Iterator<Item = (usize, &'a str)>,
) -> Vec<ScoredRow> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }
    candidates
        .filter_map(|(row_id, content)| {
            let haystack = content.to_lowercase();
            let matched = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
            (matched > 0).then(|| ScoredRow {
                row_id,
                score: matched as f64 / tokens.len() as f64,
            })
        })
        .collect()
}
