use sage_core::store::SearchResult;

/// Descriptive attribute words the post-filter recognizes: colors, tastes,
/// and broad food categories. Matching is substring-based on lowercased
/// text, so "yellowish" still satisfies "yellow".
const ATTRIBUTE_WORDS: &[&str] = &[
    // colors
    "red", "green", "yellow", "orange", "purple", "blue", "black", "white", "brown", "pink",
    // tastes
    "sweet", "sour", "bitter", "salty", "spicy", "tart",
    // categories
    "fruit", "vegetable", "grain", "herb", "spice", "berry", "citrus",
];

/// Heuristic relevance guard for free-text queries against a hosted index.
///
/// When the query names a recognized attribute word, results whose text does
/// not mention that word are dropped. This is a soft policy, not a
/// correctness requirement: synonyms produce false negatives, which is why
/// it can be disabled in configuration.
pub fn apply_attribute_filter(query: &str, results: SearchResult) -> SearchResult {
    let query_lower = query.to_lowercase();
    let query_words: Vec<&str> = query_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let wanted: Vec<&str> = ATTRIBUTE_WORDS
        .iter()
        .copied()
        .filter(|attr| query_words.contains(attr))
        .collect();
    if wanted.is_empty() {
        return results;
    }

    let keep: Vec<usize> = results
        .documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| {
            let doc_lower = doc.to_lowercase();
            wanted.iter().all(|attr| doc_lower.contains(attr))
        })
        .map(|(i, _)| i)
        .collect();

    if keep.len() == results.len() {
        return results;
    }

    let mut filtered = SearchResult::default();
    for i in keep {
        filtered.documents.push(results.documents[i].clone());
        filtered.ids.push(results.ids[i].clone());
        filtered.distances.push(results.distances[i]);
        filtered.metadatas.push(results.metadatas[i].clone());
    }
    filtered
}
