use std::collections::BTreeSet;

/// Lowercased word tokens of `text`, or `shingle_size`-word shingles when
/// `shingle_size > 1`.
///
/// A text with fewer words than the shingle size yields one shingle made of
/// all its words.
#[must_use]
pub fn token_set(text: &str, shingle_size: usize) -> BTreeSet<String> {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    if shingle_size <= 1 {
        return tokens.into_iter().collect();
    }
    if tokens.len() < shingle_size {
        if tokens.is_empty() {
            return BTreeSet::new();
        }
        return std::iter::once(tokens.join(" ")).collect();
    }
    tokens.windows(shingle_size).map(|w| w.join(" ")).collect()
}

/// Intersection over union. Two empty sets are identical (`1.0`).
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = inter as f64 / union as f64;
    ratio
}

/// Upper bound on the Jaccard similarity of two sets of these sizes.
#[must_use]
pub(crate) fn jaccard_upper_bound(len_a: usize, len_b: usize) -> f64 {
    let (small, large) = if len_a <= len_b {
        (len_a, len_b)
    } else {
        (len_b, len_a)
    };
    if large == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let bound = small as f64 / large as f64;
    bound
}
