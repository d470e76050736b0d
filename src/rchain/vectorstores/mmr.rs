/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Indices of up to `k` candidates chosen by maximal marginal relevance.
///
/// The first pick is the candidate closest to the query. Each following
/// pick maximises `lambda_mult * sim(query) - (1 - lambda_mult) * max sim(selected)`;
/// ties keep the earlier candidate.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    lambda_mult: f32,
    k: usize,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let to_query = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect::<Vec<_>>();

    let mut first = 0;
    for (index, score) in to_query.iter().enumerate() {
        if *score > to_query[first] {
            first = index;
        }
    }
    let mut selected = vec![first];

    while selected.len() < limit {
        let mut best: Option<(usize, f32)> = None;
        for (index, query_score) in to_query.iter().enumerate() {
            if selected.contains(&index) {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&chosen| cosine_similarity(&candidates[index], &candidates[chosen]))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda_mult * query_score - (1.0 - lambda_mult) * redundancy;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        match best {
            Some((index, _)) => selected.push(index),
            None => break,
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn lambda_one_is_plain_similarity_order() {
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.9, 0.1]];
        let picked = maximal_marginal_relevance(&[1.0, 0.0], &candidates, 1.0, 3);
        assert_eq!(picked, vec![1, 2, 0]);
    }

    #[test]
    fn low_lambda_skips_near_duplicates() {
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.01], vec![0.5, 0.5]];
        let picked = maximal_marginal_relevance(&[1.0, 0.0], &candidates, 0.3, 2);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn empty_inputs_select_nothing() {
        assert!(maximal_marginal_relevance(&[1.0], &[], 0.5, 4).is_empty());
        assert!(maximal_marginal_relevance(&[1.0], &[vec![1.0]], 0.5, 0).is_empty());
    }
}
