//! Maximal marginal relevance selection.

use crate::index::cosine;

/// A search candidate with its precomputed norm and query similarity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub vector: &'a [f32],
    pub norm: f64,
    pub relevance: f32,
}

/// Greedily pick up to `k` candidates, returning their positions in pick order.
///
/// Each step takes the candidate maximising
/// `lambda * relevance - (1 - lambda) * max_similarity_to_picked`.
/// The first pick has no penalty. Ties go to the earlier candidate.
pub(crate) fn select(candidates: &[Candidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let n = candidates.len();
    let mut picked = Vec::with_capacity(k.min(n));
    let mut taken = vec![false; n];
    // Highest similarity of each candidate to anything picked so far.
    let mut redundancy = vec![f32::NEG_INFINITY; n];

    while picked.len() < k.min(n) {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let penalty = if picked.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * candidate.relevance - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((i, score));
            }
        }
        let Some((choice, _)) = best else { break };

        taken[choice] = true;
        picked.push(choice);
        let chosen = candidates[choice];
        for (i, candidate) in candidates.iter().enumerate() {
            if !taken[i] {
                let sim = cosine(candidate.vector, candidate.norm, chosen.vector, chosen.norm);
                redundancy[i] = redundancy[i].max(sim);
            }
        }
    }

    picked
}
