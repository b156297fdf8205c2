//! Selection of the next judgment batches from the pending pool.

use crate::evaluation::measure::PendingPool;

/// A batch of documents for one query, proposed for judging next.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub query: String,
    pub documents: Vec<String>,
    /// Summed selection weight of the batch's documents.
    pub weight: f64,
}

/// Pick the `batch_num` highest-weight batches of up to `batch_size`
/// documents, each batch drawn from a single query.
///
/// Candidate batches are carved per query in rounds: each round takes every
/// query's current top-weighted documents, so one heavy query cannot
/// monopolize all batches before lighter queries field a candidate.
/// Ties are broken by document then query identifier, keeping the
/// selection deterministic across runs.
pub fn select_batches(pending: &PendingPool, batch_num: usize, batch_size: usize) -> Vec<Batch> {
    if batch_num == 0 || batch_size == 0 {
        return Vec::new();
    }

    // Per query, documents sorted by descending weight (doc id breaks ties).
    let mut ranked: Vec<(&str, Vec<(&str, f64)>)> = pending
        .iter()
        .map(|(query, docs)| {
            let mut docs: Vec<(&str, f64)> = docs
                .iter()
                .map(|(doc, est)| (doc.as_str(), est.weight))
                .collect();
            docs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            (query.as_str(), docs)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(b.0));

    let mut candidates: Vec<Batch> = Vec::new();
    for round in 0..batch_num {
        for (query, docs) in &ranked {
            let chunk: Vec<&(&str, f64)> =
                docs.iter().skip(round * batch_size).take(batch_size).collect();
            if chunk.is_empty() {
                continue;
            }
            candidates.push(Batch {
                query: query.to_string(),
                documents: chunk.iter().map(|(doc, _)| doc.to_string()).collect(),
                weight: chunk.iter().map(|(_, weight)| weight).sum(),
            });
        }
    }

    candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.query.cmp(&b.query)));
    candidates.truncate(batch_num);
    candidates
}
