//! Reciprocal Rank Fusion.
//!
//! `score(id) = sum(1 / (rank + k))` over every list containing `id`, with
//! 0-indexed ranks. Output is sorted by descending score; equal scores keep
//! first-encountered order, scanning list A before list B.

use std::collections::HashMap;

use localrag_core::types::{FragmentId, SearchResult};
use localrag_core::{Error, Result};

pub const DEFAULT_RRF_K: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedId {
    pub id: FragmentId,
    /// `None` when only one list had candidates and no fusion happened.
    pub rrf_score: Option<f32>,
}

/// Accumulated scores in first-encountered order.
fn accumulate(a: &[FragmentId], b: &[FragmentId], k: f32) -> Vec<(FragmentId, f32)> {
    let mut order: Vec<(FragmentId, f32)> = Vec::with_capacity(a.len() + b.len());
    let mut slot: HashMap<FragmentId, usize> = HashMap::with_capacity(a.len() + b.len());
    for list in [a, b] {
        for (rank, id) in list.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (rank as f32 + k);
            match slot.get(id) {
                Some(&i) => order[i].1 += contribution,
                None => {
                    slot.insert(*id, order.len());
                    order.push((*id, contribution));
                }
            }
        }
    }
    // Stable: ties stay in first-encountered order.
    order.sort_by(|x, y| y.1.total_cmp(&x.1));
    order
}

pub fn fuse_ids(a: &[FragmentId], b: &[FragmentId], k: f32, top_k: usize) -> Result<Vec<RankedId>> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Err(Error::NoCandidates),
        (false, true) => Ok(a.iter().take(top_k).map(|&id| RankedId { id, rrf_score: None }).collect()),
        (true, false) => Ok(b.iter().take(top_k).map(|&id| RankedId { id, rrf_score: None }).collect()),
        (false, false) => Ok(accumulate(a, b, k)
            .into_iter()
            .take(top_k)
            .map(|(id, s)| RankedId { id, rrf_score: Some(s) })
            .collect()),
    }
}

/// Fuse two result lists, keeping the first-encountered record for each
/// fragment and setting its `fused_score`.
pub fn fuse_results(a: Vec<SearchResult>, b: Vec<SearchResult>, k: f32, top_k: usize) -> Result<Vec<SearchResult>> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Err(Error::NoCandidates),
        (false, true) => return Ok(a.into_iter().take(top_k).collect()),
        (true, false) => return Ok(b.into_iter().take(top_k).collect()),
        (false, false) => {}
    }
    let a_ids: Vec<FragmentId> = a.iter().map(SearchResult::id).collect();
    let b_ids: Vec<FragmentId> = b.iter().map(SearchResult::id).collect();
    let mut records: HashMap<FragmentId, SearchResult> = HashMap::with_capacity(a.len() + b.len());
    for r in a.into_iter().chain(b) {
        records.entry(r.id()).or_insert(r);
    }
    Ok(accumulate(&a_ids, &b_ids, k)
        .into_iter()
        .take(top_k)
        .filter_map(|(id, s)| {
            records.remove(&id).map(|mut r| {
                r.fused_score = Some(s);
                r
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::{Fragment, Score};

    fn hit(id: u64, score: Score) -> SearchResult {
        SearchResult::new(Fragment { id, text: format!("t{id}"), source_label: "s".into() }, score)
    }

    #[test]
    fn document_in_both_lists_outranks_single_list_documents() {
        let fused = fuse_ids(&[1, 2, 3], &[4, 2, 5], DEFAULT_RRF_K, 10).unwrap();
        assert_eq!(fused[0].id, 2);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].rrf_score.unwrap() - expected).abs() < 1e-7);
    }

    #[test]
    fn ties_follow_first_encounter_across_a_then_b() {
        let fused = fuse_ids(&[10, 11], &[20, 21], DEFAULT_RRF_K, 10).unwrap();
        let ids: Vec<u64> = fused.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 20, 11, 21]);
    }

    #[test]
    fn one_empty_list_passes_the_other_through_unscored() {
        let fused = fuse_ids(&[], &[7, 8, 9], DEFAULT_RRF_K, 2).unwrap();
        assert_eq!(fused, vec![RankedId { id: 7, rrf_score: None }, RankedId { id: 8, rrf_score: None }]);
        assert!(matches!(fuse_ids(&[], &[], DEFAULT_RRF_K, 3), Err(Error::NoCandidates)));
    }

    #[test]
    fn single_list_fusion_preserves_order() {
        let ids: Vec<u64> = (0..20).collect();
        let fused = fuse_ids(&ids, &ids, DEFAULT_RRF_K, 20).unwrap();
        assert_eq!(fused.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn results_keep_first_record_and_gain_fused_score() {
        let a = vec![hit(1, Score::Distance(0.1)), hit(2, Score::Distance(0.4))];
        let b = vec![hit(2, Score::Bm25(3.0)), hit(3, Score::Bm25(1.0))];
        let fused = fuse_results(a, b, DEFAULT_RRF_K, 3).unwrap();
        assert_eq!(fused.iter().map(SearchResult::id).collect::<Vec<_>>(), vec![2, 1, 3]);
        assert_eq!(fused[0].score, Score::Distance(0.4), "record from list A wins");
        assert!(fused.iter().all(|r| r.fused_score.is_some()));
    }

    #[test]
    fn results_single_list_is_untouched() {
        let b = vec![hit(5, Score::Bm25(2.0)), hit(6, Score::Bm25(1.0))];
        let fused = fuse_results(vec![], b.clone(), DEFAULT_RRF_K, 5).unwrap();
        assert_eq!(fused, b);
    }
}
