//! # Domain Invariants
//!
//! Rules the ledger and the registry must satisfy at quiescence.

use std::collections::{HashMap, HashSet};

use super::entities::{ParticipantPost, VoteKey, VoteRecord};
use super::value_objects::PostId;
use crate::error::{VoteError, VoteResult};

/// Invariant: at most one record per `(voter, post)`.
pub fn invariant_single_vote_per_post(records: &[VoteRecord]) -> VoteResult<()> {
    let mut seen: HashSet<VoteKey> = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.key()) {
            return Err(VoteError::InvariantViolation {
                reason: format!(
                    "voter {} has more than one vote on post {}",
                    record.voter_id, record.post_id
                ),
            });
        }
    }
    Ok(())
}

/// Posts whose `vote_count` differs from the number of live records.
///
/// Returns `(post_id, displayed_count, ledger_count)` per mismatch.
pub fn count_mismatches(
    posts: &[ParticipantPost],
    records: &[VoteRecord],
) -> Vec<(PostId, u64, u64)> {
    let mut live: HashMap<&PostId, u64> = HashMap::new();
    for record in records {
        *live.entry(&record.post_id).or_insert(0) += 1;
    }

    posts
        .iter()
        .filter_map(|post| {
            let ledger_count = live.get(&post.post_id).copied().unwrap_or(0);
            (post.vote_count != ledger_count).then(|| {
                (post.post_id.clone(), post.vote_count, ledger_count)
            })
        })
        .collect()
}

/// Invariant: every post's count equals its live records.
pub fn invariant_count_matches_ledger(
    posts: &[ParticipantPost],
    records: &[VoteRecord],
) -> VoteResult<()> {
    match count_mismatches(posts, records).first() {
        None => Ok(()),
        Some((post_id, displayed, ledger)) => Err(VoteError::InvariantViolation {
            reason: format!("post {post_id} shows {displayed} votes but ledger holds {ledger}"),
        }),
    }
}
