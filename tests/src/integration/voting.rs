//! # Voting Flows
//!
//! `cast_vote` against live tables: duplicate prevention under concurrency,
//! subscription gating and count/ledger agreement after mixed traffic.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use vote_integrity::adapters::testing::ScriptedOracle;
    use vote_integrity::ports::inbound::VoteApi;
    use vote_integrity::{RejectReason, UserId, VoteConfig, VoteOutcome};

    use crate::integration::{channel, Harness};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_clicks_count_once() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;

        // Every click passes the membership check before any insert lands
        h.oracle.set_delay(Some(Duration::from_millis(20)));

        let clicks = (0..16).map(|_| {
            let processor = Arc::clone(&h.processor);
            let c = c.clone();
            let post_id = post.post_id.clone();
            tokio::spawn(async move { processor.cast_vote(UserId(7), &c, &post_id).await })
        });
        let outcomes: Vec<VoteOutcome> = join_all(clicks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        let duplicates = outcomes
            .iter()
            .filter(|o| **o == VoteOutcome::Rejected(RejectReason::DuplicateVote))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(h.count(&post), 1);
        assert_eq!(h.ledger.all_records().len(), 1);
        h.assert_quiescent_invariants();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_voters_all_count() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        h.oracle.set_delay(Some(Duration::from_millis(5)));

        let clicks = (1..=40u64).map(|voter| {
            let processor = Arc::clone(&h.processor);
            let c = c.clone();
            let post_id = post.post_id.clone();
            tokio::spawn(async move { processor.cast_vote(UserId(voter), &c, &post_id).await })
        });
        for joined in join_all(clicks).await {
            assert!(joined.unwrap().unwrap().is_accepted());
        }

        assert_eq!(h.count(&post), 40);
        h.assert_quiescent_invariants();
    }

    #[tokio::test]
    async fn test_second_click_is_duplicate() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;

        let first = h.processor.cast_vote(UserId(1), &c, &post.post_id).await.unwrap();
        let second = h.processor.cast_vote(UserId(1), &c, &post.post_id).await.unwrap();

        assert_eq!(first, VoteOutcome::Accepted { new_count: 1 });
        assert_eq!(second, VoteOutcome::Rejected(RejectReason::DuplicateVote));
        assert_eq!(h.count(&post), 1);
    }

    #[tokio::test]
    async fn test_non_member_changes_nothing() {
        let h = Harness::with_oracle(VoteConfig::for_testing(), ScriptedOracle::denying());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;

        let outcome = h.processor.cast_vote(UserId(9), &c, &post.post_id).await.unwrap();

        assert_eq!(outcome, VoteOutcome::Rejected(RejectReason::NotSubscribed));
        assert_eq!(h.count(&post), 0);
        assert!(h.ledger.all_records().is_empty());
    }

    #[tokio::test]
    async fn test_global_required_channel_gates_votes() {
        let support = channel("@support");
        let config = VoteConfig::for_testing().with_required_channels(vec![support.clone()]);
        let h = Harness::new(config);
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        h.oracle.revoke(UserId(3), &support);

        let outcome = h.processor.cast_vote(UserId(3), &c, &post.post_id).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Rejected(RejectReason::NotSubscribed));

        let outcome = h.processor.cast_vote(UserId(4), &c, &post.post_id).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Accepted { new_count: 1 });
    }

    #[tokio::test]
    async fn test_post_from_other_channel_is_invalid_target() {
        let h = Harness::new(VoteConfig::for_testing());
        let contest = channel("@contest");
        let other = channel("@other");
        let post = h.post(&contest, 100).await;

        let outcome = h.processor.cast_vote(UserId(1), &other, &post.post_id).await.unwrap();

        assert_eq!(outcome, VoteOutcome::Rejected(RejectReason::InvalidTarget));
        assert_eq!(h.count(&post), 0);
    }

    #[tokio::test]
    async fn test_voting_for_several_posts_is_allowed() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let first = h.post(&c, 100).await;
        let second = h.post(&c, 200).await;

        for post in [&first, &second] {
            let outcome = h.processor.cast_vote(UserId(5), &c, &post.post_id).await.unwrap();
            assert!(outcome.is_accepted());
        }
        assert_eq!(h.count(&first), 1);
        assert_eq!(h.count(&second), 1);
    }

    #[tokio::test]
    async fn test_mixed_traffic_keeps_counts_equal_to_ledger() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let mut posts = Vec::new();
        for participant in [100, 200, 300] {
            posts.push(h.post(&c, participant).await);
        }
        for voter in (1..=20u64).filter(|v| v % 4 == 0) {
            h.oracle.revoke(UserId(voter), &c);
        }

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..300 {
            let voter = UserId(rng.gen_range(1..=20));
            let post = &posts[rng.gen_range(0..posts.len())];
            let outcome = h.processor.cast_vote(voter, &c, &post.post_id).await.unwrap();
            if voter.0 % 4 == 0 {
                assert_eq!(outcome, VoteOutcome::Rejected(RejectReason::NotSubscribed));
            }
        }

        h.assert_quiescent_invariants();
        assert!(h
            .ledger
            .all_records()
            .iter()
            .all(|record| record.voter_id.0 % 4 != 0));
    }

    #[tokio::test]
    async fn test_accepted_votes_refresh_the_button() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;

        for voter in 1..=3u64 {
            h.processor.cast_vote(UserId(voter), &c, &post.post_id).await.unwrap();
        }
        // Rejected clicks do not refresh
        h.processor.cast_vote(UserId(1), &c, &post.post_id).await.unwrap();

        let (platform, stats) = h.finish().await;
        assert_eq!(stats.applied, 3);
        assert_eq!(stats.failed, 0);

        let edits = platform.edits();
        assert_eq!(edits.len(), 3);
        assert!(edits.iter().all(|(channel, _, _)| channel == &c));
        // The worker renders the count it reads, not the count at enqueue time
        assert!(edits.last().unwrap().2.label.ends_with("(3)"));
    }
}
