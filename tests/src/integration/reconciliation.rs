//! # Reconciliation Flows
//!
//! Sweeps over real vote traffic: retraction of departed voters, deferral on
//! lookup errors, button refreshes and the maintenance audit.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;

    use vote_integrity::adapters::testing::RecordingPlatform;
    use vote_integrity::adapters::{InMemoryParticipantRegistry, PlatformMembershipOracle};
    use vote_integrity::domain::CountDelta;
    use vote_integrity::ports::inbound::{ReconciliationApi, VoteApi};
    use vote_integrity::ports::outbound::{MembershipOracle, ParticipantRegistry};
    use vote_integrity::{ChannelId, MembershipStatus, UserId, VoteConfig};

    use crate::integration::{channel, Harness};

    async fn vote_all(h: &Harness, c: &ChannelId, post: &vote_integrity::PostId, voters: &[u64]) {
        for voter in voters {
            let outcome = h.processor.cast_vote(UserId(*voter), c, post).await.unwrap();
            assert!(outcome.is_accepted());
        }
    }

    #[tokio::test]
    async fn test_departed_voter_is_retracted_others_kept() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        vote_all(&h, &c, &post.post_id, &[1, 2, 3]).await;
        assert_eq!(h.count(&post), 3);

        h.oracle.revoke(UserId(2), &c);
        let report = h.sweeper.run_reconciliation_sweep().await;

        assert_eq!(report.voters_disqualified, 1);
        assert_eq!(report.votes_retracted, 1);
        assert_eq!(h.count(&post), 2);
        let voters: Vec<u64> = h.ledger.all_records().iter().map(|r| r.voter_id.0).collect();
        assert!(voters.contains(&1));
        assert!(voters.contains(&3));
        assert!(!voters.contains(&2));
        h.assert_quiescent_invariants();

        let entries = h.log.entries();
        assert!(entries.iter().any(|line| line.contains("user 2")));
    }

    #[tokio::test]
    async fn test_lookup_error_defers_only_that_voter() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        vote_all(&h, &c, &post.post_id, &[1, 2]).await;

        h.oracle.fail(UserId(1), &c);
        h.oracle.revoke(UserId(2), &c);
        let report = h.sweeper.run_reconciliation_sweep().await;

        assert_eq!(report.voters_deferred, 1);
        assert_eq!(report.votes_retracted, 1);
        assert_eq!(h.count(&post), 1);
        assert_eq!(h.ledger.all_records()[0].voter_id, UserId(1));

        // Next cycle sees the real answer
        h.oracle.revoke(UserId(1), &c);
        let report = h.sweeper.run_reconciliation_sweep().await;
        assert_eq!(report.votes_retracted, 1);
        assert_eq!(h.count(&post), 0);
        h.assert_quiescent_invariants();
    }

    #[tokio::test]
    async fn test_leaving_a_global_channel_retracts_everywhere() {
        let support = channel("@support");
        let h = Harness::new(VoteConfig::for_testing().with_required_channels(vec![support.clone()]));
        let contest = channel("@contest");
        let weekly = channel("@weekly");
        let a = h.post(&contest, 100).await;
        let b = h.post(&weekly, 200).await;
        vote_all(&h, &contest, &a.post_id, &[1, 2]).await;
        vote_all(&h, &weekly, &b.post_id, &[1]).await;

        h.oracle.revoke(UserId(1), &support);
        let report = h.sweeper.run_reconciliation_sweep().await;

        assert_eq!(report.channels_scanned, 2);
        assert_eq!(report.votes_retracted, 2);
        assert_eq!(h.count(&a), 1);
        assert_eq!(h.count(&b), 0);
        h.assert_quiescent_invariants();
    }

    #[tokio::test]
    async fn test_sweep_refreshes_buttons_with_new_counts() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        vote_all(&h, &c, &post.post_id, &[1, 2, 3]).await;

        h.oracle.revoke(UserId(1), &c);
        h.oracle.revoke(UserId(3), &c);
        h.sweeper.run_reconciliation_sweep().await;

        let (platform, stats) = h.finish().await;
        assert_eq!(stats.failed, 0);
        let last = platform.edits().last().cloned().unwrap();
        assert!(last.2.label.ends_with("(1)"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_votes_and_sweeps_interleaved_keep_counts_equal_to_ledger() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let mut posts = Vec::new();
        for participant in [100, 200, 300] {
            posts.push(h.post(&c, participant).await);
        }
        h.oracle.set_delay(Some(Duration::from_millis(1)));

        let clicks = (1..=30u64).flat_map(|voter| {
            let first = posts[voter as usize % 3].post_id.clone();
            let second = posts[(voter as usize + 1) % 3].post_id.clone();
            [first, second].into_iter().map(move |post_id| (voter, post_id))
        });
        let votes: Vec<_> = clicks
            .map(|(voter, post_id)| {
                let processor = Arc::clone(&h.processor);
                let c = c.clone();
                tokio::spawn(async move { processor.cast_vote(UserId(voter), &c, &post_id).await })
            })
            .collect();

        let sweeps = {
            let sweeper = Arc::clone(&h.sweeper);
            let oracle = Arc::clone(&h.oracle);
            let c = c.clone();
            tokio::spawn(async move {
                for round in 0..6u64 {
                    // A few more even voters leave before every pass
                    for voter in (1..=30u64).filter(|v| v % 5 == round % 5) {
                        if voter % 2 == 0 {
                            oracle.revoke(UserId(voter), &c);
                        }
                    }
                    sweeper.run_reconciliation_sweep().await;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };

        for vote in join_all(votes).await {
            vote.unwrap().unwrap();
        }
        sweeps.await.unwrap();
        h.assert_quiescent_invariants();

        // Every increment has landed, so a last pass retracts without clamping.
        let report = h.sweeper.run_reconciliation_sweep().await;
        assert_eq!(report.clamped_decrements, 0);
        h.assert_quiescent_invariants();
        assert!(h
            .ledger
            .all_records()
            .iter()
            .all(|record| record.voter_id.0 % 2 == 1));
    }

    #[tokio::test]
    async fn test_re_vote_after_rejoining() {
        let h = Harness::new(VoteConfig::for_testing());
        let c = channel("@contest");
        let post = h.post(&c, 100).await;
        vote_all(&h, &c, &post.post_id, &[1]).await;

        h.oracle.revoke(UserId(1), &c);
        h.sweeper.run_reconciliation_sweep().await;
        assert_eq!(h.count(&post), 0);

        h.oracle.set(UserId(1), &c, true);
        vote_all(&h, &c, &post.post_id, &[1]).await;
        assert_eq!(h.count(&post), 1);
        h.assert_quiescent_invariants();
    }

    #[tokio::test]
    async fn test_maintenance_snapshot_after_traffic() {
        let h = Harness::new(VoteConfig::for_testing());
        let contest = channel("@contest");
        let weekly = channel("@weekly");
        let a = h.post(&contest, 100).await;
        let b = h.post(&weekly, 200).await;
        vote_all(&h, &contest, &a.post_id, &[1, 2, 3]).await;
        vote_all(&h, &weekly, &b.post_id, &[3, 4]).await;

        let snapshot = h.sweeper.run_maintenance().await.unwrap();

        assert_eq!(snapshot.channels, 2);
        assert_eq!(snapshot.posts, 2);
        assert_eq!(snapshot.votes, 5);
        assert_eq!(snapshot.unique_voters, 4);
        assert_eq!(snapshot.count_mismatches, 0);
        assert!(h.log.entries().iter().any(|line| line.starts_with("Statistics")));
    }

    #[tokio::test]
    async fn test_clamped_decrement_never_goes_negative() {
        let registry = InMemoryParticipantRegistry::new();
        let c = channel("@contest");
        let post = registry.create_post(&c, UserId(100)).await.unwrap();

        let update = registry
            .increment_count(&post.post_id, CountDelta::Decrement)
            .await
            .unwrap();

        assert_eq!(update.new_count, 0);
        assert!(update.clamped);
    }

    #[tokio::test]
    async fn test_platform_oracle_maps_memberships() {
        let platform = Arc::new(RecordingPlatform::new());
        let oracle = PlatformMembershipOracle::new(Arc::clone(&platform));
        let c = channel("@contest");

        platform.set_membership(&c, UserId(1), MembershipStatus::Member);
        platform.set_membership(&c, UserId(2), MembershipStatus::Left);
        platform.set_membership(&c, UserId(3), MembershipStatus::Restricted { is_member: true });

        assert!(oracle.is_qualifying(UserId(1), &c).await.unwrap());
        assert!(!oracle.is_qualifying(UserId(2), &c).await.unwrap());
        assert!(oracle.is_qualifying(UserId(3), &c).await.unwrap());
        assert!(oracle.is_qualifying(UserId(4), &c).await.is_err());
    }
}
