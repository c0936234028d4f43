use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::models::{Id, NewVote, VoteDirection};
use crate::repo::{PostRepo, RepoError, VoteRepo};

pub const DEFAULT_DAILY_QUOTA: i64 = 30;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("invalid vote payload: {0}")]
    InvalidPayload(String),
    #[error("daily vote limit reached ({0})")]
    QuotaExceeded(i64),
    #[error("already voted for this post today")]
    DuplicateVote,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteReceipt {
    pub post_id: Id,
    pub direction: VoteDirection,
    pub vote_date: NaiveDate,
    /// Votes this identity may still cast today.
    pub remaining_today: i64,
}

/// Append-only vote ledger. All day arithmetic goes through the injected clock.
pub struct VoteLedger<'a, R: ?Sized> {
    repo: &'a R,
    clock: &'a dyn Clock,
    daily_quota: i64,
}

impl<'a, R> VoteLedger<'a, R>
where
    R: VoteRepo + PostRepo + ?Sized,
{
    pub fn new(repo: &'a R, clock: &'a dyn Clock, daily_quota: i64) -> Self {
        Self { repo, clock, daily_quota }
    }

    /// Validate raw request fields and cast a vote for today.
    pub async fn cast(&self, post_id: Option<Id>, voter_id: &str, direction: Option<&str>) -> Result<VoteReceipt, LedgerError> {
        let post_id = post_id
            .filter(|id| *id > 0)
            .ok_or_else(|| LedgerError::InvalidPayload("postId must be a positive integer".into()))?;
        let direction = direction
            .and_then(VoteDirection::parse)
            .ok_or_else(|| LedgerError::InvalidPayload("voteType must be 'up' or 'down'".into()))?;
        if voter_id.is_empty() {
            return Err(LedgerError::InvalidPayload("missing voter identity".into()));
        }

        match self.repo.get_post(post_id).await {
            Ok(_) => {}
            Err(RepoError::NotFound) => return Err(LedgerError::InvalidPayload("unknown post".into())),
            Err(e) => return Err(store_err(e)),
        }

        let today = self.clock.today();
        let vote = self
            .repo
            .record_vote(
                NewVote { post_id, voter_id: voter_id.to_string(), direction, vote_date: today },
                self.daily_quota,
            )
            .await
            .map_err(|e| match e {
                RepoError::QuotaExceeded => LedgerError::QuotaExceeded(self.daily_quota),
                RepoError::DuplicateVote => LedgerError::DuplicateVote,
                // post deleted between lookup and insert
                RepoError::NotFound => LedgerError::InvalidPayload("unknown post".into()),
                other => store_err(other),
            })?;

        let cast_today = self.repo.votes_cast_on(voter_id, today).await.map_err(store_err)?;
        tracing::debug!(post_id, direction = direction.as_str(), %today, cast_today, "vote recorded");
        Ok(VoteReceipt {
            post_id: vote.post_id,
            direction: vote.direction,
            vote_date: vote.vote_date,
            remaining_today: (self.daily_quota - cast_today).max(0),
        })
    }
}

fn store_err(e: RepoError) -> LedgerError {
    LedgerError::StoreUnavailable(e.to_string())
}

#[cfg(all(test, feature = "inmem-store"))]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{NewPolitician, NewPost};
    use crate::repo::inmem::InMemRepo;
    use crate::repo::PoliticianRepo;

    async fn seeded(posts: usize) -> (InMemRepo, Vec<Id>) {
        let repo = InMemRepo::ephemeral();
        let pol = repo
            .create_politician(NewPolitician { name: "Sita".into(), party_id: None, bio: None, photo_path: None })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..posts {
            let p = repo
                .create_post(NewPost {
                    politician_id: pol.id,
                    party_id: None,
                    promise_text: format!("promise {i}"),
                    location: "Lalitpur".into(),
                    video_path: Some(format!("posts/{i}.mp4")),
                })
                .await
                .unwrap();
            ids.push(p.id);
        }
        (repo, ids)
    }

    fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 5, d).unwrap() }

    #[tokio::test]
    async fn second_vote_same_day_is_duplicate() {
        let (repo, ids) = seeded(1).await;
        let clock = FixedClock::new(day(1));
        let ledger = VoteLedger::new(&repo, &clock, DEFAULT_DAILY_QUOTA);
        ledger.cast(Some(ids[0]), "voter-a", Some("up")).await.unwrap();
        let err = ledger.cast(Some(ids[0]), "voter-a", Some("down")).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateVote));
        assert_eq!(repo.votes_cast_on("voter-a", day(1)).await.unwrap(), 1);

        // next day the same voter may vote again
        clock.advance_days(1);
        ledger.cast(Some(ids[0]), "voter-a", Some("down")).await.unwrap();
    }

    #[tokio::test]
    async fn thirty_first_vote_hits_quota() {
        let (repo, ids) = seeded(31).await;
        let clock = FixedClock::new(day(2));
        let ledger = VoteLedger::new(&repo, &clock, DEFAULT_DAILY_QUOTA);
        for (n, id) in ids.iter().take(30).enumerate() {
            let receipt = ledger.cast(Some(*id), "voter-b", Some("up")).await.unwrap();
            assert_eq!(receipt.remaining_today, 30 - (n as i64 + 1));
        }
        let err = ledger.cast(Some(ids[30]), "voter-b", Some("up")).await.unwrap_err();
        assert!(matches!(err, LedgerError::QuotaExceeded(30)));
        // quota is checked before duplicates
        let err = ledger.cast(Some(ids[0]), "voter-b", Some("up")).await.unwrap_err();
        assert!(matches!(err, LedgerError::QuotaExceeded(_)));
        // other voters are unaffected
        ledger.cast(Some(ids[30]), "voter-c", Some("down")).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_payloads_never_write() {
        let (repo, ids) = seeded(1).await;
        let clock = FixedClock::new(day(3));
        let ledger = VoteLedger::new(&repo, &clock, DEFAULT_DAILY_QUOTA);
        for (post, dir) in [(None, Some("up")), (Some(0), Some("up")), (Some(ids[0]), Some("sideways")), (Some(ids[0]), None), (Some(9999), Some("up"))] {
            let err = ledger.cast(post, "voter-d", dir).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidPayload(_)), "{post:?} {dir:?}");
        }
        assert_eq!(repo.votes_cast_on("voter-d", day(3)).await.unwrap(), 0);
    }
}
