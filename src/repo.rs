use async_trait::async_trait;

use crate::models::*;
use crate::ranking::{FeedFilter, SortMode};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("invalid: {0}")] Invalid(String),
    #[error("daily vote limit reached")] QuotaExceeded,
    #[error("already voted for this post today")] DuplicateVote,
    #[error("store unavailable: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait PartyRepo: Send + Sync {
    /// All parties by name.
    async fn list_parties(&self) -> RepoResult<Vec<Party>>;
    /// Newest first, with total row count.
    async fn page_parties(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Party>, i64)>;
    async fn get_party(&self, id: Id) -> RepoResult<Party>;
    async fn create_party(&self, new: NewParty) -> RepoResult<Party>;
    /// A `None` logo keeps the stored one.
    async fn update_party(&self, id: Id, upd: NewParty) -> RepoResult<Party>;
    /// Detaches member politicians and posts.
    async fn delete_party(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PoliticianRepo: Send + Sync {
    async fn list_politicians(&self) -> RepoResult<Vec<Politician>>;
    async fn page_politicians(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Politician>, i64)>;
    async fn list_party_members(&self, party_id: Id) -> RepoResult<Vec<Politician>>;
    async fn get_politician(&self, id: Id) -> RepoResult<Politician>;
    async fn create_politician(&self, new: NewPolitician) -> RepoResult<Politician>;
    async fn update_politician(&self, id: Id, upd: NewPolitician) -> RepoResult<Politician>;
    /// Deletes the politician's posts (and their votes) too.
    async fn delete_politician(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    /// Backfills the party from the politician when omitted.
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: Id, upd: NewPost) -> RepoResult<Post>;
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    /// Admin listing, newest first.
    async fn page_posts(&self, limit: i64, offset: i64) -> RepoResult<(Vec<FeedPost>, i64)>;

    /// Distinct posts matching the filter, ignoring any window.
    async fn count_feed(&self, filter: &FeedFilter) -> RepoResult<i64>;
    /// Filtered, aggregated, sorted and windowed feed.
    async fn query_feed(&self, filter: &FeedFilter, sort: SortMode, limit: i64, offset: i64) -> RepoResult<Vec<FeedPost>>;
    async fn get_feed_post(&self, id: Id) -> RepoResult<FeedPost>;
}

#[async_trait]
pub trait AdRepo: Send + Sync {
    /// Most recently created first.
    async fn recent_ads(&self, limit: i64) -> RepoResult<Vec<Ad>>;
    async fn page_ads(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Ad>, i64)>;
    async fn get_ad(&self, id: Id) -> RepoResult<Ad>;
    async fn create_ad(&self, new: NewAd) -> RepoResult<Ad>;
    async fn update_ad(&self, id: Id, upd: NewAd) -> RepoResult<Ad>;
    async fn delete_ad(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    async fn create_submission(&self, new: NewSubmission) -> RepoResult<Submission>;
    async fn page_submissions(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Submission>, i64)>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Quota check, duplicate check and insert as one atomic step per voter.
    /// Fails with `QuotaExceeded` when the voter already has `daily_quota`
    /// votes on `new.vote_date`, or `DuplicateVote` when this post was
    /// already voted that day.
    async fn record_vote(&self, new: NewVote, daily_quota: i64) -> RepoResult<Vote>;
    async fn votes_cast_on(&self, voter_id: &str, day: chrono::NaiveDate) -> RepoResult<i64>;
}

#[async_trait]
pub trait AdminRepo: Send + Sync {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Admin>;
    async fn upsert_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin>;
    async fn dashboard_counts(&self) -> RepoResult<DashboardCounts>;
    async fn ping(&self) -> RepoResult<()>;
}

pub trait Repo: PartyRepo + PoliticianRepo + PostRepo + AdRepo + SubmissionRepo + VoteRepo + AdminRepo {}

impl<T> Repo for T where T: PartyRepo + PoliticianRepo + PostRepo + AdRepo + SubmissionRepo + VoteRepo + AdminRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;
