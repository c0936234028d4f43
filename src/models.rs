use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Party {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub logo_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewParty {
    pub name: String,
    pub description: Option<String>,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Politician {
    pub id: Id,
    pub name: String,
    pub party_id: Option<Id>,
    pub bio: Option<String>,
    pub photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPolitician {
    pub name: String,
    pub party_id: Option<Id>,
    pub bio: Option<String>,
    pub photo_path: Option<String>,
}

/// A promise video attached to a politician (and usually their party).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub politician_id: Id,
    pub party_id: Option<Id>,
    pub promise_text: String,
    pub location: String,
    pub video_path: String,
    pub created_at: DateTime<Utc>,
}

/// Used for both create and update; on update a missing `video_path` keeps the stored one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPost {
    pub politician_id: Id,
    pub party_id: Option<Id>,
    pub promise_text: String,
    pub location: String,
    pub video_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Ad {
    pub id: Id,
    pub title: String,
    pub image_path: String,
    pub contact_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAd {
    pub title: String,
    pub contact_url: String,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Submission {
    pub id: Id,
    pub submitter_name: String,
    pub contact: Option<String>,
    pub politician_name: String,
    pub location: String,
    pub video_url: String,
    pub promise_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewSubmission {
    #[serde(default)]
    pub submitter_name: String,
    pub contact: Option<String>,
    #[serde(default)]
    pub politician_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub promise_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(VoteDirection::Up),
            "down" => Some(VoteDirection::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Vote {
    pub id: Id,
    pub post_id: Id,
    pub voter_id: String,
    pub direction: VoteDirection,
    pub vote_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub post_id: Id,
    pub voter_id: String,
    pub direction: VoteDirection,
    pub vote_date: NaiveDate,
}

/// A post joined with its politician, party and live vote aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct FeedPost {
    pub id: Id,
    pub promise_text: String,
    pub location: String,
    pub video_path: String,
    pub created_at: DateTime<Utc>,
    pub politician_id: Id,
    pub politician_name: String,
    pub politician_photo: Option<String>,
    pub party_id: Option<Id>,
    pub party_name: Option<String>,
    pub party_logo: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Admin {
    pub id: Id,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PoliticianProfile {
    pub politician: Politician,
    pub party: Option<Party>,
    pub posts: Vec<FeedPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartyProfile {
    pub party: Party,
    pub members: Vec<Politician>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DashboardCounts {
    pub parties: i64,
    pub politicians: i64,
    pub posts: i64,
    pub ads: i64,
    pub submissions: i64,
}
