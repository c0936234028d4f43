use crate::feed::FeedPage;
use crate::ledger::VoteReceipt;
use crate::models::{
    Ad, DashboardCounts, FeedPost, NewAd, NewParty, NewPolitician, NewPost, NewSubmission, Party, PartyProfile,
    Politician, PoliticianProfile, Post, Submission, VoteDirection,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_feed,
        crate::routes::get_post,
        crate::routes::cast_vote,
        crate::routes::create_submission,
        crate::routes::list_parties,
        crate::routes::party_profile,
        crate::routes::list_politicians,
        crate::routes::politician_profile,
        crate::routes::admin_login,
        crate::routes::admin_summary,
        crate::routes::admin_create_party,
        crate::routes::admin_create_politician,
        crate::routes::admin_create_post,
        crate::routes::admin_create_ad,
        crate::routes::upload_media,
        crate::routes::health,
    ),
    components(schemas(
        FeedPage, FeedPost, Post, NewPost, Party, NewParty, Politician, NewPolitician,
        Ad, NewAd, Submission, NewSubmission, VoteDirection, VoteReceipt,
        PartyProfile, PoliticianProfile, DashboardCounts,
        crate::routes::VotePayload, crate::routes::VoteResponse,
        crate::routes::LoginRequest, crate::routes::LoginResponse,
        crate::routes::MediaUploadResponse
    )),
    tags(
        (name = "feed", description = "Ranked promise feed and voting"),
        (name = "directory", description = "Parties and politicians"),
        (name = "admin", description = "Curation console"),
    )
)]
pub struct ApiDoc;
