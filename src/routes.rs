use std::sync::Arc;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{create_jwt, verify_password, Auth, ADMIN_COOKIE, SESSION_HOURS};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::ApiError;
use crate::feed::{load_page, FeedPage, FeedQuery, PageRequest};
use crate::identity::VoterIdentity;
use crate::ledger::{LedgerError, VoteLedger, VoteReceipt};
use crate::models::*;
use crate::rate_limit::{Action, RateLimiterFacade};
use crate::ranking::{FeedFilter, SortMode};
use crate::repo::{AdRepo, AdminRepo, PartyRepo, PoliticianRepo, PostRepo, Repo, RepoError, SubmissionRepo};
use crate::storage::{media_key, MediaFolder, MediaStore, MediaStoreError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _req| ApiError::InvalidPayload(err.to_string()).into()),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| ApiError::InvalidPayload(err.to_string()).into()))
    .app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::NotFound.into()));

    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/posts").route(web::get().to(list_feed)))
            .service(web::resource("/posts/{id}").route(web::get().to(get_post)))
            .service(web::resource("/votes").route(web::post().to(cast_vote)))
            .service(web::resource("/submissions").route(web::post().to(create_submission)))
            .service(web::resource("/parties").route(web::get().to(list_parties)))
            .service(web::resource("/parties/{id}").route(web::get().to(party_profile)))
            .service(web::resource("/politicians").route(web::get().to(list_politicians)))
            .service(web::resource("/politicians/{id}").route(web::get().to(politician_profile)))
            // Admin console
            .service(web::resource("/admin/login").route(web::post().to(admin_login)))
            .service(web::resource("/admin/logout").route(web::post().to(admin_logout)))
            .service(web::resource("/admin/summary").route(web::get().to(admin_summary)))
            .service(
                web::resource("/admin/parties")
                    .route(web::get().to(admin_list_parties))
                    .route(web::post().to(admin_create_party)),
            )
            .service(
                web::resource("/admin/parties/{id}")
                    .route(web::put().to(admin_update_party))
                    .route(web::delete().to(admin_delete_party)),
            )
            .service(
                web::resource("/admin/politicians")
                    .route(web::get().to(admin_list_politicians))
                    .route(web::post().to(admin_create_politician)),
            )
            .service(
                web::resource("/admin/politicians/{id}")
                    .route(web::put().to(admin_update_politician))
                    .route(web::delete().to(admin_delete_politician)),
            )
            .service(
                web::resource("/admin/posts")
                    .route(web::get().to(admin_list_posts))
                    .route(web::post().to(admin_create_post)),
            )
            .service(
                web::resource("/admin/posts/{id}")
                    .route(web::put().to(admin_update_post))
                    .route(web::delete().to(admin_delete_post)),
            )
            .service(
                web::resource("/admin/ads")
                    .route(web::get().to(admin_list_ads))
                    .route(web::post().to(admin_create_ad)),
            )
            .service(
                web::resource("/admin/ads/{id}")
                    .route(web::get().to(admin_get_ad))
                    .route(web::put().to(admin_update_ad))
                    .route(web::delete().to(admin_delete_ad)),
            )
            .service(web::resource("/admin/submissions").route(web::get().to(admin_list_submissions)))
            .service(web::resource("/admin/media/{folder}").route(web::post().to(upload_media))),
    );
    // outside /api/v1 so <video src="/uploads/..."> works
    cfg.route("/uploads/{key:.*}", web::get().to(get_media));
    cfg.route("/health", web::get().to(health));
    cfg.route("/metrics", web::get().to(render_metrics));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub media_store: Arc<dyn MediaStore>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub settings: Settings,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// System clock, default settings, no rate limiting, no metrics exporter.
    pub fn new(repo: Arc<dyn Repo>, media_store: Arc<dyn MediaStore>) -> Self {
        Self {
            repo,
            media_store,
            clock: Arc::new(SystemClock::utc()),
            rate_limiter: None,
            settings: Settings::default(),
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_rate_limiter(mut self, rl: RateLimiterFacade) -> Self {
        self.rate_limiter = Some(rl);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::InvalidPayload(format!("{field} is required")));
    }
    Ok(v.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ---------------- Public feed & voting ----------------

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(FeedQuery),
    responses(
        (status = 200, description = "One feed page with ads interleaved", body = FeedPage),
        (status = 400, description = "Non-numeric politician/party filter")
    )
)]
pub async fn list_feed(req: HttpRequest, data: web::Data<AppState>, query: web::Query<FeedQuery>) -> Result<HttpResponse, ApiError> {
    let voter = VoterIdentity::resolve(&req);
    let filter = query.filter().map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
    let sort = query.sort();
    let settings = &data.settings;
    let page_req = query.page_request(settings.feed_page_size, settings.feed_max_limit);
    let cursor = query.cursor(page_req.page);

    metrics::counter!("feed_requests_total", "sort" => sort.as_str()).increment(1);
    let page = load_page(data.repo.as_ref(), &filter, sort, page_req, cursor, settings.ad_pool_size).await?;

    let mut resp = HttpResponse::Ok();
    if let Some(cookie) = voter.cookie(settings.cookie) {
        resp.cookie(cookie);
    }
    Ok(resp.json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post with live vote counts", body = FeedPost),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_feed_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Loose vote body: `postId` may arrive as a number or numeric string.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VotePayload {
    #[serde(rename = "postId", alias = "post_id", default)]
    #[schema(value_type = Option<i64>)]
    pub post_id: Option<serde_json::Value>,
    #[serde(rename = "voteType", alias = "vote_type", default)]
    pub vote_type: Option<String>,
}

impl VotePayload {
    fn post_id(&self) -> Option<Id> {
        match self.post_id.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub message: String,
    pub vote: VoteReceipt,
}

#[utoipa::path(
    post,
    path = "/api/v1/votes",
    request_body = VotePayload,
    responses(
        (status = 200, description = "Vote accepted", body = VoteResponse),
        (status = 400, description = "Invalid vote payload"),
        (status = 409, description = "Already voted for this post today"),
        (status = 429, description = "Daily vote limit reached")
    )
)]
pub async fn cast_vote(req: HttpRequest, data: web::Data<AppState>, payload: web::Json<VotePayload>) -> Result<HttpResponse, ApiError> {
    let voter = VoterIdentity::resolve(&req);
    let ledger = VoteLedger::new(data.repo.as_ref(), data.clock.as_ref(), data.settings.daily_vote_quota);
    let result = ledger.cast(payload.post_id(), &voter.id, payload.vote_type.as_deref()).await;

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(LedgerError::InvalidPayload(_)) => "invalid",
        Err(LedgerError::QuotaExceeded(_)) => "quota_exceeded",
        Err(LedgerError::DuplicateVote) => "duplicate",
        Err(LedgerError::StoreUnavailable(_)) => "error",
    };
    metrics::counter!("votes_total", "outcome" => outcome).increment(1);

    // the identity cookie is set even when the vote is rejected
    let cookie = voter.cookie(data.settings.cookie);
    match result {
        Ok(receipt) => {
            let mut resp = HttpResponse::Ok();
            if let Some(c) = cookie {
                resp.cookie(c);
            }
            Ok(resp.json(VoteResponse { message: "Vote accepted".into(), vote: receipt }))
        }
        Err(e) => {
            let mut resp = actix_web::ResponseError::error_response(&ApiError::from(e));
            if let Some(c) = cookie {
                if let Err(e) = resp.add_cookie(&c) {
                    tracing::warn!(error = %e, "could not attach voter cookie to rejected vote");
                }
            }
            Ok(resp)
        }
    }
}

// ---------------- Submissions ----------------

#[utoipa::path(
    post,
    path = "/api/v1/submissions",
    request_body = NewSubmission,
    responses(
        (status = 201, description = "Submission stored for review", body = Submission),
        (status = 400, description = "Missing required fields"),
        (status = 429, description = "Too many submissions from this address")
    )
)]
pub async fn create_submission(req: HttpRequest, data: web::Data<AppState>, payload: web::Json<NewSubmission>) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow(Action::Submission, &client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }
    let p = payload.into_inner();
    let clean = NewSubmission {
        submitter_name: required(&p.submitter_name, "submitter_name")?,
        contact: optional(p.contact),
        politician_name: required(&p.politician_name, "politician_name")?,
        location: required(&p.location, "location")?,
        video_url: required(&p.video_url, "video_url")?,
        promise_text: required(&p.promise_text, "promise_text")?,
    };
    let sub = data.repo.create_submission(clean).await?;
    metrics::counter!("submissions_total").increment(1);
    tracing::info!(submission_id = sub.id, "submission received");
    Ok(HttpResponse::Created().json(sub))
}

// ---------------- Directory & profiles ----------------

#[utoipa::path(get, path = "/api/v1/parties", responses((status = 200, description = "All parties by name", body = [Party])))]
pub async fn list_parties(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_parties().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/parties/{id}",
    params(("id" = Id, Path, description = "Party id")),
    responses(
        (status = 200, description = "Party with member politicians", body = PartyProfile),
        (status = 404, description = "Party not found")
    )
)]
pub async fn party_profile(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let party = data.repo.get_party(path.into_inner()).await?;
    let members = data.repo.list_party_members(party.id).await?;
    Ok(HttpResponse::Ok().json(PartyProfile { party, members }))
}

#[utoipa::path(get, path = "/api/v1/politicians", responses((status = 200, description = "All politicians by name", body = [Politician])))]
pub async fn list_politicians(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_politicians().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/politicians/{id}",
    params(("id" = Id, Path, description = "Politician id")),
    responses(
        (status = 200, description = "Politician, party and posts newest first", body = PoliticianProfile),
        (status = 404, description = "Politician not found")
    )
)]
pub async fn politician_profile(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let politician = data.repo.get_politician(path.into_inner()).await?;
    let party = match politician.party_id {
        Some(pid) => match data.repo.get_party(pid).await {
            Ok(p) => Some(p),
            Err(RepoError::NotFound) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };
    let filter = FeedFilter { politician_id: Some(politician.id), ..FeedFilter::default() };
    let posts = data.repo.query_feed(&filter, SortMode::New, i64::MAX, 0).await?;
    Ok(HttpResponse::Ok().json(PoliticianProfile { politician, party, posts }))
}

// ---------------- Admin ----------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "JWT issued (also set as admin_token cookie)", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn admin_login(req: HttpRequest, data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow(Action::Login, &client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }
    let email = payload.email.trim();
    let admin = match data.repo.find_admin_by_email(email).await {
        Ok(a) => a,
        Err(RepoError::NotFound) => return Err(ApiError::Unauthorized),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&payload.password, &admin.password_hash) {
        tracing::warn!(email, "failed admin login");
        return Err(ApiError::Unauthorized);
    }
    let token = create_jwt(admin.id, &admin.email)?;
    let cookie = Cookie::build(ADMIN_COOKIE, token.clone())
        .path("/")
        .max_age(CookieDuration::hours(SESSION_HOURS))
        .same_site(SameSite::Strict)
        .http_only(true)
        .secure(data.settings.cookie.secure)
        .finish();
    tracing::info!(admin_id = admin.id, "admin logged in");
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(LoginResponse { token, expires_in: SESSION_HOURS * 3600 }))
}

pub async fn admin_logout() -> HttpResponse {
    let mut cookie = Cookie::build(ADMIN_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::NoContent().cookie(cookie).finish()
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/summary",
    responses(
        (status = 200, description = "Row counts for the dashboard", body = DashboardCounts),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn admin_summary(_auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.dashboard_counts().await?))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminPageQuery {
    pub page: Option<String>,
}

impl AdminPageQuery {
    fn request(&self, settings: &Settings) -> PageRequest {
        PageRequest::from_params(self.page.as_deref(), None, settings.admin_page_size, settings.admin_page_size)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl<T> Paged<T> {
    fn new((items, total): (Vec<T>, i64), req: PageRequest) -> Self {
        Self { items, page: req.page, total_pages: crate::feed::total_pages(total, req.limit), total }
    }
}

pub async fn admin_list_parties(_auth: Auth, data: web::Data<AppState>, q: web::Query<AdminPageQuery>) -> Result<HttpResponse, ApiError> {
    let pr = q.request(&data.settings);
    Ok(HttpResponse::Ok().json(Paged::new(data.repo.page_parties(pr.limit, pr.offset()).await?, pr)))
}

fn clean_party(p: NewParty) -> Result<NewParty, ApiError> {
    Ok(NewParty { name: required(&p.name, "name")?, description: optional(p.description), logo_path: optional(p.logo_path) })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/parties",
    request_body = NewParty,
    responses((status = 201, description = "Party created", body = Party), (status = 401, description = "Unauthorized"))
)]
pub async fn admin_create_party(_auth: Auth, data: web::Data<AppState>, payload: web::Json<NewParty>) -> Result<HttpResponse, ApiError> {
    let party = data.repo.create_party(clean_party(payload.into_inner())?).await?;
    Ok(HttpResponse::Created().json(party))
}

pub async fn admin_update_party(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<NewParty>) -> Result<HttpResponse, ApiError> {
    let party = data.repo.update_party(path.into_inner(), clean_party(payload.into_inner())?).await?;
    Ok(HttpResponse::Ok().json(party))
}

pub async fn admin_delete_party(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_party(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_list_politicians(_auth: Auth, data: web::Data<AppState>, q: web::Query<AdminPageQuery>) -> Result<HttpResponse, ApiError> {
    let pr = q.request(&data.settings);
    Ok(HttpResponse::Ok().json(Paged::new(data.repo.page_politicians(pr.limit, pr.offset()).await?, pr)))
}

fn clean_politician(p: NewPolitician) -> Result<NewPolitician, ApiError> {
    Ok(NewPolitician { name: required(&p.name, "name")?, party_id: p.party_id, bio: optional(p.bio), photo_path: optional(p.photo_path) })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/politicians",
    request_body = NewPolitician,
    responses((status = 201, description = "Politician created", body = Politician), (status = 400, description = "Unknown party"))
)]
pub async fn admin_create_politician(_auth: Auth, data: web::Data<AppState>, payload: web::Json<NewPolitician>) -> Result<HttpResponse, ApiError> {
    let pol = data.repo.create_politician(clean_politician(payload.into_inner())?).await?;
    Ok(HttpResponse::Created().json(pol))
}

pub async fn admin_update_politician(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<NewPolitician>) -> Result<HttpResponse, ApiError> {
    let pol = data.repo.update_politician(path.into_inner(), clean_politician(payload.into_inner())?).await?;
    Ok(HttpResponse::Ok().json(pol))
}

pub async fn admin_delete_politician(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_politician(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_list_posts(_auth: Auth, data: web::Data<AppState>, q: web::Query<AdminPageQuery>) -> Result<HttpResponse, ApiError> {
    let pr = q.request(&data.settings);
    Ok(HttpResponse::Ok().json(Paged::new(data.repo.page_posts(pr.limit, pr.offset()).await?, pr)))
}

fn clean_post(p: NewPost) -> Result<NewPost, ApiError> {
    Ok(NewPost {
        politician_id: p.politician_id,
        party_id: p.party_id,
        promise_text: required(&p.promise_text, "promise_text")?,
        location: required(&p.location, "location")?,
        video_path: optional(p.video_path),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/posts",
    request_body = NewPost,
    responses(
        (status = 201, description = "Post created; party backfilled from the politician", body = Post),
        (status = 400, description = "Unknown politician/party or missing video")
    )
)]
pub async fn admin_create_post(_auth: Auth, data: web::Data<AppState>, payload: web::Json<NewPost>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.create_post(clean_post(payload.into_inner())?).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn admin_update_post(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<NewPost>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.update_post(path.into_inner(), clean_post(payload.into_inner())?).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn admin_delete_post(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_post(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_list_ads(_auth: Auth, data: web::Data<AppState>, q: web::Query<AdminPageQuery>) -> Result<HttpResponse, ApiError> {
    let pr = q.request(&data.settings);
    Ok(HttpResponse::Ok().json(Paged::new(data.repo.page_ads(pr.limit, pr.offset()).await?, pr)))
}

fn clean_ad(a: NewAd) -> Result<NewAd, ApiError> {
    Ok(NewAd { title: required(&a.title, "title")?, contact_url: required(&a.contact_url, "contact_url")?, image_path: optional(a.image_path) })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/ads",
    request_body = NewAd,
    responses((status = 201, description = "Ad created", body = Ad), (status = 400, description = "Missing image"))
)]
pub async fn admin_create_ad(_auth: Auth, data: web::Data<AppState>, payload: web::Json<NewAd>) -> Result<HttpResponse, ApiError> {
    let ad = data.repo.create_ad(clean_ad(payload.into_inner())?).await?;
    Ok(HttpResponse::Created().json(ad))
}

pub async fn admin_get_ad(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.get_ad(path.into_inner()).await?))
}

pub async fn admin_update_ad(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<NewAd>) -> Result<HttpResponse, ApiError> {
    let ad = data.repo.update_ad(path.into_inner(), clean_ad(payload.into_inner())?).await?;
    Ok(HttpResponse::Ok().json(ad))
}

pub async fn admin_delete_ad(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_ad(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_list_submissions(_auth: Auth, data: web::Data<AppState>, q: web::Query<AdminPageQuery>) -> Result<HttpResponse, ApiError> {
    let pr = q.request(&data.settings);
    Ok(HttpResponse::Ok().json(Paged::new(data.repo.page_submissions(pr.limit, pr.offset()).await?, pr)))
}

// ---------------- Media ----------------

#[derive(Debug, Serialize, ToSchema)]
pub struct MediaUploadResponse {
    /// Media reference to store on the party/politician/post/ad.
    pub key: String,
    pub url: String,
    pub mime: String,
    pub size: usize,
    pub duplicate: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/media/{folder}",
    params(("folder" = String, Path, description = "parties | politicians | posts | ads | submissions")),
    responses(
        (status = 201, description = "Stored (new)", body = MediaUploadResponse),
        (status = 200, description = "Already stored (idempotent)", body = MediaUploadResponse),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn upload_media(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    use actix_web::http::StatusCode;
    let folder = MediaFolder::parse(&path.into_inner()).ok_or(ApiError::NotFound)?;
    let limit = data.settings.max_upload_bytes;

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::warn!("multipart error: {e}");
        ApiError::InvalidPayload("malformed multipart body".into())
    })? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        let mut bytes: Vec<u8> = Vec::new();
        let mut hasher = Sha256::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::warn!("upload stream error: {e}");
            ApiError::InvalidPayload("upload interrupted".into())
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::PayloadTooLarge);
            }
            hasher.update(&chunk);
            bytes.extend_from_slice(&chunk);
        }
        let kind = infer::get(&bytes).ok_or(ApiError::UnsupportedMediaType)?;
        let mime = kind.mime_type().to_string();
        if !folder.accepts(&mime) {
            return Err(ApiError::UnsupportedMediaType);
        }
        let hash = format!("{:x}", hasher.finalize());
        let key = media_key(folder, &hash, kind.extension());
        let (status, duplicate) = match data.media_store.save(&key, &mime, &bytes).await {
            Ok(()) => (StatusCode::CREATED, false),
            Err(MediaStoreError::Duplicate) => (StatusCode::OK, true),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(%key, size = bytes.len(), duplicate, "media stored");
        let resp = MediaUploadResponse { url: format!("/uploads/{key}"), key, mime, size: bytes.len(), duplicate };
        return Ok(HttpResponse::build(status).json(resp));
    }
    Err(ApiError::InvalidPayload("multipart field 'file' is required".into()))
}

pub async fn get_media(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    match data.media_store.load(&key).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok()
            .insert_header(("Content-Type", mime))
            .insert_header(("Cache-Control", "public, max-age=31536000, immutable"))
            .body(bytes)),
        Err(MediaStoreError::NotFound | MediaStoreError::InvalidKey) => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}

// ---------------- Ops ----------------

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Store reachable"), (status = 500, description = "Store unreachable"))
)]
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    match data.repo.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            HttpResponse::InternalServerError().json(serde_json::json!({ "ok": false }))
        }
    }
}

pub async fn render_metrics(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let handle = data.metrics.as_ref().ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render()))
}
