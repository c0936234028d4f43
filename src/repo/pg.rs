use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::*;
use crate::ranking::like_pattern;

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => RepoError::Conflict,
            Some("23503") => RepoError::Invalid("referenced row does not exist".into()),
            _ => RepoError::Internal(e.to_string()),
        },
        _ => RepoError::Internal(e.to_string()),
    }
}

fn expect_affected(rows: u64) -> RepoResult<()> {
    if rows == 0 { Err(RepoError::NotFound) } else { Ok(()) }
}

const FEED_SELECT: &str = r#"
    SELECT p.id, p.promise_text, p.location, p.video_path, p.created_at,
           pol.id AS politician_id, pol.name AS politician_name, pol.photo_path AS politician_photo,
           pa.id AS party_id, pa.name AS party_name, pa.logo_path AS party_logo,
           COALESCE(SUM(CASE WHEN v.vote_type = 'up' THEN 1 ELSE 0 END), 0)::BIGINT AS upvotes,
           COALESCE(SUM(CASE WHEN v.vote_type = 'down' THEN 1 ELSE 0 END), 0)::BIGINT AS downvotes,
           COALESCE(SUM(CASE WHEN v.vote_type = 'up' THEN 1 WHEN v.vote_type = 'down' THEN -1 ELSE 0 END), 0)::BIGINT AS score
    FROM posts p
    JOIN politicians pol ON pol.id = p.politician_id
    LEFT JOIN parties pa ON pa.id = p.party_id
    LEFT JOIN votes v ON v.post_id = p.id
"#;

const FEED_GROUP_BY: &str = " GROUP BY p.id, pol.id, pa.id";

const FEED_COUNT: &str = r#"
    SELECT COUNT(DISTINCT p.id)
    FROM posts p
    JOIN politicians pol ON pol.id = p.politician_id
    LEFT JOIN parties pa ON pa.id = p.party_id
"#;

fn push_feed_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &FeedFilter) {
    let mut sep = " WHERE ";
    if let Some(id) = f.politician_id {
        qb.push(sep).push("p.politician_id = ").push_bind(id);
        sep = " AND ";
    }
    if let Some(id) = f.party_id {
        qb.push(sep).push("p.party_id = ").push_bind(id);
        sep = " AND ";
    }
    if let Some(loc) = &f.location {
        qb.push(sep).push("p.location ILIKE ").push_bind(like_pattern(loc));
        sep = " AND ";
    }
    if let Some(q) = &f.q {
        let pat = like_pattern(q);
        qb.push(sep)
            .push("(p.promise_text ILIKE ").push_bind(pat.clone())
            .push(" OR pol.name ILIKE ").push_bind(pat.clone())
            .push(" OR COALESCE(pa.name, '') ILIKE ").push_bind(pat)
            .push(")");
    }
}

async fn count_table(pool: &Pool<Postgres>, table: &str) -> RepoResult<i64> {
    // table names come from a fixed list below, never from input
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool).await.map_err(db_err)?;
    Ok(n)
}

#[async_trait]
impl PartyRepo for PgRepo {
    async fn list_parties(&self) -> RepoResult<Vec<Party>> {
        sqlx::query_as::<_, Party>("SELECT id, name, description, logo_path, created_at FROM parties ORDER BY name ASC")
            .fetch_all(&self.pool).await.map_err(db_err)
    }
    async fn page_parties(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Party>, i64)> {
        let rows = sqlx::query_as::<_, Party>(
            "SELECT id, name, description, logo_path, created_at FROM parties ORDER BY id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit).bind(offset)
        .fetch_all(&self.pool).await.map_err(db_err)?;
        Ok((rows, count_table(&self.pool, "parties").await?))
    }
    async fn get_party(&self, id: Id) -> RepoResult<Party> {
        sqlx::query_as::<_, Party>("SELECT id, name, description, logo_path, created_at FROM parties WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn create_party(&self, new: NewParty) -> RepoResult<Party> {
        sqlx::query_as::<_, Party>(
            "INSERT INTO parties (name, description, logo_path) VALUES ($1, $2, $3) RETURNING id, name, description, logo_path, created_at",
        )
        .bind(&new.name).bind(&new.description).bind(&new.logo_path)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn update_party(&self, id: Id, upd: NewParty) -> RepoResult<Party> {
        sqlx::query_as::<_, Party>(
            "UPDATE parties SET name = $2, description = $3, logo_path = COALESCE($4, logo_path) WHERE id = $1 \
             RETURNING id, name, description, logo_path, created_at",
        )
        .bind(id).bind(&upd.name).bind(&upd.description).bind(&upd.logo_path)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn delete_party(&self, id: Id) -> RepoResult<()> {
        // politicians.party_id and posts.party_id are ON DELETE SET NULL
        let res = sqlx::query("DELETE FROM parties WHERE id = $1").bind(id).execute(&self.pool).await.map_err(db_err)?;
        expect_affected(res.rows_affected())
    }
}

const POLITICIAN_COLS: &str = "id, name, party_id, bio, photo_path, created_at";

#[async_trait]
impl PoliticianRepo for PgRepo {
    async fn list_politicians(&self) -> RepoResult<Vec<Politician>> {
        sqlx::query_as::<_, Politician>(&format!("SELECT {POLITICIAN_COLS} FROM politicians ORDER BY name ASC"))
            .fetch_all(&self.pool).await.map_err(db_err)
    }
    async fn page_politicians(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Politician>, i64)> {
        let rows = sqlx::query_as::<_, Politician>(&format!(
            "SELECT {POLITICIAN_COLS} FROM politicians ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit).bind(offset)
        .fetch_all(&self.pool).await.map_err(db_err)?;
        Ok((rows, count_table(&self.pool, "politicians").await?))
    }
    async fn list_party_members(&self, party_id: Id) -> RepoResult<Vec<Politician>> {
        sqlx::query_as::<_, Politician>(&format!(
            "SELECT {POLITICIAN_COLS} FROM politicians WHERE party_id = $1 ORDER BY name ASC"
        ))
        .bind(party_id)
        .fetch_all(&self.pool).await.map_err(db_err)
    }
    async fn get_politician(&self, id: Id) -> RepoResult<Politician> {
        sqlx::query_as::<_, Politician>(&format!("SELECT {POLITICIAN_COLS} FROM politicians WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn create_politician(&self, new: NewPolitician) -> RepoResult<Politician> {
        sqlx::query_as::<_, Politician>(&format!(
            "INSERT INTO politicians (name, party_id, bio, photo_path) VALUES ($1, $2, $3, $4) RETURNING {POLITICIAN_COLS}"
        ))
        .bind(&new.name).bind(new.party_id).bind(&new.bio).bind(&new.photo_path)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn update_politician(&self, id: Id, upd: NewPolitician) -> RepoResult<Politician> {
        sqlx::query_as::<_, Politician>(&format!(
            "UPDATE politicians SET name = $2, party_id = $3, bio = $4, photo_path = COALESCE($5, photo_path) \
             WHERE id = $1 RETURNING {POLITICIAN_COLS}"
        ))
        .bind(id).bind(&upd.name).bind(upd.party_id).bind(&upd.bio).bind(&upd.photo_path)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn delete_politician(&self, id: Id) -> RepoResult<()> {
        // posts cascade, votes cascade from posts
        let res = sqlx::query("DELETE FROM politicians WHERE id = $1").bind(id).execute(&self.pool).await.map_err(db_err)?;
        expect_affected(res.rows_affected())
    }
}

const POST_COLS: &str = "id, politician_id, party_id, promise_text, location, video_path, created_at";

impl PgRepo {
    async fn resolve_post_party(&self, politician_id: Id, party_id: Option<Id>) -> RepoResult<Option<Id>> {
        if party_id.is_some() { return Ok(party_id); }
        let row: Option<(Option<Id>,)> = sqlx::query_as("SELECT party_id FROM politicians WHERE id = $1")
            .bind(politician_id)
            .fetch_optional(&self.pool).await.map_err(db_err)?;
        row.map(|(p,)| p).ok_or_else(|| RepoError::Invalid("unknown politician".into()))
    }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        let video_path = new
            .video_path
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RepoError::Invalid("video required".into()))?;
        let party_id = self.resolve_post_party(new.politician_id, new.party_id).await?;
        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (politician_id, party_id, promise_text, location, video_path) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {POST_COLS}"
        ))
        .bind(new.politician_id).bind(party_id).bind(&new.promise_text).bind(&new.location).bind(&video_path)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn update_post(&self, id: Id, upd: NewPost) -> RepoResult<Post> {
        let party_id = self.resolve_post_party(upd.politician_id, upd.party_id).await?;
        let video = upd.video_path.filter(|v| !v.trim().is_empty());
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET politician_id = $2, party_id = $3, promise_text = $4, location = $5, \
             video_path = COALESCE($6, video_path) WHERE id = $1 RETURNING {POST_COLS}"
        ))
        .bind(id).bind(upd.politician_id).bind(party_id).bind(&upd.promise_text).bind(&upd.location).bind(&video)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(&self.pool).await.map_err(db_err)?;
        expect_affected(res.rows_affected())
    }
    async fn page_posts(&self, limit: i64, offset: i64) -> RepoResult<(Vec<FeedPost>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        qb.push(FEED_GROUP_BY)
            .push(" ORDER BY p.id DESC LIMIT ").push_bind(limit)
            .push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<FeedPost>().fetch_all(&self.pool).await.map_err(db_err)?;
        Ok((rows, count_table(&self.pool, "posts").await?))
    }
    async fn count_feed(&self, filter: &FeedFilter) -> RepoResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_COUNT);
        push_feed_filter(&mut qb, filter);
        let (n,): (i64,) = qb.build_query_as::<(i64,)>().fetch_one(&self.pool).await.map_err(db_err)?;
        Ok(n)
    }
    async fn query_feed(&self, filter: &FeedFilter, sort: SortMode, limit: i64, offset: i64) -> RepoResult<Vec<FeedPost>> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        push_feed_filter(&mut qb, filter);
        qb.push(FEED_GROUP_BY)
            .push(" ORDER BY ").push(sort.order_by_sql())
            .push(" LIMIT ").push_bind(limit)
            .push(" OFFSET ").push_bind(offset);
        qb.build_query_as::<FeedPost>().fetch_all(&self.pool).await.map_err(db_err)
    }
    async fn get_feed_post(&self, id: Id) -> RepoResult<FeedPost> {
        let mut qb = QueryBuilder::<Postgres>::new(FEED_SELECT);
        qb.push(" WHERE p.id = ").push_bind(id).push(FEED_GROUP_BY);
        qb.build_query_as::<FeedPost>().fetch_one(&self.pool).await.map_err(db_err)
    }
}

const AD_COLS: &str = "id, title, image_path, contact_url, created_at";

#[async_trait]
impl AdRepo for PgRepo {
    async fn recent_ads(&self, limit: i64) -> RepoResult<Vec<Ad>> {
        sqlx::query_as::<_, Ad>(&format!("SELECT {AD_COLS} FROM ads ORDER BY created_at DESC, id DESC LIMIT $1"))
            .bind(limit)
            .fetch_all(&self.pool).await.map_err(db_err)
    }
    async fn page_ads(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Ad>, i64)> {
        let rows = sqlx::query_as::<_, Ad>(&format!("SELECT {AD_COLS} FROM ads ORDER BY id DESC LIMIT $1 OFFSET $2"))
            .bind(limit).bind(offset)
            .fetch_all(&self.pool).await.map_err(db_err)?;
        Ok((rows, count_table(&self.pool, "ads").await?))
    }
    async fn get_ad(&self, id: Id) -> RepoResult<Ad> {
        sqlx::query_as::<_, Ad>(&format!("SELECT {AD_COLS} FROM ads WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn create_ad(&self, new: NewAd) -> RepoResult<Ad> {
        let image_path = new
            .image_path
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RepoError::Invalid("image required".into()))?;
        sqlx::query_as::<_, Ad>(&format!(
            "INSERT INTO ads (title, image_path, contact_url) VALUES ($1, $2, $3) RETURNING {AD_COLS}"
        ))
        .bind(&new.title).bind(&image_path).bind(&new.contact_url)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn update_ad(&self, id: Id, upd: NewAd) -> RepoResult<Ad> {
        let image = upd.image_path.filter(|v| !v.trim().is_empty());
        sqlx::query_as::<_, Ad>(&format!(
            "UPDATE ads SET title = $2, contact_url = $3, image_path = COALESCE($4, image_path) WHERE id = $1 RETURNING {AD_COLS}"
        ))
        .bind(id).bind(&upd.title).bind(&upd.contact_url).bind(&image)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn delete_ad(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM ads WHERE id = $1").bind(id).execute(&self.pool).await.map_err(db_err)?;
        expect_affected(res.rows_affected())
    }
}

const SUBMISSION_COLS: &str = "id, submitter_name, contact, politician_name, location, video_url, promise_text, created_at";

#[async_trait]
impl SubmissionRepo for PgRepo {
    async fn create_submission(&self, new: NewSubmission) -> RepoResult<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO submissions (submitter_name, contact, politician_name, location, video_url, promise_text) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SUBMISSION_COLS}"
        ))
        .bind(&new.submitter_name).bind(&new.contact).bind(&new.politician_name)
        .bind(&new.location).bind(&new.video_url).bind(&new.promise_text)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn page_submissions(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Submission>, i64)> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLS} FROM submissions ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit).bind(offset)
        .fetch_all(&self.pool).await.map_err(db_err)?;
        Ok((rows, count_table(&self.pool, "submissions").await?))
    }
}

#[async_trait]
impl VoteRepo for PgRepo {
    async fn record_vote(&self, new: NewVote, daily_quota: i64) -> RepoResult<Vote> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        // serialize this voter's concurrent votes so the quota count stays exact
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&new.voter_id)
            .execute(&mut *tx).await.map_err(db_err)?;
        let (cast,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE voter_id = $1 AND vote_date = $2")
            .bind(&new.voter_id).bind(new.vote_date)
            .fetch_one(&mut *tx).await.map_err(db_err)?;
        if cast >= daily_quota {
            return Err(RepoError::QuotaExceeded);
        }
        let inserted: Option<(Id, DateTime<Utc>)> = sqlx::query_as(
            "INSERT INTO votes (post_id, voter_id, vote_type, vote_date) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (voter_id, post_id, vote_date) DO NOTHING RETURNING id, created_at",
        )
        .bind(new.post_id).bind(&new.voter_id).bind(new.direction.as_str()).bind(new.vote_date)
        .fetch_optional(&mut *tx).await
        .map_err(|e| match db_err(e) {
            RepoError::Invalid(_) => RepoError::NotFound,
            other => other,
        })?;
        let Some((id, created_at)) = inserted else {
            return Err(RepoError::DuplicateVote);
        };
        tx.commit().await.map_err(db_err)?;
        Ok(Vote {
            id,
            post_id: new.post_id,
            voter_id: new.voter_id,
            direction: new.direction,
            vote_date: new.vote_date,
            created_at,
        })
    }
    async fn votes_cast_on(&self, voter_id: &str, day: NaiveDate) -> RepoResult<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE voter_id = $1 AND vote_date = $2")
            .bind(voter_id).bind(day)
            .fetch_one(&self.pool).await.map_err(db_err)?;
        Ok(n)
    }
}

#[async_trait]
impl AdminRepo for PgRepo {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Admin> {
        sqlx::query_as::<_, Admin>("SELECT id, email, password_hash FROM admins WHERE lower(email) = lower($1) LIMIT 1")
            .bind(email)
            .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn upsert_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin> {
        sqlx::query_as::<_, Admin>(
            "INSERT INTO admins (email, password_hash) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET password_hash = EXCLUDED.password_hash \
             RETURNING id, email, password_hash",
        )
        .bind(email).bind(password_hash)
        .fetch_one(&self.pool).await.map_err(db_err)
    }
    async fn dashboard_counts(&self) -> RepoResult<DashboardCounts> {
        Ok(DashboardCounts {
            parties: count_table(&self.pool, "parties").await?,
            politicians: count_table(&self.pool, "politicians").await?,
            posts: count_table(&self.pool, "posts").await?,
            ads: count_table(&self.pool, "ads").await?,
            submissions: count_table(&self.pool, "submissions").await?,
        })
    }
    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ()).map_err(db_err)
    }
}
