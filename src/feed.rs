//! Feed paginator: filtered, ranked, windowed pages with ads spliced in.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::ads::{interleave, FeedCursor, FeedEntry};
use crate::models::{Ad, FeedPost, Id};
use crate::ranking::{FeedFilter, SortMode};
use crate::repo::{AdRepo, PostRepo, RepoError};

/// Raw query string of `GET /api/v1/posts`. Everything arrives as text so
/// malformed numbers can fall back to defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    pub politician: Option<String>,
    pub party: Option<String>,
    pub location: Option<String>,
    pub q: Option<String>,
    /// trending | new | optimistic | pessimistic
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Rotation position for continuation loads.
    pub ad_offset: Option<String>,
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{0} must be a numeric id")]
pub struct BadFilter(pub &'static str);

impl FeedQuery {
    pub fn filter(&self) -> Result<FeedFilter, BadFilter> {
        let id = |raw: &Option<String>, name: &'static str| -> Result<Option<Id>, BadFilter> {
            present(raw).map(|s| s.parse::<Id>().map_err(|_| BadFilter(name))).transpose()
        };
        Ok(FeedFilter {
            politician_id: id(&self.politician, "politician")?,
            party_id: id(&self.party, "party")?,
            location: present(&self.location).map(str::to_string),
            q: present(&self.q).map(str::to_string),
        })
    }

    pub fn sort(&self) -> SortMode {
        SortMode::from_param(present(&self.sort))
    }

    pub fn page_request(&self, default_limit: i64, max_limit: i64) -> PageRequest {
        PageRequest::from_params(present(&self.page), present(&self.limit), default_limit, max_limit)
    }

    pub fn cursor(&self, page: i64) -> FeedCursor {
        let offset = present(&self.ad_offset).and_then(|s| s.parse::<usize>().ok());
        match offset {
            Some(o) => FeedCursor::resume(page, o),
            None => FeedCursor { page, ad_rotation_offset: 0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Non-numeric or non-positive values fall back to page 1 / the default
    /// limit; the limit is capped at `max_limit`.
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: i64, max_limit: i64) -> Self {
        let positive = |raw: Option<&str>| raw.and_then(|s| s.parse::<i64>().ok()).filter(|n| *n > 0);
        let page = positive(page).unwrap_or(1);
        let limit = positive(limit).unwrap_or(default_limit).min(max_limit);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 { return 1; }
    ((total + limit - 1) / limit).max(1)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub ads: Vec<Ad>,
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<FeedEntry>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub has_more: bool,
    pub next_ad_offset: usize,
}

/// Count, rank and window the matching posts, then splice the ad pool in.
pub async fn load_page<R>(
    repo: &R,
    filter: &FeedFilter,
    sort: SortMode,
    req: PageRequest,
    cursor: FeedCursor,
    ad_pool_size: i64,
) -> Result<FeedPage, RepoError>
where
    R: PostRepo + AdRepo + ?Sized,
{
    let total = repo.count_feed(filter).await?;
    let total_pages = total_pages(total, req.limit);
    let posts = if req.page > total_pages {
        Vec::new()
    } else {
        repo.query_feed(filter, sort, req.limit, req.offset()).await?
    };
    let ads = repo.recent_ads(ad_pool_size).await?;
    let (entries, next_ad_offset) = interleave(&posts, &ads, cursor.ad_rotation_offset);
    Ok(FeedPage {
        posts,
        ads,
        entries,
        page: req.page,
        total_pages,
        total,
        has_more: req.page < total_pages,
        next_ad_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_coerce_to_defaults() {
        assert_eq!(PageRequest::from_params(None, None, 8, 20), PageRequest { page: 1, limit: 8 });
        assert_eq!(PageRequest::from_params(Some("0"), Some("-4"), 8, 20), PageRequest { page: 1, limit: 8 });
        assert_eq!(PageRequest::from_params(Some("x"), Some("1.5"), 8, 20), PageRequest { page: 1, limit: 8 });
        assert_eq!(PageRequest::from_params(Some("3"), Some("500"), 8, 20), PageRequest { page: 3, limit: 20 });
        assert_eq!(PageRequest::from_params(Some("3"), Some("5"), 8, 20).offset(), 10);
    }

    #[test]
    fn total_pages_never_below_one() {
        assert_eq!(total_pages(0, 8), 1);
        assert_eq!(total_pages(8, 8), 1);
        assert_eq!(total_pages(9, 8), 2);
        assert_eq!(total_pages(17, 8), 3);
    }

    #[test]
    fn query_parsing() {
        let q = FeedQuery {
            politician: Some("".into()),
            party: Some(" 4 ".into()),
            location: Some("  ".into()),
            q: Some("road".into()),
            sort: Some("bogus".into()),
            ..FeedQuery::default()
        };
        let f = q.filter().unwrap();
        assert_eq!(f.politician_id, None);
        assert_eq!(f.party_id, Some(4));
        assert_eq!(f.location, None);
        assert_eq!(f.q.as_deref(), Some("road"));
        assert_eq!(q.sort(), SortMode::Trending);

        let bad = FeedQuery { politician: Some("abc".into()), ..FeedQuery::default() };
        assert_eq!(bad.filter(), Err(BadFilter("politician")));
    }

    #[test]
    fn cursor_from_ad_offset() {
        let fresh = FeedQuery::default();
        assert_eq!(fresh.cursor(1), FeedCursor::fresh());
        let cont = FeedQuery { ad_offset: Some("3".into()), ..FeedQuery::default() };
        assert_eq!(cont.cursor(2).ad_rotation_offset, 3);
        // page 1 always restarts rotation
        assert_eq!(cont.cursor(1).ad_rotation_offset, 0);
    }

    #[cfg(feature = "inmem-store")]
    #[tokio::test]
    async fn page_past_end_is_empty_with_metadata() {
        use crate::models::{NewPolitician, NewPost};
        use crate::repo::inmem::InMemRepo;
        use crate::repo::PoliticianRepo;

        let repo = InMemRepo::ephemeral();
        let pol = repo
            .create_politician(NewPolitician { name: "Ram".into(), party_id: None, bio: None, photo_path: None })
            .await
            .unwrap();
        for i in 0..9 {
            repo.create_post(NewPost {
                politician_id: pol.id,
                party_id: None,
                promise_text: format!("p{i}"),
                location: "Kathmandu".into(),
                video_path: Some("v.mp4".into()),
            })
            .await
            .unwrap();
        }
        let filter = FeedFilter::default();
        let first = load_page(&repo, &filter, SortMode::New, PageRequest { page: 1, limit: 8 }, FeedCursor::fresh(), 20)
            .await
            .unwrap();
        assert_eq!((first.posts.len(), first.total, first.total_pages, first.has_more), (8, 9, 2, true));

        let past = load_page(&repo, &filter, SortMode::New, PageRequest { page: 3, limit: 8 }, FeedCursor::fresh(), 20)
            .await
            .unwrap();
        assert!(past.posts.is_empty());
        assert_eq!((past.total, past.total_pages, past.has_more), (9, 2, false));
    }
}
