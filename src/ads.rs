use serde::{Deserialize, Serialize};

use crate::models::{Ad, FeedPost};

/// One ad follows every `AD_CADENCE` posts of a batch.
pub const AD_CADENCE: usize = 4;

/// Position in a feed session: the page about to be loaded and where ad rotation resumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCursor {
    pub page: i64,
    pub ad_rotation_offset: usize,
}

impl FeedCursor {
    pub fn fresh() -> Self { Self { page: 1, ad_rotation_offset: 0 } }

    /// Continuation of a session; page 1 always restarts the rotation.
    pub fn resume(page: i64, ad_rotation_offset: usize) -> Self {
        if page <= 1 { Self::fresh() } else { Self { page, ad_rotation_offset } }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item", rename_all = "lowercase")]
pub enum FeedEntry {
    Post(FeedPost),
    Ad(Ad),
}

/// Splice ads into one rendered batch. Returns the display sequence and the
/// rotation offset the next batch should start from, always within `0..ads.len()`
/// for a non-empty pool. Any client-supplied offset is accepted.
pub fn interleave(posts: &[FeedPost], ads: &[Ad], offset: usize) -> (Vec<FeedEntry>, usize) {
    if ads.is_empty() {
        return (posts.iter().cloned().map(FeedEntry::Post).collect(), offset);
    }
    let mut slot = offset % ads.len();
    let mut out = Vec::with_capacity(posts.len() + posts.len() / AD_CADENCE);
    for (idx, post) in posts.iter().enumerate() {
        out.push(FeedEntry::Post(post.clone()));
        if (idx + 1) % AD_CADENCE == 0 {
            out.push(FeedEntry::Ad(ads[slot].clone()));
            slot = (slot + 1) % ads.len();
        }
    }
    (out, slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: i64) -> FeedPost {
        FeedPost {
            id,
            promise_text: String::new(),
            location: String::new(),
            video_path: String::new(),
            created_at: Utc::now(),
            politician_id: 1,
            politician_name: String::new(),
            politician_photo: None,
            party_id: None,
            party_name: None,
            party_logo: None,
            upvotes: 0,
            downvotes: 0,
            score: 0,
        }
    }

    fn ad(id: i64) -> Ad {
        Ad { id, title: format!("ad{id}"), image_path: String::new(), contact_url: String::new(), created_at: Utc::now() }
    }

    fn layout(entries: &[FeedEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e {
                FeedEntry::Post(p) => format!("p{}", p.id),
                FeedEntry::Ad(a) => format!("a{}", a.id),
            })
            .collect()
    }

    #[test]
    fn nine_posts_get_two_ads() {
        let posts: Vec<_> = (1..=9).map(post).collect();
        let (entries, next) = interleave(&posts, &[ad(100), ad(200), ad(300)], 0);
        assert_eq!(
            layout(&entries),
            vec!["p1", "p2", "p3", "p4", "a100", "p5", "p6", "p7", "p8", "a200", "p9"]
        );
        assert_eq!(next, 2);
    }

    #[test]
    fn rotation_continues_across_batches_and_wraps() {
        let posts: Vec<_> = (1..=8).map(post).collect();
        let pool = [ad(1), ad(2), ad(3)];
        let (_, next) = interleave(&posts, &pool, 0);
        let (entries, next) = interleave(&posts, &pool, next);
        let ads: Vec<_> = layout(&entries).into_iter().filter(|s| s.starts_with('a')).collect();
        assert_eq!(ads, vec!["a3", "a1"]);
        assert_eq!(next, 1);
    }

    #[test]
    fn huge_offset_wraps_into_pool() {
        let posts: Vec<_> = (1..=8).map(post).collect();
        let pool = [ad(1), ad(2)];
        let (entries, next) = interleave(&posts, &pool, usize::MAX);
        let ads: Vec<_> = layout(&entries).into_iter().filter(|s| s.starts_with('a')).collect();
        // usize::MAX % 2 == 1
        assert_eq!(ads, vec!["a2", "a1"]);
        assert_eq!(next, 1);
    }

    #[test]
    fn empty_pool_inserts_nothing() {
        let posts: Vec<_> = (1..=8).map(post).collect();
        let (entries, next) = interleave(&posts, &[], 5);
        assert_eq!(entries.len(), 8);
        assert_eq!(next, 5);
    }

    #[test]
    fn cursor_resets_on_first_page() {
        assert_eq!(FeedCursor::resume(1, 9), FeedCursor::fresh());
        assert_eq!(FeedCursor::resume(3, 4), FeedCursor { page: 3, ad_rotation_offset: 4 });
    }
}
