//! Vote aggregation, feed filters and sort policies.
//!
//! The in-memory store ranks with [`rank`] and [`FeedFilter::matches`]; the
//! Postgres store renders the same semantics as SQL via [`SortMode::order_by_sql`].

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{FeedPost, Id, Vote, VoteDirection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Trending,
    New,
    Optimistic,
    Pessimistic,
}

impl SortMode {
    /// Unknown or missing values fall back to `Trending`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("new") => SortMode::New,
            Some("optimistic") => SortMode::Optimistic,
            Some("pessimistic") => SortMode::Pessimistic,
            _ => SortMode::Trending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Trending => "trending",
            SortMode::New => "new",
            SortMode::Optimistic => "optimistic",
            SortMode::Pessimistic => "pessimistic",
        }
    }

    /// ORDER BY body over the feed select aliases (`score`, `upvotes`, `downvotes`, `p`).
    pub fn order_by_sql(&self) -> &'static str {
        match self {
            SortMode::Trending => "score DESC, p.created_at DESC, p.id DESC",
            SortMode::New => "p.created_at DESC, p.id DESC",
            SortMode::Optimistic => "upvotes DESC, p.created_at DESC, p.id DESC",
            SortMode::Pessimistic => "downvotes DESC, p.created_at DESC, p.id DESC",
        }
    }

    pub fn compare(&self, a: &FeedPost, b: &FeedPost) -> Ordering {
        let primary = match self {
            SortMode::Trending => b.score.cmp(&a.score),
            SortMode::New => Ordering::Equal,
            SortMode::Optimistic => b.upvotes.cmp(&a.upvotes),
            SortMode::Pessimistic => b.downvotes.cmp(&a.downvotes),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    }
}

pub fn rank(posts: &mut [FeedPost], sort: SortMode) {
    posts.sort_by(|a, b| sort.compare(a, b));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl Tally {
    pub fn record(&mut self, direction: VoteDirection) {
        match direction {
            VoteDirection::Up => self.upvotes += 1,
            VoteDirection::Down => self.downvotes += 1,
        }
    }

    pub fn score(&self) -> i64 { self.upvotes - self.downvotes }

    pub fn apply(&self, post: &mut FeedPost) {
        post.upvotes = self.upvotes;
        post.downvotes = self.downvotes;
        post.score = self.score();
    }
}

/// Group votes per post. Posts without votes are simply absent (tally zero).
pub fn tally_votes<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> HashMap<Id, Tally> {
    let mut out: HashMap<Id, Tally> = HashMap::new();
    for v in votes {
        out.entry(v.post_id).or_default().record(v.direction);
    }
    out
}

/// Optional feed filters, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub politician_id: Option<Id>,
    pub party_id: Option<Id>,
    pub location: Option<String>,
    /// Matches promise text, politician name or party name.
    pub q: Option<String>,
}

impl FeedFilter {
    pub fn matches(&self, post: &FeedPost) -> bool {
        if let Some(id) = self.politician_id {
            if post.politician_id != id { return false; }
        }
        if let Some(id) = self.party_id {
            if post.party_id != Some(id) { return false; }
        }
        if let Some(loc) = &self.location {
            if !contains_ci(&post.location, loc) { return false; }
        }
        if let Some(q) = &self.q {
            let party = post.party_name.as_deref().unwrap_or("");
            if !(contains_ci(&post.promise_text, q) || contains_ci(&post.politician_name, q) || contains_ci(party, q)) {
                return false;
            }
        }
        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` so a user term is matched literally by ILIKE.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') { out.push('\\'); }
        out.push(c);
    }
    out.push('%');
    out
}
