use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::*;
use crate::ranking::{rank, tally_votes, Tally};

const SNAPSHOT_FILE: &str = "state.json";

#[derive(Default, Serialize, Deserialize)]
struct State {
    parties: HashMap<Id, Party>,
    politicians: HashMap<Id, Politician>,
    posts: HashMap<Id, Post>,
    ads: HashMap<Id, Ad>,
    submissions: HashMap<Id, Submission>,
    votes: Vec<Vote>,
    admins: HashMap<Id, Admin>,
    next_id: Id,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn feed_post(&self, post: &Post, tally: Tally) -> Option<FeedPost> {
        let pol = self.politicians.get(&post.politician_id)?;
        let party = post.party_id.and_then(|id| self.parties.get(&id));
        let mut fp = FeedPost {
            id: post.id,
            promise_text: post.promise_text.clone(),
            location: post.location.clone(),
            video_path: post.video_path.clone(),
            created_at: post.created_at,
            politician_id: pol.id,
            politician_name: pol.name.clone(),
            politician_photo: pol.photo_path.clone(),
            party_id: party.map(|p| p.id),
            party_name: party.map(|p| p.name.clone()),
            party_logo: party.and_then(|p| p.logo_path.clone()),
            upvotes: 0,
            downvotes: 0,
            score: 0,
        };
        tally.apply(&mut fp);
        Some(fp)
    }

    /// Every post that joins to a politician, with aggregates.
    fn feed_posts(&self) -> Vec<FeedPost> {
        let tallies = tally_votes(&self.votes);
        self.posts
            .values()
            .filter_map(|p| self.feed_post(p, tallies.get(&p.id).copied().unwrap_or_default()))
            .collect()
    }

    fn resolve_post_party(&self, politician_id: Id, party_id: Option<Id>) -> RepoResult<Option<Id>> {
        let pol = self
            .politicians
            .get(&politician_id)
            .ok_or_else(|| RepoError::Invalid("unknown politician".into()))?;
        match party_id {
            Some(id) if self.parties.contains_key(&id) => Ok(Some(id)),
            Some(_) => Err(RepoError::Invalid("unknown party".into())),
            None => Ok(pol.party_id),
        }
    }

    fn check_party(&self, party_id: Option<Id>) -> RepoResult<()> {
        match party_id {
            Some(id) if !self.parties.contains_key(&id) => Err(RepoError::Invalid("unknown party".into())),
            _ => Ok(()),
        }
    }

    fn remove_posts_where(&mut self, pred: impl Fn(&Post) -> bool) {
        let doomed: Vec<Id> = self.posts.values().filter(|p| pred(p)).map(|p| p.id).collect();
        for id in &doomed {
            self.posts.remove(id);
        }
        self.votes.retain(|v| !doomed.contains(&v.post_id));
    }
}

/// Window a sorted vector and report the full length.
fn page_of<T: Clone>(mut items: Vec<T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let start = offset.clamp(0, total) as usize;
    let end = offset.saturating_add(limit.max(0)).clamp(0, total) as usize;
    let page = items.drain(start..end).collect();
    (page, total)
}

/// Process-local store, optionally snapshotted to JSON after every write.
#[derive(Clone)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot: Option<Arc<Snapshot>>,
}

/// On-disk snapshot target. `written` holds the sequence number of the last
/// snapshot that reached disk so a slower writer never replaces newer state.
struct Snapshot {
    path: PathBuf,
    seq: AtomicU64,
    written: Mutex<u64>,
}

impl Snapshot {
    fn new(path: PathBuf) -> Self {
        Self { path, seq: AtomicU64::new(0), written: Mutex::new(0) }
    }

    fn write(&self, seq: u64, bytes: &[u8]) {
        let Ok(mut written) = self.written.lock() else {
            tracing::error!("snapshot writer lock poisoned");
            return;
        };
        if *written >= seq {
            return;
        }
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::error!(dir = %dir.display(), error = %e, "failed to create snapshot directory");
                return;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let res = std::fs::File::create(&tmp)
            .and_then(|mut f| f.write_all(bytes).and_then(|_| f.sync_all()))
            .and_then(|_| std::fs::rename(&tmp, &self.path));
        match res {
            Ok(()) => *written = seq,
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "failed to write snapshot"),
        }
    }
}

impl InMemRepo {
    fn data_dir() -> PathBuf {
        std::env::var("NETA_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data"))
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    tracing::info!(path = %path.display(), "loaded in-memory snapshot");
                    s
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to parse snapshot");
                    Self::quarantine(path);
                    State::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot; starting empty");
                State::default()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read snapshot");
                Self::quarantine(path);
                State::default()
            }
        }
    }

    /// Moves an unreadable snapshot aside so the next write cannot overwrite it.
    fn quarantine(path: &Path) {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        let aside = PathBuf::from(name);
        match std::fs::rename(path, &aside) {
            Ok(()) => tracing::warn!(kept = %aside.display(), "unreadable snapshot moved aside; starting empty"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "could not move unreadable snapshot aside"),
        }
    }

    /// Persistent store under `NETA_DATA_DIR` (default `data/`).
    pub fn new() -> Self {
        Self::at(Self::data_dir().join(SNAPSHOT_FILE))
    }

    /// Persistent store backed by the snapshot file at `path`.
    pub fn at(path: PathBuf) -> Self {
        let state = Self::load_state_from(&path);
        Self { state: Arc::new(RwLock::new(state)), snapshot: Some(Arc::new(Snapshot::new(path))) }
    }

    /// Store that never touches disk.
    pub fn ephemeral() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())), snapshot: None }
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    /// Serializes under the write guard, then releases it before touching disk.
    fn persist(&self, state: RwLockWriteGuard<'_, State>) {
        let Some(snap) = &self.snapshot else { return };
        let seq = snap.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes = serde_json::to_vec_pretty(&*state);
        drop(state);
        match bytes {
            Ok(bytes) => snap.write(seq, &bytes),
            Err(e) => tracing::error!(error = %e, "failed to serialize snapshot"),
        }
    }
}

impl Default for InMemRepo {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl PartyRepo for InMemRepo {
    async fn list_parties(&self) -> RepoResult<Vec<Party>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.parties.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }
    async fn page_parties(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Party>, i64)> {
        let s = self.read()?;
        let mut v: Vec<_> = s.parties.values().cloned().collect();
        v.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page_of(v, limit, offset))
    }
    async fn get_party(&self, id: Id) -> RepoResult<Party> {
        self.read()?.parties.get(&id).cloned().ok_or(RepoError::NotFound)
    }
    async fn create_party(&self, new: NewParty) -> RepoResult<Party> {
        let mut s = self.write()?;
        let id = s.next_id();
        let party = Party {
            id,
            name: new.name,
            description: new.description,
            logo_path: new.logo_path,
            created_at: Utc::now(),
        };
        s.parties.insert(id, party.clone());
        self.persist(s);
        Ok(party)
    }
    async fn update_party(&self, id: Id, upd: NewParty) -> RepoResult<Party> {
        let mut s = self.write()?;
        let party = s.parties.get_mut(&id).ok_or(RepoError::NotFound)?;
        party.name = upd.name;
        party.description = upd.description;
        if let Some(logo) = upd.logo_path { party.logo_path = Some(logo); }
        let updated = party.clone();
        self.persist(s);
        Ok(updated)
    }
    async fn delete_party(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.parties.remove(&id).ok_or(RepoError::NotFound)?;
        for pol in s.politicians.values_mut().filter(|p| p.party_id == Some(id)) {
            pol.party_id = None;
        }
        for post in s.posts.values_mut().filter(|p| p.party_id == Some(id)) {
            post.party_id = None;
        }
        self.persist(s);
        Ok(())
    }
}

#[async_trait]
impl PoliticianRepo for InMemRepo {
    async fn list_politicians(&self) -> RepoResult<Vec<Politician>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.politicians.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }
    async fn page_politicians(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Politician>, i64)> {
        let s = self.read()?;
        let mut v: Vec<_> = s.politicians.values().cloned().collect();
        v.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page_of(v, limit, offset))
    }
    async fn list_party_members(&self, party_id: Id) -> RepoResult<Vec<Politician>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.politicians.values().filter(|p| p.party_id == Some(party_id)).cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }
    async fn get_politician(&self, id: Id) -> RepoResult<Politician> {
        self.read()?.politicians.get(&id).cloned().ok_or(RepoError::NotFound)
    }
    async fn create_politician(&self, new: NewPolitician) -> RepoResult<Politician> {
        let mut s = self.write()?;
        s.check_party(new.party_id)?;
        let id = s.next_id();
        let pol = Politician {
            id,
            name: new.name,
            party_id: new.party_id,
            bio: new.bio,
            photo_path: new.photo_path,
            created_at: Utc::now(),
        };
        s.politicians.insert(id, pol.clone());
        self.persist(s);
        Ok(pol)
    }
    async fn update_politician(&self, id: Id, upd: NewPolitician) -> RepoResult<Politician> {
        let mut s = self.write()?;
        s.check_party(upd.party_id)?;
        let pol = s.politicians.get_mut(&id).ok_or(RepoError::NotFound)?;
        pol.name = upd.name;
        pol.party_id = upd.party_id;
        pol.bio = upd.bio;
        if let Some(photo) = upd.photo_path { pol.photo_path = Some(photo); }
        let updated = pol.clone();
        self.persist(s);
        Ok(updated)
    }
    async fn delete_politician(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.politicians.remove(&id).ok_or(RepoError::NotFound)?;
        s.remove_posts_where(|p| p.politician_id == id);
        self.persist(s);
        Ok(())
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        self.read()?.posts.get(&id).cloned().ok_or(RepoError::NotFound)
    }
    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        let mut s = self.write()?;
        let party_id = s.resolve_post_party(new.politician_id, new.party_id)?;
        let video_path = new
            .video_path
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RepoError::Invalid("video required".into()))?;
        let id = s.next_id();
        let post = Post {
            id,
            politician_id: new.politician_id,
            party_id,
            promise_text: new.promise_text,
            location: new.location,
            video_path,
            created_at: Utc::now(),
        };
        s.posts.insert(id, post.clone());
        self.persist(s);
        Ok(post)
    }
    async fn update_post(&self, id: Id, upd: NewPost) -> RepoResult<Post> {
        let mut s = self.write()?;
        if !s.posts.contains_key(&id) { return Err(RepoError::NotFound); }
        let party_id = s.resolve_post_party(upd.politician_id, upd.party_id)?;
        let post = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.politician_id = upd.politician_id;
        post.party_id = party_id;
        post.promise_text = upd.promise_text;
        post.location = upd.location;
        if let Some(video) = upd.video_path.filter(|v| !v.trim().is_empty()) { post.video_path = video; }
        let updated = post.clone();
        self.persist(s);
        Ok(updated)
    }
    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if !s.posts.contains_key(&id) { return Err(RepoError::NotFound); }
        s.remove_posts_where(|p| p.id == id);
        self.persist(s);
        Ok(())
    }
    async fn page_posts(&self, limit: i64, offset: i64) -> RepoResult<(Vec<FeedPost>, i64)> {
        let s = self.read()?;
        let mut v = s.feed_posts();
        v.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page_of(v, limit, offset))
    }
    async fn count_feed(&self, filter: &FeedFilter) -> RepoResult<i64> {
        let s = self.read()?;
        Ok(s.feed_posts().iter().filter(|p| filter.matches(p)).count() as i64)
    }
    async fn query_feed(&self, filter: &FeedFilter, sort: SortMode, limit: i64, offset: i64) -> RepoResult<Vec<FeedPost>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.feed_posts().into_iter().filter(|p| filter.matches(p)).collect();
        rank(&mut v, sort);
        Ok(page_of(v, limit, offset).0)
    }
    async fn get_feed_post(&self, id: Id) -> RepoResult<FeedPost> {
        let s = self.read()?;
        let post = s.posts.get(&id).ok_or(RepoError::NotFound)?;
        let tally = tally_votes(s.votes.iter().filter(|v| v.post_id == id)).remove(&id).unwrap_or_default();
        s.feed_post(post, tally).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl AdRepo for InMemRepo {
    async fn recent_ads(&self, limit: i64) -> RepoResult<Vec<Ad>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.ads.values().cloned().collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(page_of(v, limit, 0).0)
    }
    async fn page_ads(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Ad>, i64)> {
        let s = self.read()?;
        let mut v: Vec<_> = s.ads.values().cloned().collect();
        v.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page_of(v, limit, offset))
    }
    async fn get_ad(&self, id: Id) -> RepoResult<Ad> {
        self.read()?.ads.get(&id).cloned().ok_or(RepoError::NotFound)
    }
    async fn create_ad(&self, new: NewAd) -> RepoResult<Ad> {
        let mut s = self.write()?;
        let image_path = new
            .image_path
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RepoError::Invalid("image required".into()))?;
        let id = s.next_id();
        let ad = Ad { id, title: new.title, image_path, contact_url: new.contact_url, created_at: Utc::now() };
        s.ads.insert(id, ad.clone());
        self.persist(s);
        Ok(ad)
    }
    async fn update_ad(&self, id: Id, upd: NewAd) -> RepoResult<Ad> {
        let mut s = self.write()?;
        let ad = s.ads.get_mut(&id).ok_or(RepoError::NotFound)?;
        ad.title = upd.title;
        ad.contact_url = upd.contact_url;
        if let Some(img) = upd.image_path.filter(|v| !v.trim().is_empty()) { ad.image_path = img; }
        let updated = ad.clone();
        self.persist(s);
        Ok(updated)
    }
    async fn delete_ad(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.ads.remove(&id).ok_or(RepoError::NotFound)?;
        self.persist(s);
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepo for InMemRepo {
    async fn create_submission(&self, new: NewSubmission) -> RepoResult<Submission> {
        let mut s = self.write()?;
        let id = s.next_id();
        let sub = Submission {
            id,
            submitter_name: new.submitter_name,
            contact: new.contact,
            politician_name: new.politician_name,
            location: new.location,
            video_url: new.video_url,
            promise_text: new.promise_text,
            created_at: Utc::now(),
        };
        s.submissions.insert(id, sub.clone());
        self.persist(s);
        Ok(sub)
    }
    async fn page_submissions(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Submission>, i64)> {
        let s = self.read()?;
        let mut v: Vec<_> = s.submissions.values().cloned().collect();
        v.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page_of(v, limit, offset))
    }
}

#[async_trait]
impl VoteRepo for InMemRepo {
    async fn record_vote(&self, new: NewVote, daily_quota: i64) -> RepoResult<Vote> {
        // single write lock: quota, duplicate check and insert cannot interleave
        let mut s = self.write()?;
        if !s.posts.contains_key(&new.post_id) { return Err(RepoError::NotFound); }
        let today: Vec<&Vote> = s
            .votes
            .iter()
            .filter(|v| v.voter_id == new.voter_id && v.vote_date == new.vote_date)
            .collect();
        if today.len() as i64 >= daily_quota { return Err(RepoError::QuotaExceeded); }
        if today.iter().any(|v| v.post_id == new.post_id) { return Err(RepoError::DuplicateVote); }
        let id = s.next_id();
        let vote = Vote {
            id,
            post_id: new.post_id,
            voter_id: new.voter_id,
            direction: new.direction,
            vote_date: new.vote_date,
            created_at: Utc::now(),
        };
        s.votes.push(vote.clone());
        self.persist(s);
        Ok(vote)
    }
    async fn votes_cast_on(&self, voter_id: &str, day: NaiveDate) -> RepoResult<i64> {
        let s = self.read()?;
        Ok(s.votes.iter().filter(|v| v.voter_id == voter_id && v.vote_date == day).count() as i64)
    }
}

#[async_trait]
impl AdminRepo for InMemRepo {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Admin> {
        let s = self.read()?;
        s.admins.values().find(|a| a.email.eq_ignore_ascii_case(email)).cloned().ok_or(RepoError::NotFound)
    }
    async fn upsert_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin> {
        let mut s = self.write()?;
        let existing = s.admins.values().find(|a| a.email.eq_ignore_ascii_case(email)).map(|a| a.id);
        let id = match existing {
            Some(id) => id,
            None => s.next_id(),
        };
        let admin = Admin { id, email: email.to_string(), password_hash: password_hash.to_string() };
        s.admins.insert(id, admin.clone());
        self.persist(s);
        Ok(admin)
    }
    async fn dashboard_counts(&self) -> RepoResult<DashboardCounts> {
        let s = self.read()?;
        Ok(DashboardCounts {
            parties: s.parties.len() as i64,
            politicians: s.politicians.len() as i64,
            posts: s.posts.len() as i64,
            ads: s.ads.len() as i64,
            submissions: s.submissions.len() as i64,
        })
    }
    async fn ping(&self) -> RepoResult<()> {
        self.read().map(|_| ())
    }
}
