#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use neta::auth::{create_jwt, hash_password};
use neta::clock::FixedClock;
use neta::models::{Ad, NewAd, NewParty, NewPolitician, NewPost, Party, Politician, Post};
use neta::repo::inmem::InMemRepo;
use neta::repo::{AdRepo, AdminRepo, PartyRepo, PoliticianRepo, PostRepo};
use neta::storage::{MediaStore, MediaStoreError};
use neta::AppState;

#[derive(Default)]
pub struct MockMediaStore {
    inner: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

#[async_trait::async_trait]
impl MediaStore for MockMediaStore {
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        let mut m = self.inner.lock().unwrap();
        if m.contains_key(key) { return Err(MediaStoreError::Duplicate); }
        m.insert(key.to_string(), (bytes.to_vec(), mime.to_string()));
        Ok(())
    }
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), MediaStoreError> {
        let m = self.inner.lock().unwrap();
        m.get(key).cloned().ok_or(MediaStoreError::NotFound)
    }
}

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const ADMIN_EMAIL: &str = "admin@example.org";
pub const ADMIN_PASSWORD: &str = "hunter2-but-longer";

pub fn set_secret() {
    std::env::set_var("JWT_SECRET", SECRET);
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Ephemeral repo, mock media, fixed clock on 2024-06-01.
pub fn state(repo: &InMemRepo) -> (AppState, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(day(2024, 6, 1)));
    let st = AppState::new(Arc::new(repo.clone()), Arc::new(MockMediaStore::default())).with_clock(clock.clone());
    (st, clock)
}

pub async fn party(repo: &InMemRepo, name: &str) -> Party {
    repo.create_party(NewParty { name: name.into(), description: None, logo_path: Some(format!("parties/{name}.png")) })
        .await
        .unwrap()
}

pub async fn politician(repo: &InMemRepo, name: &str, party_id: Option<i64>) -> Politician {
    repo.create_politician(NewPolitician { name: name.into(), party_id, bio: None, photo_path: None })
        .await
        .unwrap()
}

pub async fn post(repo: &InMemRepo, politician_id: i64, text: &str, location: &str) -> Post {
    repo.create_post(NewPost {
        politician_id,
        party_id: None,
        promise_text: text.into(),
        location: location.into(),
        video_path: Some(format!("posts/{}.mp4", text.replace(' ', "-"))),
    })
    .await
    .unwrap()
}

pub async fn ad(repo: &InMemRepo, title: &str) -> Ad {
    repo.create_ad(NewAd { title: title.into(), contact_url: "https://example.org".into(), image_path: Some(format!("ads/{title}.png")) })
        .await
        .unwrap()
}

/// Seeds the admin account and returns a bearer token for it.
pub async fn admin_token(repo: &InMemRepo) -> String {
    set_secret();
    let admin = repo.upsert_admin(ADMIN_EMAIL, &hash_password(ADMIN_PASSWORD).unwrap()).await.unwrap();
    create_jwt(admin.id, &admin.email).unwrap()
}
