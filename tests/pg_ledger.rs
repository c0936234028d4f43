#![cfg(feature = "postgres-store")]

use chrono::NaiveDate;
use neta::ads::FeedCursor;
use neta::feed::{load_page, PageRequest};
use neta::models::{Id, NewParty, NewPolitician, NewPost, NewVote, VoteDirection};
use neta::ranking::{FeedFilter, SortMode};
use neta::repo::pg::PgRepo;
use neta::repo::{PartyRepo, PoliticianRepo, PostRepo, RepoError, VoteRepo};
use sqlx::postgres::PgPoolOptions;

async fn repo() -> Option<PgRepo> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    };
    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.expect("connect");
    let repo = PgRepo::new(pool);
    repo.migrate().await.expect("migrate");
    Some(repo)
}

fn vote(post_id: i64, voter: &str, direction: VoteDirection, day: NaiveDate) -> NewVote {
    NewVote { post_id, voter_id: voter.into(), direction, vote_date: day }
}

#[actix_web::test]
async fn pg_ledger_enforces_uniqueness_and_quota() {
    let Some(repo) = repo().await else { return };
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let pol = repo
        .create_politician(NewPolitician { name: format!("pg-{tag}"), party_id: None, bio: None, photo_path: None })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for n in 0..4 {
        let post = repo
            .create_post(NewPost {
                politician_id: pol.id,
                party_id: None,
                promise_text: format!("promise {n}"),
                location: "Kathmandu".into(),
                video_path: Some(format!("posts/{tag}-{n}.mp4")),
            })
            .await
            .unwrap();
        ids.push(post.id);
    }
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let voter = format!("voter-{tag}");

    repo.record_vote(vote(ids[0], &voter, VoteDirection::Up, today), 3).await.unwrap();
    let dup = repo.record_vote(vote(ids[0], &voter, VoteDirection::Down, today), 3).await;
    assert!(matches!(dup, Err(RepoError::DuplicateVote)));

    repo.record_vote(vote(ids[1], &voter, VoteDirection::Up, today), 3).await.unwrap();
    repo.record_vote(vote(ids[2], &voter, VoteDirection::Down, today), 3).await.unwrap();
    let over = repo.record_vote(vote(ids[3], &voter, VoteDirection::Up, today), 3).await;
    assert!(matches!(over, Err(RepoError::QuotaExceeded)));
    assert_eq!(repo.votes_cast_on(&voter, today).await.unwrap(), 3);

    // next day the same pair is allowed again
    let tomorrow = today.succ_opt().unwrap();
    repo.record_vote(vote(ids[0], &voter, VoteDirection::Up, tomorrow), 3).await.unwrap();

    let agg = repo.get_feed_post(ids[0]).await.unwrap();
    assert_eq!((agg.upvotes, agg.downvotes, agg.score), (2, 0, 2));
    let agg = repo.get_feed_post(ids[2]).await.unwrap();
    assert_eq!((agg.upvotes, agg.downvotes, agg.score), (0, 1, -1));

    let missing = repo.record_vote(vote(i64::MAX, &voter, VoteDirection::Up, tomorrow), 3).await;
    assert!(matches!(missing, Err(RepoError::NotFound)));

    repo.delete_politician(pol.id).await.unwrap();
}

#[actix_web::test]
async fn pg_feed_filters_sorts_and_pages() {
    let Some(repo) = repo().await else { return };
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let party = repo
        .create_party(NewParty { name: format!("pg-party-{tag}"), description: None, logo_path: None })
        .await
        .unwrap();
    let pol = repo
        .create_politician(NewPolitician { name: format!("pg-pol-{tag}"), party_id: Some(party.id), bio: None, photo_path: None })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for (n, (text, location)) in [
        ("roads 100% paved", "Kathmandu"),
        ("new bridge", "Pokhara"),
        ("school meals", "kathmandu-3"),
        ("100 percent water", "Lalitpur"),
        ("hospital", "Pokhara"),
    ]
    .into_iter()
    .enumerate()
    {
        let post = repo
            .create_post(NewPost {
                politician_id: pol.id,
                party_id: None,
                promise_text: text.into(),
                location: location.into(),
                video_path: Some(format!("posts/{tag}-{n}.mp4")),
            })
            .await
            .unwrap();
        ids.push(post.id);
    }
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    for (post, voter, dir) in [
        (0, "a", VoteDirection::Up),
        (0, "b", VoteDirection::Down),
        (1, "a", VoteDirection::Up),
        (1, "b", VoteDirection::Up),
        (2, "a", VoteDirection::Down),
        (2, "b", VoteDirection::Down),
        (4, "a", VoteDirection::Up),
    ] {
        repo.record_vote(vote(ids[post], &format!("{voter}-{tag}"), dir, day), 30).await.unwrap();
    }

    let mine = FeedFilter { politician_id: Some(pol.id), ..FeedFilter::default() };
    let order = |posts: Vec<neta::models::FeedPost>| -> Vec<Id> { posts.into_iter().map(|p| p.id).collect() };
    let at = |idx: &[usize]| -> Vec<Id> { idx.iter().map(|&i| ids[i]).collect() };

    for (sort, expected) in [
        (SortMode::Trending, [1, 4, 3, 0, 2]),
        (SortMode::New, [4, 3, 2, 1, 0]),
        (SortMode::Optimistic, [1, 4, 0, 3, 2]),
        (SortMode::Pessimistic, [2, 0, 4, 3, 1]),
    ] {
        let got = repo.query_feed(&mine, sort, 10, 0).await.unwrap();
        assert_eq!(order(got), at(&expected), "{}", sort.as_str());
    }

    // location is a case-insensitive substring match
    let loc = FeedFilter { location: Some("KATHMANDU".into()), ..mine.clone() };
    assert_eq!(repo.count_feed(&loc).await.unwrap(), 2);
    assert_eq!(order(repo.query_feed(&loc, SortMode::New, 10, 0).await.unwrap()), at(&[2, 0]));

    // wildcard characters in the search term match literally
    let pct = FeedFilter { q: Some("100%".into()), ..mine.clone() };
    assert_eq!(order(repo.query_feed(&pct, SortMode::New, 10, 0).await.unwrap()), at(&[0]));
    let under = FeedFilter { q: Some("100_".into()), ..mine.clone() };
    assert_eq!(repo.count_feed(&under).await.unwrap(), 0);

    // q also matches party and politician names
    let by_party = FeedFilter { q: Some(format!("party-{tag}")), ..FeedFilter::default() };
    assert_eq!(repo.count_feed(&by_party).await.unwrap(), 5);
    let by_pol = FeedFilter { party_id: Some(party.id), q: Some(format!("POL-{tag}")), ..FeedFilter::default() };
    assert_eq!(repo.count_feed(&by_pol).await.unwrap(), 5);

    let page = |n: i64| PageRequest { page: n, limit: 2 };
    let first = load_page(&repo, &mine, SortMode::New, page(1), FeedCursor::fresh(), 20).await.unwrap();
    assert_eq!(order(first.posts), at(&[4, 3]));
    assert_eq!((first.total, first.total_pages, first.has_more), (5, 3, true));

    let last = load_page(&repo, &mine, SortMode::New, page(3), FeedCursor::resume(3, 0), 20).await.unwrap();
    assert_eq!(order(last.posts), at(&[0]));
    assert!(!last.has_more);

    let past = load_page(&repo, &mine, SortMode::New, page(4), FeedCursor::resume(4, 0), 20).await.unwrap();
    assert!(past.posts.is_empty());
    assert!(past.entries.is_empty());
    assert_eq!((past.total, past.has_more), (5, false));

    repo.delete_politician(pol.id).await.unwrap();
    repo.delete_party(party.id).await.unwrap();
}
