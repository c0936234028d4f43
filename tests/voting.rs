#![cfg(feature = "inmem-store")]

mod common;

use actix_web::cookie::Cookie;
use actix_web::{test, web, App};
use neta::config::Settings;
use neta::repo::inmem::InMemRepo;
use neta::repo::VoteRepo;
use serde_json::{json, Value};

fn vote(voter: &str, post_id: i64, dir: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/votes")
        .cookie(Cookie::new("anon_id", voter.to_string()))
        .set_json(json!({ "postId": post_id, "voteType": dir }))
}

#[actix_web::test]
async fn votes_show_up_in_trending_feed_and_revote_conflicts() {
    let repo = InMemRepo::ephemeral();
    let a = common::party(&repo, "A").await;
    let p = common::politician(&repo, "P", Some(a.id)).await;
    let i1 = common::post(&repo, p.id, "build bridge", "Kathmandu").await;
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(neta::config)).await;

    for (voter, dir) in [("v1", "up"), ("v2", "up"), ("v3", "up"), ("v4", "down")] {
        let resp = test::call_service(&app, vote(voter, i1.id, dir).to_request()).await;
        assert_eq!(resp.status(), 200, "{voter}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Vote accepted");
    }

    let req = test::TestRequest::get().uri("/api/v1/posts?sort=trending").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let first = &body["posts"][0];
    assert_eq!(first["id"], i1.id);
    assert_eq!(first["upvotes"], 3);
    assert_eq!(first["downvotes"], 1);
    assert_eq!(first["score"], 2);
    assert_eq!(first["party_id"], a.id);

    let resp = test::call_service(&app, vote("v1", i1.id, "up").to_request()).await;
    assert_eq!(resp.status(), 409);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Already voted for this post today");
}

#[actix_web::test]
async fn quota_exhaustion_returns_429_and_resets_next_day() {
    let repo = InMemRepo::ephemeral();
    let p = common::politician(&repo, "P", None).await;
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(common::post(&repo, p.id, &format!("promise {n}"), "Pokhara").await.id);
    }
    let (st, clock) = common::state(&repo);
    let st = st.with_settings(Settings { daily_vote_quota: 3, ..Settings::default() });
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(neta::config)).await;

    for id in &ids[..3] {
        assert_eq!(test::call_service(&app, vote("quota-voter", *id, "down").to_request()).await.status(), 200);
    }
    let resp = test::call_service(&app, vote("quota-voter", ids[3], "down").to_request()).await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Daily vote limit reached (3)");
    assert_eq!(repo.votes_cast_on("quota-voter", common::day(2024, 6, 1)).await.unwrap(), 3);

    clock.advance_days(1);
    assert_eq!(test::call_service(&app, vote("quota-voter", ids[3], "down").to_request()).await.status(), 200);
}

#[actix_web::test]
async fn invalid_payloads_are_400() {
    let repo = InMemRepo::ephemeral();
    let p = common::politician(&repo, "P", None).await;
    let post = common::post(&repo, p.id, "clean river", "Biratnagar").await;
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(neta::config)).await;

    for payload in [
        json!({ "voteType": "up" }),
        json!({ "postId": post.id, "voteType": "meh" }),
        json!({ "postId": "abc", "voteType": "up" }),
        json!({ "postId": -1, "voteType": "up" }),
        json!({ "postId": 424242, "voteType": "up" }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/v1/votes")
            .cookie(Cookie::new("anon_id", "bad-payload-voter"))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "{payload}");
    }

    // malformed JSON body goes through the same error shape
    let req = test::TestRequest::post()
        .uri("/api/v1/votes")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());

    // a numeric string id is accepted
    let req = test::TestRequest::post()
        .uri("/api/v1/votes")
        .cookie(Cookie::new("anon_id", "string-id-voter"))
        .set_json(json!({ "postId": post.id.to_string(), "voteType": "up" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn first_visit_mints_anon_cookie_and_reuses_it() {
    let repo = InMemRepo::ephemeral();
    let p = common::politician(&repo, "P", None).await;
    let post = common::post(&repo, p.id, "free wifi", "Dharan").await;
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(neta::config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/posts").to_request()).await;
    assert_eq!(resp.status(), 200);
    let minted = resp
        .response()
        .cookies()
        .find(|c| c.name() == "anon_id")
        .map(|c| (c.value().to_string(), c.http_only(), c.path().map(str::to_string)))
        .expect("anon_id cookie");
    assert!(!minted.0.is_empty());
    assert_eq!(minted.1, Some(true));
    assert_eq!(minted.2.as_deref(), Some("/"));

    // returning visitor: no new cookie, vote attributed to the existing identity
    let resp = test::call_service(&app, vote(&minted.0, post.id, "up").to_request()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.response().cookies().all(|c| c.name() != "anon_id"));
    assert_eq!(repo.votes_cast_on(&minted.0, common::day(2024, 6, 1)).await.unwrap(), 1);

    // a vote without any cookie still gets one minted
    let req = test::TestRequest::post()
        .uri("/api/v1/votes")
        .set_json(json!({ "postId": post.id, "voteType": "down" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.response().cookies().any(|c| c.name() == "anon_id"));
}

#[actix_web::test]
async fn rejected_vote_still_mints_anon_cookie() {
    let repo = InMemRepo::ephemeral();
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(neta::config)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/votes")
        .set_json(json!({ "postId": 0, "voteType": "sideways" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let minted = resp
        .response()
        .cookies()
        .find(|c| c.name() == "anon_id")
        .map(|c| c.value().to_string())
        .expect("anon_id cookie on rejection");
    assert!(!minted.is_empty());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid vote payload");
}
