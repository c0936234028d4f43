use actix_web::cookie::Cookie;
use actix_web::{dev::Payload, test, FromRequest};
use neta::auth::{create_jwt, decode_jwt, hash_password, verify_password, Auth, ADMIN_COOKIE};
use serial_test::serial;
use std::env;

fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

#[actix_web::test]
#[serial]
async fn jwt_roundtrip_via_bearer() {
    set_secret();
    let token = create_jwt(7, "ops@example.org").expect("token");
    let req = test::TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.0.sub, "ops@example.org");
    assert_eq!(auth.0.admin_id, 7);
}

#[actix_web::test]
#[serial]
async fn session_cookie_is_accepted() {
    set_secret();
    let token = create_jwt(3, "a@b.c").unwrap();
    let req = test::TestRequest::default()
        .cookie(Cookie::new(ADMIN_COOKIE, token))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("cookie auth");
    assert_eq!(auth.0.admin_id, 3);
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_missing_and_invalid_tokens() {
    set_secret();
    let req = test::TestRequest::default().to_http_request();
    assert!(Auth::from_request(&req, &mut Payload::None).await.is_err());

    let req = test::TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    assert!(Auth::from_request(&req, &mut Payload::None).await.is_err());
}

#[actix_web::test]
#[serial]
async fn token_signed_with_other_secret_is_rejected() {
    env::set_var("JWT_SECRET", "another-secret-that-is-32-bytes-long");
    let token = create_jwt(1, "x@y.z").unwrap();
    set_secret();
    assert!(decode_jwt(&token).is_err());
}

#[std::prelude::v1::test]
fn argon2_hashes_verify() {
    let hash = hash_password("s3cret-pass").unwrap();
    assert_ne!(hash, "s3cret-pass");
    assert!(verify_password("s3cret-pass", &hash));
    assert!(!verify_password("wrong", &hash));
    // salts differ between hashes of the same password
    assert_ne!(hash, hash_password("s3cret-pass").unwrap());
}
