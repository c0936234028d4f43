#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App, HttpResponse};
use neta::repo::inmem::InMemRepo;
use neta::{config, SecurityHeaders};

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    std::env::remove_var("CSP");
    let repo = InMemRepo::ephemeral();
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(web::Data::new(st))
            .configure(config)
    ).await;
    let req = test::TestRequest::get().uri("/api/v1/posts").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("media-src 'self' https:"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("permissions-policy").is_some());
    assert!(headers.get("strict-transport-security").is_none());
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts() {
    std::env::set_var("ENABLE_HSTS", "1");
    let repo = InMemRepo::ephemeral();
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(web::Data::new(st))
            .configure(config)
    ).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_some());
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_builder_can_disable_hsts_even_when_env_set() {
    std::env::set_var("ENABLE_HSTS", "true");
    let repo = InMemRepo::ephemeral();
    let (st, _clock) = common::state(&repo);
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env().with_hsts(false))
            .app_data(web::Data::new(st))
            .configure(config)
    ).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_none());
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
async fn test_existing_csp_header_preserved() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .route("/custom", web::get().to(|| async {
                HttpResponse::Ok()
                    .insert_header((actix_web::http::header::CONTENT_SECURITY_POLICY, "custom-src 'none'"))
                    .finish()
            }))
    ).await;
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    let csp = resp.headers().get("content-security-policy").unwrap().to_str().unwrap();
    assert_eq!(csp, "custom-src 'none'");
}
