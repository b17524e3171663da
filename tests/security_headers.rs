#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App, HttpResponse};
use folio::repo::inmem::InMemRepo;
use folio::{config, AppConfig, AppState, SecurityHeaders};
use std::sync::Arc;

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(Arc::new(InMemRepo::ephemeral()), AppConfig::degraded()))
}

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    let app = test::init_service(App::new().wrap(SecurityHeaders::from_env()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/home").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert!(headers.get("content-security-policy").unwrap().to_str().unwrap().contains("img-src 'self' data: https:"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "strict-origin-when-cross-origin");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("cache-control").is_none(), "public pages may be cached");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
#[serial_test::serial]
async fn test_private_routes_are_not_cached() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::default()).app_data(state()).configure(config)).await;
    // rejected requests still carry the header
    for uri in ["/api/dashboard/stats", "/api/albums", "/api/auth/me"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store", "{uri}");
    }
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts() {
    std::env::set_var("ENABLE_HSTS", "1");
    let app = test::init_service(App::new().wrap(SecurityHeaders::from_env()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get("strict-transport-security").unwrap(),
        "max-age=63072000; includeSubDomains"
    );
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_builder_can_disable_hsts_even_when_env_set() {
    std::env::set_var("ENABLE_HSTS", "true");
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env().with_hsts(false))
            .app_data(state())
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_none());
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_existing_csp_header_preserved() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::from_env()).route(
        "/custom",
        web::get().to(|| async {
            HttpResponse::Ok()
                .insert_header((actix_web::http::header::CONTENT_SECURITY_POLICY, "custom-src 'none'"))
                .finish()
        }),
    ))
    .await;
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    let csp = resp.headers().get("content-security-policy").unwrap().to_str().unwrap();
    assert_eq!(csp, "custom-src 'none'");
}
