//! End-to-end checks of the `/{action}/{token}` view against the in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;

use privateurl::config;
use privateurl::hooks::HookRegistry;
use privateurl::models::private_url::PrivateUrl;
use privateurl::service::{CreatePrivateUrl, PrivateUrls};
use privateurl::store::MemoryStore;
use privateurl::{api, AppState};

fn ok_hook(_: &Parts, url: Option<&PrivateUrl>, _: &str) -> Option<Response> {
    let url = url?;
    Some((StatusCode::OK, format!("ok {}", url.usage_count)).into_response())
}

fn fail_hook(_: &Parts, _: Option<&PrivateUrl>, _: &str) -> Option<Response> {
    Some((StatusCode::OK, "fail").into_response())
}

fn app_with(hooks: HookRegistry, vars: &[(&str, &str)]) -> (Router, PrivateUrls, MemoryStore) {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let cfg = config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    let store = MemoryStore::new();
    let urls = PrivateUrls::new(Arc::new(store.clone()));
    let state = Arc::new(AppState {
        urls: urls.clone(),
        hooks,
        config: cfg,
    });
    (api::router(state), urls, store)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_single_use_token_redirects_once_then_404() {
    let (app, urls, _) = app_with(HookRegistry::new(), &[]);
    let url = urls.create(CreatePrivateUrl::new("test2")).await.unwrap();
    let path = format!("/test2/{}", url.token);

    let first = get(&app, &path).await;
    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(first.headers()["location"], "/");

    let second = get(&app, &path).await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);

    let stored = urls.find("test2", &url.token).await.unwrap().unwrap();
    assert_eq!(stored.usage_count, 1);
    assert!(stored.first_used_at.is_some());
}

#[tokio::test]
async fn test_hooks_override_default_responses() {
    let hooks = HookRegistry::new()
        .on_success("test", ok_hook)
        .on_failure("test", fail_hook);
    let (app, urls, _) = app_with(hooks, &[]);
    let url = urls.create(CreatePrivateUrl::new("test")).await.unwrap();

    let first = get(&app, &format!("/test/{}", url.token)).await;
    assert_eq!(first.status(), StatusCode::OK);
    // success hooks see the record after consumption
    assert_eq!(body_text(first).await, "ok 1");

    let second = get(&app, &format!("/test/{}", url.token)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_text(second).await, "fail");

    // unknown action: no hooks registered, default 404
    let other = get(&app, &format!("/none/{}", url.token)).await;
    assert_eq!(other.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failure_hook_sees_unavailable_record() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_hook = seen.clone();
    let hooks = HookRegistry::new().on_failure(
        "test",
        move |_: &Parts, url: Option<&PrivateUrl>, _: &str| {
            if url.is_some() {
                seen_in_hook.fetch_add(1, Ordering::SeqCst);
            }
            None
        },
    );
    let (app, urls, _) = app_with(hooks, &[]);
    let expired = urls
        .create(CreatePrivateUrl::new("test").expire(Utc::now() - chrono::Duration::seconds(1)))
        .await
        .unwrap();

    let resp = get(&app, &format!("/test/{}", expired.token)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    let stored = urls.find("test", &expired.token).await.unwrap().unwrap();
    assert_eq!(stored.usage_count, 0);
}

#[tokio::test]
async fn test_malformed_path_skips_hooks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_hook = calls.clone();
    let hooks = HookRegistry::new().on_failure(
        "test",
        move |_: &Parts, _: Option<&PrivateUrl>, _: &str| {
            calls_in_hook.fetch_add(1, Ordering::SeqCst);
            Some(StatusCode::GONE.into_response())
        },
    );
    let (app, _, _) = app_with(hooks, &[]);

    let too_long = "a".repeat(66);
    for path in [
        "/test/bad.token",
        "/test/%20",
        "/test/%FF",
        "/bad%2Eaction/token",
        &format!("/test/{}", too_long),
    ] {
        let resp = get(&app, path).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", path);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let resp = get(&app, "/test/missing-token").await;
    assert_eq!(resp.status(), StatusCode::GONE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_auto_delete_removes_exhausted_record() {
    let (app, urls, store) = app_with(HookRegistry::new(), &[]);
    let url = urls
        .create(CreatePrivateUrl::new("test").usage_limit(2).auto_delete(true))
        .await
        .unwrap();
    let path = format!("/test/{}", url.token);

    assert_eq!(get(&app, &path).await.status(), StatusCode::FOUND);
    assert_eq!(store.len().await, 1);
    assert_eq!(get(&app, &path).await.status(), StatusCode::FOUND);
    assert_eq!(store.len().await, 0);
    assert_eq!(get(&app, &path).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prefix_and_redirect_from_config() {
    let (app, urls, _) = app_with(
        HookRegistry::new(),
        &[
            ("PRIVATEURL_PATH_PREFIX", "p"),
            ("PRIVATEURL_SUCCESS_REDIRECT", "/welcome"),
        ],
    );
    let url = urls.create(CreatePrivateUrl::new("invite")).await.unwrap();

    let unprefixed = get(&app, &format!("/invite/{}", url.token)).await;
    assert_eq!(unprefixed.status(), StatusCode::NOT_FOUND);

    let resp = get(&app, &format!("/p/invite/{}", url.token)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["location"], "/welcome");
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let (app, _, _) = app_with(HookRegistry::new(), &[]);
    let resp = get(&app, "/test/unknown").await;

    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.headers()["referrer-policy"], "no-referrer");
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (app, urls, _) = app_with(HookRegistry::new(), &[]);
    let url = urls.create(CreatePrivateUrl::new("test")).await.unwrap();
    get(&app, &format!("/test/{}", url.token)).await;
    get(&app, &format!("/test/{}", url.token)).await;

    let health = get(&app, "/healthz").await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(body_text(health).await, "ok");

    let metrics = body_text(get(&app, "/metrics").await).await;
    assert!(metrics.contains("privateurl_created_total 1"));
    assert!(metrics.contains("privateurl_consumed_total{outcome=\"recorded\"} 1"));
    assert!(metrics.contains("privateurl_rejected_total{reason=\"unavailable\"} 1"));
}
