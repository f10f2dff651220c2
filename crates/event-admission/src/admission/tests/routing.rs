use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::admission::router::{lottery_handler, USER_ID_HEADER, USER_ROLES_HEADER};
use crate::admission::EntrantStatus::*;
use crate::admission::{admission_router, AdmissionController, AdmissionSettings};
use crate::store::MemoryStore;

fn router_for(store: &MemoryStore) -> Router {
    admission_router(Arc::new(controller(store)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn lottery_handler_reports_missing_limit_as_unprocessable() {
    let store = seeded_store(None, &[(Waiting, &["u1"])]);
    let controller = Arc::new(controller(&store));

    let response = lottery_handler::<MemoryStore>(State(controller), Path(EVENT.to_string())).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().is_some());
}

#[tokio::test]
async fn lottery_route_returns_draw_result() {
    let store = seeded_store(Some(1), &[(Waiting, &["u1", "u2"])]);
    let response = router_for(&store)
        .oneshot(post_empty(&format!("/api/v1/events/{EVENT}/lottery")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["result"], "applied");
    assert_eq!(payload["detail"]["invited"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["detail"]["uninvited"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn pool_route_accepts_count() {
    let store = seeded_store(Some(5), &[(Waiting, &["u1", "u2", "u3"])]);
    let response = router_for(&store)
        .oneshot(post_json(
            &format!("/api/v1/events/{EVENT}/pool"),
            json!({ "count": 2 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bucket(&store, Invited).len(), 2);
    assert_eq!(bucket(&store, Uninvited).len(), 1);
}

#[tokio::test]
async fn entrants_route_lists_bucket_and_rejects_unknown_status() {
    let store = seeded_store(Some(5), &[(Waiting, &["u1", "u2"])]);
    let router = router_for(&store);

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/events/{EVENT}/entrants/waiting"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "WAITING");
    assert_eq!(payload["entrants"], json!(["u1", "u2"]));

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/events/{EVENT}/entrants/PENDING"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn join_route_accepts_location_and_conflicts_on_repeat() {
    let store = seeded_store(Some(5), &[]);
    let router = router_for(&store);
    let uri = format!("/api/v1/events/{EVENT}/participants/u1/join");

    let response = router
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "location": { "latitude": 10.0, "longitude": 20.0 } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        value_at(&store, &format!("/WaitingList/{EVENT}/WAITING/u1")),
        Some(json!({ "latitude": 10.0, "longitude": 20.0 }))
    );

    let response = router
        .oneshot(post_empty(&uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn join_route_rejects_malformed_body_without_writing() {
    let store = seeded_store(Some(5), &[]);
    let router = router_for(&store);
    let uri = format!("/api/v1/events/{EVENT}/participants/u9/join");

    let response = router
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "location": { "latitude": "north", "longitude": 20.0 } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(value_at(&store, &format!("/WaitingList/{EVENT}/WAITING/u9")), None);

    let truncated = Request::post(uri.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"location\":"))
        .expect("request builds");
    let response = router
        .clone()
        .oneshot(truncated)
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.write_count(), 0);

    let response = router
        .oneshot(post_empty(&uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        value_at(&store, &format!("/WaitingList/{EVENT}/WAITING/u9")),
        Some(Value::Bool(true))
    );
}

#[tokio::test]
async fn ban_route_rejects_malformed_reason() {
    let store = MemoryStore::from_value(json!({
        "Organizer": { "org-1": { "name": "Rec Centre" } }
    }));
    let request = Request::post("/api/v1/organizers/org-1/ban")
        .header(USER_ID_HEADER, "admin-1")
        .header(USER_ROLES_HEADER, "admin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "reason": 42 }).to_string()))
        .expect("request builds");
    let response = router_for(&store)
        .oneshot(request)
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(value_at(&store, "/Organizer/org-1/bannedFromOrganizer"), None);
}

#[tokio::test]
async fn swap_route_requires_status() {
    let store = seeded_store(Some(5), &[(Waiting, &["u1"])]);
    let router = router_for(&store);
    let uri = format!("/api/v1/events/{EVENT}/participants/u1/swap");

    let response = router
        .clone()
        .oneshot(post_empty(&uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post_json(&uri, json!({ "status": "DECLINED" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bucket(&store, Declined), vec!["u1"]);
}

#[tokio::test]
async fn participant_route_returns_not_found_for_unknown_entrant() {
    let store = seeded_store(Some(5), &[]);
    let response = router_for(&store)
        .oneshot(
            Request::get(format!("/api/v1/events/{EVENT}/participants/nobody"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_route_serves_csv() {
    let store = seeded_store(Some(5), &[]);
    let response = router_for(&store)
        .oneshot(
            Request::get(format!("/api/v1/events/{EVENT}/export.csv"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );
    assert_eq!(read_text_body(response).await, "userId,name,email,phone\n");
}

#[tokio::test]
async fn ban_route_checks_caller_roles() {
    let store = MemoryStore::from_value(json!({
        "Organizer": { "org-1": { "name": "Rec Centre" } }
    }));
    let router = router_for(&store);

    let forbidden = Request::post("/api/v1/organizers/org-1/ban")
        .header(USER_ID_HEADER, "someone")
        .header(USER_ROLES_HEADER, "entrant,organizer")
        .body(Body::empty())
        .expect("request builds");
    let response = router.clone().oneshot(forbidden).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let anonymous = post_empty("/api/v1/organizers/org-1/ban");
    let response = router.clone().oneshot(anonymous).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let allowed = Request::post("/api/v1/organizers/org-1/ban")
        .header(USER_ID_HEADER, "admin-1")
        .header(USER_ROLES_HEADER, "admin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "reason": "Fraud" }).to_string()))
        .expect("request builds");
    let response = router.oneshot(allowed).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        value_at(&store, "/Organizer/org-1/banReason"),
        Some(json!("Fraud"))
    );
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let controller = Arc::new(AdmissionController::in_process(
        Arc::new(UnavailableStore),
        AdmissionSettings::default(),
    ));
    let response = admission_router(controller)
        .oneshot(post_empty(&format!("/api/v1/events/{EVENT}/pool/auto")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
