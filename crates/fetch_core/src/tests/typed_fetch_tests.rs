use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::typed_fetch::{FetchError, TypedClient};
use shared::domain::{Post, User};

async fn spawn_api(router: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn users_payload() -> serde_json::Value {
    json!([{
        "id": 1,
        "name": "Leanne Graham",
        "username": "Bret",
        "email": "Sincere@april.biz",
        "phone": "1-770-736-8031",
        "website": "hildegard.org",
        "company": { "name": "Romaguera-Crona" }
    }])
}

#[tokio::test]
async fn success_body_parses_into_expected_shape() {
    let base = spawn_api(Router::new().route("/users", get(|| async { Json(users_payload()) }))).await;

    let client = TypedClient::new();
    let users: Vec<User> = client
        .get_json(&format!("{base}/users"), &CancellationToken::new())
        .await
        .expect("fetch users");

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Leanne Graham");
    assert_eq!(users[0].website, "hildegard.org");
}

#[tokio::test]
async fn http_failure_carries_status_and_reason_phrase() {
    let base = spawn_api(Router::new().route(
        "/users",
        get(|| async { (StatusCode::NOT_FOUND, "missing") }),
    ))
    .await;

    let client = TypedClient::new();
    let err = client
        .get_json::<Vec<User>>(&format!("{base}/users"), &CancellationToken::new())
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        FetchError::Http {
            status: 404,
            status_text: "Not Found".to_string(),
        }
    );
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Not Found");
}

#[tokio::test]
async fn unparsable_body_maps_to_decode_error() {
    let base = spawn_api(Router::new().route("/posts", get(|| async { "this is not json" }))).await;

    let client = TypedClient::new();
    let err = client
        .get_json::<Vec<Post>>(&format!("{base}/posts"), &CancellationToken::new())
        .await
        .expect_err("must fail");

    assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn unreachable_server_maps_to_transport_error() {
    // Bind then drop the listener so the port is known-dead.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = TypedClient::new();
    let err = client
        .get_json::<Vec<User>>(&format!("http://{addr}/users"), &CancellationToken::new())
        .await
        .expect_err("must fail");

    assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn pre_cancelled_token_short_circuits_without_a_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let route_hits = Arc::clone(&hits);
    let base = spawn_api(Router::new().route(
        "/users",
        get(move || {
            let hits = Arc::clone(&route_hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(users_payload())
            }
        }),
    ))
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = TypedClient::new();
    let err = client
        .get_json::<Vec<User>>(&format!("{base}/users"), &cancel)
        .await
        .expect_err("must be cancelled");

    assert_eq!(err, FetchError::Cancelled);
    assert_eq!(err.to_string(), "request cancelled");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_mid_flight_wins_over_a_slow_response() {
    let base = spawn_api(Router::new().route(
        "/users",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(users_payload())
        }),
    ))
    .await;

    let cancel = CancellationToken::new();
    let client = TypedClient::new();
    let request = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            client
                .get_json::<Vec<User>>(&format!("{base}/users"), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let result = request.await.expect("task join");
    assert_eq!(result, Err(FetchError::Cancelled));
}
