//! Transport tests against an in-process echo server.

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use cachewire_transport::headers::header_map;
use cachewire_transport::{
    HttpTransport, JsonCodec, MediaType, Payload, RequestOptions, TaskLocalInbound,
    TransportError, TransportSettings,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
struct Echo {
    method: String,
    path: String,
    query: Option<String>,
    headers: HashMap<String, String>,
    body: String,
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    match uri.path() {
        "/fail/json" => (StatusCode::BAD_REQUEST, r#"{"Message":"invalid key"}"#).into_response(),
        "/fail/empty" => (StatusCode::NOT_FOUND, "{}").into_response(),
        "/fail/text" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        path => {
            let headers: serde_json::Map<String, Value> = headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        Value::String(v.to_str().unwrap_or_default().to_string()),
                    )
                })
                .collect();

            Json(json!({
                "method": method.as_str(),
                "path": path,
                "query": uri.query(),
                "headers": headers,
                "body": body,
            }))
            .into_response()
        }
    }
}

async fn start_echo_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn transport_for(addr: SocketAddr) -> HttpTransport {
    HttpTransport::new(TransportSettings {
        default_base_url: Some(format!("http://{addr}")),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_default_base_and_query() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);

    let echo: Echo = transport
        .get_json(
            None,
            "/rest/users",
            RequestOptions::new()
                .with_query("page", Some("2"))
                .with_query("filter", None::<String>),
        )
        .await
        .unwrap();

    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/rest/users");
    assert_eq!(echo.query.as_deref(), Some("page=2"));
    assert!(echo.body.is_empty());
}

#[tokio::test]
async fn test_json_and_text_bodies() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);
    let base = format!("http://{addr}");

    let echo: Echo = transport
        .post_json(
            Some(&base),
            "/items",
            Payload::Json(json!({"name": "x", "gone": null})),
            RequestOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(echo.body, r#"{"name":"x"}"#);
    assert_eq!(echo.headers["content-type"], "application/json");

    let echo: Echo = transport
        .put_json(
            Some(&base),
            "/items/1",
            Payload::from("raw value"),
            RequestOptions::new().with_media_type(MediaType::Text),
        )
        .await
        .unwrap();
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.body, "raw value");
    assert_eq!(echo.headers["content-type"], "text/plain");

    let echo: Echo = transport
        .patch_json(
            Some(&base),
            "/items/1",
            Payload::Json(json!({"a": "b c"})),
            RequestOptions::new().with_media_type(MediaType::FormUrlEncoded),
        )
        .await
        .unwrap();
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.body, "a=b+c");
}

#[tokio::test]
async fn test_codec_override_keeps_nulls() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr).with_codec(JsonCodec::new().with_skip_nulls(false));
    assert!(!transport.codec().skip_nulls());

    let echo: Echo = transport
        .post_json(
            Some(&format!("http://{addr}")),
            "/items",
            Payload::Json(json!({"gone": null})),
            RequestOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(echo.body, r#"{"gone":null}"#);
}

#[tokio::test]
async fn test_inbound_headers_propagate_without_override() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);

    let inbound = header_map([
        ("Authorization", "Bearer from-inbound"),
        ("CorrelationId", "corr-42"),
        ("X-Forwarded-For", "10.0.0.9"),
        ("X-Not-Whitelisted", "nope"),
    ])
    .unwrap();
    let caller = header_map([("Authorization", "Basic caller")]).unwrap();

    let echo: Echo = TaskLocalInbound::scope(inbound, async {
        transport
            .get_json(None, "/x", RequestOptions::new().with_headers(caller))
            .await
    })
    .await
    .unwrap();

    assert_eq!(echo.headers["authorization"], "Basic caller");
    assert_eq!(echo.headers["correlationid"], "corr-42");
    assert_eq!(echo.headers["x-forwarded-for"], "10.0.0.9");
    assert!(!echo.headers.contains_key("x-not-whitelisted"));
}

#[tokio::test]
async fn test_propagation_can_be_disabled() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr).with_inbound(None);
    let inbound = header_map([("CorrelationId", "corr-42")]).unwrap();

    let echo: Echo = TaskLocalInbound::scope(inbound, async {
        transport.get_json(None, "/x", RequestOptions::new()).await
    })
    .await
    .unwrap();

    assert!(!echo.headers.contains_key("correlationid"));
}

#[tokio::test]
async fn test_strict_mode_errors() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);

    let err = transport
        .get_json::<Value>(None, "/fail/json", RequestOptions::new())
        .await
        .unwrap_err();
    match err {
        TransportError::Remote { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid key");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = transport
        .get_bytes(None, "/fail/empty", RequestOptions::new())
        .await
        .unwrap_err();
    match err {
        TransportError::Remote { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = transport
        .delete(None, "/fail/text", RequestOptions::new().strict())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    match err {
        TransportError::Status { body, .. } => assert_eq!(body, "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_strict_returns_raw_response() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);

    let response = transport
        .get(None, "/fail/text", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(response.text().await.unwrap(), "boom");

    let response = transport
        .head(None, "/anything", RequestOptions::new())
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let addr = start_echo_server().await;
    let transport = transport_for(addr);

    let calls = (0..16).map(|i| {
        let resource = format!("/item/{i}");
        let transport = &transport;
        async move { transport.get(None, &resource, RequestOptions::new()).await }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.client_pool().len(), 1);
    assert_eq!(transport.client_pool().clients_created(), 1);
}

#[tokio::test]
async fn test_connection_refused_is_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = transport_for(addr)
        .get(None, "/x", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
}
