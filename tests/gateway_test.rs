//! End-to-end tests: real gateway, real TCP, mock backends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use card_gateway::config::{load_config, validation::ValidationError, ConfigError};

mod common;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];

type Seen = Arc<Mutex<Vec<HeaderMap>>>;

fn recorder() -> Seen {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_proxy_get_relays_json_and_forwards_authorization() {
    let seen = recorder();
    let record = seen.clone();
    let backend = common::start_mock_backend(Router::new().route(
        "/api/company/{id}",
        get(move |Path(id): Path<String>, headers: HeaderMap| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(headers);
                Json(json!({ "id": id, "name": "Acme" }))
            }
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/company/123")])
        .header(header::AUTHORIZATION, "Bearer abc")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "id": "123", "name": "Acme" }));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one backend call");
    assert_eq!(seen[0][header::AUTHORIZATION], "Bearer abc");
    assert_eq!(seen[0][header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn test_proxy_never_fabricates_authorization() {
    let seen = recorder();
    let record = seen.clone();
    let backend = common::start_mock_backend(Router::new().route(
        "/api/me",
        get(move |headers: HeaderMap| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(headers);
                Json(json!({ "ok": true }))
            }
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/me")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let seen = seen.lock().unwrap();
    assert!(seen[0].get(header::AUTHORIZATION).is_none());
}

#[tokio::test]
async fn test_login_relays_backend_rejection() {
    let bodies = Arc::new(Mutex::new(Vec::<Bytes>::new()));
    let record = bodies.clone();
    let backend = common::start_mock_backend(Router::new().route(
        "/api/auth/login",
        post(move |body: Bytes| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(body);
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "detail": "Invalid credentials" })),
                )
            }
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let credentials = r#"{"email":"a@b.com","password":"bad"}"#;
    let res = common::client()
        .post(gateway.url("/api/auth/login"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(credentials)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Invalid credentials" }));
    assert_eq!(&bodies.lock().unwrap()[0][..], credentials.as_bytes());
}

#[tokio::test]
async fn test_signup_relays_created() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/auth/signup",
        post(|Json(body): Json<Value>| async move {
            (
                StatusCode::CREATED,
                Json(json!({ "email": body["email"], "access_token": "t0k" })),
            )
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .post(gateway.url("/api/auth/signup"))
        .json(&json!({ "email": "new@acme.io", "password": "pw", "company_name": "Acme" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "email": "new@acme.io", "access_token": "t0k" }));
}

#[tokio::test]
async fn test_login_with_invalid_json_is_400() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .post(gateway.url("/api/auth/login"))
        .body("email=a@b.com")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));
}

#[tokio::test]
async fn test_proxy_without_path_is_400_for_every_method() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    for method in [
        reqwest::Method::GET,
        reqwest::Method::POST,
        reqwest::Method::PUT,
        reqwest::Method::DELETE,
    ] {
        let res = client
            .request(method.clone(), gateway.url("/api/proxy"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "{method}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Missing path parameter", "{method}");
    }
}

#[tokio::test]
async fn test_backend_status_and_json_pass_through() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/status/{code}",
        get(|Path(code): Path<u16>| async move {
            let status = StatusCode::from_u16(code).unwrap();
            (status, Json(json!({ "code": code, "nested": { "list": [1, 2, 3] } })))
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    for code in [200u16, 201, 400, 401, 404, 409, 500] {
        let res = client
            .get(gateway.url("/api/proxy"))
            .query(&[("path", format!("/status/{code}"))])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), code);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "code": code, "nested": { "list": [1, 2, 3] } }));
    }
}

#[tokio::test]
async fn test_non_json_backend_error_is_wrapped() {
    let backend = common::start_mock_backend(
        Router::new()
            .route(
                "/api/maintenance",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
            )
            .route("/api/gone", get(|| async { StatusCode::GONE })),
    )
    .await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    let res = client
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/maintenance")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "down for maintenance" }));

    let res = client
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/gone")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 410);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Backend returned 410" }));
}

#[tokio::test]
async fn test_proxy_forwards_bodies_for_post_and_put_only() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/echo",
        get(|body: Bytes| async move { Json(json!({ "len": body.len() })) })
            .post(|body: Bytes| async move { (StatusCode::CREATED, body) })
            .put(|body: Bytes| async move { body })
            .delete(|body: Bytes| async move { Json(json!({ "len": body.len() })) }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    let res = client
        .post(gateway.url("/api/proxy"))
        .query(&[("path", "/echo")])
        .json(&json!({ "theme": "dark" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "theme": "dark" }));

    let res = client
        .put(gateway.url("/api/proxy"))
        .query(&[("path", "/echo")])
        .json(&json!({ "primary_color": "#112233" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "primary_color": "#112233" }));

    let res = client
        .delete(gateway.url("/api/proxy"))
        .query(&[("path", "/echo")])
        .body(r#"{"ignored":true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "len": 0 }));
}

#[tokio::test]
async fn test_proxy_rejects_paths_outside_api() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/../admin")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid path parameter");
}

#[tokio::test]
async fn test_unreachable_backend_is_500() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    let res = client
        .post(gateway.url("/api/auth/login"))
        .json(&json!({ "email": "a@b.com", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "error": "Failed to login" }));

    let res = client
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/company/1")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Failed to process request" })
    );

    let slugs = [("company_slug", "acme"), ("employee_slug", "jane")];
    let res = client
        .get(gateway.url("/api/card"))
        .query(&slugs)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Failed to fetch card data" })
    );

    let res = client
        .get(gateway.url("/api/qrcode"))
        .query(&slugs)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Failed to fetch QR code" })
    );
}

#[tokio::test]
async fn test_card_fetch() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/card/{company}/{employee}",
        get(|Path((company, employee)): Path<(String, String)>| async move {
            Json(json!({ "company": company, "employee": employee }))
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    let res = client
        .get(gateway.url("/api/card"))
        .query(&[("company_slug", "acme"), ("employee_slug", "jane doe")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "company": "acme", "employee": "jane doe" })
    );

    let res = client
        .get(gateway.url("/api/card"))
        .query(&[("company_slug", "acme")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Missing parameters" })
    );
}

#[tokio::test]
async fn test_qrcode_follows_redirect_and_returns_png() {
    let generator = common::start_mock_backend(Router::new().route(
        "/v1/create-qr-code",
        get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG) }),
    ))
    .await;
    let target = format!("http://{generator}/v1/create-qr-code?size=300x300");

    let backend = common::start_mock_backend(Router::new().route(
        "/api/card/{company}/{employee}/qr-vcard",
        get(move || {
            let target = target.clone();
            async move { Redirect::temporary(&target) }
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/qrcode"))
        .query(&[("company_slug", "acme"), ("employee_slug", "jane")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(res.headers()[header::CACHE_CONTROL], "public, max-age=3600");
    let body = res.bytes().await.unwrap();
    assert_eq!(&body[..], PNG);
}

#[tokio::test]
async fn test_qrcode_backend_error_is_json() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/card/{company}/{employee}/qr-vcard",
        get(|| async { StatusCode::NOT_FOUND.into_response() }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/qrcode"))
        .query(&[("company_slug", "acme"), ("employee_slug", "nobody")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Backend returned 404" })
    );
}

#[tokio::test]
async fn test_request_id_propagates_to_backend() {
    let seen = recorder();
    let record = seen.clone();
    let backend = common::start_mock_backend(Router::new().route(
        "/api/ping",
        get(move |headers: HeaderMap| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(headers);
                Json(json!({}))
            }
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/ping")])
        .send()
        .await
        .unwrap();

    let returned = res.headers()["x-request-id"].clone();
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0]["x-request-id"], returned);
}

#[tokio::test]
async fn test_healthz() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client().get(gateway.url("/healthz")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn test_signup_with_invalid_json_is_400() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    for body in ["", "{\"email\":"] {
        let res = client
            .post(gateway.url("/api/auth/signup"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "{body:?}");
        assert_eq!(
            res.json::<Value>().await.unwrap(),
            json!({ "error": "Invalid JSON body" })
        );
    }
}

#[tokio::test]
async fn test_malformed_query_is_400() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/proxy?path=/a&path=/b"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Invalid query string" })
    );
}

#[tokio::test]
async fn test_qrcode_without_both_slugs_is_400() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway(backend).await;
    let client = common::client();

    let missing: &[(&str, &str)] = &[("company_slug", "acme")];
    let blank: &[(&str, &str)] = &[("company_slug", "acme"), ("employee_slug", "  ")];
    for query in [missing, blank] {
        let res = client
            .get(gateway.url("/api/qrcode"))
            .query(query)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400, "{query:?}");
        assert_eq!(
            res.json::<Value>().await.unwrap(),
            json!({ "error": "Missing parameters" })
        );
    }
}

#[tokio::test]
async fn test_card_slugs_forwarded_as_sent() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/card/{company}/{employee}",
        get(|Path((company, employee)): Path<(String, String)>| async move {
            Json(json!({ "company": company, "employee": employee }))
        }),
    ))
    .await;
    let gateway = common::start_gateway(backend).await;

    let res = common::client()
        .get(gateway.url("/api/card"))
        .query(&[("company_slug", " acme "), ("employee_slug", "jane")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "company": " acme ", "employee": "jane" })
    );
}

#[tokio::test]
async fn test_oversized_body_is_413_with_envelope() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway_with(backend, |config| {
        config.limits.max_body_size = 16;
    })
    .await;
    let client = common::client();

    let credentials = json!({ "email": "someone@acme.io", "password": "hunter22" });
    let res = client
        .post(gateway.url("/api/auth/login"))
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Request body too large" })
    );

    let res = client
        .put(gateway.url("/api/proxy"))
        .query(&[("path", "/company/1")])
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Request body too large" })
    );
}

#[tokio::test]
async fn test_stalled_upload_hits_request_deadline_with_envelope() {
    let backend = common::closed_port().await;
    let gateway = common::start_gateway_with(backend, |config| {
        config.timeouts.connect_secs = 1;
        config.timeouts.backend_secs = 1;
        config.timeouts.request_secs = 2;
    })
    .await;

    let mut stream = TcpStream::connect(gateway.addr).await.unwrap();
    stream
        .write_all(
            b"POST /api/auth/login HTTP/1.1\r\n\
              host: gateway\r\n\
              content-type: application/json\r\n\
              content-length: 64\r\n\r\n{",
        )
        .await
        .unwrap();

    let mut raw = Vec::new();
    let read = async {
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap_or(0);
            raw.extend_from_slice(&buf[..n]);
            if n == 0 || String::from_utf8_lossy(&raw).contains("Request timed out") {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read).await.unwrap();

    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 408"), "{text}");
    assert!(text.contains(r#"{"error":"Request timed out"}"#), "{text}");
}

#[tokio::test]
async fn test_slow_backend_is_500_not_deadline() {
    let backend = common::start_mock_backend(Router::new().route(
        "/api/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "late": true }))
        }),
    ))
    .await;
    let gateway = common::start_gateway_with(backend, |config| {
        config.timeouts.backend_secs = 1;
        config.timeouts.request_secs = 2;
    })
    .await;

    let res = common::client()
        .get(gateway.url("/api/proxy"))
        .query(&[("path", "/slow")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Failed to process request" })
    );
}

#[test]
fn test_request_deadline_below_backend_timeout_is_rejected() {
    let path = std::env::temp_dir().join(format!("card-gateway-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[timeouts]\nbackend_secs = 30\nrequest_secs = 10\n").unwrap();

    let result = load_config(Some(&path));
    std::fs::remove_file(&path).unwrap();

    match result {
        Err(ConfigError::Validation(errors)) => assert!(errors.contains(
            &ValidationError::RequestDeadline {
                request: 10,
                backend: 30
            }
        )),
        other => panic!("expected a validation error, got {other:?}"),
    }
}
