//! Integration tests for the configuration portal.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use relay_switch::portal::PortalState;
use relay_switch::services::{build_router, WebPortal, WebPortalConfig};
use relay_switch::{ConfigPortal, Settings};

fn create_test_app(settings: Settings) -> (axum::Router, Arc<PortalState>) {
    let state = Arc::new(PortalState::new(settings));
    let router = build_router(Arc::clone(&state), &WebPortalConfig::default());
    (router, state)
}

fn form_post(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/save")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_form_is_prefilled() {
    let settings = Settings::default()
        .with_device_name("porch")
        .with_mqtt_server("10.0.0.2", 1884);
    let (app, _state) = create_test_app(settings);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("name=\"device_name\" value=\"porch\""));
    assert!(html.contains("name=\"mqtt_server\" value=\"10.0.0.2\""));
    assert!(html.contains("name=\"mqtt_port\" value=\"1884\""));
}

#[tokio::test]
async fn test_save_queues_submission() {
    let (app, state) = create_test_app(Settings::default().with_wifi("HomeNet", "secret"));

    let response = app
        .oneshot(form_post(
            "device_name=attic&wifi_ssid=HomeNet&wifi_password=&mqtt_server=broker.lan&mqtt_port=1883&control_topic=attic%2Fset&status_topic=attic%2Fstate",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let pending = state.take_pending().expect("submission queued");
    assert_eq!(pending.device_name.as_str(), "attic");
    assert_eq!(pending.wifi_password.as_str(), "secret");
    assert_eq!(pending.mqtt_server.as_str(), "broker.lan");
    assert_eq!(pending.control_topic(), Some("attic/set"));
    assert_eq!(pending.status_topic(), Some("attic/state"));
}

#[tokio::test]
async fn test_save_rejects_bad_port() {
    let (app, state) = create_test_app(Settings::default());

    let response = app
        .oneshot(form_post("device_name=attic&mqtt_port=abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("invalid port"));
    assert!(state.take_pending().is_none());
}

#[tokio::test]
async fn test_not_found() {
    let (app, _state) = create_test_app(Settings::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_portal_serves_until_stopped() {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    let mut portal = WebPortal::new(WebPortalConfig::new(([127, 0, 0, 1], 0)));
    portal
        .start(&Settings::default().with_device_name("porch"))
        .unwrap();
    let addr = portal.local_addr().unwrap();

    let body = "device_name=shed";
    let mut stream = TcpStream::connect(addr).unwrap();
    write!(
        stream,
        "POST /save HTTP/1.1\r\nHost: {}\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        addr,
        body.len(),
        body
    )
    .unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    assert!(reply.starts_with("HTTP/1.1 200"));

    let submitted = portal.take_submission().unwrap();
    assert_eq!(submitted.device_name.as_str(), "shed");
    assert!(portal.take_submission().is_none());

    portal.stop();
    assert!(portal.local_addr().is_none());
}
