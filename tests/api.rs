//! HTTP surface tests against an in-process server

use std::sync::Arc;

use axum::{body::Body, routing::get, Router};
use chrono::Local;
use futures::StreamExt;
use image::{Rgb, RgbImage};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use camwatch::camera::{Camera, MotionAlert};
use camwatch::config::ConfigStore;
use camwatch::events::EventBus;
use camwatch::recording::VideoWriter;
use camwatch::state::AppState;
use camwatch::video::JpegEncoder;
use camwatch::web::create_router;

struct TestServer {
    _dir: tempfile::TempDir,
    state: Arc<AppState>,
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(&dir.path().join("camwatch.db"))
            .await
            .unwrap();
        let recordings = dir.path().join("recordings");
        std::fs::create_dir_all(&recordings).unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(
            config,
            Arc::new(EventBus::new()),
            shutdown_tx,
            recordings,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            _dir: dir,
            state,
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn add_camera(&self, name: &str, url: &str) {
        let (status, _) = self
            .post("/api/camera/add", json!({ "name": name, "url": url }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

fn jpeg(shade: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(64, 48, Rgb([shade, shade, shade]));
    JpegEncoder::new(90).unwrap().encode(&image).unwrap()
}

#[tokio::test]
async fn test_health_without_cameras() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["total_cameras"], 0);
    assert_eq!(body["services"]["camera_monitor"], "running");
}

#[tokio::test]
async fn test_camera_registry_endpoints() {
    let server = TestServer::start().await;
    server.add_camera("porch", "http://10.0.0.5:8080/video").await;

    // Duplicate names are rejected regardless of case
    let (status, body) = server
        .post(
            "/api/camera/add",
            json!({ "name": "PORCH", "url": "http://10.0.0.6/video" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = server
        .post(
            "/api/camera/add",
            json!({ "name": "garage", "url": "rtsp://10.0.0.7/live" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cameras) = server.get("/api/cameras").await;
    assert_eq!(cameras.as_array().unwrap().len(), 1);
    assert_eq!(cameras[0]["name"], "porch");
    assert_eq!(cameras[0]["status"], "unknown");

    // Never checked cameras report unknown
    let (_, statuses) = server.get("/api/camera_status").await;
    assert_eq!(statuses["porch"]["status"], "unknown");
    assert_eq!(statuses["porch"]["error"], "Not checked yet");

    assert_eq!(server.delete("/api/camera/porch").await, StatusCode::OK);
    assert_eq!(server.delete("/api/camera/porch").await, StatusCode::NOT_FOUND);
    assert!(server.state.config.get().cameras.is_empty());
}

#[tokio::test]
async fn test_recording_flag_endpoints() {
    let server = TestServer::start().await;
    server.add_camera("porch", "http://10.0.0.5/video").await;

    let (status, body) = server.post("/api/recording/porch/start", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], true);
    assert_eq!(body["active"], false);
    assert!(server.state.cameras.is_recording_requested("porch"));

    let (_, body) = server.get("/api/recording/porch").await;
    assert_eq!(body["recording"], true);

    let (_, stats) = server.get("/api/system_stats").await;
    assert_eq!(stats["recording_cameras"], 1);

    let (status, _) = server.post("/api/recording/porch/pause", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.post("/api/recording/attic/start", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = server.post("/api/recording/porch/stop", json!({})).await;
    assert_eq!(body["recording"], false);
}

#[tokio::test]
async fn test_motion_alerts_drain() {
    let server = TestServer::start().await;
    for camera in ["porch", "garage"] {
        server.state.cameras.push_alert(MotionAlert {
            camera: camera.to_string(),
            timestamp: Local::now(),
            area: 1500.0,
        });
    }

    let (_, first) = server.get("/api/motion_alerts").await;
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[0]["camera"], "porch");

    // No new motion in between
    let (_, second) = server.get("/api/motion_alerts").await;
    assert!(second.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_camera_settings() {
    let server = TestServer::start().await;
    server.add_camera("porch", "http://10.0.0.5/video").await;

    let (status, settings) = server.get("/api/camera/porch/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["motion_sensitivity"], 500);
    assert_eq!(settings["motion_enabled"], true);

    let (_, body) = server
        .post(
            "/api/camera/porch/settings",
            json!({ "motion_sensitivity": 1200 }),
        )
        .await;
    assert_eq!(body["settings"]["motion_sensitivity"], 1200);
    assert_eq!(body["settings"]["notification_enabled"], true);

    let (_, settings) = server.get("/api/camera/PORCH/settings").await;
    assert_eq!(settings["motion_sensitivity"], 1200);

    let (status, _) = server.get("/api/camera/attic/settings").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recordings_list_serve_and_delete() {
    let server = TestServer::start().await;
    let path = server
        .state
        .recordings_dir()
        .join("porch_20240101_120000.avi");

    let frame = bytes::Bytes::from(jpeg(120));
    let mut writer = VideoWriter::create(&path, 64, 48, 20).unwrap();
    for _ in 0..40 {
        writer.write_frame(frame.clone()).unwrap();
    }
    writer.finish().unwrap();

    let (_, list) = server.get("/api/recordings").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["camera"], "porch");
    assert_eq!(list[0]["frames"], 40);
    assert_eq!(list[0]["duration"], "00:00:02");
    assert_eq!(list[0]["url"], "/recordings/porch_20240101_120000.avi");

    let resp = server
        .client
        .get(server.url("/recordings/porch_20240101_120000.avi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(&bytes[..4], b"RIFF");

    assert_eq!(
        server.delete("/api/recording/notes.txt").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        server.delete("/api/recording/porch_20240101_120000.avi").await,
        StatusCode::OK
    );
    assert_eq!(
        server.delete("/api/recording/porch_20240101_120000.avi").await,
        StatusCode::NOT_FOUND
    );
    // The status route on the same path still answers for cameras
    let (status, _) = server.get("/api/recording/porch").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_system_restart_clears_state() {
    let server = TestServer::start().await;
    server.add_camera("porch", "http://10.0.0.5/video").await;
    server.state.cameras.set_recording("porch", true);
    server.state.cameras.stats().record_motion_event();
    server.state.cameras.push_alert(MotionAlert {
        camera: "porch".to_string(),
        timestamp: Local::now(),
        area: 700.0,
    });

    let (status, body) = server.post("/api/system/restart", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, stats) = server.get("/api/system_stats").await;
    assert_eq!(stats["total_cameras"], 1);
    assert_eq!(stats["recording_cameras"], 0);
    assert_eq!(stats["motion_alerts"], 0);
    assert_eq!(stats["total_motion_events"], 0);
    assert_eq!(stats["system_health"], "degraded");
}

#[tokio::test]
async fn test_video_feed_unknown_camera() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .get(server.url("/video_feed/attic"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(server.state.clients.stats().is_empty());
}

#[tokio::test]
async fn test_video_feed_streams_camera_frames() {
    // Fake camera: a multipart body with a handful of frames
    let mut body = Vec::new();
    for shade in [40u8, 60, 80, 100] {
        body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        body.extend(jpeg(shade));
        body.extend_from_slice(b"\r\n");
    }
    let camera = Router::new().route(
        "/video",
        get(move || {
            let body = body.clone();
            async move { Body::from(body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let camera_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, camera).await.unwrap();
    });

    let server = TestServer::start().await;
    server
        .state
        .registry
        .add(Camera::new("porch", format!("http://{}/video", camera_addr)))
        .unwrap();

    let resp = server
        .client
        .get(server.url("/video_feed/porch"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    // Read until one complete JPEG part has arrived
    let mut received = Vec::new();
    let mut chunks = resp.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        received.extend_from_slice(&chunk.unwrap());
        if received.windows(2).any(|w| w == [0xFF, 0xD9]) {
            break;
        }
    }
    assert!(received.starts_with(b"--frame\r\nContent-Type: image/jpeg"));
    assert_eq!(server.state.clients.client_count(), 1);

    drop(chunks);
}
