use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose;
use campaign_imagegen::catalog::{PromptCatalog, PromptEntry};
use campaign_imagegen::client::ImageClient;
use campaign_imagegen::config::GeneratorConfig;
use campaign_imagegen::error::{FailureKind, GenerationError};
use campaign_imagegen::runner::{ImageService, Runner};
use serde_json::{Value, json};

const API_KEY: &str = "test-key";
const MODEL: &str = "test-model";

/// Not a real image, just the PNG signature plus some bytes.
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, 1, 2, 3];
const FAKE_JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0, 16, b'J', b'F', b'I', b'F'];

fn image_reply(mime: &str, bytes: &[u8]) -> Response {
    Json(json!({
        "candidates": [{
            "content": {"parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": mime, "data": general_purpose::STANDARD.encode(bytes)}}
            ]},
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

/// Picks a reply based on keywords in the prompt.
async fn mock_generate(
    State(hits): State<Arc<AtomicUsize>>,
    uri: Uri,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);

    if uri.path() != format!("/v1beta/models/{MODEL}:generateContent") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if query.as_deref() != Some(format!("key={API_KEY}").as_str()) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if body["generationConfig"]["responseModalities"] != json!(["Text", "Image"]) {
        return (StatusCode::BAD_REQUEST, "bad generationConfig").into_response();
    }

    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    if prompt.contains("server error") {
        (StatusCode::INTERNAL_SERVER_ERROR, "something broke").into_response()
    } else if prompt.contains("words only") {
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "I can only describe it"}]},
                "finishReason": "STOP"
            }]
        }))
        .into_response()
    } else if prompt.contains("no candidates") {
        Json(json!({"candidates": []})).into_response()
    } else if prompt.contains("broken payload") {
        Json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "not base64!!"}}
                ]}
            }]
        }))
        .into_response()
    } else if prompt.contains("garbage") {
        (StatusCode::OK, "<html>definitely not json</html>").into_response()
    } else if prompt.contains("slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
        image_reply("image/png", FAKE_PNG)
    } else if prompt.contains("jpeg") {
        image_reply("image/jpeg", FAKE_JPEG)
    } else {
        image_reply("image/png", FAKE_PNG)
    }
}

async fn spawn_mock() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .fallback(mock_generate)
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    (format!("http://{addr}/v1beta"), hits)
}

fn client_for(base: &str, output_dir: &Path) -> ImageClient {
    let config = GeneratorConfig::new(base, MODEL, API_KEY, output_dir).expect("config");
    ImageClient::new(config).expect("client")
}

fn catalog(entries: &[(&str, &str)]) -> PromptCatalog {
    PromptCatalog::new(
        entries
            .iter()
            .map(|(id, text)| PromptEntry::new(*id, *text))
            .collect(),
    )
    .expect("catalog")
}

fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn one_success_one_server_error() {
    let (base, hits) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("images");

    let report = Runner::new(client_for(&base, &out))
        .run(&catalog(&[("a", "prompt A"), ("b", "prompt B server error")]))
        .await;

    assert_eq!(report.succeeded(), vec!["a"]);
    assert_eq!(report.failed(), vec!["b"]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(files_in(&out), vec!["a.png".to_string()]);

    let err = report.outcomes[1].error().expect("b failed");
    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(matches!(
        err,
        GenerationError::HttpStatus { status: 500, body } if body == "something broke"
    ));
}

#[tokio::test]
async fn text_only_reply_writes_nothing() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = client_for(&base, tmp.path());

    let err = client
        .generate("c", "words only please")
        .await
        .expect_err("no image expected");

    assert_eq!(err.kind(), FailureKind::NoImageProduced);
    assert!(err.to_string().contains("I can only describe it"));
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn zero_candidates_writes_nothing() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = client_for(&base, tmp.path());

    let err = client
        .generate("z", "no candidates")
        .await
        .expect_err("no image expected");

    assert_eq!(err.kind(), FailureKind::NoImageProduced);
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn png_payload_round_trips() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = client_for(&base, &tmp.path().join("nested").join("dir"));

    let path = client.generate("hero", "  a sunny porch  ").await.expect("image");

    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("png"));
    let written = fs::read(&path).expect("read image");
    assert_eq!(
        general_purpose::STANDARD.encode(&written),
        general_purpose::STANDARD.encode(FAKE_PNG)
    );
}

#[tokio::test]
async fn jpeg_mime_type_gets_jpg_extension() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = client_for(&base, tmp.path());

    let path = client.generate("photo", "a jpeg please").await.expect("image");

    assert_eq!(path, tmp.path().join("photo.jpg"));
    assert_eq!(fs::read(&path).expect("read image"), FAKE_JPEG);
}

#[tokio::test]
async fn rerun_overwrites_with_identical_files() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let prompts = catalog(&[("a", "prompt A"), ("b", "a jpeg")]);

    let runner = Runner::new(client_for(&base, tmp.path()));
    runner.run(&prompts).await;
    let first_a = fs::read(tmp.path().join("a.png")).expect("a.png");
    let first_b = fs::read(tmp.path().join("b.jpg")).expect("b.jpg");

    let report = runner.run(&prompts).await;

    assert!(report.all_succeeded());
    assert_eq!(files_in(tmp.path()), vec!["a.png".to_string(), "b.jpg".to_string()]);
    assert_eq!(fs::read(tmp.path().join("a.png")).expect("a.png"), first_a);
    assert_eq!(fs::read(tmp.path().join("b.jpg")).expect("b.jpg"), first_b);
}

#[tokio::test]
async fn malformed_reply_does_not_stop_the_batch() {
    let (base, hits) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");

    let report = Runner::new(client_for(&base, tmp.path()))
        .run(&catalog(&[
            ("x", "garbage"),
            ("y", "words only"),
            ("z", "prompt Z"),
        ]))
        .await;

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(report.failed(), vec!["x", "y"]);
    assert_eq!(report.succeeded(), vec!["z"]);
    assert_eq!(
        report.outcomes[0].error().map(GenerationError::kind),
        Some(FailureKind::MalformedResponse)
    );
    assert_eq!(files_in(tmp.path()), vec!["z.png".to_string()]);
}

#[tokio::test]
async fn write_failure_leaves_no_file_and_batch_continues() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("images");
    // a directory squatting on a.png makes the final rename fail
    fs::create_dir_all(out.join("a.png")).expect("squat a.png");

    let report = Runner::new(client_for(&base, &out))
        .run(&catalog(&[("a", "prompt A"), ("b", "prompt B")]))
        .await;

    assert_eq!(report.failed(), vec!["a"]);
    assert_eq!(report.succeeded(), vec!["b"]);
    let err = report.outcomes[0].error().expect("a failed");
    assert_eq!(err.kind(), FailureKind::DecodeOrWrite);
    assert!(matches!(err, GenerationError::Write { .. }));
    assert!(out.join("a.png").is_dir());
    assert_eq!(
        files_in(&out),
        vec!["a.png".to_string(), "b.png".to_string()]
    );

    // output dir that is actually a regular file
    let blocked = tmp.path().join("blocked");
    fs::write(&blocked, b"x").expect("write blocker");

    let report = Runner::new(client_for(&base, &blocked))
        .run(&catalog(&[("c", "prompt C")]))
        .await;

    assert_eq!(report.failed(), vec!["c"]);
    assert_eq!(
        report.outcomes[0].error().map(GenerationError::kind),
        Some(FailureKind::DecodeOrWrite)
    );
    assert_eq!(fs::read(&blocked).expect("blocker"), b"x");
    assert!(!files_in(tmp.path()).iter().any(|name| name.starts_with("c.")));
}

#[tokio::test]
async fn bad_base64_leaves_no_file_and_batch_continues() {
    let (base, hits) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");

    let report = Runner::new(client_for(&base, tmp.path()))
        .run(&catalog(&[("p", "broken payload"), ("q", "prompt Q")]))
        .await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed(), vec!["p"]);
    assert_eq!(report.succeeded(), vec!["q"]);
    let err = report.outcomes[0].error().expect("p failed");
    assert_eq!(err.kind(), FailureKind::DecodeOrWrite);
    assert!(matches!(err, GenerationError::Decode(_)));
    assert_eq!(files_in(tmp.path()), vec!["q.png".to_string()]);
}

#[tokio::test]
async fn slow_service_times_out() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = GeneratorConfig::new(&base, MODEL, API_KEY, tmp.path()).expect("config");
    config.timeout = Duration::from_millis(300);
    let client = ImageClient::new(config).expect("client");

    let err = client.generate("s", "slow").await.expect_err("timeout");

    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(err.to_string().contains("timed out"));
    assert!(!err.to_string().contains(API_KEY));
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() {
    // grab a free port, then close it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let tmp = tempfile::tempdir().expect("tempdir");
    let client = client_for(&format!("http://{addr}/v1beta"), tmp.path());

    let err = client.generate("u", "prompt").await.expect_err("refused");

    assert!(matches!(err, GenerationError::Transport(_)));
    assert!(!err.to_string().contains(API_KEY));
}

#[tokio::test]
async fn responses_are_dumped_when_asked() {
    let (base, _) = spawn_mock().await;
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config =
        GeneratorConfig::new(&base, MODEL, API_KEY, tmp.path().join("images")).expect("config");
    config.response_dump_dir = Some(tmp.path().join("responses"));
    let client = ImageClient::new(config).expect("client");

    let _ = client.generate("d", "words only").await;

    let dumped = fs::read_to_string(tmp.path().join("responses").join("d.json"))
        .expect("dumped response");
    assert!(dumped.contains("I can only describe it"));
}
