//! Integration tests for the artifact and version endpoints.

mod common;

use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, RETRY_AFTER};
use chive_core::{ArtifactId, Role};
use common::TestServer;
use common::fixtures::{seeded_bytes, sha256_hash};
use serde_json::Value;

fn id_of(version: &Value) -> String {
    version["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, body) = server.json("GET", "/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let server = TestServer::new().await;

    let (status, body) = server.json("GET", "/v1/artifacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, body) = server
        .json("GET", "/v1/artifacts", None, Some("not-a-real-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_upload_and_inspect_version() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;
    let payload = seeded_bytes(7, 4096);

    let (status, version) = server
        .upload(
            "model-x",
            "name=baseline&description=first%20cut&file_name=weights.bin&metadata=%7B%22epochs%22%3A3%7D",
            payload.clone(),
            &writer,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(version["artifact_id"], "model-x");
    assert_eq!(version["sequence"], 1);
    assert_eq!(version["name"], "baseline");
    assert_eq!(version["description"], "first cut");
    assert_eq!(version["file_name"], "weights.bin");
    assert_eq!(version["metadata"]["epochs"], 3);
    assert_eq!(version["size_bytes"], 4096);
    assert_eq!(version["created_by"], "alice");
    assert_eq!(version["payload_sha256"], sha256_hash(&payload));

    let id = id_of(&version);
    let (status, fetched) = server
        .json("GET", &format!("/v1/versions/{id}"), None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], version["id"]);
    assert_eq!(fetched["payload_sha256"], version["payload_sha256"]);
    assert_eq!(fetched["metadata"], version["metadata"]);

    let (status, headers, body) = server
        .send(
            "GET",
            &format!("/v1/versions/{id}/payload"),
            Body::empty(),
            Some(&writer),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, payload);
    assert_eq!(
        headers.get("x-chive-sha256").unwrap(),
        sha256_hash(&payload).as_str()
    );
    assert_eq!(
        headers.get(CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"weights.bin\""
    );
}

#[tokio::test]
async fn test_versions_listed_in_creation_order() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    for seed in 0..3u64 {
        let (status, _) = server
            .upload("model-x", "", seeded_bytes(seed, 64), &writer)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    server
        .upload("dataset-y", "", seeded_bytes(9, 64), &writer)
        .await;

    let (status, body) = server
        .json("GET", "/v1/artifacts/model-x/versions", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    let sequences: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    let (status, body) = server
        .json("GET", "/v1/artifacts/unknown/versions", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let (status, body) = server
        .json("GET", "/v1/artifacts", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    let artifacts = body.as_array().unwrap();
    assert_eq!(artifacts.len(), 2);
    let model = artifacts
        .iter()
        .find(|a| a["artifact_id"] == "model-x")
        .unwrap();
    assert_eq!(model["version_count"], 3);
    assert_eq!(model["latest_sequence"], 3);
    assert!(model["active_version_id"].is_null());
}

#[tokio::test]
async fn test_reader_cannot_upload_or_activate() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;
    let reader = server.create_token("bob", &[Role::Read]).await;

    let (status, body) = server
        .upload("model-x", "", seeded_bytes(1, 16), &reader)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (_, version) = server
        .upload("model-x", "", seeded_bytes(1, 16), &writer)
        .await;
    let id = id_of(&version);

    let (status, body) = server
        .json(
            "POST",
            &format!("/v1/artifacts/model-x/versions/{id}/activate"),
            None,
            Some(&reader),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    // Nothing was recorded by the rejected upload.
    let (_, body) = server
        .json("GET", "/v1/artifacts/model-x/versions", None, Some(&reader))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_rejects_bad_input() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    let (status, body) = server
        .upload("model-x", "metadata=%7Bnot-json", seeded_bytes(1, 16), &writer)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, body) = server
        .upload("model-x", "metadata=%5B1%2C2%5D", seeded_bytes(1, 16), &writer)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, body) = server
        .upload("bad@id", "", seeded_bytes(1, 16), &writer)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, body) = server
        .json("GET", "/v1/versions/not-a-uuid", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let server = TestServer::with_config(|config| {
        config.server.max_payload_bytes = 32;
    })
    .await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    let (status, body) = server
        .upload("model-x", "", seeded_bytes(1, 33), &writer)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");

    let (status, _) = server
        .upload("model-x", "", seeded_bytes(1, 32), &writer)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reader_upload_is_forbidden_before_size_check() {
    let server = TestServer::with_config(|config| {
        config.server.max_payload_bytes = 32;
    })
    .await;
    let reader = server.create_token("bob", &[Role::Read]).await;

    let (status, body) = server
        .upload("model-x", "", seeded_bytes(1, 64), &reader)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_activate_and_restore() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;
    let v1_bytes = seeded_bytes(1, 256);
    let v2_bytes = seeded_bytes(2, 512);

    let (_, v1) = server
        .upload("model-x", "", v1_bytes.clone(), &writer)
        .await;
    let (_, v2) = server
        .upload("model-x", "", v2_bytes.clone(), &writer)
        .await;

    let (status, body) = server
        .json("GET", "/v1/artifacts/model-x/active", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _, _) = server
        .send(
            "GET",
            "/v1/artifacts/model-x/active/payload",
            Body::empty(),
            Some(&writer),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let activate = |id: String| format!("/v1/artifacts/model-x/versions/{id}/activate");

    let (status, body) = server
        .json("POST", &activate(id_of(&v2)), None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["pointer"]["version_id"], v2["id"]);
    assert_eq!(body["pointer"]["activated_by"], "alice");

    // Restore the older version.
    let (status, body) = server
        .json("POST", &activate(id_of(&v1)), None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);

    let (status, pointer) = server
        .json("GET", "/v1/artifacts/model-x/active", None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pointer["version_id"], v1["id"]);

    let (status, _, bytes) = server
        .send(
            "GET",
            "/v1/artifacts/model-x/active/payload",
            Body::empty(),
            Some(&writer),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, v1_bytes);

    // Activating the active version again is a no-op.
    let (status, body) = server
        .json("POST", &activate(id_of(&v1)), None, Some(&writer))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(body["pointer"]["version_id"], pointer["version_id"]);

    let (_, body) = server
        .json("GET", "/v1/artifacts", None, Some(&writer))
        .await;
    assert_eq!(body[0]["active_version_id"], v1["id"]);
}

#[tokio::test]
async fn test_activate_errors() {
    let server = TestServer::new().await;
    let activator = server.create_token("ops", &[Role::Activate]).await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    let (_, other) = server
        .upload("dataset-y", "", seeded_bytes(1, 16), &writer)
        .await;

    let (status, body) = server
        .json(
            "POST",
            &format!("/v1/artifacts/model-x/versions/{}/activate", id_of(&other)),
            None,
            Some(&activator),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "version_mismatch");

    let missing = uuid::Uuid::now_v7();
    let (status, body) = server
        .json(
            "POST",
            &format!("/v1/artifacts/model-x/versions/{missing}/activate"),
            None,
            Some(&activator),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = server
        .json(
            "POST",
            &format!("/v1/artifacts/dataset-y/versions/{}/activate", id_of(&other)),
            None,
            Some(&activator),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_busy_artifact_returns_retry_after() {
    let server = TestServer::with_config(|config| {
        config.versioning.lock_timeout_ms = 50;
    })
    .await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    let artifact = ArtifactId::parse("model-x").unwrap();
    let guard = server
        .state
        .versions
        .locks()
        .acquire(&artifact)
        .await
        .unwrap();

    let (status, headers, body) = server
        .send(
            "POST",
            "/v1/artifacts/model-x/versions",
            Body::from(seeded_bytes(1, 16)),
            Some(&writer),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers.get(RETRY_AFTER).unwrap(), "1");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], "busy");

    drop(guard);
    let (status, _) = server
        .upload("model-x", "", seeded_bytes(1, 16), &writer)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_whoami_and_guidance() {
    let server = TestServer::new().await;
    let reader = server.create_token("bob", &[Role::Read]).await;

    let (status, body) = server
        .json("GET", "/v1/auth/whoami", None, Some(&reader))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "bob");
    assert_eq!(body["roles"], serde_json::json!(["artifacts:read"]));

    let (status, _) = server
        .json("GET", "/v1/guidance/refactor", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .json("GET", "/v1/guidance/refactor", None, Some(&reader))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lineage_key"], "refactored_from_version_id");
    assert!(!body["steps"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_lineage_metadata_roundtrips() {
    let server = TestServer::new().await;
    let writer = server.create_token("alice", &[Role::Write]).await;

    let (_, original) = server
        .upload("model-x", "", seeded_bytes(1, 16), &writer)
        .await;
    let original_id = id_of(&original);

    let (status, derived) = server
        .upload(
            "model-x",
            &format!(
                "description=refactored&metadata=%7B%22refactored_from_version_id%22%3A%22{original_id}%22%7D"
            ),
            seeded_bytes(2, 16),
            &writer,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        derived["metadata"]["refactored_from_version_id"],
        original_id.as_str()
    );
}

#[tokio::test]
async fn test_metrics_endpoint_gated_by_config() {
    let server = TestServer::new().await;
    let (status, _, body) = server
        .send("GET", "/metrics", Body::empty(), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("chive_"));

    let server = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;
    let (status, _, _) = server
        .send("GET", "/metrics", Body::empty(), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
