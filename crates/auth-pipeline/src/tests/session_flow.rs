//! Login, logout, restore, persistence and status.

use super::harness::{eventually, MockApi, TestHarness, VALID_PASSWORD};
use crate::error::AuthError;
use crate::lifecycle::SessionPhase;
use crate::pipeline::{AuthPipeline, PipelineOptions};
use crate::wire::{ApiRequest, LOGOUT_PATH};
use credential_storage::{CredentialStore, FileStorage, PersistedSession};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn login_installs_session() {
    let harness = TestHarness::new();

    let session = harness
        .pipeline
        .login("hr@example.com", VALID_PASSWORD)
        .await
        .unwrap();

    assert_eq!(session.epoch, 1);
    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.identity.id, "u1");
    assert_eq!(session.identity.name.as_deref(), Some("Hiring Manager"));

    let response = harness
        .pipeline
        .perform(&ApiRequest::get("/jobs"))
        .await
        .unwrap();
    assert_eq!(response.body["servedWith"], "access-1");
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let harness = TestHarness::new();

    let result = harness.pipeline.login("hr@example.com", "guess").await;

    match result {
        Err(AuthError::InvalidCredentials(message)) => {
            assert_eq!(message, "Invalid email or password")
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(harness.pipeline.store().read().is_none());
    assert_eq!(harness.pipeline.status().phase, SessionPhase::SignedOut);
}

#[tokio::test]
async fn logout_revokes_and_clears() {
    let harness = TestHarness::new();
    let session = harness.sign_in();
    harness
        .credentials
        .save_session(&session.to_persisted())
        .unwrap();

    assert!(harness.pipeline.logout().await.unwrap());

    let calls = harness.api.calls_to(LOGOUT_PATH);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].bearer.as_deref(), Some("access-0"));
    assert!(harness.pipeline.store().read().is_none());
    assert!(!harness.credentials.has_session().unwrap());

    assert!(!harness.pipeline.logout().await.unwrap());
    assert_eq!(harness.api.calls_to(LOGOUT_PATH).len(), 1);
}

#[tokio::test]
async fn restore_seeds_store_from_persisted_session() {
    let harness = TestHarness::new();
    harness
        .credentials
        .save_session(&PersistedSession {
            access_token: "access-0".to_string(),
            refresh_token: "refresh-0".to_string(),
            user: json!({ "_id": "u7", "email": "lead@example.com", "role": "recruiter" }),
        })
        .unwrap();

    let session = harness.pipeline.restore().unwrap().unwrap();

    assert_eq!(session.epoch, 1);
    assert_eq!(session.identity.id, "u7");
    let status = harness.pipeline.status();
    assert!(status.authenticated);
    assert_eq!(status.phase, SessionPhase::SignedIn);
    assert_eq!(status.email.as_deref(), Some("lead@example.com"));
    assert_eq!(status.role.as_deref(), Some("recruiter"));
}

#[tokio::test]
async fn restore_without_persisted_session() {
    let harness = TestHarness::new();
    assert!(harness.pipeline.restore().unwrap().is_none());
    assert!(!harness.pipeline.status().authenticated);
}

#[tokio::test]
async fn persistence_follows_renewal_and_teardown() {
    let harness = TestHarness::new();
    let persistence = harness.pipeline.spawn_persistence();

    harness
        .pipeline
        .login("hr@example.com", VALID_PASSWORD)
        .await
        .unwrap();
    let credentials = harness.credentials.clone();
    assert!(
        eventually(|| matches!(
            credentials.load_session(),
            Ok(Some(ref s)) if s.access_token == "access-1"
        ))
        .await
    );

    harness.api.expire_all();
    harness
        .pipeline
        .perform(&ApiRequest::get("/jobs"))
        .await
        .unwrap();
    assert!(
        eventually(|| matches!(
            credentials.load_session(),
            Ok(Some(ref s)) if s.access_token == "access-2" && s.refresh_token == "refresh-2"
        ))
        .await
    );

    harness.pipeline.logout().await.unwrap();
    assert!(eventually(|| !credentials.has_session().unwrap()).await);

    drop(harness);
    tokio::time::timeout(Duration::from_secs(1), persistence)
        .await
        .expect("persistence task should stop with the pipeline")
        .unwrap();
}

#[tokio::test]
async fn session_survives_restart_through_file_storage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let api = Arc::new(MockApi::new());

    {
        let credentials = Arc::new(CredentialStore::new(Box::new(FileStorage::new(&path))));
        let pipeline =
            AuthPipeline::new(api.clone(), credentials.clone(), PipelineOptions::default());
        let persistence = pipeline.spawn_persistence();
        pipeline.login("hr@example.com", VALID_PASSWORD).await.unwrap();
        assert!(eventually(|| credentials.has_session().unwrap()).await);
        drop(pipeline);
        persistence.await.unwrap();
    }

    let credentials = Arc::new(CredentialStore::new(Box::new(FileStorage::new(&path))));
    let pipeline = AuthPipeline::new(api.clone(), credentials, PipelineOptions::default());
    let restored = pipeline.restore().unwrap().unwrap();
    assert_eq!(restored.access_token, "access-1");

    let response = pipeline.perform(&ApiRequest::get("/jobs")).await.unwrap();
    assert_eq!(response.body["servedWith"], "access-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_reports_refreshing_while_renewal_pending() {
    let harness = TestHarness::new();
    let session = harness.sign_in();
    harness.api.set_renewal_delay(Duration::from_millis(150));

    let pending = {
        let pipeline = harness.pipeline.clone();
        tokio::spawn(async move { pipeline.coordinator().request_refresh(session.epoch).await })
    };
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(harness.pipeline.status().phase, SessionPhase::Refreshing);

    pending.await.unwrap().unwrap();
    let status = harness.pipeline.status();
    assert_eq!(status.phase, SessionPhase::SignedIn);
    assert_eq!(status.epoch, 2);
    assert_eq!(status.user_id.as_deref(), Some("u1"));
}

#[test]
fn snapshot_serializes_for_json_output() {
    let harness = TestHarness::new();
    let value = serde_json::to_value(harness.pipeline.status()).unwrap();
    assert_eq!(
        value,
        json!({ "phase": "signed_out", "authenticated": false, "epoch": 0 })
    );
}
