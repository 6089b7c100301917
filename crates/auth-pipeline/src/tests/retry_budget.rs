//! Retry budget of one.
//!
//! A call whose retry is again told the token expired fails with AuthExpired
//! and never asks for a second renewal.

use super::harness::{drain_events, RenewalScript, TestHarness};
use crate::error::DispatchError;
use crate::session_store::{EndReason, SessionEvent};
use crate::wire::ApiRequest;
use std::time::Duration;

#[tokio::test]
async fn second_expiry_fails_without_second_renewal() {
    let harness = TestHarness::new();
    harness.sign_in();
    harness.api.expire_all();
    harness.api.set_renewal(RenewalScript::RotateWithoutActivation);
    let mut events = harness.pipeline.subscribe();

    let result = harness.pipeline.perform(&ApiRequest::get("/jobs")).await;

    assert!(matches!(result, Err(DispatchError::AuthExpired)));
    assert_eq!(harness.api.renewal_calls(), 1);
    assert_eq!(
        harness.api.bearers_for("/jobs"),
        vec!["access-0".to_string(), "access-1".to_string()]
    );
    assert!(harness.pipeline.store().read().is_none());

    let ended: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Ended { reason } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(ended, vec![EndReason::RetryExhausted]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_second_expiries_stay_bounded() {
    let harness = TestHarness::new();
    harness.sign_in();
    harness.api.expire_all();
    harness.api.set_renewal(RenewalScript::RotateWithoutActivation);
    harness.api.set_renewal_delay(Duration::from_millis(50));

    let mut handles = Vec::new();
    for i in 0..5 {
        let pipeline = harness.pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.perform(&ApiRequest::get(format!("/users/{}", i))).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert!(matches!(
            handle.await.unwrap(),
            Err(DispatchError::AuthExpired)
        ));
        assert!(harness.api.calls_to(&format!("/users/{}", i)).len() <= 2);
    }
    assert_eq!(harness.api.renewal_calls(), 1);
    assert!(harness.pipeline.store().read().is_none());
}

#[tokio::test]
async fn retry_outcome_other_than_expiry_is_returned() {
    let harness = TestHarness::new();
    harness.sign_in();
    harness.api.expire_all();

    let response = harness
        .pipeline
        .perform(&ApiRequest::get("/jobs"))
        .await
        .unwrap();
    assert_eq!(response.body["servedWith"], "access-1");
    assert_eq!(harness.api.calls_to("/jobs").len(), 2);
}
