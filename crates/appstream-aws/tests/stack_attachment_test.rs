mod common;

use appstream_aws::{AppStreamApi, FLEET_TYPE, STACK_ATTACHMENT_TYPE, STACK_TYPE, StackRequest};
use appstream_plugin::{Attributes, ProviderError, ResourceState};
use common::{FakeAppStream, attrs, provider};
use serde_json::json;
use std::sync::Arc;

/// Fake with stacks `stack-a`, `stack-b` and fleets `fleet-a`, `fleet-b`
async fn seeded() -> Arc<FakeAppStream> {
    let fake = FakeAppStream::new();
    for stack in ["stack-a", "stack-b"] {
        fake.create_stack(&StackRequest::new(stack)).await.unwrap();
    }
    let p = provider(fake.clone());
    for fleet in ["fleet-a", "fleet-b"] {
        let config = json!({
            "name": fleet,
            "instance_type": "stream.standard.small",
            "compute_capacity": [{ "desired_instances": 1 }],
        });
        p.create(FLEET_TYPE, attrs(config)).await.unwrap();
    }
    fake.clear_calls();
    fake
}

fn pair(stack: &str, fleet: &str) -> Attributes {
    attrs(json!({ "appstream_stack_id": stack, "appstream_fleet_id": fleet }))
}

#[tokio::test(start_paused = true)]
async fn test_create_associates() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();

    assert_eq!(state.id, "stack-a/fleet-a");
    assert_eq!(state.attributes["appstream_stack_id"], json!("stack-a"));
    assert_eq!(state.attributes["appstream_fleet_id"], json!("fleet-a"));
    assert_eq!(
        fake.calls(),
        vec![
            "AssociateFleet stack-a fleet-a",
            "ListAssociatedFleets stack-a",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_error_propagates() {
    let fake = seeded().await;
    fake.fail_on("AssociateFleet");
    let p = provider(fake.clone());

    let err = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ApiError(_)), "{}", err);
}

#[tokio::test(start_paused = true)]
async fn test_update_disassociates_old_pair_first() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();
    fake.clear_calls();

    let updated = p
        .update(STACK_ATTACHMENT_TYPE, state, pair("stack-b", "fleet-b"))
        .await
        .unwrap();

    assert_eq!(updated.id, "stack-b/fleet-b");
    assert_eq!(
        fake.calls(),
        vec![
            "DisassociateFleet stack-a fleet-a",
            "AssociateFleet stack-b fleet-b",
            "ListAssociatedFleets stack-b",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_failing_associate_leaves_old_pair_removed() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();
    fake.clear_calls();
    fake.fail_on("AssociateFleet");

    let err = p
        .update(STACK_ATTACHMENT_TYPE, state.clone(), pair("stack-b", "fleet-b"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ApiError(_)), "{}", err);
    assert_eq!(
        fake.calls(),
        vec![
            "DisassociateFleet stack-a fleet-a",
            "AssociateFleet stack-b fleet-b",
        ]
    );
    assert_eq!(
        fake.list_associated_fleets("stack-a").await.unwrap(),
        Some(vec![])
    );
    assert!(p.read(STACK_ATTACHMENT_TYPE, state).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_update_without_changes_only_reads() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();
    fake.clear_calls();

    let planned = state.attributes.clone();
    p.update(STACK_ATTACHMENT_TYPE, state, planned).await.unwrap();
    assert_eq!(fake.calls(), vec!["ListAssociatedFleets stack-a"]);
}

#[tokio::test(start_paused = true)]
async fn test_read_gone_when_other_fleet_associated() {
    let fake = seeded().await;
    fake.associate("stack-a", "fleet-b");
    let p = provider(fake.clone());

    let state = ResourceState::new("stack-a/fleet-a", Default::default());
    assert!(p.read(STACK_ATTACHMENT_TYPE, state).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_read_gone_when_stack_missing() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();
    let stack = ResourceState::new("stack-a", Default::default());
    p.delete(STACK_TYPE, stack).await.unwrap();

    assert!(p.read(STACK_ATTACHMENT_TYPE, state).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_read_rejects_malformed_id() {
    let p = provider(seeded().await);

    let state = ResourceState::new("stack-a", Default::default());
    let err = p.read(STACK_ATTACHMENT_TYPE, state).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidId { .. }), "{}", err);
}

#[tokio::test(start_paused = true)]
async fn test_delete_disassociates() {
    let fake = seeded().await;
    let p = provider(fake.clone());

    let state = p
        .create(STACK_ATTACHMENT_TYPE, pair("stack-a", "fleet-a"))
        .await
        .unwrap();
    fake.clear_calls();

    p.delete(STACK_ATTACHMENT_TYPE, state.clone()).await.unwrap();
    assert_eq!(fake.calls(), vec!["DisassociateFleet stack-a fleet-a"]);
    assert!(p.read(STACK_ATTACHMENT_TYPE, state).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_import_by_composite_id() {
    let fake = seeded().await;
    fake.associate("stack-b", "fleet-a");
    let p = provider(fake.clone());

    let imported = p
        .import(STACK_ATTACHMENT_TYPE, "stack-b/fleet-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(imported.attributes, pair("stack-b", "fleet-a"));

    assert!(
        p.import(STACK_ATTACHMENT_TYPE, "stack-b/fleet-b")
            .await
            .unwrap()
            .is_none()
    );
}
