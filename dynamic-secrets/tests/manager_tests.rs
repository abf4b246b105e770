//! Lease manager behaviour against a scripted transport.

use dynamic_secrets::{
    DynamicSecretProvider, FileLeaseStore, LeaseManager, LeaseStore, ManualClock,
    MemoryLeaseStore, RevokeOutcome, TransportError, codec,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_utils::fixtures::{aws_deploy_config, aws_lease, sample_mounts, unix};
use test_utils::mocks::{MockTransport, TransportCall};

struct Harness {
    transport: Arc<MockTransport>,
    store: Arc<MemoryLeaseStore>,
    clock: Arc<ManualClock>,
    manager: LeaseManager,
}

fn harness(start: i64) -> Harness {
    let transport = Arc::new(MockTransport::new());
    let store = Arc::new(MemoryLeaseStore::new());
    let clock = Arc::new(ManualClock::at_unix(start));
    let manager = LeaseManager::new(
        Arc::clone(&store) as Arc<dyn LeaseStore>,
        Arc::clone(&transport) as Arc<dyn dynamic_secrets::Transport>,
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn dynamic_secrets::Clock>);

    Harness { transport, store, clock, manager }
}

#[tokio::test]
async fn cache_hit_within_lease_window() {
    let h = harness(1000);
    let config = aws_deploy_config();

    let first = h.manager.get_value("aws_deploy", &config).await;
    let second = h.manager.get_value("aws_deploy", &config).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(h.transport.read_count().await, 1);
    assert_eq!(
        h.transport.calls().await,
        vec![TransportCall::Read("/aws/creds/deploy".to_string())]
    );
}

#[tokio::test]
async fn expiry_scenario_from_issue_time() {
    let h = harness(1000);
    let config = aws_deploy_config();

    h.manager.get_value("aws_deploy", &config).await;
    let record = h.manager.lease("aws_deploy").await.unwrap().unwrap();
    assert_eq!(record.lease_duration, 3600);
    assert_eq!(record.lease_expiry, unix(4600));

    h.clock.set_unix(4599);
    h.manager.get_value("aws_deploy", &config).await;
    assert_eq!(h.transport.read_count().await, 1);

    h.clock.set_unix(4601);
    h.manager.get_value("aws_deploy", &config).await;
    assert_eq!(h.transport.read_count().await, 2);
}

#[tokio::test]
async fn refetch_replaces_whole_record() {
    let h = harness(0);
    let config = aws_deploy_config();

    let old = h.manager.get_value("aws_deploy", &config).await;
    h.clock.advance(3600);
    let new = h.manager.get_value("aws_deploy", &config).await;

    let record = h.manager.lease("aws_deploy").await.unwrap().unwrap();
    assert_ne!(old, new);
    assert_eq!(record.data, new);
    assert_eq!(record.lease_id, "aws/creds/deploy/2");
    assert_eq!(record.lease_expiry, unix(7200));
    assert_eq!(codec::decode(&new).unwrap()["access_key"], json!("AKIA2"));
}

#[tokio::test]
async fn expiry_is_not_resampled_on_read() {
    let h = harness(1000);
    let config = aws_deploy_config();

    h.manager.get_value("aws_deploy", &config).await;
    let before = h.manager.lease("aws_deploy").await.unwrap().unwrap();

    h.clock.advance(1800);
    h.manager.get_value("aws_deploy", &config).await;
    let after = h.manager.lease("aws_deploy").await.unwrap().unwrap();

    assert_eq!(before, after);
}

#[tokio::test]
async fn failed_fetch_returns_empty_and_keeps_store_clean() {
    let h = harness(0);
    h.transport
        .push_read(Err(TransportError::PermissionDenied("/aws/creds/deploy".to_string())))
        .await;

    let value = h.manager.get_value("aws_deploy", &aws_deploy_config()).await;

    assert_eq!(value, "");
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn failed_refresh_keeps_expired_record() {
    let h = harness(0);
    let config = aws_deploy_config();

    h.manager.get_value("aws_deploy", &config).await;
    h.clock.advance(4000);
    h.transport
        .push_read(Err(TransportError::Unavailable("connection refused".to_string())))
        .await;

    assert_eq!(h.manager.get_value("aws_deploy", &config).await, "");
    let record = h.manager.lease("aws_deploy").await.unwrap().unwrap();
    assert_eq!(record.lease_id, "aws/creds/deploy/1");
}

#[tokio::test]
async fn strict_get_surfaces_transport_error() {
    let h = harness(0);
    h.transport
        .push_read(Err(TransportError::RateLimited))
        .await;

    let err = h
        .manager
        .try_get_value("aws_deploy", &aws_deploy_config())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn delete_without_record_is_a_noop() {
    let h = harness(0);

    h.manager.delete_value("aws_deploy", &aws_deploy_config()).await;

    assert!(h.transport.calls().await.is_empty());
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn delete_revokes_before_forgetting() {
    let h = harness(0);
    let config = aws_deploy_config();
    h.transport.push_read(Ok(aws_lease("aws/creds/deploy/abc123", 60))).await;

    h.manager.get_value("aws_deploy", &config).await;
    let outcome = h.manager.try_delete_value("aws_deploy", &config).await.unwrap();

    assert_eq!(outcome, RevokeOutcome::Revoked);
    assert_eq!(
        h.transport.calls().await[1],
        TransportCall::Put(
            "/sys/leases/revoke/aws/creds/deploy/abc123".to_string(),
            json!({ "lease_id": "aws/creds/deploy/abc123" })
        )
    );
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn revoke_failure_still_removes_record() {
    let h = harness(0);
    let config = aws_deploy_config();
    h.transport.fail_puts().await;

    h.manager.get_value("aws_deploy", &config).await;
    h.manager.delete_value("aws_deploy", &config).await;

    assert_eq!(h.transport.put_count().await, 1);
    assert!(h.manager.lease("aws_deploy").await.unwrap().is_none());

    // Next read starts over with a fresh lease.
    h.manager.get_value("aws_deploy", &config).await;
    assert_eq!(h.transport.read_count().await, 2);
}

#[tokio::test]
async fn set_value_is_discarded() {
    let h = harness(0);
    let config = aws_deploy_config();

    let value = h.manager.get_value("aws_deploy", &config).await;
    h.manager.set_value("aws_deploy", "manual-override").await;

    assert_eq!(h.manager.get_value("aws_deploy", &config).await, value);
    assert_eq!(h.transport.read_count().await, 1);
}

#[tokio::test]
async fn identities_are_independent() {
    let h = harness(0);
    let config = aws_deploy_config();

    let a = h.manager.get_value("aws_a", &config).await;
    let b = h.manager.get_value("aws_b", &config).await;
    h.manager.delete_value("aws_a", &config).await;

    assert_ne!(a, b);
    assert!(h.manager.lease("aws_a").await.unwrap().is_none());
    assert_eq!(h.manager.lease("aws_b").await.unwrap().unwrap().data, b);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn concurrent_refresh_issues_one_lease() {
    let h = harness(0);
    h.transport.set_read_delay(Duration::from_millis(50)).await;
    let manager = Arc::new(h.manager);
    let config = aws_deploy_config();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let config = config.clone();
            tokio::spawn(async move { manager.get_value("aws_deploy", &config).await })
        })
        .collect();

    let mut values = Vec::new();
    for task in tasks {
        values.push(task.await.unwrap());
    }

    assert_eq!(h.transport.read_count().await, 1);
    assert!(values.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn concurrent_deletes_revoke_once() {
    let h = harness(0);
    let config = aws_deploy_config();
    h.manager.get_value("aws_deploy", &config).await;
    let manager = Arc::new(h.manager);

    let (a, b) = tokio::join!(
        manager.try_delete_value("aws_deploy", &config),
        manager.try_delete_value("aws_deploy", &config)
    );

    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == RevokeOutcome::Revoked);
    assert_eq!(outcomes, vec![RevokeOutcome::NoLease, RevokeOutcome::Revoked]);
    assert_eq!(h.transport.put_count().await, 1);
}

#[tokio::test]
async fn mount_verification_uses_mount_table() {
    let h = harness(0);
    h.transport.set_mounts(sample_mounts()).await;

    assert!(h.manager.verify_mount(&aws_deploy_config(), "aws").await.is_ok());
    assert_eq!(h.manager.available_mounts("kv").await.unwrap().len(), 1);
    assert!(
        h.manager
            .verify_mount(&dynamic_secrets::ProviderConfig::new("secret/", "deploy").unwrap(), "aws")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn file_store_survives_manager_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leases.json");
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(ManualClock::at_unix(1000));
    let config = aws_deploy_config();

    let build = || {
        LeaseManager::new(
            Arc::new(FileLeaseStore::new(&path)),
            Arc::clone(&transport) as Arc<dyn dynamic_secrets::Transport>,
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn dynamic_secrets::Clock>)
    };

    let first = build().get_value("aws_deploy", &config).await;
    let second = build().get_value("aws_deploy", &config).await;

    assert_eq!(first, second);
    assert_eq!(transport.read_count().await, 1);

    build().delete_value("aws_deploy", &config).await;
    let store = FileLeaseStore::new(&path);
    assert!(store.get("dynamic_secrets.aws_deploy").await.unwrap().is_none());
}
