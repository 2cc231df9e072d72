// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end vault scenarios over a temp database and a scripted probe.

use std::time::Duration;

use byok_core::schema::COST_PER_REQUEST;
use byok_core::types::{AuditEvent, CredentialStatus, EncryptedBundle};
use byok_core::{
    ByokError, Capability, Credential, CredentialFilter, CredentialStore, Environment, Metadata,
    MetadataValue, Provider, SecretPayload, SelectionStrategy, UsageMetrics,
};
use byok_crypto::{TenantCipher, hash_secret};
use byok_router::BreakerState;
use byok_test_utils::{ROTATED_MASTER_SECRET, TEST_MASTER_SECRET, TestVault, master, openai_key};
use byok_validator::ValidationOutcome;
use byok_vault::{CredentialChanges, NewCredential};
use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

fn openai(tenant: &str, alias: &str) -> NewCredential {
    NewCredential::new(
        tenant,
        Provider::OpenAi,
        Environment::Production,
        alias,
        SecretPayload::new(openai_key(alias)),
    )
}

async fn create(vault: &TestVault, tenant: &str, alias: &str) -> Credential {
    vault.create_credential(openai(tenant, alias)).await.unwrap()
}

fn events(entries: &[byok_core::AuditEntry], id: &str) -> Vec<AuditEvent> {
    let mut events: Vec<_> = entries
        .iter()
        .filter(|e| e.credential_id.as_deref() == Some(id))
        .map(|e| e.event)
        .collect();
    events.reverse();
    events
}

#[tokio::test]
async fn create_stores_encrypted_and_reveal_round_trips() {
    let vault = TestVault::new().await.unwrap();
    let credential = create(&vault, "t1", "primary").await;

    assert_eq!(credential.status, CredentialStatus::Active);
    assert_eq!(credential.health_score, 100);
    assert_eq!(credential.key_hash, hash_secret(&openai_key("primary")));
    let needle = openai_key("primary");
    assert!(
        !credential
            .bundle
            .ciphertext
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    );

    let fetched = vault.get_credential(&credential.id).await.unwrap();
    assert_eq!(fetched, credential);

    let secret = vault.reveal_secret(&credential.id).await.unwrap();
    assert_eq!(secret.api_key(), openai_key("primary"));

    let audit = vault.audit("t1").await.unwrap();
    assert_eq!(
        events(&audit, &credential.id),
        vec![AuditEvent::Create, AuditEvent::Use]
    );
}

#[tokio::test]
async fn invalid_input_is_rejected_and_nothing_is_stored() {
    let vault = TestVault::new().await.unwrap();

    let malformed = NewCredential::new(
        "t1",
        Provider::OpenAi,
        Environment::Production,
        "bad",
        SecretPayload::new("not-an-openai-key"),
    );
    let unknown_key: Metadata = [("voice_id".to_string(), MetadataValue::Text("v1".into()))]
        .into_iter()
        .collect();
    let wrong_kind: Metadata = [(COST_PER_REQUEST.to_string(), MetadataValue::Text("cheap".into()))]
        .into_iter()
        .collect();

    let attempts = [
        malformed,
        openai("t1", "meta").with_metadata(unknown_key),
        openai("t1", "kind").with_metadata(wrong_kind),
        openai("t1", "caps").with_capabilities([Capability::Telephony]),
        openai("t1", "past").expires_at(Utc::now() - TimeDelta::seconds(5)),
        openai("t1", " "),
    ];
    for attempt in attempts {
        let result = vault.create_credential(attempt).await;
        assert!(
            matches!(result, Err(ByokError::Validation(_))),
            "expected validation error, got {result:?}"
        );
    }

    let listed = vault
        .list_credentials("t1", &CredentialFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn duplicate_key_is_rejected_per_tenant() {
    let vault = TestVault::new().await.unwrap();
    create(&vault, "t1", "shared").await;

    let again = vault.create_credential(openai("t1", "shared")).await;
    assert!(matches!(
        again,
        Err(ByokError::DuplicateCredential { ref tenant_id, provider: Provider::OpenAi }) if tenant_id == "t1"
    ));

    // Another tenant may hold the same key.
    create(&vault, "t2", "shared").await;
}

#[tokio::test]
async fn find_by_secret_matches_only_the_owning_tenant() {
    let vault = TestVault::new().await.unwrap();
    let credential = create(&vault, "t1", "lookup").await;
    let secret = SecretPayload::new(openai_key("lookup"));

    let found = vault.find_by_secret("t1", &secret).await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(credential.id));
    assert!(vault.find_by_secret("t2", &secret).await.unwrap().is_none());
    assert!(
        vault
            .find_by_secret("t1", &SecretPayload::new(openai_key("other")))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn secret_update_re_encrypts_and_resets_health() {
    let vault = TestVault::builder()
        .with_probe_statuses(vec![401, 401, 401])
        .build()
        .await
        .unwrap();
    let credential = create(&vault, "t1", "rotating").await;
    for _ in 0..3 {
        vault.validate_credential(&credential.id).await.unwrap();
    }
    let invalid = vault.get_credential(&credential.id).await.unwrap();
    assert_eq!(invalid.status, CredentialStatus::Invalid);

    let updated = vault
        .update_credential(
            &credential.id,
            CredentialChanges {
                secret: Some(SecretPayload::new(openai_key("replacement"))),
                alias: Some("rotated".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, CredentialStatus::Active);
    assert_eq!(updated.health_score, 100);
    assert_eq!(updated.validation_failures, 0);
    assert_eq!(updated.alias, "rotated");
    assert_eq!(updated.key_hash, hash_secret(&openai_key("replacement")));
    assert_ne!(updated.bundle, credential.bundle);
    assert_eq!(
        vault.reveal_secret(&credential.id).await.unwrap().api_key(),
        openai_key("replacement")
    );
}

#[tokio::test]
async fn secret_update_cannot_collide_with_another_credential() {
    let vault = TestVault::new().await.unwrap();
    create(&vault, "t1", "first").await;
    let second = create(&vault, "t1", "second").await;

    let result = vault
        .update_credential(
            &second.id,
            CredentialChanges {
                secret: Some(SecretPayload::new(openai_key("first"))),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ByokError::DuplicateCredential { .. })));
}

#[tokio::test]
async fn metadata_update_is_schema_checked() {
    let vault = TestVault::new().await.unwrap();
    let credential = create(&vault, "t1", "meta").await;

    let bad: Metadata = [("region".to_string(), MetadataValue::Text("us1".into()))]
        .into_iter()
        .collect();
    let result = vault
        .update_credential(
            &credential.id,
            CredentialChanges {
                metadata: Some(bad),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ByokError::Validation(_))));

    let good: Metadata = [("organization".to_string(), MetadataValue::Text("org-1".into()))]
        .into_iter()
        .collect();
    let updated = vault
        .update_credential(
            &credential.id,
            CredentialChanges {
                metadata: Some(good.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.metadata, good);
}

#[tokio::test]
async fn revoked_credential_is_never_selected_or_reactivated() {
    let vault = TestVault::new().await.unwrap();
    let credential = create(&vault, "t1", "revoke-me").await;
    assert_eq!(
        vault
            .get_fallback_credential("t1", Provider::OpenAi)
            .await
            .unwrap()
            .credential
            .id,
        credential.id
    );

    let revoked = vault.revoke_credential(&credential.id).await.unwrap();
    assert_eq!(revoked.status, CredentialStatus::Revoked);
    assert!(matches!(
        vault.get_fallback_credential("t1", Provider::OpenAi).await,
        Err(ByokError::NoAvailableCredential { .. })
    ));

    let reactivate = vault
        .update_credential(
            &credential.id,
            CredentialChanges {
                status: Some(CredentialStatus::Active),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(reactivate, Err(ByokError::Validation(_))));

    let audit = vault.audit("t1").await.unwrap();
    assert!(events(&audit, &credential.id).contains(&AuditEvent::Revoke));
}

#[tokio::test]
async fn delete_removes_chain_membership_and_keeps_audit() {
    let vault = TestVault::new().await.unwrap();
    let a = create(&vault, "t1", "a").await;
    let b = create(&vault, "t1", "b").await;
    vault
        .configure_chain(
            "t1",
            Provider::OpenAi,
            Environment::Production,
            vec![a.id.clone(), b.id.clone()],
            SelectionStrategy::Sequential,
        )
        .await
        .unwrap();

    vault.delete_credential(&a.id).await.unwrap();
    assert!(matches!(
        vault.get_credential(&a.id).await,
        Err(ByokError::CredentialNotFound(_))
    ));
    let chain = vault
        .get_chain("t1", Provider::OpenAi, Environment::Production)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chain.credential_ids, vec![b.id.clone()]);

    let audit = vault.audit("t1").await.unwrap();
    assert_eq!(
        events(&audit, &a.id),
        vec![AuditEvent::Create, AuditEvent::Delete]
    );
}

#[tokio::test]
async fn delete_tenant_cascades_but_leaves_other_tenants() {
    let vault = TestVault::new().await.unwrap();
    let a = create(&vault, "t1", "a").await;
    create(&vault, "t1", "b").await;
    let other = create(&vault, "t2", "c").await;
    vault
        .configure_chain(
            "t1",
            Provider::OpenAi,
            Environment::Production,
            vec![a.id.clone()],
            SelectionStrategy::Sequential,
        )
        .await
        .unwrap();
    vault
        .report_success(&a.id, UsageMetrics::operation("chat"))
        .await
        .unwrap();

    assert_eq!(vault.delete_tenant("t1").await.unwrap(), 2);
    let all = CredentialFilter {
        include_expired: true,
        ..Default::default()
    };
    assert!(vault.list_credentials("t1", &all).await.unwrap().is_empty());
    assert!(
        vault
            .get_chain("t1", Provider::OpenAi, Environment::Production)
            .await
            .unwrap()
            .is_none()
    );
    assert!(vault.get_credential(&other.id).await.is_ok());
    assert!(!vault.audit("t1").await.unwrap().is_empty());
}

#[tokio::test]
async fn validation_drives_health_and_status() {
    let vault = TestVault::builder()
        .with_probe_statuses(vec![401, 401, 401, 200])
        .build()
        .await
        .unwrap();
    let credential = create(&vault, "t1", "probe").await;

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(vault.validate_credential(&credential.id).await.unwrap().outcome);
    }
    assert!(outcomes.iter().all(|o| *o == ValidationOutcome::Rejected));
    let invalid = vault.get_credential(&credential.id).await.unwrap();
    assert_eq!(invalid.status, CredentialStatus::Invalid);
    assert_eq!(invalid.health_score, 34);
    assert!(vault.get_fallback_credential("t1", Provider::OpenAi).await.is_err());

    let result = vault.validate_credential(&credential.id).await.unwrap();
    assert!(result.is_valid);
    let restored = vault.get_credential(&credential.id).await.unwrap();
    assert_eq!(restored.status, CredentialStatus::Active);
    assert_eq!(vault.probe.probe_count().await, 4);
    assert!(vault.probe.seen_urls().await[0].ends_with("/v1/models"));
}

#[tokio::test]
async fn scenario_c_rotation_re_encrypts_everything() {
    let vault = TestVault::new().await.unwrap();
    let a = create(&vault, "t1", "a").await;
    let b = create(&vault, "t2", "b").await;

    let report = vault
        .rotate_master_secret(master(ROTATED_MASTER_SECRET).unwrap())
        .await
        .unwrap();
    assert_eq!(report.rotated, 2);

    assert_eq!(vault.reveal_secret(&a.id).await.unwrap().api_key(), openai_key("a"));
    assert_eq!(vault.reveal_secret(&b.id).await.unwrap().api_key(), openai_key("b"));

    let stored = vault.get_credential(&a.id).await.unwrap();
    assert_eq!(stored.key_hash, a.key_hash);
    let old = TenantCipher::new(master(TEST_MASTER_SECRET).unwrap(), 100_000).unwrap();
    assert!(matches!(
        old.decrypt(&stored.bundle, "t1"),
        Err(ByokError::Decryption(_))
    ));

    let selected = vault.get_fallback_credential("t1", Provider::OpenAi).await.unwrap();
    assert_eq!(selected.secret.api_key(), openai_key("a"));

    let audit = vault.audit("t2").await.unwrap();
    assert!(events(&audit, &b.id).contains(&AuditEvent::Rotate));
}

#[tokio::test]
async fn failed_rotation_changes_nothing() {
    let vault = TestVault::new().await.unwrap();
    let good = create(&vault, "t1", "good").await;

    // A row whose bundle cannot be opened under the current master.
    let mut corrupt = good.clone();
    corrupt.id = "corrupt".into();
    corrupt.key_hash = hash_secret("something-else");
    corrupt.bundle = EncryptedBundle {
        ciphertext: vec![1; 32],
        salt: vec![2; 16],
        nonce: vec![3; 12],
        auth_tag: vec![4; 16],
    };
    vault.store().create(&corrupt).await.unwrap();

    let result = vault
        .rotate_master_secret(master(ROTATED_MASTER_SECRET).unwrap())
        .await;
    assert!(matches!(result, Err(ByokError::Decryption(_))));

    let stored = vault.get_credential(&good.id).await.unwrap();
    assert_eq!(stored.bundle, good.bundle);
    assert_eq!(
        vault.reveal_secret(&good.id).await.unwrap().api_key(),
        openai_key("good")
    );
}

#[tokio::test]
async fn housekeeping_expires_due_credentials() {
    let vault = TestVault::new().await.unwrap();
    let due = create(&vault, "t1", "due").await;
    let fresh = create(&vault, "t1", "fresh").await;
    vault
        .update_credential(
            &due.id,
            CredentialChanges {
                expires_at: Some(Some(Utc::now() - TimeDelta::seconds(1))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = vault.run_housekeeping().await.unwrap();
    assert_eq!(report.expired, vec![(due.id.clone(), "t1".to_string())]);

    let expired = vault.get_credential(&due.id).await.unwrap();
    assert_eq!(expired.status, CredentialStatus::Expired);
    assert_eq!(
        vault.get_credential(&fresh.id).await.unwrap().status,
        CredentialStatus::Active
    );
    let audit = vault.audit("t1").await.unwrap();
    assert!(events(&audit, &due.id).contains(&AuditEvent::Expire));

    let second = vault.run_housekeeping().await.unwrap();
    assert!(second.expired.is_empty());
}

#[tokio::test]
async fn housekeeping_task_stops_on_cancel() {
    let vault = TestVault::new().await.unwrap();
    let cancel = CancellationToken::new();
    let handle = vault.spawn_housekeeping(cancel.clone());
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("housekeeping task did not stop")
        .unwrap();
}

#[tokio::test]
async fn scenario_a_through_the_vault() {
    let vault = TestVault::builder()
        .with_breaker(5, Duration::from_millis(200))
        .build()
        .await
        .unwrap();
    let credential = create(&vault, "t1", "only").await;
    vault
        .configure_chain(
            "t1",
            Provider::OpenAi,
            Environment::Production,
            vec![credential.id.clone()],
            SelectionStrategy::Sequential,
        )
        .await
        .unwrap();

    for _ in 0..5 {
        vault
            .report_failure(&credential.id, UsageMetrics::operation("chat"))
            .await
            .unwrap();
    }
    assert_eq!(vault.breaker_state(&credential.id).state, BreakerState::Open);
    assert!(vault.get_fallback_credential("t1", Provider::OpenAi).await.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let trial = vault.get_fallback_credential("t1", Provider::OpenAi).await.unwrap();
    assert!(trial.half_open_trial);
    vault
        .report_success(&credential.id, UsageMetrics::operation("chat"))
        .await
        .unwrap();
    assert_eq!(vault.breaker_state(&credential.id).state, BreakerState::Closed);
    assert!(vault.get_fallback_credential("t1", Provider::OpenAi).await.is_ok());
}

#[tokio::test]
async fn tenants_never_see_each_others_credentials() {
    let vault = TestVault::new().await.unwrap();
    create(&vault, "t1", "mine").await;
    assert!(matches!(
        vault.get_fallback_credential("t2", Provider::OpenAi).await,
        Err(ByokError::NoAvailableCredential { .. })
    ));
    let staging = vault
        .get_fallback_credential_in("t1", Provider::OpenAi, Environment::Staging)
        .await;
    assert!(staging.is_err());
}
