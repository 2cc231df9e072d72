// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master secret rotation across the whole store.

use byok_core::types::AuditEvent;
use byok_core::{ByokError, EncryptedBundle};
use byok_crypto::{MasterSecret, TenantCipher, offload};
use tracing::{info, warn};

use crate::vault::CredentialVault;

/// Outcome of [`CredentialVault::rotate_master_secret`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: usize,
}

impl CredentialVault {
    /// Re-encrypt every bundle under `new_master` and switch the process
    /// cipher to it.
    ///
    /// All bundles are re-encrypted in memory first and persisted in one
    /// transaction. Any failure leaves the store and the active cipher as
    /// they were. Bundle writers are held off for the duration.
    pub async fn rotate_master_secret(
        &self,
        new_master: MasterSecret,
    ) -> Result<RotationReport, ByokError> {
        let _guard = self.rotation.write().await;
        let current = self.cipher.load();
        let bundles = self.store.list_all_bundles().await?;

        let (rotated, owners, next) = offload(move || {
            let mut rotated: Vec<(String, EncryptedBundle)> = Vec::with_capacity(bundles.len());
            let mut owners = Vec::with_capacity(bundles.len());
            for (id, tenant_id, bundle) in bundles {
                let bundle = current
                    .rotate(&bundle, &tenant_id, &new_master)
                    .inspect_err(|e| warn!(credential_id = %id, error = %e, "rotation aborted"))?;
                rotated.push((id.clone(), bundle));
                owners.push((id, tenant_id));
            }
            let next = TenantCipher::new(new_master, current.iterations())?;
            Ok((rotated, owners, next))
        })
        .await?;

        self.store.replace_bundles(&rotated).await?;
        self.cipher.swap(next);
        info!(credentials = rotated.len(), "master secret rotated");

        for (id, tenant_id) in &owners {
            self.audit
                .credential_event(tenant_id, id, AuditEvent::Rotate, true, "re-encrypted under new master secret")
                .await;
        }
        Ok(RotationReport {
            rotated: rotated.len(),
        })
    }
}
