// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic expiry and retention cleanup.

use std::time::Duration;

use byok_core::ByokError;
use byok_core::types::AuditEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::vault::CredentialVault;

/// What one housekeeping pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// `(credential_id, tenant_id)` pairs moved to `expired`.
    pub expired: Vec<(String, String)>,
    pub usage_deleted: u64,
    pub audit_deleted: u64,
}

impl CredentialVault {
    /// Expire due credentials and apply the usage and audit retentions.
    pub async fn run_housekeeping(&self) -> Result<HousekeepingReport, ByokError> {
        let expired = self.store.cleanup_expired().await?;
        for (id, tenant_id) in &expired {
            self.audit
                .credential_event(tenant_id, id, AuditEvent::Expire, true, "expires_at passed")
                .await;
        }
        let usage_deleted = self
            .store
            .cleanup_old_usage(self.housekeeping.usage_retention_days)
            .await?;
        let audit_deleted = self
            .store
            .cleanup_audit(self.housekeeping.audit_retention_days)
            .await?;

        let report = HousekeepingReport {
            expired,
            usage_deleted,
            audit_deleted,
        };
        if report.expired.is_empty() && usage_deleted == 0 && audit_deleted == 0 {
            debug!("housekeeping pass found nothing to do");
        } else {
            info!(
                expired = report.expired.len(),
                usage_deleted, audit_deleted, "housekeeping pass finished"
            );
        }
        Ok(report)
    }

    /// Run [`run_housekeeping`](Self::run_housekeeping) every
    /// `housekeeping.interval_secs` until `cancel` fires.
    pub fn spawn_housekeeping(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let vault = self.clone();
        let period = Duration::from_secs(self.housekeeping.interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = vault.run_housekeeping().await {
                            warn!(error = %e, "housekeeping pass failed");
                        }
                    }
                    _ = cancel.cancelled() => {
                        info!("housekeeping task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
