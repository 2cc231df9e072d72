// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail.

use std::sync::Arc;

use tracing::warn;

use crate::traits::CredentialStore;
use crate::types::{AuditEntry, AuditEvent};

/// Writes audit entries through the store.
///
/// Audit writes never fail the operation being audited: a failed append is
/// logged at `warn` and dropped.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn CredentialStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(
                tenant_id = %entry.tenant_id,
                credential_id = ?entry.credential_id,
                event = %entry.event,
                error = %e,
                "failed to append audit entry"
            );
        }
    }

    /// Shorthand for a credential-scoped entry.
    pub async fn credential_event(
        &self,
        tenant_id: &str,
        credential_id: &str,
        event: AuditEvent,
        success: bool,
        context: impl Into<String>,
    ) {
        self.record(AuditEntry::new(
            tenant_id,
            Some(credential_id.to_string()),
            event,
            success,
            context,
        ))
        .await;
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}
