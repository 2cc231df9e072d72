// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide cipher that can be swapped after a master rotation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use byok_core::{ByokError, EncryptedBundle, SecretPayload};

use crate::cipher::TenantCipher;

/// Run key derivation and AEAD work on tokio's blocking pool.
///
/// Every PBKDF2 derivation costs at least 100,000 HMAC rounds; it must not
/// run on an async worker thread.
pub async fn offload<T, F>(work: F) -> Result<T, ByokError>
where
    F: FnOnce() -> Result<T, ByokError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ByokError::Internal(format!("crypto task panicked: {e}")))?
}

/// Shared, lock-free handle to the active [`TenantCipher`].
///
/// Readers take a snapshot with [`CipherHandle::load`]; an in-flight
/// operation keeps the cipher it started with even if a swap happens.
#[derive(Clone)]
pub struct CipherHandle {
    inner: Arc<ArcSwap<TenantCipher>>,
}

impl CipherHandle {
    pub fn new(cipher: TenantCipher) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(cipher)),
        }
    }

    pub fn load(&self) -> Arc<TenantCipher> {
        self.inner.load_full()
    }

    /// Install `cipher` for all subsequent loads.
    pub fn swap(&self, cipher: TenantCipher) {
        self.inner.store(Arc::new(cipher));
    }

    /// [`TenantCipher::encrypt_payload`] on the blocking pool.
    pub async fn encrypt_payload(
        &self,
        payload: &SecretPayload,
        tenant_id: &str,
    ) -> Result<EncryptedBundle, ByokError> {
        let cipher = self.load();
        let payload = payload.clone();
        let tenant_id = tenant_id.to_string();
        offload(move || cipher.encrypt_payload(&payload, &tenant_id)).await
    }

    /// [`TenantCipher::decrypt_payload`] on the blocking pool.
    pub async fn decrypt_payload(
        &self,
        bundle: &EncryptedBundle,
        tenant_id: &str,
    ) -> Result<SecretPayload, ByokError> {
        let cipher = self.load();
        let bundle = bundle.clone();
        let tenant_id = tenant_id.to_string();
        offload(move || cipher.decrypt_payload(&bundle, &tenant_id)).await
    }
}

impl std::fmt::Debug for CipherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::MasterSecret;
    use secrecy::SecretString;

    fn cipher(secret: &str) -> TenantCipher {
        let master = MasterSecret::new(SecretString::from(secret.to_string())).unwrap();
        TenantCipher::new(master, 100_000).unwrap()
    }

    #[test]
    fn swap_is_seen_by_clones_and_old_snapshots_survive() {
        let handle = CipherHandle::new(cipher("Correct-Horse-Battery-Staple-2026-master"));
        let clone = handle.clone();
        let before = handle.load();
        let bundle = before.encrypt(b"sk-live-1", "t1").unwrap();

        handle.swap(cipher("Another-Strong-Master-Secret-For-Rotation-99"));

        assert!(clone.load().decrypt(&bundle, "t1").is_err());
        assert_eq!(&before.decrypt(&bundle, "t1").unwrap()[..], b"sk-live-1");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn payload_roundtrip_runs_off_the_async_thread() {
        let handle = CipherHandle::new(cipher("Correct-Horse-Battery-Staple-2026-master"));
        let payload = SecretPayload::new("sk-live-1").with_field("account_sid", "AC1");

        let bundle = handle.encrypt_payload(&payload, "t1").await.unwrap();
        let back = handle.decrypt_payload(&bundle, "t1").await.unwrap();
        assert_eq!(back, payload);

        let err = handle.decrypt_payload(&bundle, "t2").await.unwrap_err();
        assert!(matches!(err, ByokError::Decryption(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn offload_surfaces_panics_as_internal_errors() {
        let err = offload::<(), _>(|| panic!("boom")).await.unwrap_err();
        assert!(matches!(err, ByokError::Internal(_)));
    }
}
