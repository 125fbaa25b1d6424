// Signing key table with rolling rotation
// Exactly one CURRENT key at any time; retired keys stay resolvable for a
// grace window so tokens in flight keep verifying. The key id in the token
// header selects verification material without trying all keys.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::services::secrets::MIN_SIGNING_SECRET_BYTES;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

struct KeyEntry {
    material: Vec<u8>,
    /// None for the CURRENT key, Some(instant of demotion) for retired keys
    retired_at: Option<DateTime<Utc>>,
}

struct KeyTable {
    current_id: String,
    keys: HashMap<String, KeyEntry>,
}

/// In-memory provider of signing material, safe for concurrent use.
/// Readers observe either the pre- or post-rotation table, never a half
/// rotated one: all mutation happens under the write lock.
pub struct KeyProvider {
    grace_period: Duration,
    inner: RwLock<KeyTable>,
}

impl KeyProvider {
    /// Seed the table with the initial signing material
    pub fn new(material: &[u8], grace_period: Duration) -> Result<Self, KeyError> {
        Self::validate_material(material)?;

        let key_id = Self::key_id(material);
        let mut keys = HashMap::new();
        keys.insert(
            key_id.clone(),
            KeyEntry {
                material: material.to_vec(),
                retired_at: None,
            },
        );

        Ok(Self {
            grace_period,
            inner: RwLock::new(KeyTable {
                current_id: key_id,
                keys,
            }),
        })
    }

    /// Deterministic short fingerprint: first 8 bytes of SHA-256, hex-encoded.
    /// The same secret always yields the same identifier.
    pub fn key_id(material: &[u8]) -> String {
        let digest = Sha256::digest(material);
        digest
            .iter()
            .take(8)
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn validate_material(material: &[u8]) -> Result<(), KeyError> {
        if material.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(KeyError::InvalidKey(format!(
                "key material must be at least {} bytes (current: {})",
                MIN_SIGNING_SECRET_BYTES,
                material.len()
            )));
        }
        Ok(())
    }

    /// The active key and its identifier
    pub fn current(&self) -> (String, Vec<u8>) {
        let table = self.inner.read().expect("key table lock poisoned");
        let entry = table
            .keys
            .get(&table.current_id)
            .expect("current key missing from table");
        (table.current_id.clone(), entry.material.clone())
    }

    /// Resolve material by key id: the CURRENT key, or a retired key still
    /// inside its grace window. Expired retirees are pruned on access.
    pub fn material_by_id(&self, key_id: &str) -> Option<Vec<u8>> {
        let now = Utc::now();

        {
            let table = self.inner.read().expect("key table lock poisoned");
            match table.keys.get(key_id) {
                Some(entry) => match entry.retired_at {
                    None => return Some(entry.material.clone()),
                    Some(retired) if now < retired + self.grace_period => {
                        return Some(entry.material.clone());
                    },
                    Some(_) => {},
                },
                None => return None,
            }
        }

        // The entry exists but its grace window has elapsed; drop it
        let mut table = self.inner.write().expect("key table lock poisoned");
        if let Some(entry) = table.keys.get(key_id) {
            if let Some(retired) = entry.retired_at {
                if now >= retired + self.grace_period {
                    table.keys.remove(key_id);
                }
            }
        }
        None
    }

    /// Install new signing material: the existing CURRENT key is demoted to
    /// RETIRED with the clock read under the write lock, and the new key
    /// becomes CURRENT. Rotating to the already-current material is a no-op.
    pub fn rotate(&self, new_material: &[u8]) -> Result<String, KeyError> {
        Self::validate_material(new_material)?;

        let new_id = Self::key_id(new_material);
        let now = Utc::now();

        let mut table = self.inner.write().expect("key table lock poisoned");
        if table.current_id == new_id {
            return Ok(new_id);
        }

        let previous_id = table.current_id.clone();
        if let Some(entry) = table.keys.get_mut(&previous_id) {
            entry.retired_at = Some(now);
        }

        table.keys.insert(
            new_id.clone(),
            KeyEntry {
                material: new_material.to_vec(),
                retired_at: None,
            },
        );
        table.current_id = new_id.clone();

        tracing::info!(
            old_key_id = %previous_id,
            new_key_id = %new_id,
            grace_hours = self.grace_period.num_hours(),
            "Signing key rotated"
        );

        Ok(new_id)
    }

    /// Remove retired keys whose grace window has elapsed. Idempotent.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let grace = self.grace_period;

        let mut table = self.inner.write().expect("key table lock poisoned");
        let before = table.keys.len();
        table.keys.retain(|_, entry| match entry.retired_at {
            None => true,
            Some(retired) => now < retired + grace,
        });
        before - table.keys.len()
    }

    /// Number of keys currently held (current + retirees in grace)
    pub fn key_count(&self) -> usize {
        self.inner.read().expect("key table lock poisoned").keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATERIAL_A: &[u8] = b"first-signing-secret-at-least-32-bytes!!";
    const MATERIAL_B: &[u8] = b"second-signing-secret-at-least-32-bytes!";

    #[test]
    fn test_key_id_is_deterministic() {
        let id1 = KeyProvider::key_id(MATERIAL_A);
        let id2 = KeyProvider::key_id(MATERIAL_A);
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 16);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(id1, KeyProvider::key_id(MATERIAL_B));
    }

    #[test]
    fn test_short_material_rejected() {
        assert!(matches!(
            KeyProvider::new(b"short", Duration::hours(24)),
            Err(KeyError::InvalidKey(_))
        ));

        let provider = KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap();
        assert!(matches!(
            provider.rotate(b"short"),
            Err(KeyError::InvalidKey(_))
        ));
        assert!(matches!(provider.rotate(b""), Err(KeyError::InvalidKey(_))));
    }

    #[test]
    fn test_current_and_lookup_agree() {
        let provider = KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap();

        let (key_id, material) = provider.current();
        assert_eq!(material, MATERIAL_A);
        assert_eq!(provider.material_by_id(&key_id), Some(MATERIAL_A.to_vec()));
        assert_eq!(provider.material_by_id("unknown-kid"), None);
    }

    #[test]
    fn test_rotation_keeps_old_key_in_grace() {
        let provider = KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap();
        let (old_id, _) = provider.current();

        let new_id = provider.rotate(MATERIAL_B).unwrap();
        assert_ne!(old_id, new_id);

        let (current_id, current_material) = provider.current();
        assert_eq!(current_id, new_id);
        assert_eq!(current_material, MATERIAL_B);

        // The retired key still resolves inside the grace window
        assert_eq!(provider.material_by_id(&old_id), Some(MATERIAL_A.to_vec()));
        assert_eq!(provider.key_count(), 2);
    }

    #[test]
    fn test_expired_retiree_is_rejected_and_pruned() {
        let provider = KeyProvider::new(MATERIAL_A, Duration::zero()).unwrap();
        let (old_id, _) = provider.current();

        provider.rotate(MATERIAL_B).unwrap();

        // Zero grace: the retired key is immediately unresolvable
        assert_eq!(provider.material_by_id(&old_id), None);
        assert_eq!(provider.key_count(), 1);
    }

    #[test]
    fn test_rotate_to_same_material_is_noop() {
        let provider = KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap();
        let (old_id, _) = provider.current();

        let new_id = provider.rotate(MATERIAL_A).unwrap();
        assert_eq!(old_id, new_id);
        assert_eq!(provider.key_count(), 1);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let provider = KeyProvider::new(MATERIAL_A, Duration::zero()).unwrap();
        provider.rotate(MATERIAL_B).unwrap();

        assert_eq!(provider.sweep(), 1);
        assert_eq!(provider.sweep(), 0);
        assert_eq!(provider.key_count(), 1);

        // The current key never sweeps
        let (current_id, _) = provider.current();
        assert_eq!(
            provider.material_by_id(&current_id),
            Some(MATERIAL_B.to_vec())
        );
    }

    #[test]
    fn test_concurrent_rotation_and_reads() {
        use std::sync::Arc;

        let provider = Arc::new(KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let provider = Arc::clone(&provider);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    if i % 2 == 0 {
                        // Readers must always resolve the id they were handed
                        let (key_id, _) = provider.current();
                        assert!(provider.material_by_id(&key_id).is_some());
                    } else {
                        provider.rotate(MATERIAL_B).unwrap();
                        provider.rotate(MATERIAL_A).unwrap();
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
