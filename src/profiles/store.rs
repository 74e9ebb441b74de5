//! File-backed profile map. Every mutation rewrites the whole document.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::model::Profile;

/// Result returned after rewriting a persisted document.
#[derive(Debug, Clone)]
pub struct StoreWriteOutcome {
    pub path: PathBuf,
    pub hash: String,
}

/// Persisted mapping of profile id → [`Profile`].
pub struct ProfileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, Profile>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed reading profile store {:?}", self.path))?;
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(BTreeMap::new());
        }
        let profiles = serde_json::from_slice(&data)
            .with_context(|| format!("Failed parsing profile store {:?}", self.path))?;
        Ok(profiles)
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        Ok(self.load_all()?.into_values().collect())
    }

    pub fn get(&self, profile_id: &str) -> Result<Option<Profile>> {
        Ok(self.load_all()?.remove(profile_id))
    }

    /// Inserts or replaces a profile and rewrites the store.
    pub fn save(&self, profile: &Profile) -> Result<StoreWriteOutcome> {
        if profile.id.trim().is_empty() {
            bail!("Refusing to store a profile without an id.");
        }
        let _guard = self.lock();
        let mut profiles = self.load_all()?;
        let mut stored = profile.clone();
        stored.touch();
        profiles.insert(stored.id.clone(), stored);
        self.write_all(&profiles)
    }

    /// Removes a profile. Returns false when the id was unknown.
    pub fn delete(&self, profile_id: &str) -> Result<bool> {
        let _guard = self.lock();
        let mut profiles = self.load_all()?;
        if profiles.remove(profile_id).is_none() {
            return Ok(false);
        }
        self.write_all(&profiles)?;
        Ok(true)
    }

    /// Writes one cache entry into the persisted copy of a profile.
    ///
    /// Only the named key is touched, so entries learned concurrently by
    /// another session survive. With `overwrite == false` an existing entry
    /// is left alone and `None` is returned.
    pub fn learn_answer(
        &self,
        profile_id: &str,
        key: &str,
        answer: &str,
        overwrite: bool,
    ) -> Result<Option<StoreWriteOutcome>> {
        let _guard = self.lock();
        let mut profiles = self.load_all()?;
        let profile = profiles
            .get_mut(profile_id)
            .with_context(|| format!("Unknown profile '{profile_id}'"))?;
        if !overwrite && profile.question_cache.contains_key(key) {
            return Ok(None);
        }
        profile
            .question_cache
            .insert(key.to_string(), answer.to_string());
        profile.touch();
        let outcome = self.write_all(&profiles)?;
        Ok(Some(outcome))
    }

    fn write_all(&self, profiles: &BTreeMap<String, Profile>) -> Result<StoreWriteOutcome> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating profile directory {:?}", parent))?;
        }
        let payload = serde_json::to_vec_pretty(profiles)
            .with_context(|| format!("Failed serializing profile store {:?}", self.path))?;
        fs::write(&self.path, &payload)
            .with_context(|| format!("Failed writing profile store {:?}", self.path))?;
        let hash = compute_hash(&payload);
        log::debug!("[STORE] Rewrote {:?} ({} profiles, {hash})", self.path, profiles.len());
        Ok(StoreWriteOutcome {
            path: self.path.clone(),
            hash,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Computes a lowercase hex SHA-256 hash of the provided bytes.
pub fn compute_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}
