use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{ObjectStore, StoreConfig, StoreError};

const DEFAULT_PUBLIC_URL: &str = "http://localhost:3710";
const DEV_SIGNING_SECRET: &str = "filedock-dev-signing-secret";

type HmacSha256 = Hmac<Sha256>;

pub struct LocalStore {
    base_dir: PathBuf,
    public_url: String,
    signing_secret: String,
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Self {
        let base_dir = config
            .local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let public_url = config
            .public_url
            .as_deref()
            .unwrap_or(DEFAULT_PUBLIC_URL)
            .trim_end_matches('/')
            .to_string();
        let signing_secret = match &config.signing_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!("FILEDOCK_SIGNING_SECRET not set, using the development secret");
                DEV_SIGNING_SECRET.to_string()
            }
        };
        Self {
            base_dir,
            public_url,
            signing_secret,
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Map a key to a path under `base_dir`, refusing anything that could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || !safe {
            return Err(StoreError::Internal(format!("invalid key: {key}")));
        }
        Ok(self.base_dir.join(rel))
    }

    fn mac(&self) -> Result<HmacSha256, StoreError> {
        HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| StoreError::Internal(format!("signing key: {e}")))
    }

    /// Hex HMAC-SHA256 of `key:expires` under the signing secret.
    pub fn signature(&self, key: &str, expires: i64) -> Result<String, StoreError> {
        let mut mac = self.mac()?;
        mac.update(format!("{key}:{expires}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a signed download URL valid until the unix timestamp `expires`.
    pub fn signed_url(&self, key: &str, expires: i64) -> Result<String, StoreError> {
        Ok(format!(
            "{}/files/{key}?expires={expires}&signature={}",
            self.public_url,
            self.signature(key, expires)?
        ))
    }

    /// True when `signature` matches and `expires` is not in the past relative to `now`.
    pub fn verify_signature(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(format!("{key}:{expires}").as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// Same default data directory as `filedock_db::data_dir()`, without
/// depending on the db crate.
fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("filedock").join("objects")
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_with_content_type(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Internal(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Internal(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::try_exists(&path).await {
            Ok(exists) => Ok(exists),
            Err(e) => Err(StoreError::Internal(format!(
                "exists {}: {e}",
                path.display()
            ))),
        }
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        self.resolve(key)?;
        let ttl = i64::try_from(expires_in.as_secs())
            .map_err(|_| StoreError::Internal("presign ttl out of range".into()))?;
        let expires = chrono::Utc::now().timestamp() + ttl;
        self.signed_url(key, expires)
    }
}
