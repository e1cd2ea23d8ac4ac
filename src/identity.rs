// src/identity.rs

//! Content-addressed identities for build configurations.
//!
//! Every compiler handle, watcher and result record carries the
//! [`Signature`] of the configuration it came from, so downstream code never
//! needs the configuration itself to know "which build was this".

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use blake3::Hasher;

use crate::config::BuildConfig;

/// Number of hex characters of the content hash kept in a signature.
const SIGNATURE_HASH_LEN: usize = 12;

/// Stable identity of a configuration, e.g. `node:dist/server.js#3f9a0c1b22de`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(Arc<str>);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Signature {
    fn from(s: &str) -> Self {
        Signature(Arc::from(s))
    }
}

/// A configuration paired with its signature. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConfig {
    config: Arc<BuildConfig>,
    signature: Signature,
}

impl SignedConfig {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }
}

impl Deref for SignedConfig {
    type Target = BuildConfig;

    fn deref(&self) -> &BuildConfig {
        &self.config
    }
}

/// Attach a content-derived signature to a configuration.
///
/// Equal configurations always get equal signatures.
pub fn sign(config: BuildConfig) -> SignedConfig {
    let digest = content_hash(&config);
    let signature = Signature(Arc::from(format!(
        "{}:{}#{}",
        config.context,
        config.out.to_string_lossy().replace('\\', "/"),
        &digest[..SIGNATURE_HASH_LEN]
    )));

    SignedConfig {
        config: Arc::new(config),
        signature,
    }
}

/// Sign every configuration in order.
pub fn sign_all(configs: impl IntoIterator<Item = BuildConfig>) -> Vec<SignedConfig> {
    configs.into_iter().map(sign).collect()
}

/// Hash every field of `config` in a fixed order.
///
/// Each field is length-prefixed so that no two distinct configurations feed
/// the hasher the same bytes.
fn content_hash(config: &BuildConfig) -> String {
    let action = match config.on_rebuild {
        Some(action) => format!("{action:?}"),
        None => "default".to_string(),
    };

    let fields: [(&str, Vec<u8>); 8] = [
        ("entry", config.entry.as_os_str().as_encoded_bytes().to_vec()),
        ("out", config.out.as_os_str().as_encoded_bytes().to_vec()),
        ("context", config.context.to_string().into_bytes()),
        ("mode", config.mode.to_string().into_bytes()),
        ("run", config.run.to_string().into_bytes()),
        ("watch", config.watch.to_string().into_bytes()),
        ("verbose", config.verbose.to_string().into_bytes()),
        ("on_rebuild", action.into_bytes()),
    ];

    let mut hasher = Hasher::new();
    for (key, value) in fields.iter() {
        hasher.update(key.as_bytes());
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value);
    }
    hasher.finalize().to_hex().to_string()
}
