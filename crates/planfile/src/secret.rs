//! Per-installation signing secret.

use std::fmt;
use std::fs;
use std::path::Path;

use rand::RngCore;

use crate::error::{PlanError, Result};
use crate::storage::write_private;

/// File name of the secret inside the config directory.
pub const SECRET_FILE: &str = "secret.hex";

/// Minimum decoded secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Opaque signing key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wrap raw key bytes.
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load `secret.hex` from `config_dir`, creating it on first use.
    ///
    /// A missing file produces 32 fresh random bytes written as hex with
    /// owner-only permissions. An existing file must decode to at least
    /// 32 bytes.
    pub fn ensure(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(SECRET_FILE);

        match fs::read_to_string(&path) {
            Ok(content) => {
                let bytes = hex::decode(content.trim())?;
                if bytes.len() < MIN_SECRET_LEN {
                    return Err(PlanError::SecretTooShort(bytes.len()));
                }
                log::debug!("Loaded signing secret from {}", path.display());
                Ok(Self(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut bytes = vec![0u8; MIN_SECRET_LEN];
                rand::rng().fill_bytes(&mut bytes);
                write_private(&path, format!("{}\n", hex::encode(&bytes)).as_bytes())?;
                log::info!("Generated new signing secret at {}", path.display());
                Ok(Self(bytes))
            }
            Err(e) => Err(PlanError::io(path, e)),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {}])", self.0.len())
    }
}
