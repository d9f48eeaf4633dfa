//! Cache key derivation
//!
//! A derivative is identified by the SHA-256 of (object key, object version,
//! normalized transform spec). Every field is length- or tag-prefixed so
//! distinct inputs cannot concatenate to the same byte stream.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::store::ObjectRef;
use crate::transform::TransformSpec;

/// Bumped whenever the encoding below changes
const KEY_DOMAIN: &[u8] = b"kagami:derivative:v1";

/// Digest identifying one derivative
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for `spec` applied to `object`
    ///
    /// Pure and infallible; `spec` must already be validated.
    pub fn derive(object: &ObjectRef, spec: &TransformSpec) -> Self {
        let spec = spec.normalized();
        let mut hasher = Sha256::new();

        hasher.update(KEY_DOMAIN);
        update_str(&mut hasher, &object.key);
        update_str(&mut hasher, &object.version);
        update_opt_u32(&mut hasher, spec.width);
        update_opt_u32(&mut hasher, spec.height);
        update_str(&mut hasher, spec.fit.as_str());
        match spec.format {
            Some(format) => {
                hasher.update([1u8]);
                update_str(&mut hasher, format.as_str());
            }
            None => hasher.update([0u8]),
        }
        match spec.quality {
            Some(quality) => hasher.update([1u8, quality]),
            None => hasher.update([0u8]),
        }

        CacheKey(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used for logs and ETags
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps log lines readable
        write!(f, "CacheKey({})", &self.to_hex()[..16])
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn update_opt_u32(hasher: &mut Sha256, value: Option<u32>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update(v.to_be_bytes());
        }
        None => hasher.update([0u8]),
    }
}
