//! Signed model manifests.
//!
//! A model directory carries `manifest.json`, which lists the SHA-256 of every
//! artifact file, and `model.sig`, an Ed25519 signature over the manifest
//! bytes. The loader only reads artifact files the verified manifest binds.
//!
//! # Key Rotation
//!
//! 1. Generate a new seed: `cargo run --bin sign_model -- --generate-seed <path>`
//! 2. Replace `EMBEDDED_PUBKEY` (or deploy `HEMOSCAN_MODEL_SIGNING_PUBKEY_B64_FILE`)
//! 3. Re-sign every model directory with the new seed
//! 4. Securely destroy the old seed

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::ModelError;

pub const MODEL_FILE: &str = "severity_model.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

const MANIFEST_VERSION: u32 = 1;
const NONCE_LEN: usize = 16;
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Verifying key for the bundled model.
const EMBEDDED_PUBKEY: [u8; 32] = [
    0xc6, 0xf2, 0x0c, 0x0a, 0x96, 0xc7, 0xbf, 0xd4, 0x85, 0x7e, 0xa7, 0xd7, 0x34, 0xb3, 0xd8, 0x28,
    0x59, 0x41, 0x5e, 0x0e, 0x48, 0x47, 0x0a, 0xb6, 0x4d, 0xf3, 0xdd, 0x58, 0x64, 0xb5, 0xed, 0x6e,
];

/// Signed content of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedModelManifest {
    pub version: u32,
    /// Monotonic serial for anti-rollback.
    pub serial: u64,
    /// Unix timestamp (seconds) when the manifest was created.
    pub created_at: i64,
    /// Random 16-byte nonce (base64).
    pub nonce_b64: String,
    /// Relative file name to SHA-256 hex digest.
    pub files: BTreeMap<String, String>,
}

/// How strictly a model directory is verified.
#[derive(Debug, Clone, Default)]
pub struct ModelLoadOptions {
    /// Accept a directory with no manifest. Honored in debug builds only.
    pub allow_unsigned: bool,
    /// Verifying key; the embedded key when `None`.
    pub trusted_key: Option<VerifyingKey>,
    /// Refuse manifests with a lower serial.
    pub min_serial: Option<u64>,
    /// Refuse manifests older than this many seconds.
    pub max_age_secs: Option<i64>,
}

/// Current Unix time in seconds (0 if the clock is before the epoch).
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn signature_error(msg: impl Into<String>) -> ModelError {
    ModelError::Signature(msg.into())
}

fn validate_nonce_b64(nonce_b64: &str) -> Result<(), ModelError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(nonce_b64.trim())
        .map_err(|e| signature_error(format!("Invalid nonce base64: {e}")))?;
    if raw.len() != NONCE_LEN {
        return Err(signature_error(format!(
            "nonce must decode to exactly {NONCE_LEN} bytes"
        )));
    }
    Ok(())
}

/// Fresh random nonce for a new manifest.
#[must_use]
pub fn make_nonce_b64() -> String {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    base64::engine::general_purpose::STANDARD.encode(nonce)
}

/// Parse a base64-encoded 32-byte Ed25519 verifying key.
///
/// # Errors
/// Returns `ModelError::Signature` for bad base64, length or curve point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ModelError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| signature_error("Invalid public key base64"))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| signature_error("Invalid public key length (expected 32 bytes)"))?;
    VerifyingKey::from_bytes(&pubkey).map_err(|_| signature_error("Invalid verifying key"))
}

/// The verifying key compiled into the binary.
///
/// # Errors
/// Returns `ModelError::Signature` if the embedded bytes are not a valid key.
pub fn embedded_verifying_key() -> Result<VerifyingKey, ModelError> {
    VerifyingKey::from_bytes(&EMBEDDED_PUBKEY)
        .map_err(|_| signature_error("Invalid embedded public key"))
}

/// Verify the manifest and signature in `dir` and every file it binds.
///
/// Returns `Ok(None)` only when the directory has no manifest and unsigned
/// loading is allowed in a debug build.
///
/// # Errors
/// Fails closed on any missing file, bad signature, hash mismatch or
/// freshness violation.
pub fn verify_model_dir(
    dir: &Path,
    options: &ModelLoadOptions,
) -> Result<Option<SignedModelManifest>, ModelError> {
    let sig_path = dir.join(SIGNATURE_FILE);
    let manifest_path = dir.join(MANIFEST_FILE);

    if !sig_path.exists() || !manifest_path.exists() {
        if cfg!(debug_assertions) && options.allow_unsigned {
            tracing::warn!(
                "Loading UNSIGNED model from {:?}. This is only allowed in debug builds.",
                dir
            );
            return Ok(None);
        }
        tracing::error!("Model signature not found at {:?}", sig_path);
        return Err(signature_error(format!(
            "{MANIFEST_FILE} and {SIGNATURE_FILE} are required in {}",
            dir.display()
        )));
    }

    let sig_bytes = fs::read(&sig_path)
        .map_err(|e| signature_error(format!("Failed to read signature: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| signature_error("Invalid signature length (expected 64 bytes)"))?;
    let signature = Signature::from_bytes(&sig_array);

    let manifest_content = fs::read(&manifest_path)
        .map_err(|e| signature_error(format!("Failed to read manifest: {e}")))?;

    let public_key = match options.trusted_key {
        Some(key) => key,
        None => embedded_verifying_key()?,
    };
    public_key
        .verify(&manifest_content, &signature)
        .map_err(|_| signature_error("Invalid model signature"))?;

    let manifest: SignedModelManifest = serde_json::from_slice(&manifest_content)
        .map_err(|e| signature_error(format!("Invalid {MANIFEST_FILE} format: {e}")))?;
    check_manifest(&manifest, options, unix_now())?;

    for (rel, expected_hex) in &manifest.files {
        let path = dir.join(rel);
        let bytes = fs::read(&path).map_err(|e| {
            signature_error(format!(
                "Manifest references missing/unreadable file {}: {e}",
                path.display()
            ))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected_hex) {
            return Err(signature_error(format!("File hash mismatch for {rel}")));
        }
    }

    tracing::info!(
        "Model manifest verified (serial={}, files={})",
        manifest.serial,
        manifest.files.len()
    );
    Ok(Some(manifest))
}

fn check_manifest(
    manifest: &SignedModelManifest,
    options: &ModelLoadOptions,
    now: i64,
) -> Result<(), ModelError> {
    if manifest.version != MANIFEST_VERSION {
        return Err(signature_error(format!(
            "Unsupported manifest version: {}",
            manifest.version
        )));
    }
    validate_nonce_b64(&manifest.nonce_b64)?;

    if manifest.created_at > now + MAX_CLOCK_SKEW_SECS {
        return Err(signature_error("manifest created_at is in the future"));
    }
    if let Some(max_age) = options.max_age_secs.filter(|age| *age > 0) {
        if now.saturating_sub(manifest.created_at) > max_age {
            return Err(signature_error("manifest is older than allowed max age"));
        }
    }
    if let Some(min_serial) = options.min_serial {
        if manifest.serial < min_serial {
            return Err(signature_error(format!(
                "Refusing to load older signed manifest (serial {} < {min_serial})",
                manifest.serial
            )));
        }
    }
    if !manifest.files.contains_key(MODEL_FILE) {
        return Err(signature_error(format!(
            "{MANIFEST_FILE} must include {MODEL_FILE}"
        )));
    }
    Ok(())
}

/// Write `manifest.json` and `model.sig` binding the given files in `dir`.
///
/// # Errors
/// Returns an error if a file cannot be read or the outputs cannot be written.
pub fn sign_model_dir(
    dir: &Path,
    file_names: &[&str],
    signing_key: &SigningKey,
    serial: u64,
    nonce_b64: String,
) -> Result<SignedModelManifest, ModelError> {
    validate_nonce_b64(&nonce_b64)?;

    let mut files = BTreeMap::new();
    for rel in file_names {
        let path = dir.join(rel);
        let bytes = fs::read(&path)
            .map_err(|e| ModelError::Io(format!("Failed to read {}: {e}", path.display())))?;
        files.insert((*rel).to_string(), sha256_hex(&bytes));
    }

    let manifest = SignedModelManifest {
        version: MANIFEST_VERSION,
        serial,
        created_at: unix_now(),
        nonce_b64,
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ModelError::Io(format!("Failed to serialize {MANIFEST_FILE}: {e}")))?;
    fs::write(dir.join(MANIFEST_FILE), &manifest_bytes)
        .map_err(|e| ModelError::Io(format!("Failed to write {MANIFEST_FILE}: {e}")))?;

    let signature: Signature = signing_key.sign(&manifest_bytes);
    fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes())
        .map_err(|e| ModelError::Io(format!("Failed to write {SIGNATURE_FILE}: {e}")))?;

    Ok(manifest)
}
