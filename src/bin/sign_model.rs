//! Model signing utility for HemoScan severity models.
//!
//! Creates a signed manifest (`manifest.json`) and Ed25519 signature (`model.sig`)
//! for a model directory, enabling verification at load time.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_model -- <model_dir> [--serial <n>] [--nonce-b64 <b64>]
//! cargo run --bin sign_model -- --generate-seed <seed_file>
//! ```
//!
//! # Security
//!
//! - Signing seed read from `HEMOSCAN_MODEL_SIGNING_KEY_B64_FILE`
//!   (env var fallback only in debug builds)
//! - Manifest includes SHA-256 hashes of all bound files
//! - Anti-rollback fields: serial number, creation timestamp, random nonce
//! - Private key material zeroized after use

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use hemoscan::adapters::logistic::manifest::{make_nonce_b64, sign_model_dir, unix_now};
use hemoscan::adapters::logistic::MODEL_FILE;

const KEY_FILE_ENV: &str = "HEMOSCAN_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "HEMOSCAN_MODEL_SIGNING_KEY_B64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>, String> {
    let secret = Zeroizing::new(raw.trim_end_matches(['\n', '\r']).to_string());
    if secret.is_empty() {
        return Err("Empty signing key".to_string());
    }
    Ok(secret)
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>, String> {
    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim())
                .map_err(|e| format!("Failed reading signing key file: {e}"))?,
        );
        return non_empty_secret(&content);
    }

    // Dev-only fallback for convenience.
    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return non_empty_secret(&Zeroizing::new(v));
        }
    }

    Err(format!(
        "Missing signing key. Provide {KEY_FILE_ENV} (or {KEY_ENV} in debug builds), \
         or create one with --generate-seed."
    ))
}

fn read_signing_seed() -> Result<Seed, String> {
    let v = read_signing_seed_b64()?;

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(v.trim())
            .map_err(|e| format!("Invalid base64 in signing key: {e}"))?,
    );

    if raw.len() != 32 {
        return Err(format!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        ));
    }

    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

/// Write a fresh base64 seed to `path` (owner-only) and print its verifying key.
fn generate_seed(path: &Path) -> Result<(), String> {
    let mut seed = Seed([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut seed.0);
    let encoded = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| format!("Failed to create {path:?}: {e}"))?;
    file.write_all(encoded.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
        .map_err(|e| format!("Failed to write {path:?}: {e}"))?;

    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    println!("Wrote signing seed: {path:?}");
    println!(
        "HEMOSCAN_MODEL_SIGNING_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(verifying_key.as_bytes())
    );
    Ok(())
}

fn usage() -> String {
    "Usage: sign_model <model_dir> [--serial <u64>] [--nonce-b64 <b64_16_bytes>]\n       \
     sign_model --generate-seed <seed_file>"
        .to_string()
}

enum Command {
    Sign {
        model_dir: PathBuf,
        serial: Option<u64>,
        nonce_b64: Option<String>,
    },
    GenerateSeed(PathBuf),
}

fn parse_args() -> Result<Command, String> {
    let mut args = env::args().skip(1);
    let mut model_dir: Option<PathBuf> = None;
    let mut serial: Option<u64> = None;
    let mut nonce_b64: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--generate-seed" => {
                let path = args.next().ok_or_else(usage)?;
                return Ok(Command::GenerateSeed(PathBuf::from(path)));
            }
            "--serial" => {
                let v = args.next().ok_or_else(usage)?;
                let parsed = v
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| "--serial must be a u64".to_string())?;
                serial = Some(parsed);
            }
            "--nonce-b64" => {
                nonce_b64 = Some(args.next().ok_or_else(usage)?);
            }
            "-h" | "--help" => return Err(usage()),
            _ => {
                if model_dir.is_none() {
                    model_dir = Some(PathBuf::from(arg));
                } else {
                    return Err(usage());
                }
            }
        }
    }

    Ok(Command::Sign {
        model_dir: model_dir.ok_or_else(usage)?,
        serial,
        nonce_b64,
    })
}

fn main() -> Result<(), String> {
    let (model_dir, serial_arg, nonce_arg) = match parse_args()? {
        Command::GenerateSeed(path) => return generate_seed(&path),
        Command::Sign {
            model_dir,
            serial,
            nonce_b64,
        } => (model_dir, serial, nonce_b64),
    };

    let model_dir = if model_dir.is_file() {
        model_dir
            .parent()
            .ok_or_else(|| "Model path has no parent directory".to_string())?
            .to_path_buf()
    } else {
        model_dir
    };
    if !model_dir.join(MODEL_FILE).is_file() {
        return Err(format!("No {MODEL_FILE} found in {model_dir:?}"));
    }

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let serial = serial_arg.unwrap_or_else(|| u64::try_from(unix_now()).unwrap_or(1).max(1));
    let nonce_b64 = nonce_arg.unwrap_or_else(make_nonce_b64);

    let manifest = sign_model_dir(&model_dir, &[MODEL_FILE], &signing_key, serial, nonce_b64)
        .map_err(|e| e.to_string())?;

    println!("Signed manifest for {model_dir:?} (serial {})", manifest.serial);
    println!(
        "HEMOSCAN_MODEL_SIGNING_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}
