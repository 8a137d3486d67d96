//! Hashing - SHA-256 for variants and manifests
//!
//! Hashes are deterministic: same pixels or same manifest, same digest.

use image::DynamicImage;
use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of an image's dimensions, color type and raw pixel bytes.
pub fn pixel_hash(image: &DynamicImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_be_bytes());
    hasher.update(image.height().to_be_bytes());
    hasher.update(format!("{:?}", image.color()).as_bytes());
    hasher.update(image.as_bytes());
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// job_hash = sha256(source_hash + canonical_request + engine_version)
pub fn compute_job_hash(
    source_hash: &str,
    request: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_request = canonical_json(request)?;
    let combined = format!("{}:{}:{}", source_hash, canonical_request, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}
