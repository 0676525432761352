use sha2::{Digest, Sha256};

/// Load job id derived from the object identity and its content, so a redelivered
/// notification for the same bytes maps to the same warehouse job.
pub fn load_job_id(container: &str, key: &str, content: &str) -> String {
    let content_hash = Sha256::digest(content.as_bytes());

    // Simple canonical string; can be evolved later
    let mut hasher = Sha256::new();
    hasher.update(container.as_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    hasher.update(b"|");
    hasher.update(hex::encode(content_hash).as_bytes());
    let out = hex::encode(hasher.finalize());

    format!("csv_loader_{}", &out[..40])
}
