//! Persistent installation identity
//!
//! Generated once on first run and reused for the life of the
//! installation, so revalidations renew the same activation.

use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::ValidatorResult;
use crate::fs_util::write_atomic;

const INSTANCE_ID_FILENAME: &str = "instance_id";

/// Read the stored instance ID, creating one if missing or empty
pub fn load_or_create(data_dir: &Path) -> ValidatorResult<String> {
    let path = data_dir.join(INSTANCE_ID_FILENAME);

    match fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => return Ok(content.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let instance_id = Uuid::new_v4().to_string();
    fs::create_dir_all(data_dir)?;
    write_atomic(&path, instance_id.as_bytes())?;
    tracing::info!(instance_id = %instance_id, "Generated installation instance ID");
    Ok(instance_id)
}
