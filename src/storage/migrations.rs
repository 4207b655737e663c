use std::path::PathBuf;

use serde_json::Value;

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

/// Index `n` upgrades version `n + 1` to `n + 2`. To add a schema change,
/// bump `CURRENT_VERSION` in `models/store.rs` and append its function here.
fn get_migrations() -> Vec<MigrationFn> {
    vec![]
}

/// A store without a `version` field is treated as v1.
pub fn detect_version(content: &str) -> Result<u32, StorageError> {
    let value: Value = serde_json::from_str(content).map_err(|e| StorageError::ParseFailed {
        path: PathBuf::from("<unknown>"),
        source: e,
    })?;

    match value.get("version") {
        None => Ok(1),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::ParseFailed {
                path: PathBuf::from("<unknown>"),
                source: serde::de::Error::custom(format!("invalid store version: {v}")),
            }),
    }
}

/// Applies migrations one version at a time up to `to_version`.
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version == to_version {
        return Ok(data);
    }

    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration = version
            .checked_sub(1)
            .and_then(|idx| migrations.get(idx as usize))
            .ok_or(StorageError::UnsupportedVersion(version))?;
        data = migration(data)?;
    }

    Ok(data)
}
