//! JSON snapshot writer.
//!
//! Writes Snapshot documents to JSON files with proper formatting.

use crate::snapshot::Snapshot;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write a snapshot to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `snapshot` - Snapshot to write
/// * `output_path` - Path to output JSON file
///
/// # Returns
/// Ok if file written successfully
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
///
/// # Example
/// ```ignore
/// let built = snapshot(&profiler);
/// write_snapshot(&built, "snapshot.json")?;
/// ```
pub fn write_snapshot(snapshot: &Snapshot, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing snapshot to: {}", output_path.display());

    validate_output_path(output_path)?;

    // Create parent directories if needed
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, snapshot).map_err(OutputError::SerializationFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    info!(
        "Snapshot written successfully ({} bytes)",
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Serialize a snapshot to a pretty JSON string
///
/// **Public** - useful for tests and embedding
pub fn snapshot_to_string(snapshot: &Snapshot) -> Result<String, OutputError> {
    serde_json::to_string_pretty(snapshot).map_err(OutputError::SerializationFailed)
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    // Check if we're trying to overwrite a directory
    if path.exists() && path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a snapshot from a JSON file
///
/// **Public** - used by the `validate` command and tests
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_snapshot(input_path: impl AsRef<Path>) -> Result<Snapshot, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading snapshot from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let snapshot: Snapshot =
        serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Snapshot loaded: generated {}, {} records",
        snapshot.generated,
        snapshot.records.len()
    );

    Ok(snapshot)
}
