//! Config load validation tests for transfer-mesh-config.
// crates/transfer-mesh-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use transfer_mesh_config::ConfigError;
use transfer_mesh_config::MAX_CONFIG_FILE_SIZE;
use transfer_mesh_config::TransferMeshConfig;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<TransferMeshConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(TransferMeshConfig::load(Some(path)), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(TransferMeshConfig::load(Some(path)), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; MAX_CONFIG_FILE_SIZE + 1];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(TransferMeshConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(TransferMeshConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(TransferMeshConfig::load(Some(&path)), "config io error")
}

#[test]
fn load_reads_valid_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let text = "[agent]\nalias = \"site-a\"\nurl = \"http://127.0.0.1:8989\"\nstorage_dir = \
                \"/tmp/site-a\"\n";
    file.write_all(text.as_bytes()).map_err(|err| err.to_string())?;
    let config = TransferMeshConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.agent.alias != "site-a" {
        return Err(format!("unexpected alias {}", config.agent.alias));
    }
    Ok(())
}
