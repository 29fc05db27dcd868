use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ccm_core::AuditResult;

/// Location: `{out_dir}/{audit_id}/result.json`
pub fn result_path(out_dir: &Path, audit_id: &str) -> PathBuf {
    out_dir.join(audit_id).join("result.json")
}

/// Write to a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Load a saved result. Returns None if the file doesn't exist.
pub fn load_result(out_dir: &Path, audit_id: &str) -> Result<Option<AuditResult>> {
    let path = result_path(out_dir, audit_id);
    if !path.exists() {
        return Ok(None);
    }
    read_result(&path).map(Some)
}

pub fn read_result(path: &Path) -> Result<AuditResult> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading result: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing result: {}", path.display()))
}

pub fn save_result(out_dir: &Path, result: &AuditResult) -> Result<PathBuf> {
    let path = result_path(out_dir, &result.audit_id);
    let data = serde_json::to_string_pretty(result)?;
    write_atomic(&path, data.as_bytes())
        .with_context(|| format!("saving result: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_core::{AuditStage, ConsentKind};

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_result(dir.path(), "missing").unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = AuditResult::new("abc", "https://example.com/");
        result.flow_mut(ConsentKind::Accept).consent.performed = true;

        let path = save_result(dir.path(), &result).unwrap();
        assert!(path.ends_with("abc/result.json"));
        let loaded = load_result(dir.path(), "abc").unwrap().unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn save_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = AuditResult::new("abc", "https://example.com/");
        save_result(dir.path(), &result).unwrap();
        result.stage = AuditStage::Finalized;
        save_result(dir.path(), &result).unwrap();
        let loaded = load_result(dir.path(), "abc").unwrap().unwrap();
        assert_eq!(loaded.stage, AuditStage::Finalized);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = result_path(dir.path(), "bad");
        write_atomic(&path, b"{not json").unwrap();
        let err = load_result(dir.path(), "bad").unwrap_err();
        assert!(err.to_string().contains("parsing result"));
    }
}
