//! `analysis`: one JSON file per analysed contract.
//!
//! ```text
//! {output_dir}/
//! ├── nda.pdf.json
//! └── msa.docx.json
//! ```
//!
//! Writes go to a hidden temp file that is renamed into place, so a reader
//! (the dashboard, `clausewatch list`) never sees a partial record.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::agent::ContractAnalysis;
use crate::error::AppError;

const EXTENSION: &str = ".json";

#[derive(Debug, Clone)]
pub struct AnalysisStore {
    dir: PathBuf,
}

impl AnalysisStore {
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Store(format!("analysis: cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the record for `doc_id` is (or would be) stored at.
    pub fn path_for(&self, doc_id: &str) -> Result<PathBuf, AppError> {
        Ok(self.dir.join(file_name(doc_id)?))
    }

    /// Write `analysis` as `<doc_id>.json`, replacing any earlier record.
    pub fn save(&self, analysis: &ContractAnalysis) -> Result<PathBuf, AppError> {
        let name = file_name(&analysis.doc_id)?;
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{name}.tmp"));

        let json = serde_json::to_string_pretty(analysis)
            .map_err(|e| AppError::Store(format!("analysis: serialize {}: {e}", analysis.doc_id)))?;
        fs::write(&tmp, json)
            .map_err(|e| AppError::Store(format!("analysis: write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::Store(format!("analysis: rename into {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "analysis saved");
        Ok(path)
    }

    /// Load by doc id (`nda.pdf`) or by file name (`nda.pdf.json`).
    pub fn load(&self, name: &str) -> Result<ContractAnalysis, AppError> {
        let file = if name.ends_with(EXTENSION) {
            check_name(name)?;
            name.to_string()
        } else {
            file_name(name)?
        };
        let path = self.dir.join(&file);
        let raw = fs::read_to_string(&path)
            .map_err(|e| AppError::Store(format!("analysis: read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Store(format!("analysis: parse {}: {e}", path.display())))
    }

    /// Stored file names, reverse lexical order.
    pub fn list(&self) -> Result<Vec<String>, AppError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| AppError::Store(format!("analysis: list {}: {e}", self.dir.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AppError::Store(format!("analysis: list entry: {e}")))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(EXTENSION) && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// True when a readable record for `doc_id` carries `content_hash`.
    pub fn is_current(&self, doc_id: &str, content_hash: &str) -> bool {
        match self.load(doc_id) {
            Ok(existing) => existing.content_hash == content_hash,
            Err(_) => false,
        }
    }
}

fn file_name(doc_id: &str) -> Result<String, AppError> {
    check_name(doc_id)?;
    Ok(format!("{doc_id}{EXTENSION}"))
}

/// Names must be a single path component.
fn check_name(name: &str) -> Result<(), AppError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(AppError::Store(format!("analysis: invalid document name '{name}'")));
    }
    Ok(())
}
