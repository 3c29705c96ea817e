use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a file.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checksums for a set of locked input files, keyed by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Missing,
    Changed { expected: String, actual: String },
}

impl Manifest {
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut files = BTreeMap::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("bad manifest entry path {}", path.display()))?;
            files.insert(name.to_string(), file_sha256(path)?);
        }
        Ok(Self { files })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse manifest {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize manifest")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    pub fn verify(&self, dir: &Path) -> Result<Vec<(String, FileStatus)>> {
        let mut results = Vec::with_capacity(self.files.len());
        for (name, expected) in &self.files {
            let path = dir.join(name);
            let status = if !path.exists() {
                FileStatus::Missing
            } else {
                let actual = file_sha256(&path)?;
                if actual == *expected {
                    FileStatus::Ok
                } else {
                    FileStatus::Changed {
                        expected: expected.clone(),
                        actual,
                    }
                }
            };
            results.push((name.clone(), status));
        }
        Ok(results)
    }
}
