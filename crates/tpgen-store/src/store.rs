//! File-backed record store
//!
//! Layout under the store root:
//!
//! ```text
//! .lock              held while an upload allocates its id and persists
//! sequence           last allocated id
//! uploads/{id}.json  one UploadRecord per upload
//! ```
//!
//! Every write goes to a uniquely named temporary file first and is renamed
//! into place.

use chrono::Utc;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tpgen_core::{Analyzer, grammar};

use crate::error::{Result, StoreError};
use crate::policy::UploadPolicy;
use crate::record::{ComparisonView, Page, RecordSummary, UploadRecord, content_digest};

const UPLOADS_DIR: &str = "uploads";
const SEQUENCE_FILE: &str = "sequence";
const LOCK_FILE: &str = ".lock";
const LEASE_TIMEOUT: Duration = Duration::from_secs(10);
const LEASE_POLL: Duration = Duration::from_millis(5);

/// Upload store bound to one analyzer
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    policy: UploadPolicy,
    analyzer: Analyzer,
}

impl UploadStore {
    /// Open (or create) a store rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>, analyzer: Analyzer) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(UPLOADS_DIR))?;
        tracing::debug!(root = %root.display(), "store opened");
        Ok(Self {
            root,
            policy: UploadPolicy::default(),
            analyzer,
        })
    }

    /// Replace the upload policy
    #[must_use]
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Store root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Upload policy in use
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Analyzer in use
    #[must_use]
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Gate, validate, analyze and persist an upload
    ///
    /// # Errors
    ///
    /// Returns the first failing gate (extension, size, encoding, grammar,
    /// parse), [`StoreError::LeaseTimeout`] when another writer holds the
    /// store for too long, or an IO error while persisting.
    pub fn upload(&self, file_name: &str, bytes: &[u8], created_by: &str) -> Result<UploadRecord> {
        let text = self.policy.admit(file_name, bytes)?;

        if let Err(error) = grammar::check(text) {
            tracing::info!(file = file_name, code = %error.error_code, "upload rejected");
            return Err(StoreError::Grammar(error));
        }

        let outcome = self.analyzer.analyze(text);
        let analysis = match outcome.analysis {
            Some(analysis) if outcome.success => analysis,
            _ => return Err(StoreError::ParseFailed(outcome.parse_errors)),
        };

        let _lease = StoreLease::acquire(&self.root.join(LOCK_FILE), LEASE_TIMEOUT)?;
        let id = self.next_id()?;
        let record = UploadRecord {
            id,
            file_name: file_name.to_string(),
            file_size: bytes.len(),
            content: text.to_string(),
            sha256: content_digest(bytes),
            basic_info: analysis.basic_info.clone(),
            validation_status: analysis.validation_status,
            template_name: analysis.template_name.clone(),
            analysis,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.record_path(id), &json)?;
        write_atomic(&self.root.join(SEQUENCE_FILE), id.to_string().as_bytes())?;

        tracing::info!(
            id,
            file = file_name,
            status = %record.validation_status,
            "upload stored"
        );
        Ok(record)
    }

    /// Fetch a record
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn get(&self, id: u64) -> Result<UploadRecord> {
        let path = self.record_path(id);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    /// List records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be read.
    pub fn list(&self, page: usize, page_size: usize) -> Result<Page<RecordSummary>> {
        let mut ids = self.ids()?;
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let summaries = ids
            .into_iter()
            .map(|id| self.get(id).map(|r| r.summary()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::paginate(summaries, page, page_size))
    }

    /// Delete a record
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn delete(&self, id: u64) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => {
                tracing::info!(id, "upload deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-run the comparison for a stored upload
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids, or
    /// [`StoreError::ParseFailed`] if the stored text no longer parses under
    /// the current limits.
    pub fn comparison(&self, id: u64) -> Result<ComparisonView> {
        let record = self.get(id)?;
        let outcome = self.analyzer.analyze(&record.content);
        let comparison = match outcome.analysis {
            Some(analysis) if outcome.success => analysis.comparison,
            _ => return Err(StoreError::ParseFailed(outcome.parse_errors)),
        };
        Ok(ComparisonView {
            id,
            user_yaml: record.content,
            template_yaml: self.analyzer.template().skeleton_yaml()?,
            missing_fields: comparison.missing_fields.clone(),
            type_errors: comparison.type_errors.clone(),
            comparison,
        })
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.root.join(UPLOADS_DIR).join(format!("{id}.json"))
    }

    fn ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(UPLOADS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Next id: one past the larger of the sequence file and the highest
    /// stored record. Callers hold the store lease.
    fn next_id(&self) -> Result<u64> {
        let path = self.root.join(SEQUENCE_FILE);
        let last: u64 = match fs::read_to_string(&path) {
            Ok(text) => text
                .trim()
                .parse()
                .map_err(|_| StoreError::CorruptSequence(text.trim().to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let highest = self.ids()?.into_iter().max().unwrap_or(0);
        Ok(last.max(highest) + 1)
    }
}

/// Exclusive lock file, removed on drop
#[derive(Debug)]
struct StoreLease {
    path: PathBuf,
}

impl StoreLease {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(StoreError::LeaseTimeout(path.display().to_string()));
                    }
                    std::thread::sleep(LEASE_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release store lease");
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
