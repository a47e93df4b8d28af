//! TPGen CLI Library
//!
//! Library functions behind the `tpgen` binary: configuration loading and
//! one function per subcommand returning printable output.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tpgen_core::{Analyzer, DocumentLimits, MachineCatalog, ReferenceTemplate, grammar};
use tpgen_report::{
    OutputFormat, comparison_markdown, grammar_failure_markdown, record_list_markdown,
    render_outcome, to_data_string,
};
use tpgen_store::{DEFAULT_MAX_UPLOAD_BYTES, StoreError, UploadPolicy, UploadStore};

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tpgen.yaml";

/// Result of a CLI operation
#[derive(Debug)]
pub enum CliResult {
    /// Operation succeeded
    Success(String),
    /// Operation failed with error
    Error(String),
}

impl CliResult {
    /// Returns true if the result is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the message
    pub fn message(&self) -> &str {
        match self {
            Self::Success(msg) | Self::Error(msg) => msg,
        }
    }
}

impl From<Result<String, String>> for CliResult {
    fn from(result: Result<String, String>) -> Self {
        match result {
            Ok(msg) => Self::Success(msg),
            Err(msg) => Self::Error(msg),
        }
    }
}

/// Settings from `tpgen.yaml`; every field is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference template file; built-in template when unset
    pub template: Option<PathBuf>,
    /// Machine catalog file; built-in catalog when unset
    pub catalog: Option<PathBuf>,
    /// Upload store directory
    pub store_dir: PathBuf,
    /// Upload size limit in bytes
    pub max_upload_bytes: usize,
    /// Maximum nesting depth for the tolerant parse
    pub max_depth: usize,
    /// Maximum node count for the tolerant parse
    pub max_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let limits = DocumentLimits::default();
        Self {
            template: None,
            catalog: None,
            store_dir: PathBuf::from(".tpgen"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_depth: limits.max_depth,
            max_nodes: limits.max_nodes,
        }
    }
}

/// Command-line overrides for [`Config`]
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--template`
    pub template: Option<PathBuf>,
    /// `--catalog`
    pub catalog: Option<PathBuf>,
    /// `--store`
    pub store_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading config {}: {e}", path.display()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| format!("Error parsing config {}: {e}", path.display()))
    }

    /// Load the explicit config file, else `tpgen.yaml` when present, else
    /// defaults; then apply command-line overrides
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self, String> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        if overrides.template.is_some() {
            config.template = overrides.template;
        }
        if overrides.catalog.is_some() {
            config.catalog = overrides.catalog;
        }
        if let Some(store_dir) = overrides.store_dir {
            config.store_dir = store_dir;
        }
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Structural limits for the tolerant parse
    pub fn limits(&self) -> DocumentLimits {
        DocumentLimits {
            max_depth: self.max_depth,
            max_nodes: self.max_nodes,
        }
    }
}

/// Build an analyzer from the configured template and catalog
pub fn build_analyzer(config: &Config) -> Result<Analyzer, String> {
    let template = match &config.template {
        Some(path) => ReferenceTemplate::from_file(path)
            .map_err(|e| format!("Error loading template {}: {e}", path.display()))?,
        None => ReferenceTemplate::builtin().map_err(|e| format!("Error loading template: {e}"))?,
    };
    let catalog = match &config.catalog {
        Some(path) => MachineCatalog::from_file(path)
            .map_err(|e| format!("Error loading catalog {}: {e}", path.display()))?,
        None => MachineCatalog::builtin().map_err(|e| format!("Error loading catalog: {e}"))?,
    };
    tracing::debug!(
        template = %template.name,
        version = %template.version,
        machines = catalog.len(),
        "analyzer ready"
    );
    Ok(Analyzer::new(Arc::new(template), Arc::new(catalog)).with_limits(config.limits()))
}

/// Open the configured upload store
pub fn open_store(config: &Config, analyzer: Analyzer) -> Result<UploadStore, String> {
    let policy = UploadPolicy::default().with_max_bytes(config.max_upload_bytes);
    UploadStore::open(&config.store_dir, analyzer)
        .map(|store| store.with_policy(policy))
        .map_err(|e| format!("Error opening store {}: {e}", config.store_dir.display()))
}

/// Parse an output format argument
pub fn parse_format(format: &str) -> Result<OutputFormat, String> {
    format.parse().map_err(|e| format!("{e}"))
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

/// `tpgen validate`: grammar check only
pub fn validate_file(path: &Path) -> CliResult {
    let text = match read_text(path) {
        Ok(text) => text,
        Err(e) => return CliResult::Error(e),
    };
    let report = grammar::validate(&text);
    match &report.error {
        None => CliResult::Success(format!("{}: VALID", display_name(path))),
        Some(error) => CliResult::Error(error.display_message()),
    }
}

/// `tpgen analyze`: grammar check, then full analysis
pub fn analyze_file(analyzer: &Analyzer, path: &Path, format: OutputFormat) -> CliResult {
    let text = match read_text(path) {
        Ok(text) => text,
        Err(e) => return CliResult::Error(e),
    };
    if let Err(error) = grammar::check(&text) {
        return CliResult::Error(match format {
            OutputFormat::Markdown => grammar_failure_markdown(&error),
            data => to_data_string(&error, data).unwrap_or_else(|_| error.display_message()),
        });
    }
    let outcome = analyzer.analyze(&text);
    let rendered = render_outcome(&outcome, &display_name(path), format).map_err(|e| e.to_string());
    match (rendered, outcome.success) {
        (Ok(out), true) => CliResult::Success(out),
        (Ok(out) | Err(out), _) => CliResult::Error(out),
    }
}

/// `tpgen upload`
pub fn upload_file(store: &UploadStore, path: &Path, user: &str) -> CliResult {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return CliResult::Error(format!("Error reading {}: {e}", path.display())),
    };
    match store.upload(&display_name(path), &bytes, user) {
        Ok(record) => CliResult::Success(format!(
            "Stored upload {} ({}): {} errors, {} warnings, {} compatible machines",
            record.id,
            record.validation_status,
            record.analysis.error_count,
            record.analysis.warning_count,
            record.analysis.compatible_count
        )),
        Err(StoreError::Grammar(error)) => CliResult::Error(error.display_message()),
        Err(e) => CliResult::Error(e.to_string()),
    }
}

/// `tpgen show`
pub fn show_record(store: &UploadStore, id: u64, format: OutputFormat) -> CliResult {
    store
        .get(id)
        .map_err(|e| e.to_string())
        .and_then(|record| match format {
            OutputFormat::Markdown => Ok(tpgen_report::analysis_markdown(
                &format!("{} (upload {})", record.file_name, record.id),
                &record.analysis,
            )),
            data => to_data_string(&record, data).map_err(|e| e.to_string()),
        })
        .into()
}

/// `tpgen compare`
pub fn compare_record(store: &UploadStore, id: u64, format: OutputFormat) -> CliResult {
    store
        .comparison(id)
        .map_err(|e| e.to_string())
        .and_then(|view| match format {
            OutputFormat::Markdown => Ok(comparison_markdown(&view)),
            data => to_data_string(&view, data).map_err(|e| e.to_string()),
        })
        .into()
}

/// `tpgen list`
pub fn list_records(
    store: &UploadStore,
    page: usize,
    page_size: usize,
    format: OutputFormat,
) -> CliResult {
    store
        .list(page, page_size)
        .map_err(|e| e.to_string())
        .and_then(|page| match format {
            OutputFormat::Markdown => Ok(record_list_markdown(&page)),
            data => to_data_string(&page, data).map_err(|e| e.to_string()),
        })
        .into()
}

/// `tpgen delete`
pub fn delete_record(store: &UploadStore, id: u64) -> CliResult {
    store
        .delete(id)
        .map(|()| format!("Deleted upload {id}"))
        .map_err(|e| e.to_string())
        .into()
}

/// `tpgen template`
pub fn template_skeleton(analyzer: &Analyzer) -> CliResult {
    analyzer
        .template()
        .skeleton_yaml()
        .map(|yaml| {
            format!(
                "# {} v{}\n{yaml}",
                analyzer.template().name,
                analyzer.template().version
            )
        })
        .map_err(|e| e.to_string())
        .into()
}
