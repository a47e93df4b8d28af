//! Output formats

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tpgen_core::AnalysisOutcome;

use crate::error::{Error, Result};
use crate::markdown::{analysis_markdown, parse_failure_markdown};

/// Output format for rendered results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
    /// Markdown report
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
        })
    }
}

/// Serialize any value as JSON or YAML
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_data_string<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Json | OutputFormat::Markdown => Ok(serde_json::to_string_pretty(value)?),
    }
}

/// Render an analysis outcome
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_outcome(outcome: &AnalysisOutcome, title: &str, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(match &outcome.analysis {
            Some(analysis) if outcome.success => analysis_markdown(title, analysis),
            _ => parse_failure_markdown(&outcome.parse_errors),
        }),
        data => to_data_string(outcome, data),
    }
}
