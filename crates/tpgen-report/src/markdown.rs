//! Markdown rendering
//!
//! Reports use `## ` sections and tables so they read well in a terminal
//! pager and paste cleanly into tickets.

use tpgen_core::{AnalysisResult, Finding, GrammarError};
use tpgen_store::{ComparisonView, Page, RecordSummary};

fn cell(value: Option<&str>) -> String {
    value.map_or_else(|| "-".to_string(), escape)
}

fn escape(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

fn line(finding: &Finding) -> String {
    finding
        .line_number
        .map_or_else(|| "-".to_string(), |l| l.to_string())
}

fn findings_table(md: &mut String, title: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    md.push_str(&format!("## {title}\n\n"));
    md.push_str("| Line | Code | Field | Message |\n");
    md.push_str("|------|------|-------|---------|\n");
    for finding in findings {
        md.push_str(&format!(
            "| {} | {} | `{}` | {} |\n",
            line(finding),
            finding.code,
            escape(&finding.field_path),
            escape(&finding.message)
        ));
    }
    md.push('\n');
}

/// Render an analysis
#[must_use]
pub fn analysis_markdown(title: &str, result: &AnalysisResult) -> String {
    let mut md = String::with_capacity(4096);
    md.push_str(&format!("# Test Plan Analysis: {}\n\n", escape(title)));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- **Status**: {}\n",
        result.validation_status.as_str().to_uppercase()
    ));
    md.push_str(&format!(
        "- **Valid**: {}\n",
        if result.is_valid { "yes" } else { "no" }
    ));
    md.push_str(&format!(
        "- **Findings**: {} errors / {} warnings\n",
        result.error_count, result.warning_count
    ));
    md.push_str(&format!(
        "- **Machines**: {} compatible / {} incompatible\n",
        result.compatible_count, result.incompatible_count
    ));
    md.push_str(&format!(
        "- **Template**: {} v{}\n\n",
        result.template_name, result.template_version
    ));

    let info = &result.basic_info;
    md.push_str("## Basic Info\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("|-------|-------|\n");
    for (name, value) in [
        ("Plan name", &info.plan_name),
        ("Test type", &info.test_type),
        ("CPU", &info.cpu),
        ("GPU", &info.gpu),
        ("OS", &info.os),
        ("Kernel", &info.kernel),
    ] {
        md.push_str(&format!("| {name} | {} |\n", cell(value.as_deref())));
    }
    md.push('\n');

    findings_table(&mut md, "Validation Errors", &result.validation_errors);
    findings_table(&mut md, "Warnings", &result.warnings);

    if !result.comparison.type_errors.is_empty() {
        md.push_str("## Type Errors\n\n");
        md.push_str("| Field | Expected | Actual |\n");
        md.push_str("|-------|----------|--------|\n");
        for error in &result.comparison.type_errors {
            md.push_str(&format!(
                "| `{}` | {} | {} |\n",
                escape(&error.field_path),
                escape(&error.expected_type),
                escape(&error.actual_type)
            ));
        }
        md.push('\n');
    }

    md.push_str("## Compatible Machines\n\n");
    if result.compatible_machines().is_empty() {
        md.push_str("None.\n\n");
    } else {
        md.push_str("| ID | Name | CPU | GPU | OS | Kernel |\n");
        md.push_str("|----|------|-----|-----|----|--------|\n");
        for m in result.compatible_machines() {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                m.id,
                escape(&m.name),
                escape(&m.cpu),
                escape(&m.gpu),
                escape(&m.os),
                escape(&m.kernel)
            ));
        }
        md.push('\n');
    }

    if !result.incompatible_machines().is_empty() {
        md.push_str("## Incompatible Machines\n\n");
        md.push_str("| ID | Name | Constraint | Expected | Actual |\n");
        md.push_str("|----|------|------------|----------|--------|\n");
        for entry in result.incompatible_machines() {
            for failure in &entry.failures {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    entry.machine.id,
                    escape(&entry.machine.name),
                    failure.constraint,
                    escape(&failure.expected),
                    cell(Some(failure.actual.as_str()).filter(|a| !a.is_empty()))
                ));
            }
        }
        md.push('\n');
    }

    md
}

/// Render a stored plan next to the template
#[must_use]
pub fn comparison_markdown(view: &ComparisonView) -> String {
    let mut md = String::with_capacity(4096);
    md.push_str(&format!("# Template Comparison: upload {}\n\n", view.id));

    md.push_str("## Missing Fields\n\n");
    if view.missing_fields.is_empty() {
        md.push_str("None.\n\n");
    } else {
        for path in &view.missing_fields {
            md.push_str(&format!("- `{path}`\n"));
        }
        md.push('\n');
    }

    md.push_str("## Type Errors\n\n");
    if view.type_errors.is_empty() {
        md.push_str("None.\n\n");
    } else {
        md.push_str("| Field | Expected | Actual |\n");
        md.push_str("|-------|----------|--------|\n");
        for error in &view.type_errors {
            md.push_str(&format!(
                "| `{}` | {} | {} |\n",
                escape(&error.field_path),
                escape(&error.expected_type),
                escape(&error.actual_type)
            ));
        }
        md.push('\n');
    }

    md.push_str("## Uploaded Plan\n\n```yaml\n");
    md.push_str(view.user_yaml.trim_end());
    md.push_str("\n```\n\n## Reference Template\n\n```yaml\n");
    md.push_str(view.template_yaml.trim_end());
    md.push_str("\n```\n");
    md
}

/// Render a page of stored uploads
#[must_use]
pub fn record_list_markdown(page: &Page<RecordSummary>) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str(&format!(
        "# Uploads (page {} of {}, {} total)\n\n",
        page.page,
        page.total_pages.max(1),
        page.total
    ));
    if page.items.is_empty() {
        md.push_str("No uploads.\n");
        return md;
    }
    md.push_str("| ID | File | Plan | Type | Status | Errors | Warnings | Compatible | By | Uploaded |\n");
    md.push_str("|----|------|------|------|--------|--------|----------|------------|----|----------|\n");
    for item in &page.items {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            item.id,
            escape(&item.file_name),
            cell(item.plan_name.as_deref()),
            cell(item.test_type.as_deref()),
            item.validation_status,
            item.error_count,
            item.warning_count,
            item.compatible_count,
            escape(&item.created_by),
            item.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    md
}

/// Render a grammar rejection in the uploader-facing format
#[must_use]
pub fn grammar_failure_markdown(error: &GrammarError) -> String {
    format!(
        "## Grammar Check Failed\n\n- **Code**: {}\n\n```text\n{}\n```\n",
        error.error_code,
        error.display_message()
    )
}

/// Render a tolerant-parse failure
#[must_use]
pub fn parse_failure_markdown(errors: &[String]) -> String {
    let mut md = String::from("## Parse Failed\n\n");
    for error in errors {
        md.push_str(&format!("- {}\n", escape(error)));
    }
    md
}
