//! CSV report: a findings section, one blank line, then the cost section.
//!
//! ```text
//! ResourceGroup,Name,Type,Status
//! rg1,web-01,VirtualMachine,Running
//!
//! ResourceGroup,EstimatedCost
//! rg1,₹41.50
//! ```

use std::fs;
use std::path::Path;

use csv::{Terminator, WriterBuilder};

use crate::core::errors::{AcsError, Result};
use crate::cost::CostRow;
use crate::scanner::finding::FindingSet;
use crate::scanner::run::ScanReport;

pub const FINDINGS_HEADER: [&str; 4] = ["ResourceGroup", "Name", "Type", "Status"];
pub const COST_HEADER: [&str; 2] = ["ResourceGroup", "EstimatedCost"];

/// Render both report sections.
pub fn render_csv(findings: &FindingSet, costs: &[CostRow]) -> Result<String> {
    let findings_section = render_section(
        FINDINGS_HEADER,
        findings.iter().map(|f| {
            [
                f.resource_group.as_str(),
                f.name.as_str(),
                f.resource_type.label(),
                f.status.as_str(),
            ]
        }),
    )?;
    let cost_section = render_section(
        COST_HEADER,
        costs
            .iter()
            .map(|row| [row.resource_group.as_str(), row.formatted_cost.as_str()]),
    )?;
    Ok(format!("{findings_section}\n{cost_section}"))
}

/// Render and write the report, creating parent directories as needed.
pub fn write_report(path: &Path, report: &ScanReport) -> Result<()> {
    let rendered = render_csv(&report.findings, &report.costs)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AcsError::io(parent, source))?;
    }
    fs::write(path, rendered).map_err(|source| AcsError::io(path, source))
}

fn render_section<'a, const N: usize, I>(header: [&str; N], rows: I) -> Result<String>
where
    I: IntoIterator<Item = [&'a str; N]>,
{
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| AcsError::Report {
        details: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| AcsError::Report {
        details: e.to_string(),
    })
}
