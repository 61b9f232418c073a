//! Console report: sectioned, human-readable run summary.

use core::fmt::Write;

use colored::Colorize;

use crate::core::errors::Result;
use crate::scanner::classify::{ERROR_STATUS_PREFIX, VM_DEALLOCATED, VM_STOPPED};
use crate::scanner::finding::{Finding, ResourceType};
use crate::scanner::run::ScanReport;

pub fn generate<W: Write>(report: &ScanReport, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = "==== Cost Sweep Report ====";
    if use_colors {
        writeln!(writer, "{}", title.bold())?;
    } else {
        writeln!(writer, "{title}")?;
    }
    writeln!(
        writer,
        "generated {} ({})",
        report.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        if report.auto_delete {
            "auto-delete enabled"
        } else {
            "read-only"
        }
    )?;

    section(writer, "Virtual machines", use_colors)?;
    for finding in by_type(report, ResourceType::VirtualMachine) {
        writeln!(
            writer,
            "  {} ({}): {}",
            finding.name,
            finding.resource_group,
            paint(&finding.status, use_colors)
        )?;
    }

    section(writer, "Disks", use_colors)?;
    for finding in by_type(report, ResourceType::Disk) {
        let size = finding
            .size_gb
            .map_or_else(String::new, |gb| format!(", {gb} GB"));
        write!(
            writer,
            "  {} ({}{size}): {}",
            finding.name,
            finding.resource_group,
            paint(&finding.status, use_colors)
        )?;
        if let Some(disposition) = &finding.disposition {
            write!(writer, " [{}]", disposition.label())?;
        }
        writeln!(writer)?;
    }

    section(writer, "Monthly cost by resource group", use_colors)?;
    for row in &report.costs {
        writeln!(writer, "  {:20} : {}", row.resource_group, row.formatted_cost)?;
    }
    if let Some(reason) = &report.cost_degraded {
        writeln!(writer, "  ({reason})")?;
    }

    section(writer, "Right-size recommendations", use_colors)?;
    for finding in by_type(report, ResourceType::VirtualMachine) {
        if let Some(advice) = &finding.advice {
            writeln!(writer, "  {}: {advice}", finding.name)?;
        }
    }

    section(writer, "Blob containers", use_colors)?;
    for finding in by_type(report, ResourceType::BlobContainer) {
        writeln!(
            writer,
            "  {} ({}): {}",
            finding.name,
            finding.resource_group,
            paint(&finding.status, use_colors)
        )?;
    }

    let s = &report.summary;
    writeln!(writer)?;
    writeln!(
        writer,
        "{} findings: {} VMs, {} disks, {} storage; {} errors, {} protected, {} deletes requested ({} failed)",
        report.findings.len(),
        s.virtual_machines,
        s.disks,
        s.blob_findings,
        s.errors,
        s.disks_protected,
        s.deletes_requested,
        s.deletes_failed
    )?;
    Ok(())
}

fn section<W: Write>(writer: &mut W, name: &str, use_colors: bool) -> Result<()> {
    writeln!(writer)?;
    if use_colors {
        writeln!(writer, "{}", format!("{name}:").bold())?;
    } else {
        writeln!(writer, "{name}:")?;
    }
    Ok(())
}

fn by_type(report: &ScanReport, resource_type: ResourceType) -> impl Iterator<Item = &Finding> {
    report
        .findings
        .iter()
        .filter(move |f| f.resource_type == resource_type)
}

fn paint(status: &str, use_colors: bool) -> String {
    if !use_colors {
        return status.to_string();
    }
    if status.starts_with(ERROR_STATUS_PREFIX) {
        status.red().to_string()
    } else if status == VM_STOPPED || status.starts_with("Unattached") || status.starts_with("Empty") {
        status.yellow().to_string()
    } else if status == VM_DEALLOCATED || status.starts_with("Protected") {
        status.green().to_string()
    } else {
        status.to_string()
    }
}
