//! `frota import`: load loosely shaped work-order payloads.
//!
//! Accepts one JSON object or an array of them. Each payload goes through
//! the ingest normalizer, so camelCase keys, spelled-out statuses and
//! string or fractional timer values are repaired instead of rejected.

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::cmd::open_service;
use crate::output::{CliError, OutputMode, fail, render_mode};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file to read, or `-` for stdin.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct Imported {
    id: String,
    status: String,
    repairs: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Rejected {
    index: usize,
    #[serde(flatten)]
    error: CliError,
}

#[derive(Debug, Serialize)]
struct ImportOutput {
    imported: Vec<Imported>,
    rejected: Vec<Rejected>,
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// # Errors
///
/// Fails if the input cannot be read or parsed as JSON, or if any payload
/// was rejected (after reporting every result).
pub fn run_import(args: &ImportArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let svc = open_service(project_root, output)?;
    let raw = read_payload(&args.file).map_err(|e| fail(output, &CliError::new(format!("{e:#}"))))?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|e| {
        fail(
            output,
            &CliError::coded(
                frota_core::ErrorCode::MalformedPayload,
                format!("{} is not valid JSON: {e}", args.file.display()),
            ),
        )
    })?;
    let payloads = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut result = ImportOutput {
        imported: Vec::new(),
        rejected: Vec::new(),
    };
    for (index, payload) in payloads.iter().enumerate() {
        match svc.import(payload) {
            Ok(ingested) => result.imported.push(Imported {
                status: ingested.order.status().to_string(),
                id: ingested.order.id,
                repairs: ingested.repairs,
            }),
            Err(e) => result.rejected.push(Rejected {
                index,
                error: CliError::from(&e),
            }),
        }
    }

    render_mode(
        output,
        &result,
        |r, w| {
            for item in &r.imported {
                writeln!(w, "{}\t{}\t{}", item.id, item.status, item.repairs.len())?;
            }
            for item in &r.rejected {
                writeln!(w, "#{}\terror\t{}", item.index, item.error.message)?;
            }
            Ok(())
        },
        |r, w| {
            for item in &r.imported {
                writeln!(w, "✓ {} ({})", item.id, item.status)?;
                for repair in &item.repairs {
                    writeln!(w, "    repaired: {repair}")?;
                }
            }
            for item in &r.rejected {
                writeln!(w, "✗ payload #{}: {}", item.index, item.error.message)?;
            }
            writeln!(w, "{} imported, {} rejected", r.imported.len(), r.rejected.len())
        },
    )?;

    if result.rejected.is_empty() {
        Ok(())
    } else if output.is_json() {
        // The JSON document already lists each rejection.
        anyhow::bail!("{} payload(s) rejected", result.rejected.len())
    } else {
        Err(fail(
            output,
            &CliError::new(format!("{} payload(s) rejected", result.rejected.len())),
        ))
    }
}
