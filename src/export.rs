use crate::redact::Redactor;
use crate::storage::{CmdEvent, Selection};
use chrono::{DateTime, Local, SecondsFormat};
use std::io::{self, Write};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("unknown format: {0} (expected bash or md)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Bash,
    Markdown,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" | "sh" => Ok(ExportFormat::Bash),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Write `selection` in `format`, one item at a time.
pub fn export<W: Write>(
    out: &mut W,
    format: ExportFormat,
    selection: &Selection,
    redactor: &Redactor,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    match format {
        ExportFormat::Bash => write_bash(out, selection, redactor, generated_at),
        ExportFormat::Markdown => write_markdown(out, selection, redactor, generated_at),
    }
}

fn timestamp(ev: &CmdEvent) -> String {
    ev.ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn write_bash<W: Write>(
    out: &mut W,
    selection: &Selection,
    redactor: &Redactor,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    writeln!(out, "#!/usr/bin/env bash")?;
    writeln!(out, "# Generated by cmdset at {}", generated_at.to_rfc2822())?;
    writeln!(out, "# Scope: {}", selection.scope)?;
    if !selection.repo_root.is_empty() {
        writeln!(out, "# Repo root: {}", selection.repo_root)?;
    }
    writeln!(out, "set -euo pipefail")?;
    writeln!(out)?;

    let mut current_cwd: Option<&str> = None;
    for ev in &selection.items {
        if current_cwd != Some(ev.cwd.as_str()) {
            writeln!(out, "# In {}", ev.cwd)?;
            current_cwd = Some(ev.cwd.as_str());
        }
        writeln!(out, "# {}", timestamp(ev))?;
        writeln!(out, "{}", redactor.redact(&ev.cmd))?;
        writeln!(out)?;
    }

    out.flush()
}

pub fn write_markdown<W: Write>(
    out: &mut W,
    selection: &Selection,
    redactor: &Redactor,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    writeln!(out, "# cmdset runbook")?;
    writeln!(out)?;
    writeln!(out, "Generated at {}  ", generated_at.to_rfc2822())?;
    writeln!(out, "Scope: `{}`  ", selection.scope)?;
    if !selection.repo_root.is_empty() {
        writeln!(out, "Repo Root: `{}`  ", selection.repo_root)?;
    }
    writeln!(out)?;

    let mut current_cwd: Option<&str> = None;
    for ev in &selection.items {
        if current_cwd != Some(ev.cwd.as_str()) {
            writeln!(out, "## In `{}`", ev.cwd)?;
            writeln!(out)?;
            current_cwd = Some(ev.cwd.as_str());
        }
        writeln!(out, "```bash")?;
        writeln!(out, "# {}", timestamp(ev))?;
        writeln!(out, "{}", redactor.redact(&ev.cmd))?;
        writeln!(out, "```")?;
        writeln!(out)?;
    }

    out.flush()
}
