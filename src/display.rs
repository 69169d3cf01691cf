use crate::scope::format_cwd;
use crate::storage::CmdEvent;
use anyhow::Result;
use chrono::Local;
use colored::*;
use std::io::Write;
use unicode_width::UnicodeWidthStr;

/// One table row before colouring, so widths can be measured on plain text.
struct Row {
    number: String,
    time: String,
    cwd: String,
    cmd: String,
    exit: i32,
}

fn rows(events: &[CmdEvent], repo_root: &str) -> Vec<Row> {
    events
        .iter()
        .enumerate()
        .map(|(i, ev)| Row {
            number: format!("# {}", i + 1),
            time: ev.ts.with_timezone(&Local).format("%H:%M:%S").to_string(),
            cwd: format_cwd(&ev.cwd, repo_root),
            cmd: ev.cmd.clone(),
            exit: ev.exit,
        })
        .collect()
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(text));
    format!("{}{}", text, " ".repeat(fill))
}

/// Numbered table: index, local time, short directory, command, exit code.
pub fn write_table<W: Write>(out: &mut W, events: &[CmdEvent], repo_root: &str) -> Result<()> {
    let rows = rows(events, repo_root);
    let number_w = rows.iter().map(|r| r.number.width()).max().unwrap_or(0);
    let cwd_w = rows.iter().map(|r| r.cwd.width()).max().unwrap_or(0);
    let cmd_w = rows.iter().map(|r| r.cmd.width()).max().unwrap_or(0);

    for row in rows {
        let exit = format!("({})", row.exit);
        let exit = if row.exit == 0 { exit.normal() } else { exit.red() };
        writeln!(
            out,
            "{}  {}  {}  {}  {}",
            pad(&row.number, number_w).bold(),
            row.time.dimmed(),
            pad(&row.cwd, cwd_w).cyan(),
            pad(&row.cmd, cmd_w),
            exit
        )?;
    }
    Ok(())
}

pub fn print_table(events: &[CmdEvent], repo_root: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_table(&mut handle, events, repo_root)?;
    handle.flush()?;
    Ok(())
}

pub fn print_json(events: &[CmdEvent]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, events)?;
    writeln!(handle)?;
    Ok(())
}
