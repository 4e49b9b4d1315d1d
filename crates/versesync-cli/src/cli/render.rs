//! # Rendering Module
//!
//! Turns a [`CmdResult`] into text for the terminal, or into JSON with
//! `--output json`.
//!
//! Text output is built as a `String` so tests can compare it without a
//! terminal; styling goes through `console`, which drops colors when stdout
//! is not a tty.

use super::setup::OutputFormat;
use chrono::{DateTime, Local, Utc};
use console::Style;
use std::fmt::Write;
use versesync::commands::{AdapterInfo, CmdMessage, CmdResult, MessageLevel, StatusReport};
use versesync::merge::Conflict;

const NAME_WIDTH: usize = 14;
const LABEL_WIDTH: usize = 13;

struct Styles {
    muted: Style,
    active: Style,
    success: Style,
    warning: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            muted: Style::new().dim(),
            active: Style::new().bold(),
            success: Style::new().green(),
            warning: Style::new().yellow().bold(),
            error: Style::new().red().bold(),
        }
    }
}

pub fn render(result: &CmdResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => Ok(render_text(result)),
    }
}

fn render_text(result: &CmdResult) -> String {
    let styles = Styles::new();
    let mut out = String::new();

    if !result.adapters.is_empty() {
        render_adapters(&mut out, &result.adapters, &styles);
    }
    if let Some(status) = &result.status {
        render_status(&mut out, status, &styles);
    }
    if !result.conflicts.is_empty() {
        render_conflicts(&mut out, &result.conflicts, &styles);
    }
    for message in &result.messages {
        render_message(&mut out, message, &styles);
    }
    out
}

fn render_adapters(out: &mut String, adapters: &[AdapterInfo], styles: &Styles) {
    for info in adapters {
        let marker = if info.active { "*" } else { " " };
        let state = if info.authenticated {
            styles.success.apply_to("connected")
        } else {
            styles.muted.apply_to("not connected")
        };
        let name = format!("{:<NAME_WIDTH$}", info.name);
        let name = if info.active {
            styles.active.apply_to(name).to_string()
        } else {
            name
        };
        let _ = write!(out, "{marker} {name} {:<NAME_WIDTH$} {state}", info.display_name);
        if let Some(location) = &info.location {
            let _ = write!(out, "  {}", styles.muted.apply_to(location));
        }
        out.push('\n');
    }
}

fn render_status(out: &mut String, status: &StatusReport, styles: &Styles) {
    let row = |out: &mut String, label: &str, value: &str| {
        let _ = writeln!(out, "{:<LABEL_WIDTH$} {value}", format!("{label}:"));
    };

    match &status.adapter {
        Some(info) => {
            row(out, "Backend", &format!("{} ({})", info.display_name, info.name));
            if let Some(location) = &info.location {
                row(out, "Location", location);
            }
        }
        None => row(out, "Backend", &styles.muted.apply_to("none selected").to_string()),
    }
    row(out, "State", &status.state.to_string());

    let synced = match status.last_synced {
        Some(at) if status.remote_checked => format!("{} (remote)", format_time(at)),
        Some(at) => format_time(at),
        None => styles.muted.apply_to("never").to_string(),
    };
    row(out, "Last synced", &synced);
    row(out, "Local data", &status.local.to_string());
}

fn render_conflicts(out: &mut String, conflicts: &[Conflict], styles: &Styles) {
    let _ = writeln!(out, "{}", styles.warning.apply_to("Conflicts:"));
    for conflict in conflicts {
        let _ = writeln!(
            out,
            "  {:<10} {}  {}",
            conflict.kind.to_string(),
            conflict.key,
            styles.muted.apply_to(format!(
                "local {} / remote {}",
                conflict.local_timestamp, conflict.remote_timestamp
            ))
        );
    }
}

fn render_message(out: &mut String, message: &CmdMessage, styles: &Styles) {
    let line = match message.level {
        MessageLevel::Info => message.content.clone(),
        MessageLevel::Success => styles.success.apply_to(&message.content).to_string(),
        MessageLevel::Warning => styles.warning.apply_to(&message.content).to_string(),
        MessageLevel::Error => styles.error.apply_to(&message.content).to_string(),
    };
    out.push_str(&line);
    out.push('\n');
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
