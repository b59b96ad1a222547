//! Terminal output helpers: tables, key/value lines and a stderr spinner.

use std::io::{self, IsTerminal, Write};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Render rows as a table. Falls back to tab-separated lines when stdout is
/// not a terminal.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if !io::stdout().is_terminal() {
        let mut out = String::new();
        out.push_str(&headers.join("\t"));
        for row in rows {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        return out;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

/// Print an aligned `label: value` line.
pub fn kv(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Indeterminate progress on stderr, animated only on a terminal.
pub struct Spinner {
    message: String,
    frame: usize,
    animate: bool,
}

impl Spinner {
    pub fn new(message: &str, quiet: bool) -> Self {
        Self {
            message: message.to_string(),
            frame: 0,
            animate: !quiet && io::stderr().is_terminal(),
        }
    }

    /// Advance to the next frame.
    pub fn tick(&mut self) {
        if !self.animate {
            return;
        }
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        eprint!("\r\x1b[K{} {}...", SPINNER_FRAMES[self.frame], self.message);
        let _ = io::stderr().flush();
    }

    /// Clear the spinner line.
    pub fn finish(&self) {
        if self.animate {
            eprint!("\r\x1b[K");
            let _ = io::stderr().flush();
        }
    }
}

/// Format unix milliseconds as local `YYYY-MM-DD HH:MM`.
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|utc| {
            utc.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}
