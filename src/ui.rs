// UI layer: turns tasks into terminal output. Everything writes to a
// caller-supplied writer so the same code serves stdout and tests.

use std::io::{self, Write};

use crossterm::style::Stylize;
use unicode_width::UnicodeWidthChar;

use crate::task::Task;

pub const SUBJECT_WIDTH: usize = 70;
const ELLIPSIS: &str = "...";

/// Cut `s` so it occupies at most `width` terminal columns, ending in `...`
/// when something was removed.
pub fn truncate(s: &str, width: usize) -> String {
    let total: usize = s.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return s.to_string();
    }
    let budget = width.saturating_sub(ELLIPSIS.len());
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ELLIPSIS);
    out
}

/// One line per task: completion mark, 1-based number, subject.
pub fn render_list(out: &mut dyn Write, tasks: &[Task], color: bool) -> io::Result<()> {
    for (i, task) in tasks.iter().enumerate() {
        let mark = if task.is_completed() { "*" } else { " " };
        let number = format!("{:05}", i + 1);
        let subject = truncate(task.subject(), SUBJECT_WIDTH);
        if color {
            writeln!(out, "{} {} {}", mark.yellow(), number.green(), subject)?;
        } else {
            writeln!(out, "{} {} {}", mark, number, subject)?;
        }
    }
    Ok(())
}

/// Subject, a blank line, then the body text.
pub fn render_task(out: &mut dyn Write, task: &Task) -> io::Result<()> {
    writeln!(out, "{}", task.subject())?;
    writeln!(out)?;
    writeln!(out, "{}", task.content())
}

pub fn render_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)
}
