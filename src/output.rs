//! Output formatting for lookup and dump results
//!
//! Every line is `<id> <value>` or `<id> not found`. Colors are only used
//! when writing to a terminal that supports them.

use std::fmt::Display;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Standard output with colors when `color` is set and stdout is a terminal
pub fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn write_id<W: WriteColor>(out: &mut W, id: u64) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "{}", id)?;
    out.reset()
}

/// Print one `<id> <value>` line
pub fn print_entry<W: WriteColor>(out: &mut W, id: u64, value: impl Display) -> io::Result<()> {
    write_id(out, id)?;
    writeln!(out, " {}", value)
}

/// Print one `<id> not found` line
pub fn print_not_found<W: WriteColor>(out: &mut W, id: u64) -> io::Result<()> {
    write_id(out, id)?;
    write!(out, " ")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(out, "not found")?;
    out.reset()?;
    writeln!(out)
}

/// Print a `label: value` line with a highlighted label
pub fn print_field<W: WriteColor>(out: &mut W, label: &str, value: impl Display) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(out, "{:<16}", format!("{}:", label))?;
    out.reset()?;
    writeln!(out, " {}", value)
}

/// Print a section heading
pub fn print_heading<W: WriteColor>(out: &mut W, title: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
    writeln!(out, "{}", title)?;
    out.reset()?;
    writeln!(out, "{}", "=".repeat(title.len()))
}
