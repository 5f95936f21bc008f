use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Print a result on stdout: one JSON line in `--json` mode, pretty JSON otherwise.
pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = if is_json() {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{s}");
    Ok(())
}

/// A labelled pass/fail line for human output.
pub fn status_line(ok: bool, label: &str, detail: &str) -> anyhow::Result<()> {
    let mut out = stdout();
    let (tag, color) = if ok {
        ("ok  ", Color::Green)
    } else {
        ("FAIL", Color::Red)
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{tag}")?;
    out.reset()?;
    writeln!(out, " {label}: {detail}")?;
    Ok(())
}

fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}
