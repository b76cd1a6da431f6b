use std::io::{self, IsTerminal, Write};

use crate::cli::OutputFormat;

use super::Reading;

/// Somewhere a [`Reading`] can be shown.
pub trait Surface {
    fn show(&mut self, reading: &Reading) -> io::Result<()>;

    /// Called once before exit.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Pick the stdout surface for `format`.
///
/// `Overlay` only rewrites in place on a terminal; piped output gets plain lines.
pub fn stdout_surface(format: OutputFormat) -> Box<dyn Surface> {
    let stdout = io::stdout();
    match format {
        OutputFormat::Overlay if stdout.is_terminal() => Box::new(StatusLine::new(stdout, true)),
        OutputFormat::Overlay | OutputFormat::Lines => Box::new(Lines::new(stdout)),
        OutputFormat::Json => Box::new(JsonLines::new(stdout)),
    }
}

/// A single line that is cleared and redrawn on every update.
pub struct StatusLine<W: Write> {
    out: W,
    color: bool,
    dirty: bool,
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            dirty: false,
        }
    }
}

impl<W: Write> Surface for StatusLine<W> {
    fn show(&mut self, reading: &Reading) -> io::Result<()> {
        // Carriage return + erase line keeps the value pinned to one row.
        write!(self.out, "\r\x1b[2K")?;
        let text = single_line(reading.text());
        match (self.color, reading.is_error()) {
            (true, true) => write!(self.out, "\x1b[31m{text}\x1b[0m")?,
            (true, false) => write!(self.out, "\x1b[1m{text}\x1b[0m")?,
            (false, _) => write!(self.out, "{text}")?,
        }
        self.dirty = true;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.dirty {
            writeln!(self.out)?;
            self.dirty = false;
        }
        self.out.flush()
    }
}

/// One line per update.
pub struct Lines<W: Write> {
    out: W,
}

impl<W: Write> Lines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Surface for Lines<W> {
    fn show(&mut self, reading: &Reading) -> io::Result<()> {
        writeln!(self.out, "{}", single_line(reading.text()))?;
        self.out.flush()
    }
}

/// One JSON object per update: `{"status":"ok","text":"..."}`.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Surface for JsonLines<W> {
    fn show(&mut self, reading: &Reading) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, reading)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Collapse embedded line breaks so a value never spills onto a second row.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str) -> Reading {
        Reading::Value { text: text.into() }
    }

    #[test]
    fn test_status_line_redraws_in_place() {
        let mut buf = Vec::new();
        {
            let mut line = StatusLine::new(&mut buf, false);
            line.show(&value("first")).unwrap();
            line.show(&value("second")).unwrap();
            line.finish().unwrap();
        }
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out, "\r\x1b[2Kfirst\r\x1b[2Ksecond\n");
    }

    #[test]
    fn test_status_line_colors_errors() {
        let mut buf = Vec::new();
        StatusLine::new(&mut buf, true)
            .show(&Reading::Error {
                text: "Error reading XML: boom".into(),
            })
            .unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("\x1b[31mError reading XML: boom\x1b[0m"), "{out:?}");
    }

    #[test]
    fn test_lines_flattens_multiline_values() {
        let mut buf = Vec::new();
        Lines::new(&mut buf).show(&value("a\n  b\tc")).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a b c\n");
    }

    #[test]
    fn test_json_lines() {
        let mut buf = Vec::new();
        {
            let mut json = JsonLines::new(&mut buf);
            json.show(&value("Sales")).unwrap();
            json.show(&Reading::Error { text: "x".into() }).unwrap();
        }
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], r#"{"status":"ok","text":"Sales"}"#);
        assert_eq!(lines[1], r#"{"status":"error","text":"x"}"#);
    }
}
