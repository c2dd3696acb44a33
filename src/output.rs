//! Result printing: vimgrep lines or bare file names

use crate::search::LineMatch;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes results to any `WriteColor` sink
pub struct Printer<W> {
    out: W,
}

impl Printer<StandardStream> {
    /// Printer on stdout; colours only when `color` is set and stdout is a terminal
    pub fn stdout(color: bool) -> Self {
        let choice = if color && io::IsTerminal::is_terminal(&io::stdout()) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> Printer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// `path:line:column:text`, with the match highlighted
    pub fn print_match(&mut self, path: &str, m: &LineMatch) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(self.out, "{}", path)?;
        self.out.reset()?;
        write!(self.out, ":")?;
        self.out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(self.out, "{}", m.line)?;
        self.out.reset()?;
        write!(self.out, ":{}:", m.column)?;

        let start = m.start.min(m.text.len());
        let end = m.end.clamp(start, m.text.len());
        write!(self.out, "{}", &m.text[..start])?;
        self.out
            .set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(self.out, "{}", &m.text[start..end])?;
        self.out.reset()?;
        writeln!(self.out, "{}", &m.text[end..])
    }

    pub fn print_file(&mut self, path: &str) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(self.out, "{}", path)?;
        self.out.reset()?;
        writeln!(self.out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
