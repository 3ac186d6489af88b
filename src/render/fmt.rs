use std::fmt;
use std::io;

use crate::{Error, Result};

/// Where rendered text ends up.
pub(crate) trait Sink: fmt::Write {
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for String {}

/// Adapts an [`io::Write`] to [`fmt::Write`], keeping the underlying error.
pub struct Writer<W> {
    writer: W,
    err: Option<io::Error>,
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer, err: None }
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<W> fmt::Write for Writer<W>
where
    W: io::Write,
{
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writer.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }
}

impl<W> Sink for Writer<W>
where
    W: io::Write,
{
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// The output sink stack of a render.
///
/// Captures (`#assign x>...`, `#attempt`) and function bodies push a buffer;
/// text goes to the innermost buffer, or the base sink when there is none.
pub(crate) struct Output<'a> {
    base: Option<&'a mut (dyn Sink + 'a)>,
    buffers: Vec<Buffer>,
}

enum Buffer {
    Capture(String),
    Discard,
}

impl<'a> Output<'a> {
    pub fn new(base: &'a mut (dyn Sink + 'a)) -> Self {
        Self {
            base: Some(base),
            buffers: Vec::new(),
        }
    }

    /// An output that drops everything written to it.
    pub fn discard() -> Self {
        Self {
            base: None,
            buffers: Vec::new(),
        }
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        match self.buffers.last_mut() {
            Some(Buffer::Capture(buf)) => buf.push_str(s),
            Some(Buffer::Discard) => {}
            None => {
                if let Some(base) = self.base.as_mut() {
                    base.write_str(s)?;
                }
            }
        }
        Ok(())
    }

    pub fn push_capture(&mut self) {
        self.buffers.push(Buffer::Capture(String::new()));
    }

    pub fn push_discard(&mut self) {
        self.buffers.push(Buffer::Discard);
    }

    /// Removes the innermost buffer, returning what it captured.
    pub fn pop(&mut self) -> String {
        match self.buffers.pop() {
            Some(Buffer::Capture(buf)) => buf,
            Some(Buffer::Discard) | None => String::new(),
        }
    }

    /// Flushes the base sink. Does nothing while a buffer is active.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffers.is_empty() {
            return Ok(());
        }
        if let Some(base) = self.base.as_mut() {
            base.flush().map_err(Error::from)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_nest() {
        let mut s = String::new();
        {
            let mut out = Output::new(&mut s);
            out.write_str("a").unwrap();
            out.push_capture();
            out.write_str("b").unwrap();
            out.push_discard();
            out.write_str("lost").unwrap();
            assert_eq!(out.pop(), "");
            out.write_str("c").unwrap();
            assert_eq!(out.pop(), "bc");
            out.write_str("d").unwrap();
        }
        assert_eq!(s, "ad");
    }

    #[test]
    fn discard_output_drops_everything() {
        let mut out = Output::discard();
        out.write_str("x").unwrap();
        out.flush().unwrap();
    }
}
