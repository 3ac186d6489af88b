#![allow(dead_code)]

use std::io;

/// An in-memory sink that can be told to fail after a number of writes.
#[derive(Debug, Default)]
pub struct Writer {
    out: String,
    writes_left: Option<usize>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `n` writes, then every write fails with `AddrInUse`.
    pub fn failing_after(n: usize) -> Self {
        Self {
            out: String::new(),
            writes_left: Some(n),
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(left) = &mut self.writes_left {
            if *left == 0 {
                return Err(io::ErrorKind::AddrInUse.into());
            }
            *left -= 1;
        }
        let s = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.out.push_str(s);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
