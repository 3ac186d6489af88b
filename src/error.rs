use std::cmp::max;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::types::span::Span;

/// The category of an [`Error`].
///
/// Hosts can match on the kind to tell recoverable per-expression failures
/// (`UndefinedReference`, `TypeMismatch`) from fatal render aborts.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A variable or member lookup found nothing where a value was required.
    #[error("{0}")]
    UndefinedReference(String),

    /// A value was used in a context its capabilities do not support.
    #[error("{0}")]
    TypeMismatch(String),

    /// A built-in, operator or call rejected its operand count or shape.
    #[error("{0}")]
    InvalidOperation(String),

    /// The render was terminated with `#stop` or by cancellation.
    #[error("{}", .0.as_deref().unwrap_or("render stopped"))]
    Stopped(Option<String>),

    /// A should-never-happen condition; indicates a defect in this crate.
    #[error("internal error: {0}")]
    InternalInvariantViolation(String),

    /// The program was rejected by one of the compile passes.
    #[error("{0}")]
    Compile(String),

    /// Writing to the output sink failed.
    #[error("{0}")]
    Io(Arc<io::Error>),

    /// Converting host data into a value failed.
    #[error("{0}")]
    Serialize(String),
}

/// An error that can occur during template compilation or rendering.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    location: Option<Box<Location>>,
}

/// Where in which template an error originated.
#[derive(Debug, Clone)]
pub struct Location {
    pub template: Arc<str>,
    pub span: Span,
    pub(crate) source: Option<Arc<str>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    pub(crate) fn undefined(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedReference(msg.into()))
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch(msg.into()))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation(msg.into()))
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalInvariantViolation(msg.into()))
    }

    pub(crate) fn compile(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compile(msg.into()))
    }

    pub(crate) fn stopped(msg: Option<String>) -> Self {
        Self::new(ErrorKind::Stopped(msg))
    }

    /// A type mismatch of the form "expected X, but expression evaluated to
    /// Y".
    pub(crate) fn expected(exp: &str, got: &str) -> Self {
        Self::type_mismatch(format!(
            "expected {exp}, but expression evaluated to {got}"
        ))
    }

    /// Attaches the location of the originating node, unless an inner node
    /// already did.
    pub(crate) fn located(
        mut self,
        template: &Arc<str>,
        source: Option<&Arc<str>>,
        span: Span,
    ) -> Self {
        if self.location.is_none() {
            self.location = Some(Box::new(Location {
                template: template.clone(),
                span,
                source: source.cloned(),
            }));
        }
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the location the error originated from, if known.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_deref()
    }

    /// Returns the bare message without location information.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, ErrorKind::UndefinedReference(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::TypeMismatch(_))
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidOperation(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.kind, ErrorKind::Stopped(_))
    }

    pub fn is_compile(&self) -> bool {
        matches!(self.kind, ErrorKind::Compile(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(Arc::new(err)))
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Self::new(ErrorKind::Io(Arc::new(io::Error::new(
            io::ErrorKind::Other,
            "failed to write to the output",
        ))))
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::new(ErrorKind::Serialize(msg.to_string()))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(&**err),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location.as_deref() {
            Some(Location {
                span,
                source: Some(source),
                ..
            }) if !span.is_empty() => fmt_pretty(&self.message(), source, *span, f),
            _ => fmt::Display::fmt(self, f),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = self.message();
        match self.location.as_deref() {
            None => write!(f, "{msg}"),
            Some(Location {
                template,
                span,
                source,
            }) => match source {
                Some(source) if f.alternate() && !span.is_empty() => {
                    fmt_pretty(&msg, source, *span, f)
                }
                _ if span.is_empty() => write!(f, "{msg} in template `{template}`"),
                _ => write!(
                    f,
                    "{msg} in template `{template}` between bytes {} and {}",
                    span.m, span.n
                ),
            },
        }
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, source.get(span.m..span.n).map(str_width).unwrap_or(1));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = str_width(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            let col = line.get(..offset - n).map(str_width).unwrap_or(0);
            return (i, col);
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| str_width(l)).unwrap_or(0),
    )
}

#[cfg(feature = "unicode")]
fn str_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn str_width(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_location() {
        let err = Error::undefined("`user` is not defined");
        assert_eq!(err.to_string(), "`user` is not defined");
        assert!(err.is_undefined());
    }

    #[test]
    fn display_with_location() {
        let name: Arc<str> = Arc::from("main");
        let source: Arc<str> = Arc::from("Hello ${user}!");
        let err = Error::undefined("`user` is not defined").located(
            &name,
            Some(&source),
            Span::new(8, 12),
        );
        assert_eq!(
            err.to_string(),
            "`user` is not defined in template `main` between bytes 8 and 12"
        );
        assert_eq!(
            format!("{err:#}"),
            "
   |
 1 | Hello ${user}!
   |         ^^^^ `user` is not defined
"
        );
    }

    #[test]
    fn located_keeps_innermost_location() {
        let name: Arc<str> = Arc::from("main");
        let err = Error::invalid("bad")
            .located(&name, None, Span::new(1, 2))
            .located(&name, None, Span::new(0, 10));
        assert_eq!(err.location().map(|l| l.span), Some(Span::new(1, 2)));
    }

    #[test]
    fn stopped_without_message() {
        assert_eq!(Error::stopped(None).to_string(), "render stopped");
        assert_eq!(
            Error::stopped(Some("halt".into())).to_string(),
            "halt"
        );
    }
}
