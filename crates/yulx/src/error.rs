//! Diagnostics carried through every pipeline stage.
//!
//! The teacher workspace never reaches for `thiserror`/`anyhow` anywhere, so
//! this mirrors its own idiom (see `ouros::parse::ParseError`,
//! `ouros::exception_private::ExcType`): hand-written enums, `Cow<'static,
//! str>` messages, and a manual `Display` impl.

use std::{borrow::Cow, fmt, rc::Rc};

/// A location in a source file, used for parser diagnostics and for stamping
/// `file:line` into debug-mode revert messages (§7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub filename: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    #[must_use]
    pub fn new(filename: impl Into<Rc<str>>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    /// Renders as `path:line` the way debug-mode revert strings embed it.
    #[must_use]
    pub fn file_line(&self) -> String {
        format!("{}:{}", self.filename, self.line)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// Every error kind named in §7, realised as one enum.
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed syntax; always carries a position and, where available, the
    /// offending source line so callers can render a caret under it.
    Parse {
        msg: Cow<'static, str>,
        at: SourceSpan,
        line_text: Option<String>,
    },
    /// A `solc`/`yulc` pragma's version constraint was not satisfied.
    Version { msg: Cow<'static, str> },
    /// Undefined identifier/macro/struct/interface/method/event/error,
    /// duplicate definition, member access on a non-struct, or call arity
    /// mismatch.
    Resolution { msg: Cow<'static, str>, at: Option<SourceSpan> },
    /// ABI-type grammar violation, struct width overflow, literal width
    /// overflow, or a non-literal where the grammar demands one.
    Type { msg: Cow<'static, str>, at: Option<SourceSpan> },
    /// `revert.static` or a failed `assert.static`: a transform-time abort
    /// that never reaches emitted code.
    StaticAbort { msg: Cow<'static, str>, at: Option<SourceSpan> },
    /// An `include` target could not be read; the underlying I/O error is
    /// propagated verbatim.
    Io { msg: Cow<'static, str>, source: Rc<std::io::Error> },
}

impl Error {
    pub(crate) fn parse(msg: impl Into<Cow<'static, str>>, at: SourceSpan, line_text: Option<String>) -> Self {
        Self::Parse {
            msg: msg.into(),
            at,
            line_text,
        }
    }

    pub(crate) fn resolution(msg: impl Into<Cow<'static, str>>, at: Option<SourceSpan>) -> Self {
        Self::Resolution { msg: msg.into(), at }
    }

    pub(crate) fn ty(msg: impl Into<Cow<'static, str>>, at: Option<SourceSpan>) -> Self {
        Self::Type { msg: msg.into(), at }
    }

    pub(crate) fn static_abort(msg: impl Into<Cow<'static, str>>, at: Option<SourceSpan>) -> Self {
        Self::StaticAbort { msg: msg.into(), at }
    }

    pub(crate) fn version(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Version { msg: msg.into() }
    }

    pub(crate) fn io(msg: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::Io {
            msg: msg.into(),
            source: Rc::new(source),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { msg, at, line_text } => {
                writeln!(f, "parse error at {at}: {msg}")?;
                if let Some(line) = line_text {
                    writeln!(f, "  {line}")?;
                    let caret_pad = " ".repeat(at.column.saturating_sub(1) as usize);
                    write!(f, "  {caret_pad}^")?;
                }
                Ok(())
            }
            Self::Version { msg } => write!(f, "version error: {msg}"),
            Self::Resolution { msg, at } => write_with_pos(f, "resolution error", msg, at.as_ref()),
            Self::Type { msg, at } => write_with_pos(f, "type error", msg, at.as_ref()),
            Self::StaticAbort { msg, at } => write_with_pos(f, "static abort", msg, at.as_ref()),
            Self::Io { msg, source } => write!(f, "io error: {msg}: {source}"),
        }
    }
}

fn write_with_pos(f: &mut fmt::Formatter<'_>, kind: &str, msg: &str, at: Option<&SourceSpan>) -> fmt::Result {
    match at {
        Some(at) => write!(f, "{kind} at {at}: {msg}"),
        None => write!(f, "{kind}: {msg}"),
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
