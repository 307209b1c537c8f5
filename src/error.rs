use std::cmp::max;
use std::fmt;
use std::io;
use std::sync::Arc;

#[cfg(feature = "unicode")]
use unicode_width::UnicodeWidthStr;

use crate::types::span::Span;

/// The category of an [`Error`].
///
/// The kind decides how the renderer treats the error. Undefined variables,
/// drop methods and filters are recoverable and are written inline into the
/// output when rendering leniently; every other kind unwinds the render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed markup, an unknown tag or an unterminated block.
    Syntax,
    /// Blocks, scopes or templates were nested too deeply.
    StackLevel,
    /// Malformed filter or tag arguments detected while rendering.
    Argument,
    /// A variable could not be resolved.
    UndefinedVariable,
    /// A member of a value could not be resolved.
    UndefinedDropMethod,
    /// A filter is not registered on the engine.
    UndefinedFilter,
    /// A resource limit was exceeded.
    Memory,
    /// A template could not be loaded.
    FileSystem,
    /// The template is already being rendered.
    TemplateBusy,
    /// Any other render failure, e.g. writing the output failed.
    Render,
}

/// An error that can occur during template parsing or rendering.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    template_name: Option<String>,
    line: Option<usize>,
    markup: Option<String>,
    span: Option<(Arc<str>, Span)>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            template_name: None,
            line: None,
            markup: None,
            span: None,
        }
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &Arc<str>, span: impl Into<Span>) -> Self {
        let span = span.into();
        let line = span.start(source).line;
        Self::new(ErrorKind::Syntax, msg)
            .with_span(source.clone(), span)
            .with_line(line)
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, msg)
    }

    pub(crate) fn memory() -> Self {
        Self::new(ErrorKind::Memory, "Memory limits exceeded")
    }

    pub(crate) fn nesting() -> Self {
        Self::new(ErrorKind::StackLevel, "Nesting too deep")
    }

    pub(crate) fn with_span(mut self, source: Arc<str>, span: Span) -> Self {
        self.span = Some((source, span));
        self
    }

    pub(crate) fn with_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub(crate) fn without_line(mut self) -> Self {
        self.line = None;
        self
    }

    pub(crate) fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup.get_or_insert_with(|| markup.into());
        self
    }

    pub(crate) fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name.get_or_insert_with(|| name.into());
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the bare error message without any prefix or context.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the line the error occurred on, if known.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Returns the name of the template the error occurred in, if known.
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Whether lenient rendering replaces this error with inline text and
    /// carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UndefinedVariable
                | ErrorKind::UndefinedDropMethod
                | ErrorKind::UndefinedFilter
        )
    }

    /// Whether this error always unwinds to the caller of `render`.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Memory
                | ErrorKind::Syntax
                | ErrorKind::StackLevel
                | ErrorKind::FileSystem
                | ErrorKind::TemplateBusy
        )
    }

    fn prefix(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Syntax => f.write_str("Dry syntax error")?,
            _ => f.write_str("Dry error")?,
        }
        if let Some(line) = self.line {
            f.write_str(" (")?;
            if let Some(name) = &self.template_name {
                write!(f, "{name} ")?;
            }
            write!(f, "line {line})")?;
        }
        f.write_str(": ")
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::new(ErrorKind::Argument, msg.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Render, format!("failed to write output: {err}"))
    }
}

impl std::error::Error for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            if let Some((source, span)) = &self.span {
                return fmt_pretty(&self.msg, source, *span, f);
            }
        }
        self.prefix(f)?;
        f.write_str(&self.msg)?;
        if let Some(markup) = &self.markup {
            write!(f, " in \"{}\"", markup.trim())?;
        }
        Ok(())
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, width(source.get(span.m..span.n).unwrap_or_default()));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = width_of(&num);
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
            return (i, width(line.get(..offset - n).unwrap_or(line)));
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| width(l)).unwrap_or(0),
    )
}

fn width_of(s: &str) -> usize {
    width(s)
}

#[cfg(feature = "unicode")]
fn width(s: &str) -> usize {
    s.width()
}

#[cfg(not(feature = "unicode"))]
fn width(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_plain() {
        let err = Error::memory();
        assert_eq!(err.to_string(), "Dry error: Memory limits exceeded");
    }

    #[test]
    fn display_with_line_and_name() {
        let err = Error::new(ErrorKind::Argument, "invalid integer")
            .with_line(3)
            .with_template_name("product");
        assert_eq!(
            err.to_string(),
            "Dry error (product line 3): invalid integer"
        );
    }

    #[test]
    fn display_syntax_with_markup() {
        let source: Arc<str> = Arc::from("a\n{% foo %}");
        let err = Error::syntax("Unknown tag 'foo'", &source, 2..11).with_markup(" {% foo %} ");
        assert_eq!(
            err.to_string(),
            "Dry syntax error (line 2): Unknown tag 'foo' in \"{% foo %}\""
        );
    }

    #[test]
    fn display_pretty() {
        let source: Arc<str> = Arc::from("lorem {{ ipsum }}");
        let err = Error::syntax("boom", &source, 9..14);
        assert_eq!(
            format!("{err:#}"),
            "
   |
 1 | lorem {{ ipsum }}
   |          ^^^^^ boom
"
        );
    }
}
