use std::sync::Arc;

use crate::types::span::Span;
use crate::{Error, Result};

/// A lexer that tokenizes the template source into distinct chunks so that the
/// parser doesn't have to operate on raw text.
///
/// The lexer is implemented as a fallible iterator. The parser should
/// repeatedly call the [`.next()?`][Lexer::next] method to return the next
/// non-whitespace token until [`None`] is returned.
pub struct Lexer<'source> {
    /// The original template source.
    pub source: &'source str,

    /// A shared copy of the source, attached to errors.
    shared: Arc<str>,

    /// A cursor over the template source.
    cursor: usize,

    /// The current state of the lexer.
    state: State,

    /// A buffer to store the next token.
    next: Option<Lexeme>,

    /// How many tags or expressions we are inside of. Identifiers and
    /// operators are only recognized when this is non-zero.
    inside: usize,

    /// The last offset a line number was resolved for and its line.
    line_cache: (usize, usize),
}

/// The state of the lexer.
///
/// The lexer requires state because the tokenization is different when
/// tokenizing text between expression and block syntax, e.g. `{{ expr }}`,
/// `{% if cond %}`.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Within raw template.
    Template,

    /// Between expression or block tags.
    Block {
        /// The span of the begin tag.
        begin: Span,
        /// The end token we are expecting.
        end: Token,
    },
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw template
    Raw,
    /// Begin expression tag, e.g. `{{`
    BeginExpr,
    /// End expression tag, e.g. `}}`
    EndExpr,
    /// Begin block tag, e.g. `{%`
    BeginBlock,
    /// End block tag, e.g. `%}`
    EndBlock,
    /// Begin comment tag, e.g. `{#`
    BeginComment,
    /// End comment tag, e.g. `#}`
    EndComment,
    /// An inline comment within a block tag, e.g. `# note`
    Hash,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `|`
    Pipe,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `=`
    Equals,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// A comparison operator like `==` or `<=`
    Operator,
    /// Sequence of whitespace
    Whitespace,
    /// An attribute, variable or keyword
    Ident,
    /// An integer or float literal, e.g. `19` or `-1.5`.
    Number,
    /// A string literal, e.g. `"Hello World!"` or `'Hi'`.
    String,
    /// Any other single character.
    Other,
}

/// A token along with where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Span,
    /// The one based line the token starts on.
    pub line: usize,
    /// Whether a begin or end tag carries a whitespace control marker.
    pub trim: bool,
}

/// The body of a `raw` or `comment` block.
pub struct RawBody {
    pub span: Span,
    pub line: usize,
    /// Whether the end tag trims whitespace before it.
    pub left_trim: bool,
    /// Whether the end tag trims whitespace after it.
    pub right_trim: bool,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer.
    pub fn new(source: &'source str, shared: Arc<str>) -> Self {
        // A byte order mark is only skipped at the very start.
        let cursor = if source.starts_with('\u{feff}') { 3 } else { 0 };
        Self {
            source,
            shared,
            cursor,
            state: State::Template,
            next: None,
            inside: 0,
            line_cache: (0, 1),
        }
    }

    /// Returns the next non-whitespace token.
    pub fn next(&mut self) -> Result<Option<Lexeme>> {
        loop {
            match self.lex()? {
                Some(lx) if lx.token != Token::Whitespace => return Ok(Some(lx)),
                None => return Ok(None),
                _ => continue,
            }
        }
    }

    /// Returns the line of the byte offset.
    pub fn line_at(&mut self, offset: usize) -> usize {
        let (from, line) = match self.line_cache {
            (m, line) if m <= offset => (m, line),
            _ => (0, 1),
        };
        let offset = offset.min(self.source.len());
        let line = line
            + self.source.as_bytes()[from..offset]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
        self.line_cache = (offset, line);
        line
    }

    /// Returns the next token.
    fn lex(&mut self) -> Result<Option<Lexeme>> {
        if let Some(next) = self.next.take() {
            return Ok(Some(next));
        }

        let i = self.cursor;

        if self.source[i..].is_empty() {
            return match self.state {
                State::Template => Ok(None),
                State::Block { begin, end } => Err(self.err_unclosed(begin, end)),
            };
        }

        match self.state {
            State::Template => self.lex_template(i),
            State::Block { begin, end } => self.lex_block(begin, end, i),
        }
    }

    fn lex_template(&mut self, i: usize) -> Result<Option<Lexeme>> {
        // We are within raw template, that means all we have to do is
        // find the next begin tag from `i`. The following diagram helps
        // describe the variable naming.
        //
        // xxxxxxx{{xxxxxxxxx
        //    ^   ^ ^
        //    i   j k

        match find_begin_tag(self.source, i) {
            Some((tk, j, k, trim)) => {
                if j > i && self.source[..j].ends_with('\\') {
                    // An escaped tag, emit the text before the backslash
                    // and then the tag itself as text.
                    let next = self.lexeme(Token::Raw, j..j + 2, false);
                    self.next = Some(next);
                    self.cursor = j + 2;
                    return Ok(Some(self.lexeme(Token::Raw, i..j - 1, false)));
                }

                let begin = Span::from(j..k);
                self.cursor = k;
                self.inside += 1;
                self.state = State::Block {
                    begin,
                    end: tk.pair(),
                };
                let lx = self.lexeme(tk, j..k, trim);

                if i == j {
                    // The current cursor is exactly at the token.
                    Ok(Some(lx))
                } else {
                    // We must first emit the raw token, so we store the
                    // begin tag token in the `next` buffer.
                    self.next = Some(lx);
                    Ok(Some(self.lexeme(Token::Raw, i..j, false)))
                }
            }
            None => {
                let j = self.source.len();
                self.cursor = j;
                Ok(Some(self.lexeme(Token::Raw, i..j, false)))
            }
        }
    }

    fn lex_block(&mut self, begin: Span, end: Token, i: usize) -> Result<Option<Lexeme>> {
        // We are between two tags {{ ... }} or {% ... %} that means we
        // must parse template syntax relevant tokens and also lookout
        // for the corresponding end tag `end`.

        if end == Token::EndComment {
            return self.lex_comment(begin, i);
        }

        if let Some((j, trim)) = end_tag_at(self.source, i, end) {
            self.state = State::Template;
            self.inside -= 1;
            self.cursor = j;
            return Ok(Some(self.lexeme(end, i..j, trim)));
        }

        if begin_tag_at(self.source, i) {
            return Err(self.err_unclosed(begin, end));
        }

        // We iterate over chars because that is nicer than operating on
        // raw bytes. The map call here fixes the index to be relative
        // to the actual template source.
        let mut iter = self.source[i..].char_indices().map(|(d, c)| (i + d, c));

        let Some((i, c)) = iter.next() else {
            return Err(self.err_unclosed(begin, end));
        };

        let (tk, j) = match c {
            // Single character to token mappings.
            '|' => (Token::Pipe, i + 1),
            ',' => (Token::Comma, i + 1),
            ':' => (Token::Colon, i + 1),
            '(' => (Token::OpenParen, i + 1),
            ')' => (Token::CloseParen, i + 1),
            '[' => (Token::OpenBracket, i + 1),
            ']' => (Token::CloseBracket, i + 1),

            // Multi-character tokens with a distinct start character.
            '.' => match iter.next() {
                Some((_, '.')) => (Token::DotDot, i + 2),
                _ => (Token::Dot, i + 1),
            },
            '=' | '!' | '<' | '>' => self.lex_operator(iter, i, c),
            '#' => (Token::Hash, self.lex_until_end(i, end)),
            '"' | '\'' | '`' => self.lex_string(iter, i, c)?,
            '-' if matches!(iter.next(), Some((_, d)) if d.is_ascii_digit()) => {
                let iter = self.source[i + 1..].char_indices().map(|(d, c)| (i + 1 + d, c));
                self.lex_number(iter)
            }
            c if c.is_ascii_digit() => self.lex_number(iter),
            c if c.is_whitespace() => self.lex_whitespace(iter),
            c if is_ident_start(c) => self.lex_ident(iter),

            // Any other character.
            c => (Token::Other, i + c.len_utf8()),
        };

        // Finally, we need to update the cursor.
        self.cursor = j;

        Ok(Some(self.lexeme(tk, i..j, false)))
    }

    fn lex_comment(&mut self, begin: Span, i: usize) -> Result<Option<Lexeme>> {
        // We are between two comment tags {# ... #}, that means all we have
        // to do is find the corresponding end tag and skip everything in
        // between.
        //
        // x{#cccccc#}xxxxxx
        //    ^     ^ ^
        //    i     j k

        let rest = &self.source[i..];
        let Some(d) = rest.find("#}") else {
            return Err(self.err_unclosed(begin, Token::EndComment));
        };
        let k = i + d + 2;
        let (j, trim) = match rest[..d].strip_suffix('-') {
            Some(_) => (i + d - 1, true),
            None => (i + d, false),
        };
        self.cursor = k;
        self.inside -= 1;
        self.state = State::Template;
        Ok(Some(self.lexeme(Token::EndComment, j..k, trim)))
    }

    /// Reads the body of a `raw` or `comment` block verbatim up to and
    /// including its end tag.
    ///
    /// Must only be called directly after the end of the opening tag.
    pub fn raw_until(&mut self, name: &str, begin: Span) -> Result<RawBody> {
        debug_assert!(self.inside == 0 && self.next.is_none());
        let i = self.cursor;
        let mut from = i;
        while let Some((tk, j, k, left_trim)) = find_begin_tag(self.source, from) {
            from = k;
            if tk != Token::BeginBlock {
                continue;
            }
            let inner = self.source[k..].trim_start();
            let Some(rest) = inner.strip_prefix(name) else {
                continue;
            };
            if rest.starts_with(is_ident) {
                continue;
            }
            let m = self.source.len() - rest.trim_start().len();
            let Some((n, right_trim)) = end_tag_at(self.source, m, Token::EndBlock) else {
                continue;
            };
            self.cursor = n;
            let line = self.line_at(i);
            return Ok(RawBody {
                span: Span::from(i..j),
                line,
                left_trim,
                right_trim,
            });
        }
        Err(self.err_unclosed_block(name, begin))
    }

    fn lex_operator<I>(&mut self, mut iter: I, i: usize, c: char) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        match (c, iter.next().map(|(_, c)| c)) {
            ('=' | '!' | '<' | '>', Some('=')) | ('<', Some('>')) => (Token::Operator, i + 2),
            ('<' | '>', _) => (Token::Operator, i + 1),
            ('=', _) => (Token::Equals, i + 1),
            _ => (Token::Other, i + 1),
        }
    }

    fn lex_string<I>(&mut self, mut iter: I, i: usize, quote: char) -> Result<(Token, usize)>
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut escaped = false;
        loop {
            match iter.next() {
                None => {
                    return Err(self.err_undelimited_string(i..self.source.len()));
                }
                Some((j, c)) if c == quote && !escaped => {
                    return Ok((Token::String, j + c.len_utf8()));
                }
                Some((_, c)) => {
                    escaped = c == '\\' && !escaped;
                }
            }
        }
    }

    fn lex_number<I>(&mut self, iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(iter, |c| c.is_ascii_digit());
        // A fraction only follows if the dot is followed by a digit, so that
        // ranges like `1..5` lex as two numbers.
        let mut rest = self.source[j..].chars();
        match (rest.next(), rest.next()) {
            (Some('.'), Some(d)) if d.is_ascii_digit() => {
                let iter = self.source[j + 1..].char_indices().map(|(d, c)| (j + 1 + d, c));
                (Token::Number, self.lex_while(iter, |c| c.is_ascii_digit()))
            }
            _ => (Token::Number, j),
        }
    }

    fn lex_whitespace<I>(&mut self, iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        (Token::Whitespace, self.lex_while(iter, char::is_whitespace))
    }

    fn lex_ident<I>(&mut self, mut iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        // Identifiers may contain dashes as long as another identifier
        // character follows, and may end with a single question mark.
        loop {
            let mut peek = iter.clone();
            match peek.next() {
                Some((_, c)) if is_ident(c) => {
                    iter = peek;
                }
                Some((_, '-')) if matches!(peek.next(), Some((_, c)) if is_ident(c)) => {
                    iter.next();
                }
                Some((j, '?')) => return (Token::Ident, j + 1),
                Some((j, _)) => return (Token::Ident, j),
                None => return (Token::Ident, self.source.len()),
            }
        }
    }

    fn lex_until_end(&self, i: usize, end: Token) -> usize {
        let mut j = i;
        while j < self.source.len() {
            if end_tag_at(self.source, j, end).is_some() {
                return j;
            }
            j += self.source[j..].chars().next().map_or(1, char::len_utf8);
        }
        j
    }

    fn lex_while<I, P>(&mut self, mut iter: I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.source.len(),
            }
        }
    }

    fn lexeme(&mut self, token: Token, span: impl Into<Span>, trim: bool) -> Lexeme {
        let span = span.into();
        Lexeme {
            token,
            span,
            line: self.line_at(span.m),
            trim,
        }
    }

    fn err_unclosed(&self, begin: Span, end: Token) -> Error {
        let open = &self.source[begin];
        let msg = match end {
            Token::EndExpr => format!("Variable '{open}' was not properly terminated with '}}}}'"),
            Token::EndComment => format!("Comment '{open}' was not properly terminated with '#}}'"),
            _ => format!("Tag '{open}' was not properly terminated with '%}}'"),
        };
        Error::syntax(msg, &self.shared, begin)
    }

    fn err_unclosed_block(&self, name: &str, begin: Span) -> Error {
        Error::syntax(
            format!("'{name}' tag was never closed"),
            &self.shared,
            begin,
        )
    }

    fn err_undelimited_string(&self, span: impl Into<Span>) -> Error {
        Error::syntax("undelimited string", &self.shared, span)
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Raw => "raw template",
            Self::BeginExpr => "begin expression",
            Self::EndExpr => "end_of_string",
            Self::BeginBlock => "begin tag",
            Self::EndBlock => "end_of_string",
            Self::BeginComment => "begin comment",
            Self::EndComment => "end comment",
            Self::Hash => "comment",
            Self::Dot => "dot",
            Self::DotDot => "dotdot",
            Self::Pipe => "pipe",
            Self::Comma => "comma",
            Self::Colon => "colon",
            Self::Equals => "equals",
            Self::OpenParen => "open_round",
            Self::CloseParen => "close_round",
            Self::OpenBracket => "open_square",
            Self::CloseBracket => "close_square",
            Self::Operator => "comparison",
            Self::Whitespace => "whitespace",
            Self::Ident => "id",
            Self::Number => "number",
            Self::String => "string",
            Self::Other => "character",
        }
    }

    /// Returns the corresponding tag.
    fn pair(&self) -> Self {
        match self {
            Self::BeginExpr => Self::EndExpr,
            Self::EndExpr => Self::BeginExpr,
            Self::BeginBlock => Self::EndBlock,
            Self::EndBlock => Self::BeginBlock,
            Self::BeginComment => Self::EndComment,
            Self::EndComment => Self::BeginComment,
            _ => unreachable!(),
        }
    }
}

/// Finds the next begin tag at or after `i`.
///
/// Returns the token, the start and end of the tag and whether it carries a
/// trim marker. Variable tags may be opened with two to four braces.
fn find_begin_tag(source: &str, mut i: usize) -> Option<(Token, usize, usize, bool)> {
    let bytes = source.as_bytes();
    while let Some(d) = source[i..].find('{') {
        let j = i + d;
        let tk = match bytes.get(j + 1) {
            Some(b'{') => Token::BeginExpr,
            Some(b'%') => Token::BeginBlock,
            Some(b'#') => Token::BeginComment,
            _ => {
                i = j + 1;
                continue;
            }
        };
        let mut k = j + 2;
        if tk == Token::BeginExpr {
            while k < j + 4 && bytes.get(k) == Some(&b'{') {
                k += 1;
            }
        }
        let trim = match bytes.get(k) {
            Some(b'-') => true,
            Some(b'=') if tk != Token::BeginComment => true,
            _ => false,
        };
        if trim {
            k += 1;
        }
        return Some((tk, j, k, trim));
    }
    None
}

/// Whether a begin tag starts at `i`.
fn begin_tag_at(source: &str, i: usize) -> bool {
    let bytes = source.as_bytes();
    bytes.get(i) == Some(&b'{') && matches!(bytes.get(i + 1), Some(b'{' | b'%' | b'#'))
}

/// Checks whether the end tag `end` starts at `i`, returning where it ends
/// and whether it carries a trim marker.
fn end_tag_at(source: &str, i: usize, end: Token) -> Option<(usize, bool)> {
    let rest = &source[i..];
    let markers = rest.len() - rest.trim_start_matches(|c| c == '-' || c == '=').len();
    let after = &rest[markers..];
    let close = match end {
        Token::EndExpr => "}}",
        Token::EndBlock => "%}",
        _ => "#}",
    };
    if !after.starts_with(close) {
        return None;
    }
    let mut j = i + markers + 2;
    if end == Token::EndExpr {
        let extra = after[2..].len() - after[2..].trim_start_matches('}').len();
        j += extra.min(2);
    }
    Some((j, markers > 0))
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
