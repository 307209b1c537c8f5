//! A cursor over the tokens of a single tag or expression.
//!
//! Every tag factory receives a [`Markup`] positioned after the tag name and
//! uses it to parse whatever arguments the tag takes. The cursor knows the
//! template's error mode: in strict mode malformed markup is an error, in lax
//! mode unrecognized tokens are skipped.

use std::sync::Arc;

use crate::compile::lex::{Lexeme, Token};
use crate::types::ast::{Condition, Expr, FilterCall, Key, Logic, Lookup, Op, Variable};
use crate::types::options::ErrorMode;
use crate::types::span::Span;
use crate::{Error, Result, Value};

pub struct Markup<'a> {
    source: &'a str,
    shared: Arc<str>,
    tokens: Vec<Lexeme>,
    pos: usize,
    /// The span of the markup, excluding the tag name and delimiters.
    span: Span,
    mode: ErrorMode,
    strict: bool,
    pub(crate) warnings: Vec<Error>,
}

impl<'a> Markup<'a> {
    pub(crate) fn new(
        source: &'a str,
        shared: Arc<str>,
        tokens: Vec<Lexeme>,
        span: Span,
        mode: ErrorMode,
    ) -> Self {
        Self {
            source,
            shared,
            tokens,
            pos: 0,
            span,
            mode,
            strict: mode == ErrorMode::Strict,
            warnings: Vec::new(),
        }
    }

    /// Returns the raw markup.
    pub fn as_str(&self) -> &'a str {
        self.source[self.span].trim()
    }

    /// Whether all tokens have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Whether malformed markup is currently an error.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Runs `f` according to the error mode.
    ///
    /// In warn mode `f` is first run strictly, if that fails the error is
    /// recorded as a warning and `f` is run again leniently from the same
    /// position.
    pub fn parse<T, F>(&mut self, f: F) -> Result<T>
    where
        F: Fn(&mut Self) -> Result<T>,
    {
        match self.mode {
            ErrorMode::Lax | ErrorMode::Strict => f(self),
            ErrorMode::Warn => {
                let pos = self.pos;
                self.strict = true;
                let result = f(self);
                self.strict = false;
                match result {
                    Ok(v) => Ok(v),
                    Err(err) if err.kind() == crate::ErrorKind::Syntax => {
                        tracing::warn!(error = %err, "falling back to lax parsing");
                        self.warnings.push(err);
                        self.pos = pos;
                        f(self)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Expressions
    ////////////////////////////////////////////////////////////////////////

    /// Parses an expression followed by an optional filter pipeline.
    ///
    /// ```text
    /// name | filter | filter: arg, key: arg
    /// ```
    pub fn variable(&mut self) -> Result<Variable> {
        let start = self.peek().map_or(self.span.n, |lx| lx.span.m);
        let expr = if self.is_empty() || self.is_next(Token::Pipe) {
            Expr::Literal(Value::None)
        } else {
            self.expr()?
        };
        let mut filters = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(lx) if lx.token == Token::Pipe => {
                    self.pos += 1;
                    filters.push(self.filter()?);
                }
                Some(lx) if self.stops_variable(lx) => break,
                Some(lx) => {
                    if self.strict {
                        return Err(self.err_expected("end_of_string", lx));
                    }
                    self.pos += 1;
                }
            }
        }
        let end = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map_or(start, |lx| lx.span.n)
            .max(start);
        Ok(Variable {
            expr,
            filters,
            markup: self.source[start..end].to_owned(),
        })
    }

    /// Tokens that end a variable inside a larger tag, e.g. the comma
    /// before attributes in `include "x" with a, b: 1`.
    fn stops_variable(&self, lx: Lexeme) -> bool {
        lx.token == Token::Comma || self.is_keyword(lx, &["with", "for", "as", "only"])
    }

    fn filter(&mut self) -> Result<FilterCall> {
        let name = self.expect(Token::Ident)?;
        let mut call = FilterCall {
            name: self.text(name).to_owned(),
            args: Vec::new(),
            kwargs: Vec::new(),
            span: name.span,
        };
        if self.consume(Token::Colon).is_none() {
            return Ok(call);
        }
        loop {
            if self.is_empty() || self.is_next(Token::Pipe) {
                break;
            }
            if self.is_next(Token::Comma) {
                self.pos += 1;
                continue;
            }
            if let Some(key) = self.keyword_arg() {
                let value = self.expr()?;
                call.kwargs.push((key, value));
            } else {
                call.args.push(self.expr()?);
            }
            match self.peek() {
                None => break,
                Some(lx) if lx.token == Token::Comma || lx.token == Token::Pipe => {}
                Some(lx) if self.strict => return Err(self.err_expected("end_of_string", lx)),
                Some(_) => break,
            }
        }
        call.span = call.span.combine(self.prev_span());
        Ok(call)
    }

    /// Consumes `key:` if it is next and returns the key.
    fn keyword_arg(&mut self) -> Option<String> {
        match (self.peek_nth(0), self.peek_nth(1)) {
            (Some(k), Some(c)) if k.token == Token::Ident && c.token == Token::Colon => {
                self.pos += 2;
                Some(self.text(k).to_owned())
            }
            _ => None,
        }
    }

    /// Parses a single expression, a literal, range or variable lookup.
    pub fn expr(&mut self) -> Result<Expr> {
        let lx = self.next_or_err("id")?;
        match lx.token {
            Token::String => Ok(Expr::Literal(Value::String(unescape(self.text(lx))))),
            Token::Number => self.number(lx).map(Expr::Literal),
            Token::OpenParen => {
                let start = self.expr()?;
                self.expect(Token::DotDot)?;
                let end = self.expr()?;
                self.expect(Token::CloseParen)?;
                Ok(Expr::Range(Box::new(start), Box::new(end)))
            }
            Token::OpenBracket => {
                let key = self.expr()?;
                self.expect(Token::CloseBracket)?;
                self.lookup(Key::Expr(Box::new(key)), lx.span)
            }
            Token::Ident => {
                let name = self.text(lx);
                let has_path = self.is_next(Token::Dot) || self.is_next(Token::OpenBracket);
                if !has_path {
                    match name {
                        "nil" | "null" => return Ok(Expr::Literal(Value::None)),
                        "true" => return Ok(Expr::Literal(Value::Bool(true))),
                        "false" => return Ok(Expr::Literal(Value::Bool(false))),
                        "empty" => return Ok(Expr::Empty),
                        "blank" => return Ok(Expr::Blank),
                        "super" | "parent" if self.is_next(Token::OpenParen) => {
                            self.pos += 1;
                            self.expect(Token::CloseParen)?;
                            return Ok(Expr::Super);
                        }
                        _ => {}
                    }
                }
                self.lookup(Key::Name(name.to_owned()), lx.span)
            }
            _ => Err(self.err_expected("id", lx)),
        }
    }

    /// Parses a single expression and also returns its source text.
    pub fn expr_with_text(&mut self) -> Result<(Expr, &'a str)> {
        let start = self.peek().map_or(self.span.n, |lx| lx.span.m);
        let expr = self.expr()?;
        let end = self.prev_span().n.max(start);
        Ok((expr, &self.source[start..end]))
    }

    fn lookup(&mut self, root: Key, span: Span) -> Result<Expr> {
        let mut path = Vec::new();
        loop {
            if self.consume(Token::Dot).is_some() {
                let name = self.expect(Token::Ident)?;
                path.push(Key::Name(self.text(name).to_owned()));
            } else if self.consume(Token::OpenBracket).is_some() {
                let key = self.expr()?;
                self.expect(Token::CloseBracket)?;
                path.push(Key::Expr(Box::new(key)));
            } else {
                break;
            }
        }
        Ok(Expr::Lookup(Lookup {
            root,
            path,
            span: span.combine(self.prev_span()),
        }))
    }

    fn number(&self, lx: Lexeme) -> Result<Value> {
        let text = self.text(lx);
        let value = if text.contains('.') {
            text.parse().map(Value::Float).ok()
        } else {
            text.parse().map(Value::Integer).ok()
        };
        value.ok_or_else(|| {
            Error::syntax(format!("Invalid number '{text}'"), &self.shared, lx.span)
        })
    }

    ////////////////////////////////////////////////////////////////////////
    // Conditions
    ////////////////////////////////////////////////////////////////////////

    /// Parses a chain of comparisons joined with `and` or `or`.
    ///
    /// ```text
    /// a == 1 and b contains "x" or c
    /// ```
    pub fn condition(&mut self) -> Result<Condition> {
        let mut first = self.comparison()?;
        let mut rest = Vec::new();
        loop {
            let logic = match self.peek() {
                None => break,
                Some(lx) if self.is_keyword(lx, &["and"]) => Logic::And,
                Some(lx) if self.is_keyword(lx, &["or"]) => Logic::Or,
                Some(lx) if self.strict => return Err(self.err_expected("end_of_string", lx)),
                Some(_) => {
                    self.pos += 1;
                    continue;
                }
            };
            self.pos += 1;
            rest.push((logic, self.comparison()?));
        }

        // Build the chain back to front so each link knows how it relates
        // to the next one.
        let mut tail = None;
        while let Some((logic, mut cond)) = rest.pop() {
            cond.child = tail;
            tail = Some((logic, Box::new(cond)));
        }
        first.child = tail;
        Ok(first)
    }

    fn comparison(&mut self) -> Result<Condition> {
        let left = self.expr()?;
        let op = match self.peek() {
            Some(lx) if lx.token == Token::Operator => {
                self.pos += 1;
                Some(match self.text(lx) {
                    "==" => Op::Eq,
                    "!=" | "<>" => Op::Ne,
                    "<" => Op::Lt,
                    ">" => Op::Gt,
                    "<=" => Op::Le,
                    _ => Op::Ge,
                })
            }
            Some(lx) if self.is_keyword(lx, &["contains"]) => {
                self.pos += 1;
                Some(Op::Contains)
            }
            Some(lx) if self.is_keyword(lx, &["is"]) => {
                self.pos += 1;
                Some(Op::Eq)
            }
            Some(lx) if self.is_keyword(lx, &["isnt"]) => {
                self.pos += 1;
                Some(Op::Ne)
            }
            _ => None,
        };
        let op = match op {
            Some(op) => Some((op, self.expr()?)),
            None => None,
        };
        Ok(Condition {
            left,
            op,
            child: None,
        })
    }

    ////////////////////////////////////////////////////////////////////////
    // Attributes
    ////////////////////////////////////////////////////////////////////////

    /// Parses `key: value` pairs separated by commas or whitespace.
    pub fn attributes(&mut self) -> Result<Vec<(String, Expr)>> {
        let mut attrs = Vec::new();
        loop {
            if self.consume(Token::Comma).is_some() {
                continue;
            }
            match self.keyword_arg() {
                Some(key) => attrs.push((key, self.expr()?)),
                None => break,
            }
        }
        Ok(attrs)
    }

    /// Checks that the markup was fully consumed.
    ///
    /// Leftover tokens are only an error in strict mode.
    pub fn finish(&mut self) -> Result<()> {
        match self.peek() {
            Some(lx) if self.strict => Err(self.err_expected("end_of_string", lx)),
            _ => {
                self.pos = self.tokens.len();
                Ok(())
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Utilities
    ////////////////////////////////////////////////////////////////////////

    pub fn peek(&self) -> Option<Lexeme> {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> Option<Lexeme> {
        self.tokens.get(self.pos + n).copied()
    }

    /// Returns the source text of the token.
    pub fn text(&self, lx: Lexeme) -> &'a str {
        &self.source[lx.span]
    }

    pub fn is_next(&self, tk: Token) -> bool {
        self.peek().map_or(false, |lx| lx.token == tk)
    }

    /// Whether the next token is the identifier `kw`.
    pub fn is_next_keyword(&self, kw: &str) -> bool {
        self.peek().map_or(false, |lx| self.is_keyword(lx, &[kw]))
    }

    fn is_keyword(&self, lx: Lexeme, kws: &[&str]) -> bool {
        lx.token == Token::Ident && kws.contains(&self.text(lx))
    }

    /// Consumes the identifier `kw` if it is next.
    pub fn consume_keyword(&mut self, kw: &str) -> bool {
        let found = self.is_next_keyword(kw);
        if found {
            self.pos += 1;
        }
        found
    }

    pub fn consume(&mut self, tk: Token) -> Option<Lexeme> {
        let lx = self.peek().filter(|lx| lx.token == tk)?;
        self.pos += 1;
        Some(lx)
    }

    pub fn expect(&mut self, tk: Token) -> Result<Lexeme> {
        let lx = self.next_or_err(tk.human())?;
        if lx.token != tk {
            return Err(self.err_expected(tk.human(), lx));
        }
        Ok(lx)
    }

    /// Expects an identifier and returns its text.
    pub fn ident(&mut self) -> Result<&'a str> {
        let lx = self.expect(Token::Ident)?;
        Ok(self.text(lx))
    }

    /// Expects a string literal or an identifier and returns its value.
    pub fn name(&mut self) -> Result<String> {
        let lx = self.next_or_err("id")?;
        match lx.token {
            Token::String => Ok(unescape(self.text(lx))),
            Token::Ident => Ok(self.text(lx).to_owned()),
            _ => Err(self.err_expected("id", lx)),
        }
    }

    fn next_or_err(&mut self, expected: &str) -> Result<Lexeme> {
        match self.peek() {
            Some(lx) => {
                self.pos += 1;
                Ok(lx)
            }
            None => Err(Error::syntax(
                format!("Expected {expected} but found end_of_string"),
                &self.shared,
                Span::from(self.span.n..self.span.n),
            )),
        }
    }

    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map_or(self.span, |lx| lx.span)
    }

    pub fn err_expected(&self, expected: &str, found: Lexeme) -> Error {
        Error::syntax(
            format!("Expected {expected} but found {}", found.token.human()),
            &self.shared,
            found.span,
        )
    }

    /// Returns a syntax error pointing at the whole markup.
    pub fn err(&self, msg: impl Into<String>) -> Error {
        Error::syntax(msg, &self.shared, self.span)
    }
}

/// Strips the quotes off a string literal and resolves backslash escapes.
fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    if !inner.contains('\\') {
        return inner.to_owned();
    }
    let mut s = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => s.push('\n'),
            Some('r') => s.push('\r'),
            Some('t') => s.push('\t'),
            Some(c) => s.push(c),
            None => s.push('\\'),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::lex::Lexer;

    fn markup(source: &str, mode: ErrorMode, f: impl FnOnce(&mut Markup<'_>)) {
        let shared: Arc<str> = Arc::from(source);
        let mut lexer = Lexer::new(source, shared.clone());
        let mut tokens = Vec::new();
        while let Some(lx) = lexer.next().unwrap() {
            if !matches!(lx.token, Token::BeginExpr | Token::EndExpr) {
                tokens.push(lx);
            }
        }
        let span = Span::from(2..source.len() - 2);
        let mut m = Markup::new(source, shared.clone(), tokens, span, mode);
        f(&mut m)
    }

    #[test]
    fn markup_variable_with_filters() {
        markup("{{ a.b[0] | append: 'x', 'y' | slice: 1, size: 2 }}", ErrorMode::Strict, |m| {
            let var = m.variable().unwrap();
            assert!(m.is_empty());
            assert!(matches!(&var.expr, Expr::Lookup(l) if l.path.len() == 2));
            assert_eq!(var.filters.len(), 2);
            assert_eq!(var.filters[0].name, "append");
            assert_eq!(var.filters[0].args.len(), 2);
            assert_eq!(var.filters[1].kwargs.len(), 1);
            assert_eq!(var.filters[1].kwargs[0].0, "size");
            assert_eq!(var.markup, "a.b[0] | append: 'x', 'y' | slice: 1, size: 2");
        });
    }

    #[test]
    fn markup_literals() {
        markup("{{ nil }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Literal(Value::None)));
        });
        markup("{{ empty }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Empty));
        });
        markup("{{ 'a\\'b' }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Literal(Value::String(s)) if s == "a'b"));
        });
        markup("{{ -2.5 }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Literal(Value::Float(f)) if f == -2.5));
        });
        markup("{{ super() }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Super));
        });
        markup("{{ (1..n) }}", ErrorMode::Strict, |m| {
            assert!(matches!(m.expr().unwrap(), Expr::Range(..)));
        });
    }

    #[test]
    fn markup_condition_chain() {
        markup("{{ a == 1 or b contains 'x' and c }}", ErrorMode::Strict, |m| {
            let cond = m.condition().unwrap();
            assert!(matches!(cond.op, Some((Op::Eq, _))));
            let (logic, next) = cond.child.as_ref().unwrap();
            assert_eq!(*logic, Logic::Or);
            assert!(matches!(next.op, Some((Op::Contains, _))));
            let (logic, last) = next.child.as_ref().unwrap();
            assert_eq!(*logic, Logic::And);
            assert!(last.op.is_none());
        });
    }

    #[test]
    fn markup_strict_rejects_trailing_tokens() {
        markup("{{ a b }}", ErrorMode::Strict, |m| {
            let err = m.variable().unwrap_err();
            assert_eq!(err.message(), "Expected end_of_string but found id");
        });
    }

    #[test]
    fn markup_lax_skips_trailing_tokens() {
        markup("{{ a b | upcase }}", ErrorMode::Lax, |m| {
            let var = m.variable().unwrap();
            assert_eq!(var.filters.len(), 1);
        });
    }

    #[test]
    fn markup_warn_falls_back() {
        markup("{{ a ! }}", ErrorMode::Warn, |m| {
            let var = m
                .parse(|m| {
                    let v = m.variable()?;
                    m.finish()?;
                    Ok(v)
                })
                .unwrap();
            assert!(var.filters.is_empty());
            assert_eq!(m.warnings.len(), 1);
        });
    }

    #[test]
    fn markup_attributes() {
        markup("{{ a: 1, b: 'x' c: d.e }}", ErrorMode::Strict, |m| {
            let attrs = m.attributes().unwrap();
            let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, ["a", "b", "c"]);
        });
    }
}
