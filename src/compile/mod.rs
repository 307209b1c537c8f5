//! Compile the template source into an AST that can be rendered.
//!
//! This process has two stages:
//! - The lexer chunks the template source into tokens.
//! - The parser constructs an AST from the token stream, handing each tag
//!   off to the factory registered for it.

pub mod lex;
pub mod markup;
pub mod parse;
pub mod registry;

use std::sync::Arc;

use crate::compile::lex::{Lexer, Token};
use crate::compile::markup::Markup;
use crate::compile::registry::Registry;
use crate::types::ast;
use crate::types::options::{ErrorMode, Options};
use crate::types::span::Span;
use crate::Result;

/// Compile a template into an AST.
pub(crate) fn template(
    registry: &Registry,
    options: &Options,
    name: Option<String>,
    source: &str,
) -> Result<ast::Template> {
    let shared: Arc<str> = Arc::from(source);
    let result = parse::Parser::new(registry, options, source, shared).parse_template(name.clone());
    tracing::debug!(
        name = name.as_deref().unwrap_or("<anonymous>"),
        ok = result.is_ok(),
        "parsed template"
    );
    result.map_err(|err| {
        let err = match name {
            Some(name) => err.with_template_name(name),
            None => err,
        };
        if options.line_numbers {
            err
        } else {
            err.without_line()
        }
    })
}

/// Compile a lone expression, e.g. `product.variants[0].title`.
pub(crate) fn expression(markup: &str) -> Result<ast::Expr> {
    let source = format!("{{{{ {markup} }}}}");
    let shared: Arc<str> = Arc::from(source.as_str());
    let mut lexer = Lexer::new(&source, shared.clone());
    let mut tokens = Vec::new();
    while let Some(lx) = lexer.next()? {
        if !matches!(lx.token, Token::BeginExpr | Token::EndExpr) {
            tokens.push(lx);
        }
    }
    let span = Span::from(2..source.len() - 2);
    let mut markup = Markup::new(&source, shared, tokens, span, ErrorMode::Strict);
    let expr = markup.expr()?;
    markup.finish()?;
    Ok(expr)
}
