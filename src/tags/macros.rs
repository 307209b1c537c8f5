//! `macro` and `call`.
//!
//! Macros are hoisted, a macro defined anywhere in a template can be called
//! from anywhere in it and from the templates it includes.

use std::sync::Arc;

use crate::compile::lex::Token;
use crate::compile::markup::Markup;
use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::render::{evaluate, render_body, Context};
use crate::tags::Tag;
use crate::types::ast::{Body, Expr, MacroDef, Node};
use crate::value::Map;
use crate::{Error, ErrorKind, Result, Value};

/// `{% macro name(a, b: "default") %}...{% endmacro %}`
pub(crate) fn parse_macro(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let (name, params) = tag.markup().parse(|m| {
        let name = m.ident()?.to_owned();
        let mut params = Vec::new();
        if m.consume(Token::OpenParen).is_some() {
            while m.consume(Token::CloseParen).is_none() {
                if m.consume(Token::Comma).is_some() {
                    continue;
                }
                let param = m.ident()?.to_owned();
                let default = if m.consume(Token::Colon).is_some()
                    || m.consume(Token::Equals).is_some()
                {
                    Some(m.expr()?)
                } else {
                    None
                };
                params.push((param, default));
            }
        }
        m.finish()?;
        Ok((name, params))
    })?;
    Ok(Parsed::Block(Box::new(MacroBuilder {
        name,
        params,
        nodes: Vec::new(),
    })))
}

struct MacroBuilder {
    name: String,
    params: Vec<(String, Option<Expr>)>,
    nodes: Vec<Node>,
}

impl BlockBuilder for MacroBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn finish(self: Box<Self>, state: &mut ParseState) -> Result<Option<Node>> {
        let MacroBuilder {
            name,
            params,
            nodes,
        } = *self;
        state.define_macro(Arc::new(MacroDef {
            name,
            params,
            body: Body::new(nodes),
        }));
        Ok(None)
    }
}

////////////////////////////////////////////////////////////////////////////////
// call
////////////////////////////////////////////////////////////////////////////////

struct Call {
    name: String,
    args: Vec<Expr>,
    kwargs: Vec<(String, Expr)>,
}

impl Tag for Call {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let Some(def) = ctx.registers().macros.get(&self.name).cloned() else {
            return Err(Error::new(
                ErrorKind::Argument,
                format!("undefined macro {}", self.name),
            ));
        };
        if self.args.len() > def.params.len() {
            return Err(Error::argument(format!(
                "wrong number of arguments (given {}, expected {})",
                self.args.len(),
                def.params.len()
            )));
        }

        let mut scope = Map::new();
        for ((param, _), arg) in def.params.iter().zip(&self.args) {
            scope.insert(param.clone(), evaluate(ctx, arg)?);
        }
        for (key, arg) in &self.kwargs {
            if def.params.iter().any(|(param, _)| param == key) {
                scope.insert(key.clone(), evaluate(ctx, arg)?);
            }
        }
        for (param, default) in &def.params {
            if scope.contains_key(param) {
                continue;
            }
            let value = match default {
                Some(expr) => evaluate(ctx, expr)?,
                None => Value::None,
            };
            scope.insert(param.clone(), value);
        }

        ctx.isolated(scope, |ctx| render_body(ctx, &def.body, out))
    }
}

/// `{% call name(1, b: 2) %}`
pub(crate) fn parse_call(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let call = tag.markup().parse(|m| {
        let name = m.ident()?.to_owned();
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if m.consume(Token::OpenParen).is_some() {
            while m.consume(Token::CloseParen).is_none() {
                if m.consume(Token::Comma).is_some() {
                    continue;
                }
                match keyword(m) {
                    Some(key) => kwargs.push((key, m.expr()?)),
                    None => args.push(m.expr()?),
                }
            }
        }
        m.finish()?;
        Ok(Call { name, args, kwargs })
    })?;
    Ok(Parsed::Tag(Box::new(call)))
}

/// Consumes `key:` or `key=` if it is next.
fn keyword(m: &mut Markup<'_>) -> Option<String> {
    let key = m.peek()?;
    let sep = m.peek_nth(1)?;
    if key.token != Token::Ident || !matches!(sep.token, Token::Colon | Token::Equals) {
        return None;
    }
    let key = m.text(key).to_owned();
    m.consume(Token::Ident);
    m.consume(sep.token);
    Some(key)
}
