//! Template inheritance: `block`, `extends` and `layout`.

use std::sync::Arc;

use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::types::ast::{BlockDef, BlockMode, Body, Expr, Node, Parent};
use crate::{Error, ErrorKind, Result, Value};

/// `{% block name [replace|append|prepend] %}...{% endblock %}`
pub(crate) fn parse_block(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let (name, mode) = tag.markup().parse(|m| {
        let name = m.name()?;
        let mode = if m.consume_keyword("append") {
            BlockMode::Append
        } else if m.consume_keyword("prepend") {
            BlockMode::Prepend
        } else {
            m.consume_keyword("replace");
            BlockMode::Replace
        };
        m.finish()?;
        Ok((name, mode))
    })?;
    Ok(Parsed::Block(Box::new(NamedBlock {
        name,
        mode,
        nodes: Vec::new(),
        line: tag.line(),
    })))
}

struct NamedBlock {
    name: String,
    mode: BlockMode,
    nodes: Vec<Node>,
    line: usize,
}

impl BlockBuilder for NamedBlock {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn finish(self: Box<Self>, state: &mut ParseState) -> Result<Option<Node>> {
        let NamedBlock {
            name,
            mode,
            nodes,
            line,
        } = *self;
        let def = Arc::new(BlockDef {
            name,
            mode,
            body: Body::new(nodes),
            line,
        });
        if !state.define_block(def.clone()) {
            return Err(Error::new(
                ErrorKind::Syntax,
                format!("Block '{}' is already defined", def.name),
            )
            .with_line(line));
        }
        Ok(Some(Node::Block(def)))
    }
}

////////////////////////////////////////////////////////////////////////////////
// extends and layout
////////////////////////////////////////////////////////////////////////////////

/// `{% extends "name" %}`
pub(crate) fn parse_extends(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let expr = tag.markup().parse(|m| {
        let expr = m.expr()?;
        m.finish()?;
        Ok(expr)
    })?;
    set_parent(tag, Parent::Extends(expr))
}

/// `{% layout "name" %}`, or `{% layout none %}` to opt out of a layout.
pub(crate) fn parse_layout(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let expr = tag.markup().parse(|m| {
        let expr = if m.consume_keyword("none") {
            Expr::Literal(Value::None)
        } else {
            m.expr()?
        };
        m.finish()?;
        Ok(expr)
    })?;
    set_parent(tag, Parent::Layout(expr))
}

fn set_parent(tag: &mut TagParser<'_, '_>, parent: Parent) -> Result<Parsed> {
    let line = tag.line();
    if !tag.state().set_parent(parent) {
        return Err(Error::new(
            ErrorKind::Syntax,
            "A template can only extend or use a layout once",
        )
        .with_line(line));
    }
    Ok(Parsed::Nothing)
}
