//! `for`, `break` and `continue`.

use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::render::{Context, Interrupt};
use crate::tags::Tag;
use crate::types::ast::{Body, Expr, For, Key, Node, Offset};
use crate::Result;

/// The parts of `{% for var in collection ... %}`.
struct Header {
    var: String,
    collection: Expr,
    name: String,
    reversed: bool,
    offset: Option<Offset>,
    limit: Option<Expr>,
}

pub(crate) fn parse_for(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let header = tag.markup().parse(|m| {
        let var = m.ident()?.to_owned();
        if !m.consume_keyword("in") && !m.consume_keyword("of") {
            return Err(match m.peek() {
                Some(lx) => m.err_expected("'in'", lx),
                None => m.err("Expected 'in' but found end_of_string"),
            });
        }
        let (collection, text) = m.expr_with_text()?;
        let mut reversed = m.consume_keyword("reversed");
        let mut offset = None;
        let mut limit = None;
        for (key, expr) in m.attributes()? {
            match key.as_str() {
                "offset" if is_continue(&expr) => offset = Some(Offset::Continue),
                "offset" => offset = Some(Offset::Expr(expr)),
                "limit" => limit = Some(expr),
                _ => {}
            }
        }
        reversed |= m.consume_keyword("reversed");
        m.finish()?;
        Ok(Header {
            name: format!("{var}-{text}"),
            var,
            collection,
            reversed,
            offset,
            limit,
        })
    })?;
    Ok(Parsed::Block(Box::new(ForBuilder {
        header,
        body: Vec::new(),
        else_body: None,
        line: tag.line(),
    })))
}

/// `offset: continue` parses as a lookup of a variable named `continue`.
fn is_continue(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Lookup(lookup) if lookup.path.is_empty()
            && matches!(&lookup.root, Key::Name(name) if name == "continue")
    )
}

struct ForBuilder {
    header: Header,
    body: Vec<Node>,
    else_body: Option<Vec<Node>>,
    line: usize,
}

impl BlockBuilder for ForBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        match &mut self.else_body {
            Some(nodes) => nodes,
            None => &mut self.body,
        }
    }

    fn branch(&mut self, tag: &mut TagParser<'_, '_>) -> Result<bool> {
        if tag.name() != "else" || self.else_body.is_some() {
            return Ok(false);
        }
        tag.markup().parse(|m| m.finish())?;
        self.else_body = Some(Vec::new());
        Ok(true)
    }

    fn finish(self: Box<Self>, _: &mut ParseState) -> Result<Option<Node>> {
        let ForBuilder {
            header,
            body,
            else_body,
            line,
        } = *self;
        let mut body = Body::new(body);
        let mut else_body = else_body.map(Body::new);
        if body.blank && else_body.as_ref().map_or(true, |b| b.blank) {
            body.remove_blank_strings();
            if let Some(b) = &mut else_body {
                b.remove_blank_strings();
            }
        }
        Ok(Some(Node::For(For {
            var: header.var,
            collection: header.collection,
            name: header.name,
            reversed: header.reversed,
            offset: header.offset,
            limit: header.limit,
            body,
            else_body,
            line,
        })))
    }
}

////////////////////////////////////////////////////////////////////////////////
// break and continue
////////////////////////////////////////////////////////////////////////////////

struct LoopControl(Interrupt);

impl Tag for LoopControl {
    fn render(&self, ctx: &mut Context<'_>, _: &mut String) -> Result<()> {
        ctx.push_interrupt(self.0);
        Ok(())
    }
}

pub(crate) fn parse_break(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    tag.markup().parse(|m| m.finish())?;
    Ok(Parsed::Tag(Box::new(LoopControl(Interrupt::Break))))
}

pub(crate) fn parse_continue(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    tag.markup().parse(|m| m.finish())?;
    Ok(Parsed::Tag(Box::new(LoopControl(Interrupt::Continue))))
}
