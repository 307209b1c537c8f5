//! Tags that set or step variables.

use crate::compile::lex::Token;
use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::render::{evaluate, render_body, render_variable, write_value, Context};
use crate::tags::Tag;
use crate::types::ast::{Body, Expr, Node, Output, TagNode, Variable};
use crate::{Error, ErrorKind, Result, Value};

////////////////////////////////////////////////////////////////////////////////
// assign
////////////////////////////////////////////////////////////////////////////////

struct Assign {
    name: String,
    var: Variable,
}

impl Tag for Assign {
    fn render(&self, ctx: &mut Context<'_>, _: &mut String) -> Result<()> {
        let value = render_variable(ctx, &self.var)?;
        ctx.assign(self.name.as_str(), value)
    }

    fn is_blank(&self) -> bool {
        true
    }
}

/// `{% assign name = expr | filter %}`
pub(crate) fn parse_assign(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let (name, var) = tag.markup().parse(|m| {
        let name = m.ident()?.to_owned();
        m.expect(Token::Equals)?;
        let var = m.variable()?;
        m.finish()?;
        Ok((name, var))
    })?;
    Ok(Parsed::Tag(Box::new(Assign { name, var })))
}

////////////////////////////////////////////////////////////////////////////////
// capture
////////////////////////////////////////////////////////////////////////////////

struct Capture {
    name: String,
    body: Body,
}

impl Tag for Capture {
    fn render(&self, ctx: &mut Context<'_>, _: &mut String) -> Result<()> {
        let old = ctx.limits.begin_capture();
        let mut captured = String::new();
        let result = render_body(ctx, &self.body, &mut captured);
        ctx.limits.end_capture(old);
        result?;
        // The captured text was already charged as it was written.
        ctx.set_outermost(self.name.as_str(), Value::String(captured));
        Ok(())
    }

    fn is_blank(&self) -> bool {
        true
    }
}

/// `{% capture name %}...{% endcapture %}`
pub(crate) fn parse_capture(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let name = tag.markup().parse(|m| {
        let name = m.name()?;
        m.finish()?;
        Ok(name)
    })?;
    Ok(Parsed::Block(Box::new(CaptureBuilder {
        name,
        nodes: Vec::new(),
        line: tag.line(),
    })))
}

struct CaptureBuilder {
    name: String,
    nodes: Vec<Node>,
    line: usize,
}

impl BlockBuilder for CaptureBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn finish(self: Box<Self>, _: &mut ParseState) -> Result<Option<Node>> {
        let CaptureBuilder { name, nodes, line } = *self;
        Ok(Some(Node::Tag(TagNode {
            name: "capture".to_owned(),
            line,
            tag: Box::new(Capture {
                name,
                body: Body::new(nodes),
            }),
        })))
    }
}

////////////////////////////////////////////////////////////////////////////////
// increment and decrement
////////////////////////////////////////////////////////////////////////////////

/// A counter that lives in the render data, separate from assigned
/// variables of the same name.
struct Counter {
    name: String,
    step: i64,
}

impl Tag for Counter {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let counter = ctx.counter(&self.name);
        let current = match counter {
            Value::Integer(i) => *i,
            _ => 0,
        };
        let next = current + self.step;
        *counter = Value::Integer(next);
        // `increment` outputs the value before stepping, `decrement` after.
        let shown = if self.step > 0 { current } else { next };
        write_value(out, &Value::Integer(shown));
        Ok(())
    }
}

fn parse_counter(tag: &mut TagParser<'_, '_>, step: i64) -> Result<Parsed> {
    let name = tag.markup().parse(|m| {
        let name = m.ident()?.to_owned();
        m.finish()?;
        Ok(name)
    })?;
    Ok(Parsed::Tag(Box::new(Counter { name, step })))
}

pub(crate) fn parse_increment(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    parse_counter(tag, 1)
}

pub(crate) fn parse_decrement(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    parse_counter(tag, -1)
}

////////////////////////////////////////////////////////////////////////////////
// cycle
////////////////////////////////////////////////////////////////////////////////

struct Cycle {
    group: Option<Expr>,
    /// The key used when there is no explicit group, the values' markup.
    key: String,
    values: Vec<Expr>,
}

impl Tag for Cycle {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let key = match &self.group {
            Some(group) => evaluate(ctx, group)?.to_string(),
            None => self.key.clone(),
        };
        let position = ctx.registers().cycles.get(&key).copied().unwrap_or(0) % self.values.len();
        let value = evaluate(ctx, &self.values[position])?;
        write_value(out, &value);
        ctx.registers_mut()
            .cycles
            .insert(key, (position + 1) % self.values.len());
        Ok(())
    }
}

/// `{% cycle "a", "b" %}` or `{% cycle group: "a", "b" %}`
pub(crate) fn parse_cycle(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let cycle = tag.markup().parse(|m| {
        let group = match m.peek_nth(1) {
            Some(lx) if lx.token == Token::Colon => {
                let group = m.expr()?;
                m.expect(Token::Colon)?;
                Some(group)
            }
            _ => None,
        };
        let mut values = Vec::new();
        let mut texts = Vec::new();
        if m.peek().is_some() {
            loop {
                let (value, text) = m.expr_with_text()?;
                values.push(value);
                texts.push(text);
                if m.consume(Token::Comma).is_none() {
                    break;
                }
            }
        }
        m.finish()?;
        let key = texts.join(", ");
        Ok(Cycle { group, key, values })
    })?;
    if cycle.values.is_empty() {
        return Err(Error::new(
            ErrorKind::Syntax,
            "Syntax Error in 'cycle' - Valid syntax: cycle [name :] var [, var2, var3 ...]",
        )
        .with_line(tag.line()));
    }
    Ok(Parsed::Tag(Box::new(cycle)))
}

////////////////////////////////////////////////////////////////////////////////
// echo
////////////////////////////////////////////////////////////////////////////////

/// `{% echo expr | filter %}` is the same as `{{ expr | filter }}`.
pub(crate) fn parse_echo(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let var = tag.markup().parse(|m| {
        let var = m.variable()?;
        m.finish()?;
        Ok(var)
    })?;
    Ok(Parsed::Node(Node::Output(Output {
        var,
        line: tag.line(),
    })))
}
