use std::fmt::Write;
use std::mem;
use std::slice;
use std::sync::Arc;

use crate::render::condition;
use crate::render::context::{BlockCall, Context};
use crate::render::iter;
use crate::render::value::{evaluate, render_variable};
use crate::types::ast::{self, BlockDef, BlockMode, Body, Case, If, Node, Op, Parent};
use crate::{Result, Value};

/// Renders a template, following its `extends` or `layout` parent.
pub(crate) fn render_template(
    ctx: &mut Context<'_>,
    template: &Arc<ast::Template>,
    out: &mut String,
) -> Result<()> {
    ctx.with_template(template.clone(), |ctx| match &template.parent {
        None => render_body(ctx, &template.body, out),

        Some(Parent::Extends(expr)) => {
            let Some(name) = template_name(ctx, expr)? else {
                return render_body(ctx, &template.body, out);
            };
            let parent = ctx.load_template(&name)?;
            // Only the side effects of the child's own output are kept, its
            // blocks render in the parent.
            let mut discard = String::new();
            render_skipping_blocks(ctx, &template.body, &mut discard)?;
            ctx.block_layers.push(template.blocks.clone());
            let result = render_template(ctx, &parent, out);
            ctx.block_layers.pop();
            result
        }

        Some(Parent::Layout(expr)) => {
            let Some(name) = template_name(ctx, expr)? else {
                return render_body(ctx, &template.body, out);
            };
            let layout = ctx.load_template(&name)?;
            // Named blocks are overrides for the layout, not content.
            let mut content = String::new();
            render_skipping_blocks(ctx, &template.body, &mut content)?;
            ctx.block_layers.push(template.blocks.clone());
            let result = ctx.stack(|ctx| {
                ctx.set("content_for_layout", content.clone());
                ctx.set("content", content);
                render_template(ctx, &layout, out)
            });
            ctx.block_layers.pop();
            result
        }
    })
}

/// Renders a template, recording where the output of each top level node
/// ends.
pub(crate) fn render_fragments(
    ctx: &mut Context<'_>,
    template: &Arc<ast::Template>,
    out: &mut String,
) -> Result<Vec<usize>> {
    if template.parent.is_some() {
        render_template(ctx, template, out)?;
        return Ok(vec![out.len()]);
    }
    ctx.with_template(template.clone(), |ctx| {
        let mut ends = Vec::with_capacity(template.body.nodes.len());
        for node in &template.body.nodes {
            render_nodes(ctx, slice::from_ref(node), out)?;
            ends.push(out.len());
            if ctx.interrupted() {
                break;
            }
        }
        Ok(ends)
    })
}

/// Evaluates a template name, `nil` means there is no template.
pub(crate) fn template_name(ctx: &mut Context<'_>, expr: &ast::Expr) -> Result<Option<String>> {
    match evaluate(ctx, expr)? {
        Value::None => Ok(None),
        Value::String(name) => Ok(Some(name)),
        value => Ok(Some(value.to_string())),
    }
}

/// Renders the nodes of a block.
pub fn render_body(ctx: &mut Context<'_>, body: &Body, out: &mut String) -> Result<()> {
    render_nodes(ctx, &body.nodes, out)
}

/// Renders the body of a template that has a parent into a scratch buffer,
/// leaving out its `block`s at any depth since they render in the parent.
fn render_skipping_blocks(ctx: &mut Context<'_>, body: &Body, out: &mut String) -> Result<()> {
    let skip = mem::replace(&mut ctx.skip_blocks, true);
    let old = ctx.limits.begin_buffer();
    let result = render_nodes(ctx, &body.nodes, out);
    ctx.limits.end_capture(old);
    ctx.skip_blocks = skip;
    result
}

/// Renders nodes in order, stopping early on a `break` or `continue`.
///
/// Recoverable errors are written inline, or dropped if the node that
/// raised them only renders whitespace.
fn render_nodes(ctx: &mut Context<'_>, nodes: &[Node], out: &mut String) -> Result<()> {
    ctx.limits.increment_render_score(nodes.len())?;
    for node in nodes {
        if ctx.skip_blocks && matches!(node, Node::Block(_)) {
            continue;
        }
        if let Err(err) = render_node(ctx, node, out) {
            if err.is_fatal() {
                return Err(err);
            }
            let text = ctx.handle_error(err, node.line())?;
            if !node.is_blank() {
                out.push_str(&text);
            }
        }
        if ctx.interrupted() {
            break;
        }
        ctx.limits.increment_write_score(out)?;
    }
    Ok(())
}

fn render_node(ctx: &mut Context<'_>, node: &Node, out: &mut String) -> Result<()> {
    match node {
        Node::Text(text) => {
            out.push_str(text);
            Ok(())
        }
        Node::Output(output) => {
            let value = render_variable(ctx, &output.var)?;
            write_value(out, &value);
            Ok(())
        }
        Node::If(node) => render_if(ctx, node, out),
        Node::Case(node) => render_case(ctx, node, out),
        Node::For(node) => iter::render_for(ctx, node, out),
        Node::Block(def) => render_block(ctx, def, out),
        Node::Tag(node) => node.tag.render(ctx, out),
    }
}

/// Writes a value the way `{{ ... }}` does.
pub fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::None => {}
        Value::String(s) => out.push_str(s),
        // Writing to a string never fails.
        value => {
            let _ = write!(out, "{value}");
        }
    }
}

fn render_if(ctx: &mut Context<'_>, node: &If, out: &mut String) -> Result<()> {
    for branch in &node.branches {
        let matched = match &branch.condition {
            Some(cond) => condition::evaluate(ctx, cond)? != branch.negate,
            None => true,
        };
        if matched {
            return render_body(ctx, &branch.body, out);
        }
    }
    Ok(())
}

fn render_case(ctx: &mut Context<'_>, node: &Case, out: &mut String) -> Result<()> {
    for when in &node.branches {
        let matched = match &when.values {
            Some(values) => {
                let mut matched = false;
                for value in values {
                    if condition::compare(ctx, &node.left, Op::Eq, value)? {
                        matched = true;
                        break;
                    }
                }
                matched
            }
            None => true,
        };
        if matched {
            return render_body(ctx, &when.body, out);
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Named blocks
////////////////////////////////////////////////////////////////////////////////

/// Renders the most derived definition of a named block.
fn render_block(ctx: &mut Context<'_>, def: &Arc<BlockDef>, out: &mut String) -> Result<()> {
    let mut chain: Vec<Arc<BlockDef>> = Vec::new();
    for layer in &ctx.block_layers {
        if let Some(d) = layer.get(&def.name) {
            if !chain.iter().any(|c| Arc::ptr_eq(c, d)) {
                chain.push(d.clone());
            }
        }
    }
    if !chain.iter().any(|c| Arc::ptr_eq(c, def)) {
        chain.push(def.clone());
    }
    render_block_at(ctx, chain, 0, out)
}

fn render_block_at(
    ctx: &mut Context<'_>,
    chain: Vec<Arc<BlockDef>>,
    index: usize,
    out: &mut String,
) -> Result<()> {
    let Some(def) = chain.get(index).cloned() else {
        return Ok(());
    };
    let rendering = ctx
        .block_calls
        .iter()
        .any(|call| call.chain.get(call.index).map_or(false, |d| Arc::ptr_eq(d, &def)));
    if rendering {
        tracing::warn!(name = %def.name, "block is already rendering, skipping it");
        return Ok(());
    }
    let has_parent = index + 1 < chain.len();
    ctx.block_calls.push(BlockCall { chain, index });
    let result = match (def.mode, has_parent) {
        (BlockMode::Append, true) => {
            render_super(ctx, out).and_then(|()| render_body(ctx, &def.body, out))
        }
        (BlockMode::Prepend, true) => {
            render_body(ctx, &def.body, out).and_then(|()| render_super(ctx, out))
        }
        _ => render_body(ctx, &def.body, out),
    };
    ctx.block_calls.pop();
    result
}

/// Renders the next ancestor's definition of the block that is currently
/// rendering, used by `super()` and `parent()`.
pub(crate) fn render_super(ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
    let Some(call) = ctx.block_calls.last() else {
        return Ok(());
    };
    let chain = call.chain.clone();
    let index = call.index + 1;
    render_block_at(ctx, chain, index, out)
}
