//! Rendering other templates: `include`, `render` and `embed`.

use std::sync::Arc;

use crate::compile::markup::Markup;
use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::render::{evaluate, forloop, render_template, template_name, Context};
use crate::tags::Tag;
use crate::types::ast::{BlockSet, Expr, Node, TagNode};
use crate::value::Map;
use crate::{Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Shares the caller's variables unless `only` is given.
    Include,
    /// Never sees the caller's variables.
    Render,
    /// Like `include` but with its own block overrides.
    Embed,
}

/// The markup shared by the partial tags.
///
/// ```text
/// "name" [with|for expr] [as alias] [only] [, key: value]*
/// ```
struct Partial {
    kind: Kind,
    name: Expr,
    variable: Option<Expr>,
    is_for: bool,
    alias: Option<String>,
    only: bool,
    attrs: Vec<(String, Expr)>,
}

impl Partial {
    fn parse(m: &mut Markup<'_>, kind: Kind) -> Result<Self> {
        let name = m.expr()?;
        let (variable, is_for) = if m.consume_keyword("with") {
            (Some(m.expr()?), false)
        } else if m.consume_keyword("for") {
            (Some(m.expr()?), true)
        } else {
            (None, false)
        };
        let alias = if m.consume_keyword("as") {
            Some(m.ident()?.to_owned())
        } else {
            None
        };
        let mut only = m.consume_keyword("only");
        let attrs = m.attributes()?;
        only |= m.consume_keyword("only");
        m.finish()?;
        Ok(Self {
            kind,
            name,
            variable,
            is_for,
            alias,
            only,
            attrs,
        })
    }

    fn render_with(
        &self,
        ctx: &mut Context<'_>,
        blocks: Option<&Arc<BlockSet>>,
        out: &mut String,
    ) -> Result<()> {
        let name = template_name(ctx, &self.name)?.unwrap_or_default();
        let template = ctx.load_template(&name)?;
        let alias = match &self.alias {
            Some(alias) => alias.clone(),
            None => name.rsplit('/').next().unwrap_or(&name).to_owned(),
        };

        let value = match &self.variable {
            Some(expr) => Some(evaluate(ctx, expr)?),
            // An `include` without `with` picks up a variable named after
            // the template.
            None if self.kind != Kind::Render => ctx.find_variable(&name).cloned(),
            None => None,
        };
        let mut attrs = Map::new();
        for (key, expr) in &self.attrs {
            attrs.insert(key.clone(), evaluate(ctx, expr)?);
        }

        let iterate = self.is_for || self.kind == Kind::Include;
        let items = match value {
            Some(Value::List(list)) if iterate => list.into_iter().map(Some).collect(),
            value => vec![value],
        };
        let len = items.len();
        let layers: Vec<Arc<BlockSet>> = blocks.cloned().into_iter().collect();

        for (index, item) in items.into_iter().enumerate() {
            let mut scope = attrs.clone();
            match item {
                Some(value) => {
                    scope.insert(alias.clone(), value);
                }
                None if self.kind != Kind::Render => {
                    scope.insert(alias.clone(), Value::None);
                }
                None => {}
            }
            if self.kind == Kind::Render && self.is_for {
                scope.insert("forloop".into(), forloop(&name, index, len, &Value::None));
            }

            let layers = layers.clone();
            let render = |ctx: &mut Context<'_>| {
                ctx.with_block_layers(layers, |ctx| render_template(ctx, &template, out))
            };
            if self.only || self.kind == Kind::Render {
                ctx.isolated(scope, render)?;
            } else {
                ctx.stack(|ctx| {
                    for (key, value) in scope {
                        ctx.set(key, value);
                    }
                    render(ctx)
                })?;
            }
        }
        Ok(())
    }
}

impl Tag for Partial {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        self.render_with(ctx, None, out)
    }
}

pub(crate) fn parse_include(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let partial = tag.markup().parse(|m| Partial::parse(m, Kind::Include))?;
    Ok(Parsed::Tag(Box::new(partial)))
}

pub(crate) fn parse_render(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let partial = tag.markup().parse(|m| Partial::parse(m, Kind::Render))?;
    Ok(Parsed::Tag(Box::new(partial)))
}

////////////////////////////////////////////////////////////////////////////////
// embed
////////////////////////////////////////////////////////////////////////////////

struct Embed {
    partial: Partial,
    blocks: Arc<BlockSet>,
}

impl Tag for Embed {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        self.partial.render_with(ctx, Some(&self.blocks), out)
    }
}

/// `{% embed "name" %}{% block x %}...{% endblock %}{% endembed %}`
///
/// Only the blocks in the body matter, they override the embedded
/// template's blocks for this one use.
pub(crate) fn parse_embed(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let partial = tag.markup().parse(|m| Partial::parse(m, Kind::Embed))?;
    tag.state().push_block_set();
    Ok(Parsed::Block(Box::new(EmbedBuilder {
        partial,
        nodes: Vec::new(),
        line: tag.line(),
    })))
}

struct EmbedBuilder {
    partial: Partial,
    nodes: Vec<Node>,
    line: usize,
}

impl BlockBuilder for EmbedBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn finish(self: Box<Self>, state: &mut ParseState) -> Result<Option<Node>> {
        let EmbedBuilder { partial, line, .. } = *self;
        let blocks = Arc::new(state.pop_block_set());
        Ok(Some(Node::Tag(TagNode {
            name: "embed".to_owned(),
            line,
            tag: Box::new(Embed { partial, blocks }),
        })))
    }
}
