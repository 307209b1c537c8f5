//! The tag registry and the contract between the parser and tag factories.
//!
//! The parser knows nothing about individual tags. For every `{% name ... %}`
//! it looks `name` up in the [`Registry`] and lets the [`TagFactory`] parse
//! the markup. A factory either produces a finished node, opens a block
//! that collects the following nodes until `{% endname %}`, or only updates
//! the parse state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compile::markup::Markup;
use crate::tags::{self, Tag};
use crate::types::ast::{BlockDef, BlockSet, MacroDef, Node, Parent};
use crate::types::options::Options;
use crate::Result;

/// Builds a tag from its markup.
///
/// This trait is implemented for all functions and closures with the
/// signature `Fn(&mut TagParser<'_, '_>) -> Result<Parsed>`.
pub trait TagFactory: Send + Sync {
    fn parse(&self, tag: &mut TagParser<'_, '_>) -> Result<Parsed>;
}

impl<F> TagFactory for F
where
    F: Fn(&mut TagParser<'_, '_>) -> Result<Parsed> + Send + Sync,
{
    fn parse(&self, tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
        self(tag)
    }
}

/// What a [`TagFactory`] produced.
pub enum Parsed {
    /// A finished leaf tag.
    Tag(Box<dyn Tag>),
    /// A finished node.
    Node(Node),
    /// A block tag that owns the nodes up to its end tag.
    Block(Box<dyn BlockBuilder>),
    /// The source up to the end tag is read verbatim. It is emitted as text
    /// if `keep` is set and discarded otherwise.
    Verbatim { keep: bool },
    /// The tag only affected the parse state.
    Nothing,
}

/// Accumulates the children of an open block tag.
pub trait BlockBuilder: Send {
    /// The nodes of the branch currently being parsed.
    fn nodes_mut(&mut self) -> &mut Vec<Node>;

    /// Handles an intermediate tag like `else` or `when`.
    ///
    /// Returns `false` if the tag is not a branch of this block.
    fn branch(&mut self, tag: &mut TagParser<'_, '_>) -> Result<bool> {
        let _ = tag;
        Ok(false)
    }

    /// Called once the end tag has been reached.
    fn finish(self: Box<Self>, state: &mut ParseState) -> Result<Option<Node>>;
}

/// The input to a [`TagFactory`].
pub struct TagParser<'p, 'a> {
    pub(crate) name: &'a str,
    pub(crate) markup: Markup<'a>,
    pub(crate) line: usize,
    pub(crate) state: &'p mut ParseState,
}

impl<'p, 'a> TagParser<'p, 'a> {
    /// The tag name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The line the tag is on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The markup following the tag name.
    pub fn markup(&mut self) -> &mut Markup<'a> {
        &mut self.markup
    }

    pub fn state(&mut self) -> &mut ParseState {
        self.state
    }
}

/// Template wide state shared by all tags while parsing.
pub struct ParseState {
    pub(crate) options: Options,
    /// Named blocks, the last set receives new definitions. `embed` pushes
    /// its own set so the blocks it overrides stay local to it.
    blocks: Vec<BlockSet>,
    parent: Option<Parent>,
    macros: Vec<Arc<MacroDef>>,
    pub(crate) warnings: Vec<crate::Error>,
}

impl ParseState {
    pub(crate) fn new(options: Options) -> Self {
        Self {
            options,
            blocks: vec![BlockSet::new()],
            parent: None,
            macros: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Registers a named block, returns `false` if the name is taken.
    pub(crate) fn define_block(&mut self, def: Arc<BlockDef>) -> bool {
        let Some(set) = self.blocks.last_mut() else {
            return false;
        };
        if set.contains_key(&def.name) {
            return false;
        }
        set.insert(def.name.clone(), def);
        true
    }

    pub(crate) fn push_block_set(&mut self) {
        self.blocks.push(BlockSet::new());
    }

    pub(crate) fn pop_block_set(&mut self) -> BlockSet {
        if self.blocks.len() > 1 {
            self.blocks.pop().unwrap_or_default()
        } else {
            BlockSet::new()
        }
    }

    /// Sets the template's parent, returns `false` if it already has one.
    pub(crate) fn set_parent(&mut self, parent: Parent) -> bool {
        if self.parent.is_some() {
            return false;
        }
        self.parent = Some(parent);
        true
    }

    pub(crate) fn define_macro(&mut self, def: Arc<MacroDef>) {
        self.macros.push(def);
    }

    pub(crate) fn into_parts(mut self) -> (BlockSet, Option<Parent>, Vec<Arc<MacroDef>>) {
        let blocks = self.blocks.swap_remove(0);
        (blocks, self.parent, self.macros)
    }
}

/// Maps tag names to factories.
#[derive(Clone)]
pub struct Registry {
    tags: HashMap<String, Arc<dyn TagFactory>>,
}

impl Registry {
    /// A registry with only the built-in tags.
    pub(crate) fn builtins() -> Self {
        let mut registry = Self {
            tags: HashMap::new(),
        };
        tags::register_builtins(&mut registry);
        registry
    }

    /// Registers a factory, replacing any previous one with that name.
    pub(crate) fn insert<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: TagFactory + 'static,
    {
        self.tags.insert(name.into(), Arc::new(factory));
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Arc<dyn TagFactory>> {
        self.tags.get(name)
    }
}
