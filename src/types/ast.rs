//! AST representing a parsed template.
//!
//! The tree is immutable once built. Blocks own their children in plain
//! vectors; named blocks and macros are additionally shared through `Arc` so
//! that a template's block table can refer to the same definition as the
//! node in its body.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::tags::Tag;
use crate::types::span::Span;
use crate::{Error, Value};

#[derive(Debug)]
pub struct Template {
    pub name: Option<String>,
    pub source: Arc<str>,
    pub body: Body,
    /// Every named block defined in this template, at any depth.
    pub blocks: Arc<BlockSet>,
    pub parent: Option<Parent>,
    pub macros: Vec<Arc<MacroDef>>,
    pub warnings: Vec<Error>,
}

pub type BlockSet = BTreeMap<String, Arc<BlockDef>>;

/// The template this template inherits from.
#[derive(Debug)]
pub enum Parent {
    /// `{% extends "name" %}`, the child's own output is discarded.
    Extends(Expr),
    /// `{% layout "name" %}`, the child's output is passed to the layout.
    Layout(Expr),
}

/// An ordered list of nodes.
#[derive(Debug, Default)]
pub struct Body {
    pub nodes: Vec<Node>,
    /// Whether every node in the body renders only whitespace.
    pub blank: bool,
}

#[derive(Debug)]
pub enum Node {
    Text(String),
    Output(Output),
    If(If),
    Case(Case),
    For(For),
    Block(Arc<BlockDef>),
    Tag(TagNode),
}

/// A `{{ ... }}` expression.
#[derive(Debug)]
pub struct Output {
    pub var: Variable,
    pub line: usize,
}

/// Any other tag, built by a factory in the tag registry.
pub struct TagNode {
    pub name: String,
    pub line: usize,
    pub tag: Box<dyn Tag>,
}

/// An expression followed by a filter pipeline, e.g. `name | upcase`.
#[derive(Debug)]
pub struct Variable {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
    pub markup: String,
}

#[derive(Debug)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    /// The special `empty` literal.
    Empty,
    /// The special `blank` literal.
    Blank,
    /// A range literal, e.g. `(1..5)`.
    Range(Box<Expr>, Box<Expr>),
    Lookup(Lookup),
    /// `super()` or `parent()` within a named block.
    Super,
}

/// A variable path, e.g. `product.variants[0].title`.
#[derive(Debug)]
pub struct Lookup {
    pub root: Key,
    pub path: Vec<Key>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Key {
    Name(String),
    Expr(Box<Expr>),
}

#[derive(Debug)]
pub struct Condition {
    pub left: Expr,
    pub op: Option<(Op, Expr)>,
    pub child: Option<(Logic, Box<Condition>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug)]
pub struct If {
    pub branches: Vec<Branch>,
    pub line: usize,
}

/// One arm of an `if` or `unless`.
#[derive(Debug)]
pub struct Branch {
    /// `None` for the `else` arm.
    pub condition: Option<Condition>,
    pub negate: bool,
    pub body: Body,
}

#[derive(Debug)]
pub struct Case {
    pub left: Expr,
    pub branches: Vec<When>,
    pub line: usize,
}

/// One arm of a `case`.
#[derive(Debug)]
pub struct When {
    /// `None` for the `else` arm.
    pub values: Option<Vec<Expr>>,
    pub body: Body,
}

#[derive(Debug)]
pub struct For {
    pub var: String,
    pub collection: Expr,
    /// Identifies the loop for `offset: continue`, e.g. `item-products`.
    pub name: String,
    pub reversed: bool,
    pub offset: Option<Offset>,
    pub limit: Option<Expr>,
    pub body: Body,
    pub else_body: Option<Body>,
    pub line: usize,
}

#[derive(Debug)]
pub enum Offset {
    Continue,
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

#[derive(Debug)]
pub struct BlockDef {
    pub name: String,
    pub mode: BlockMode,
    pub body: Body,
    pub line: usize,
}

#[derive(Debug)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<(String, Option<Expr>)>,
    pub body: Body,
}

impl std::fmt::Debug for TagNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagNode")
            .field("name", &self.name)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl Body {
    pub fn new(nodes: Vec<Node>) -> Self {
        let blank = nodes.iter().all(Node::is_blank);
        Self { nodes, blank }
    }

    /// Drops whitespace only text, used by control flow tags whose bodies
    /// are all blank so they don't render stray indentation.
    pub fn remove_blank_strings(&mut self) {
        self.nodes
            .retain(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()));
    }
}

impl Node {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Output(_) | Self::Block(_) => false,
            Self::If(i) => i.branches.iter().all(|b| b.body.blank),
            Self::Case(c) => c.branches.iter().all(|b| b.body.blank),
            Self::For(f) => f.body.blank && f.else_body.as_ref().map_or(true, |b| b.blank),
            Self::Tag(t) => t.tag.is_blank(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Text(_) => None,
            Self::Output(o) => Some(o.line),
            Self::If(i) => Some(i.line),
            Self::Case(c) => Some(c.line),
            Self::For(f) => Some(f.line),
            Self::Block(b) => Some(b.line),
            Self::Tag(t) => Some(t.line),
        }
    }
}
