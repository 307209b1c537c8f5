//! `if`, `unless` and `case`.

use crate::compile::lex::Token;
use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagParser};
use crate::types::ast::{Body, Branch, Case, Condition, Expr, If, Node, When};
use crate::{Error, ErrorKind, Result};

pub(crate) fn parse_if(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    open_if(tag, false)
}

pub(crate) fn parse_unless(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    open_if(tag, true)
}

fn open_if(tag: &mut TagParser<'_, '_>, negate: bool) -> Result<Parsed> {
    let condition = parse_condition(tag)?;
    Ok(Parsed::Block(Box::new(IfBuilder {
        branches: Vec::new(),
        current: (Some(condition), negate),
        nodes: Vec::new(),
        has_else: false,
        line: tag.line(),
    })))
}

fn parse_condition(tag: &mut TagParser<'_, '_>) -> Result<Condition> {
    tag.markup().parse(|m| {
        let cond = m.condition()?;
        m.finish()?;
        Ok(cond)
    })
}

struct IfBuilder {
    branches: Vec<Branch>,
    /// The condition of the branch being parsed.
    current: (Option<Condition>, bool),
    nodes: Vec<Node>,
    has_else: bool,
    line: usize,
}

impl IfBuilder {
    fn close_branch(&mut self, next: (Option<Condition>, bool)) {
        let (condition, negate) = std::mem::replace(&mut self.current, next);
        self.branches.push(Branch {
            condition,
            negate,
            body: Body::new(std::mem::take(&mut self.nodes)),
        });
    }
}

impl BlockBuilder for IfBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn branch(&mut self, tag: &mut TagParser<'_, '_>) -> Result<bool> {
        match tag.name() {
            "elsif" => {
                if self.has_else {
                    return Err(unexpected_after_else(tag));
                }
                // `unless` arms after the first are never negated.
                let condition = parse_condition(tag)?;
                self.close_branch((Some(condition), false));
                Ok(true)
            }
            "else" => {
                if self.has_else {
                    return Err(unexpected_after_else(tag));
                }
                tag.markup().parse(|m| m.finish())?;
                self.has_else = true;
                self.close_branch((None, false));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn finish(self: Box<Self>, _: &mut ParseState) -> Result<Option<Node>> {
        let mut this = *self;
        this.close_branch((None, false));
        let mut branches = this.branches;
        if branches.iter().all(|b| b.body.blank) {
            for branch in &mut branches {
                branch.body.remove_blank_strings();
            }
        }
        Ok(Some(Node::If(If {
            branches,
            line: this.line,
        })))
    }
}

fn unexpected_after_else(tag: &TagParser<'_, '_>) -> Error {
    Error::new(
        ErrorKind::Syntax,
        format!("Unexpected '{}' tag after 'else'", tag.name()),
    )
    .with_line(tag.line())
}

////////////////////////////////////////////////////////////////////////////////
// case
////////////////////////////////////////////////////////////////////////////////

pub(crate) fn parse_case(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    let left = tag.markup().parse(|m| {
        let left = m.expr()?;
        m.finish()?;
        Ok(left)
    })?;
    Ok(Parsed::Block(Box::new(CaseBuilder {
        left,
        branches: Vec::new(),
        current: None,
        nodes: Vec::new(),
        line: tag.line(),
    })))
}

struct CaseBuilder {
    left: Expr,
    branches: Vec<When>,
    /// `None` until the first `when`, then the values of the current arm,
    /// which are `None` again for the `else` arm.
    current: Option<Option<Vec<Expr>>>,
    nodes: Vec<Node>,
    line: usize,
}

impl CaseBuilder {
    fn close_branch(&mut self, next: Option<Vec<Expr>>) {
        let nodes = std::mem::take(&mut self.nodes);
        // Anything before the first `when` is ignored.
        if let Some(values) = self.current.replace(next) {
            self.branches.push(When {
                values,
                body: Body::new(nodes),
            });
        }
    }

    fn has_else(&self) -> bool {
        matches!(self.current, Some(None))
    }
}

impl BlockBuilder for CaseBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn branch(&mut self, tag: &mut TagParser<'_, '_>) -> Result<bool> {
        match tag.name() {
            "when" => {
                if self.has_else() {
                    return Err(unexpected_after_else(tag));
                }
                let values = tag.markup().parse(|m| {
                    let mut values = vec![m.expr()?];
                    while m.consume(Token::Comma).is_some()
                        || m.consume_keyword("or")
                    {
                        values.push(m.expr()?);
                    }
                    m.finish()?;
                    Ok(values)
                })?;
                self.close_branch(Some(values));
                Ok(true)
            }
            "else" => {
                if self.current.is_none() {
                    return Err(Error::new(
                        ErrorKind::Syntax,
                        "Unexpected 'else' tag before any 'when' tag",
                    )
                    .with_line(tag.line()));
                }
                if self.has_else() {
                    return Err(unexpected_after_else(tag));
                }
                tag.markup().parse(|m| m.finish())?;
                self.close_branch(None);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn finish(self: Box<Self>, _: &mut ParseState) -> Result<Option<Node>> {
        let mut this = *self;
        if this.current.is_none() {
            return Err(Error::new(
                ErrorKind::Syntax,
                "'case' tag requires at least one 'when' tag",
            )
            .with_line(this.line));
        }
        this.close_branch(None);
        let mut branches = this.branches;
        if branches.iter().all(|b| b.body.blank) {
            for branch in &mut branches {
                branch.body.remove_blank_strings();
            }
        }
        Ok(Some(Node::Case(Case {
            left: this.left,
            branches,
            line: this.line,
        })))
    }
}
