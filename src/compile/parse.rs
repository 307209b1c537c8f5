use std::sync::Arc;

use crate::compile::lex::{Lexeme, Lexer, Token};
use crate::compile::markup::Markup;
use crate::compile::registry::{BlockBuilder, ParseState, Parsed, Registry, TagParser};
use crate::tags::raw::Verbatim;
use crate::types::ast::{self, Body, Node};
use crate::types::options::Options;
use crate::types::span::Span;
use crate::{Error, Result};

/// The maximum number of block tags that may be open at once.
pub(crate) const MAX_DEPTH: usize = 100;

/// A parser that constructs an AST from a token stream.
///
/// The parser is implemented as a simple hand written parser with no
/// recursion. It maintains a stack of open blocks, at the bottom of which is
/// the template root. Each tag is handed off to the factory registered for
/// its name.
pub struct Parser<'engine, 'source> {
    /// A lexer that tokenizes the template source.
    tokens: Lexer<'source>,

    /// The template source, shared with the AST and with errors.
    source: Arc<str>,

    /// The registered tags.
    registry: &'engine Registry,

    state: ParseState,

    /// The open blocks.
    stack: Vec<Frame>,

    /// Whether to left trim the next raw text.
    trim_next: bool,
}

/// An open block tag.
struct Frame {
    name: String,
    begin: Span,
    builder: Box<dyn BlockBuilder>,
}

/// The template root, collects the top level nodes.
struct Root {
    nodes: Vec<Node>,
}

impl BlockBuilder for Root {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    fn finish(self: Box<Self>, _: &mut ParseState) -> Result<Option<Node>> {
        Ok(None)
    }
}

impl<'engine, 'source> Parser<'engine, 'source> {
    /// Construct a new parser.
    pub fn new(
        registry: &'engine Registry,
        options: &Options,
        source: &'source str,
        shared: Arc<str>,
    ) -> Self {
        Self {
            tokens: Lexer::new(source, shared.clone()),
            source: shared,
            registry,
            state: ParseState::new(options.clone()),
            stack: vec![Frame {
                name: String::new(),
                begin: Span::default(),
                builder: Box::new(Root { nodes: Vec::new() }),
            }],
            trim_next: false,
        }
    }

    /// Parses a template.
    pub fn parse_template(mut self, name: Option<String>) -> Result<ast::Template> {
        while let Some(next) = self.tokens.next()? {
            match next.token {
                // Simply raw template, append it to the current block.
                Token::Raw => self.push_text(next.span),

                // The start of a comment, e.g. `{# ... #}`
                Token::BeginComment => {
                    self.trim_before(next.trim);
                    let end = self.expect(Token::EndComment)?;
                    self.trim_next = end.trim;
                }

                // The start of an expression, e.g. `{{ user.name }}`
                Token::BeginExpr => {
                    self.trim_before(next.trim);
                    let (mut markup, end) = self.collect(next, Token::EndExpr)?;
                    let full = &self.tokens.source[next.span.m..end.span.n];
                    let var = markup
                        .parse(|m| {
                            let var = m.variable()?;
                            m.finish()?;
                            Ok(var)
                        })
                        .map_err(|e| e.with_markup(full))?;
                    self.state.warnings.append(&mut markup.warnings);
                    self.push(Node::Output(ast::Output {
                        var,
                        line: next.line,
                    }));
                    self.trim_next = end.trim;
                }

                // The start of a tag, e.g. `{% if cond %}`
                Token::BeginBlock => self.parse_tag(next)?,

                tk => return Err(self.err_unexpected_token(tk, next.span)),
            }
        }

        if let Some(frame) = self.stack.get(1) {
            return Err(self.err_never_closed(&frame.name, frame.begin));
        }

        let mut root = self.stack.pop().map(|f| f.builder).ok_or_else(|| {
            Error::syntax("unexpected end of template", &self.source, Span::default())
        })?;
        let nodes = std::mem::take(root.nodes_mut());
        let warnings = std::mem::take(&mut self.state.warnings);
        let (blocks, parent, macros) = self.state.into_parts();

        Ok(ast::Template {
            name,
            source: self.source,
            body: Body::new(nodes),
            blocks: Arc::new(blocks),
            parent,
            macros,
            warnings,
        })
    }

    fn parse_tag(&mut self, begin: Lexeme) -> Result<()> {
        let name = match self.tokens.next()? {
            Some(lx) if lx.token == Token::Ident => lx,
            // An inline comment, e.g. `{% # note %}`
            Some(lx) if lx.token == Token::Hash => {
                self.trim_before(begin.trim);
                let end = self.expect(Token::EndBlock)?;
                self.trim_next = end.trim;
                return Ok(());
            }
            Some(lx) => return Err(self.err_expected_tag_name(lx)),
            None => return Err(self.err_never_closed("", begin.span)),
        };

        let name_str: &'source str = &self.tokens.source[name.span];
        let (markup, end) = self.collect(name, Token::EndBlock)?;
        let full = Span::from(begin.span.m..end.span.n);

        // Whitespace control applies to the block the tag appears in, which
        // for an end tag is the block it closes.
        self.trim_before(begin.trim);

        let mut tag = TagParser {
            name: name_str,
            markup,
            line: begin.line,
            state: &mut self.state,
        };

        if let Some(factory) = self.registry.get(name_str) {
            let factory = factory.clone();
            let parsed = factory
                .parse(&mut tag)
                .map_err(|e| e.with_markup(&self.tokens.source[full]))?;
            let mut warnings = std::mem::take(&mut tag.markup.warnings);
            self.state.warnings.append(&mut warnings);
            self.trim_next = end.trim;
            return self.apply(parsed, name_str, begin, end);
        }

        // An intermediate tag of the current block, e.g. `{% else %}`.
        let top = self.stack.len() - 1;
        if top > 0 {
            let handled = self.stack[top]
                .builder
                .branch(&mut tag)
                .map_err(|e| e.with_markup(&self.tokens.source[full]))?;
            if handled {
                let mut warnings = std::mem::take(&mut tag.markup.warnings);
                self.state.warnings.append(&mut warnings);
                self.trim_next = end.trim;
                return Ok(());
            }
        }

        // The end of the current block, e.g. `{% endif %}`.
        if let Some(block) = name_str.strip_prefix("end") {
            if top > 0 && self.stack[top].name == block {
                let frame = self.stack.pop().map(|f| f.builder);
                if let Some(builder) = frame {
                    if let Some(node) = builder.finish(&mut self.state)? {
                        self.push(node);
                    }
                }
                self.trim_next = end.trim;
                return Ok(());
            }
        }

        Err(self.err_unknown_tag(name_str, top, name.span))
    }

    /// Applies the result of a tag factory.
    fn apply(&mut self, parsed: Parsed, name: &str, begin: Lexeme, end: Lexeme) -> Result<()> {
        match parsed {
            Parsed::Tag(tag) => {
                self.push(Node::Tag(ast::TagNode {
                    name: name.to_owned(),
                    line: begin.line,
                    tag,
                }));
            }
            Parsed::Node(node) => self.push(node),
            Parsed::Block(builder) => {
                if self.stack.len() > MAX_DEPTH {
                    return Err(Error::nesting().with_line(begin.line));
                }
                self.stack.push(Frame {
                    name: name.to_owned(),
                    begin: begin.span,
                    builder,
                });
            }
            Parsed::Verbatim { keep } => {
                let raw = self.tokens.raw_until(&format!("end{name}"), begin.span)?;
                if keep {
                    let mut text = &self.source[raw.span];
                    if end.trim {
                        text = text.trim_start();
                    }
                    if raw.left_trim {
                        text = text.trim_end();
                    }
                    if !text.is_empty() {
                        let tag = Box::new(Verbatim::new(text));
                        self.push(Node::Tag(ast::TagNode {
                            name: name.to_owned(),
                            line: raw.line,
                            tag,
                        }));
                    }
                }
                self.trim_next = raw.right_trim;
            }
            Parsed::Nothing => {}
        }
        Ok(())
    }

    /// Collects the tokens up to the end tag `end` into a markup cursor.
    fn collect(&mut self, after: Lexeme, end: Token) -> Result<(Markup<'source>, Lexeme)> {
        let mut tokens = Vec::new();
        loop {
            match self.tokens.next()? {
                Some(lx) if lx.token == end => {
                    let span = Span::from(after.span.n..lx.span.m);
                    let mode = self.state.options.error_mode;
                    let markup =
                        Markup::new(self.tokens.source, self.source.clone(), tokens, span, mode);
                    return Ok((markup, lx));
                }
                Some(lx) => tokens.push(lx),
                None => return Err(self.err_never_closed("", after.span)),
            }
        }
    }

    fn push(&mut self, node: Node) {
        if let Some(frame) = self.stack.last_mut() {
            frame.builder.nodes_mut().push(node);
        }
    }

    fn push_text(&mut self, span: Span) {
        let mut text = &self.source[span];
        if std::mem::take(&mut self.trim_next) {
            text = text.trim_start();
        }
        if text.is_empty() {
            return;
        }
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let nodes = frame.builder.nodes_mut();
        match nodes.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => nodes.push(Node::Text(text.to_owned())),
        }
    }

    /// Strips trailing whitespace from the text before a tag with a left
    /// trim marker.
    fn trim_before(&mut self, trim: bool) {
        if !trim {
            return;
        }
        let bug_compatible = self.state.options.bug_compatible_whitespace_trimming;
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let nodes = frame.builder.nodes_mut();
        if let Some(Node::Text(prev)) = nodes.last_mut() {
            let first = prev.chars().next();
            prev.truncate(prev.trim_end().len());
            if prev.is_empty() {
                match first {
                    Some(c) if bug_compatible => prev.push(c),
                    _ => {
                        nodes.pop();
                    }
                }
            }
        }
    }

    fn expect(&mut self, exp: Token) -> Result<Lexeme> {
        match self.tokens.next()? {
            Some(lx) if lx.token == exp => Ok(lx),
            Some(lx) => Err(self.err_unexpected_token(lx.token, lx.span)),
            None => Err(Error::syntax(
                format!("Expected {} but found end of template", exp.human()),
                &self.source,
                self.source.len()..self.source.len(),
            )),
        }
    }

    fn err_unexpected_token(&self, tk: Token, span: Span) -> Error {
        Error::syntax(format!("Unexpected {}", tk.human()), &self.source, span)
    }

    fn err_expected_tag_name(&self, lx: Lexeme) -> Error {
        Error::syntax(
            format!("Expected tag name but found {}", lx.token.human()),
            &self.source,
            lx.span,
        )
    }

    fn err_never_closed(&self, name: &str, span: Span) -> Error {
        let msg = if name.is_empty() {
            format!("Tag '{}' was not properly terminated", &self.source[span])
        } else {
            format!("'{name}' tag was never closed")
        };
        Error::syntax(msg, &self.source, span)
    }

    fn err_unknown_tag(&self, name: &str, top: usize, span: Span) -> Error {
        let msg = if top == 0 {
            match name {
                "else" | "elsif" | "when" => format!("Unexpected outer '{name}' tag"),
                n if n.starts_with("end") => format!("Unexpected outer '{name}' tag"),
                _ => format!("Unknown tag '{name}'"),
            }
        } else {
            let block = &self.stack[top].name;
            match name {
                "else" | "elsif" | "when" => {
                    format!("{block} tag does not expect '{name}' tag")
                }
                n if n.starts_with("end") => format!(
                    "'{name}' is not a valid delimiter for {block} tags. use end{block}"
                ),
                _ => format!("Unknown tag '{name}'"),
            }
        };
        Error::syntax(msg, &self.source, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, options: &Options) -> Result<ast::Template> {
        let registry = Registry::builtins();
        let shared: Arc<str> = Arc::from(source);
        Parser::new(&registry, options, source, shared.clone()).parse_template(None)
    }

    fn texts(template: &ast::Template) -> Vec<&str> {
        template
            .body
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_merges_adjacent_text() {
        let t = parse("a{# x #}b{% comment %}c{% endcomment %}d", &Options::default()).unwrap();
        assert_eq!(texts(&t), ["abd"]);
    }

    #[test]
    fn parse_whitespace_control() {
        let t = parse("a  {%- if x -%}  b  {%- endif -%}  c", &Options::default()).unwrap();
        assert_eq!(texts(&t), ["a", "c"]);
        match &t.body.nodes[1] {
            Node::If(i) => match &i.branches[0].body.nodes[..] {
                [Node::Text(b)] => assert_eq!(b, "b"),
                _ => panic!("expected text"),
            },
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn parse_bug_compatible_trimming() {
        let options = Options::builder()
            .bug_compatible_whitespace_trimming(true)
            .build();
        let t = parse("a{% if x %}  {%- endif %}", &options).unwrap();
        match &t.body.nodes[1] {
            Node::If(i) => match &i.branches[0].body.nodes[..] {
                [Node::Text(b)] => assert_eq!(b, " "),
                _ => panic!("expected text"),
            },
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn parse_nesting_limit() {
        let nested = |n: usize| "{% if true %}".repeat(n) + &"{% endif %}".repeat(n);
        assert!(parse(&nested(100), &Options::default()).is_ok());
        let err = parse(&nested(101), &Options::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StackLevel);
        assert_eq!(err.message(), "Nesting too deep");
    }

    #[test]
    fn parse_err_unknown_tag() {
        let err = parse("{% foo %}", &Options::default()).unwrap_err();
        assert_eq!(err.to_string(), "Dry syntax error (line 1): Unknown tag 'foo'");
    }

    #[test]
    fn parse_err_never_closed() {
        let err = parse("\n{% if x %}", &Options::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dry syntax error (line 2): 'if' tag was never closed"
        );
    }

    #[test]
    fn parse_err_wrong_end_tag() {
        let err = parse("{% if x %}{% endfor %}", &Options::default()).unwrap_err();
        assert_eq!(
            err.message(),
            "'endfor' is not a valid delimiter for if tags. use endif"
        );
        let err = parse("{% endif %}", &Options::default()).unwrap_err();
        assert_eq!(err.message(), "Unexpected outer 'endif' tag");
    }

    #[test]
    fn parse_err_else_outside_if() {
        let err = parse("{% for x in y %}{% when 1 %}{% endfor %}", &Options::default())
            .unwrap_err();
        assert_eq!(err.message(), "for tag does not expect 'when' tag");
    }

    #[test]
    fn parse_err_includes_markup() {
        let options = Options::builder()
            .error_mode(crate::ErrorMode::Strict)
            .build();
        let err = parse("{{ a b }}", &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dry syntax error (line 1): Expected end_of_string but found id in \"{{ a b }}\""
        );
    }

    #[test]
    fn parse_warn_mode_records_warnings() {
        let options = Options::builder().error_mode(crate::ErrorMode::Warn).build();
        let t = parse("{{ a b }}{% if x y %}{% endif %}", &options).unwrap();
        assert_eq!(t.warnings.len(), 2);
    }

    #[test]
    fn parse_raw_keeps_markup() {
        let t = parse("{% raw %}{{ a }}{% if %}{% endraw %}", &Options::default()).unwrap();
        assert!(matches!(&t.body.nodes[..], [Node::Tag(tag)] if tag.name == "raw"));
    }

    #[test]
    fn parse_blank_if_drops_whitespace() {
        let t = parse("{% if x %}  {% assign a = 1 %}  {% endif %}", &Options::default()).unwrap();
        match &t.body.nodes[0] {
            Node::If(i) => assert_eq!(i.branches[0].body.nodes.len(), 1),
            _ => panic!("expected if"),
        }
    }
}
