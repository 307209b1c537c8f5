//! The builtin tags.
//!
//! `if`, `unless`, `case` and `for` compile to dedicated AST nodes since the
//! renderer needs to see into them. Every other tag is a [`Tag`] object that
//! renders itself.

mod control;
mod include;
mod inherit;
mod iteration;
mod macros;
pub(crate) mod raw;
mod variables;

use crate::compile::registry::Registry;
use crate::render::Context;
use crate::Result;

/// A parsed tag that renders itself.
///
/// Custom tags implement this trait and are returned from a
/// [`TagFactory`][crate::TagFactory] as [`Parsed::Tag`][crate::Parsed::Tag].
pub trait Tag: Send + Sync {
    /// Renders the tag, appending to `out`.
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()>;

    /// Whether the tag never renders anything but whitespace.
    ///
    /// Errors raised by a blank tag are not written to the output.
    fn is_blank(&self) -> bool {
        false
    }
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.insert("if", control::parse_if);
    registry.insert("unless", control::parse_unless);
    registry.insert("case", control::parse_case);

    registry.insert("for", iteration::parse_for);
    registry.insert("break", iteration::parse_break);
    registry.insert("continue", iteration::parse_continue);

    registry.insert("assign", variables::parse_assign);
    registry.insert("capture", variables::parse_capture);
    registry.insert("increment", variables::parse_increment);
    registry.insert("decrement", variables::parse_decrement);
    registry.insert("cycle", variables::parse_cycle);
    registry.insert("echo", variables::parse_echo);

    registry.insert("block", inherit::parse_block);
    registry.insert("extends", inherit::parse_extends);
    registry.insert("layout", inherit::parse_layout);

    registry.insert("include", include::parse_include);
    registry.insert("render", include::parse_render);
    registry.insert("embed", include::parse_embed);

    registry.insert("macro", macros::parse_macro);
    registry.insert("call", macros::parse_call);

    registry.insert("raw", raw::parse_raw);
    registry.insert("comment", raw::parse_comment);
}
