//! `raw` and `comment`, whose bodies are not parsed.

use crate::compile::registry::{Parsed, TagParser};
use crate::render::Context;
use crate::tags::Tag;
use crate::Result;

/// Text that is output exactly as written.
pub(crate) struct Verbatim {
    text: String,
}

impl Verbatim {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
        }
    }
}

impl Tag for Verbatim {
    fn render(&self, _: &mut Context<'_>, out: &mut String) -> Result<()> {
        out.push_str(&self.text);
        Ok(())
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

pub(crate) fn parse_raw(tag: &mut TagParser<'_, '_>) -> Result<Parsed> {
    tag.markup().parse(|m| m.finish())?;
    Ok(Parsed::Verbatim { keep: true })
}

pub(crate) fn parse_comment(_: &mut TagParser<'_, '_>) -> Result<Parsed> {
    Ok(Parsed::Verbatim { keep: false })
}
