pub mod context;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

/// Abstraction for a template engine.
pub trait Engine {
    fn name() -> &'static str;
    fn new() -> Self;
    fn add_template(&mut self, name: &'static str, source: &str);
    fn render<S>(&self, name: &'static str, ctx: &S) -> String
    where
        S: serde::Serialize;
}

////////////////////////////////////////////////////////////////////////////////
/// dry
////////////////////////////////////////////////////////////////////////////////

pub type Dry = dry::Engine;

impl Engine for dry::Engine {
    #[inline]
    fn name() -> &'static str {
        "dry"
    }

    #[inline]
    fn new() -> Self {
        dry::Engine::new()
    }

    #[inline]
    fn add_template(&mut self, name: &'static str, source: &str) {
        self.add_template(name, source).unwrap();
    }

    #[inline]
    fn render<S>(&self, name: &'static str, ctx: &S) -> String
    where
        S: serde::Serialize,
    {
        self.get_template(name)
            .unwrap()
            .render_strict(ctx)
            .to_string()
            .unwrap()
    }
}

////////////////////////////////////////////////////////////////////////////////
/// liquid
////////////////////////////////////////////////////////////////////////////////

pub struct Liquid {
    parser: liquid::Parser,
    templates: HashMap<&'static str, liquid::Template>,
}

impl Engine for Liquid {
    #[inline]
    fn name() -> &'static str {
        "liquid"
    }

    #[inline]
    fn new() -> Self {
        Self {
            parser: liquid::ParserBuilder::with_stdlib().build().unwrap(),
            templates: HashMap::new(),
        }
    }

    #[inline]
    fn add_template(&mut self, name: &'static str, source: &str) {
        let template = self.parser.parse(source).unwrap();
        self.templates.insert(name, template);
    }

    #[inline]
    fn render<S>(&self, name: &'static str, ctx: &S) -> String
    where
        S: serde::Serialize,
    {
        let globals = liquid::to_object(ctx).unwrap();
        self.templates[name].render(&globals).unwrap()
    }
}
