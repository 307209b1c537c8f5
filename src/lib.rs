//! A Liquid flavoured template engine with template inheritance.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Expressions: `{{ user.name }}`, `{{ products[0].title | upcase }}`
//! - Conditionals: `{% if user.admin %} ... {% elsif user.staff %} ... {% endif %}`
//! - Loops with pagination: `{% for p in products limit:10 offset:continue %}`
//! - Variables: `{% assign %}`, `{% capture %}`, `{% increment %}`, `{% cycle %}`
//! - Composition: `{% include %}`, `{% render %}`, `{% embed %}`, `{% macro %}`
//! - Inheritance: `{% extends %}` and `{% layout %}` with `{% block %}`
//!   overrides that can `replace`, `append` or `prepend` and call `super()`
//! - Whitespace control: `{%- if x -%}` and `{{- name -}}`
//!
//! ### Engine
//!
//! - Lax, warn and strict parsing modes
//! - Resource limits on output length, rendered nodes and assigned data
//! - Recoverable render errors are written inline instead of failing
//! - Custom tags and filters
//! - Render using any [`serde`] serializable values
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the options,
//! filters, tags and named templates. Generally, you only need to construct
//! one engine during the lifetime of a program.
//!
//! ```
//! let engine = dry::Engine::new();
//! ```
//!
//! A template is parsed with [`.parse`][Engine::parse] and rendered with
//! [`.render`][Template::render], which returns a [`Renderer`] that is
//! finished with one of its terminal methods.
//!
//! ```
//! # let engine = dry::Engine::new();
//! let template = engine.parse("Hello {{ user.name | upcase }}!")?;
//! let data = serde_json::json!({ "user": { "name": "John Smith" } });
//! let result = template.render(&data).to_string()?;
//! assert_eq!(result, "Hello JOHN SMITH!");
//! # Ok::<(), dry::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Template inheritance
//!
//! Templates added to the engine with [`.add_template`][Engine::add_template]
//! can be extended, included and embedded by name.
//!
//! ```
//! let mut engine = dry::Engine::new();
//! engine.add_template("base", "<h1>{% block title %}Home{% endblock %}</h1>")?;
//!
//! let template = engine.parse(r#"{% extends "base" %}{% block title append %} | About{% endblock %}"#)?;
//! let result = template.render_from(&dry::Value::None).to_string()?;
//! assert_eq!(result, "<h1>Home | About</h1>");
//! # Ok::<(), dry::Error>(())
//! ```
//!
//! Templates can also be read on demand through a [`TemplateLoader`], for
//! example a [`FileSystemLoader`].
//!
//! ### Render errors
//!
//! By default most render errors are written into the output and rendering
//! continues. Use [`.render_strict`][Template::render_strict] to fail
//! instead.
//!
//! ```
//! let engine = dry::Engine::new();
//! let template = engine.parse("{{ 1 | plus: x }}, {% if 1 > 'a' %}x{% endif %}!")?;
//! let data = serde_json::json!({ "x": 2 });
//!
//! let result = template.render(&data).to_string()?;
//! assert_eq!(result, "3, Dry error (line 1): comparison of Integer with String failed!");
//!
//! let err = template.render_strict(&data).to_string().unwrap_err();
//! assert_eq!(err.kind(), dry::ErrorKind::Argument);
//! # Ok::<(), dry::Error>(())
//! ```
//!
//! ### Resource limits
//!
//! ```
//! use dry::{Engine, Options};
//!
//! let engine = Engine::with_options(Options::builder().render_length_limit(10).build());
//! let template = engine.parse("{% for i in (1..100) %}{{ i }}{% endfor %}")?;
//! let result = template.render_from(&dry::Value::None).to_string()?;
//! assert_eq!(result, "Dry error: Memory limits exceeded");
//! # Ok::<(), dry::Error>(())
//! ```
//!
//! ### Add a custom filter
//!
//! ```
//! let mut engine = dry::Engine::new();
//! engine.add_filter("double", |n: i64| n * 2);
//!
//! let result = engine
//!     .parse("{{ n | double }}")?
//!     .render(serde_json::json!({ "n": 21 }))
//!     .to_string()?;
//! assert_eq!(result, "42");
//! # Ok::<(), dry::Error>(())
//! ```
//!
//! See the [`Filter`] trait documentation for more information on filters
//! and the [`TagFactory`] trait for custom tags.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod compile;
mod error;
#[cfg(feature = "filters")]
mod filters;
mod loader;
mod render;
mod tags;
mod types;
mod value;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use crate::compile::lex::{Lexeme, Token};
pub use crate::compile::markup::Markup;
pub use crate::compile::registry::{BlockBuilder, ParseState, Parsed, TagFactory, TagParser};
pub use crate::error::{Error, ErrorKind};
#[cfg(feature = "builtins")]
pub use crate::filters::builtins;
#[cfg(feature = "filters")]
pub use crate::filters::{Filter, FilterArg, FilterArgs, FilterReturn};
pub use crate::loader::{FileSystemLoader, InMemoryLoader, TemplateLoader};
pub use crate::render::{
    render_body, write_value, Context, GlobalFn, Interrupt, Registers, Renderer, ResourceLimits,
};
pub use crate::tags::Tag;
pub use crate::types::ast;
pub use crate::types::options::{ErrorMode, Options, OptionsBuilder};
pub use crate::types::span::Span;
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{List, Map, Value};

use crate::compile::registry::Registry;
#[cfg(feature = "filters")]
use crate::filters::FilterFn;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The default limit on nested templates.
const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// The parsing and rendering engine.
pub struct Engine {
    pub(crate) registry: Registry,
    pub(crate) options: Options,
    #[cfg(feature = "filters")]
    pub(crate) filters: BTreeMap<String, Box<FilterFn>>,
    pub(crate) loader: Option<Box<dyn TemplateLoader>>,
    pub(crate) templates: BTreeMap<String, Arc<ast::Template>>,
    pub(crate) max_include_depth: usize,
}

/// A parsed template.
///
/// Created by [`Engine::parse`], [`Engine::parse_named`] and
/// [`Engine::get_template`].
pub struct Template<'engine> {
    pub(crate) engine: &'engine Engine,
    pub(crate) template: Arc<ast::Template>,
    /// Set while the template is rendering.
    pub(crate) busy: AtomicBool,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine with the default options.
    #[inline]
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Construct a new engine with custom options.
    ///
    /// # Examples
    ///
    /// ```
    /// use dry::{Engine, ErrorMode, Options};
    ///
    /// let options = Options::builder().error_mode(ErrorMode::Strict).build();
    /// let engine = Engine::with_options(options);
    /// assert!(engine.parse("{{ a b }}").is_err());
    /// ```
    pub fn with_options(options: Options) -> Self {
        #[allow(unused_mut)]
        let mut engine = Self {
            registry: Registry::builtins(),
            options,
            #[cfg(feature = "filters")]
            filters: BTreeMap::new(),
            loader: None,
            templates: BTreeMap::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        };
        #[cfg(feature = "builtins")]
        filters::builtins::register(&mut engine);
        engine
    }

    /// Returns the engine options.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Add a new filter to the engine, replacing any filter with the same
    /// name.
    #[cfg(feature = "filters")]
    #[cfg_attr(docsrs, doc(cfg(feature = "filters")))]
    #[inline]
    pub fn add_filter<F, R, A>(&mut self, name: impl Into<String>, f: F)
    where
        F: Filter<R, A> + Send + Sync + 'static,
        R: FilterReturn,
        A: FilterArgs,
    {
        self.filters.insert(name.into(), filters::new(f));
    }

    /// Add a new tag to the engine, replacing any tag with the same name.
    ///
    /// # Examples
    ///
    /// ```
    /// use dry::{Context, Parsed, Tag, TagParser};
    ///
    /// struct Hello(String);
    ///
    /// impl Tag for Hello {
    ///     fn render(&self, _: &mut Context<'_>, out: &mut String) -> dry::Result<()> {
    ///         out.push_str("Hello ");
    ///         out.push_str(&self.0);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut engine = dry::Engine::new();
    /// engine.add_tag("hello", |tag: &mut TagParser<'_, '_>| -> dry::Result<Parsed> {
    ///     let name = tag.markup().name()?;
    ///     Ok(Parsed::Tag(Box::new(Hello(name))))
    /// });
    ///
    /// let template = engine.parse("{% hello world %}!")?;
    /// assert_eq!(template.render_from(&dry::Value::None).to_string()?, "Hello world!");
    /// # Ok::<(), dry::Error>(())
    /// ```
    #[inline]
    pub fn add_tag<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: TagFactory + 'static,
    {
        self.registry.insert(name, factory);
    }

    /// Set the loader used to find templates that were not added to the
    /// engine.
    #[inline]
    pub fn set_loader<L>(&mut self, loader: L)
    where
        L: TemplateLoader + 'static,
    {
        self.loader = Some(Box::new(loader));
    }

    /// Set the maximum number of nested templates, counting `include`,
    /// `render`, `embed`, `extends` and `layout`.
    ///
    /// Defaults to 64. Can be overridden per render with
    /// [`Renderer::with_max_include_depth`].
    #[inline]
    pub fn set_max_include_depth(&mut self, depth: usize) {
        self.max_include_depth = depth;
    }

    /// Add a template to the engine.
    ///
    /// The template is parsed and stored under the given name, other
    /// templates can then refer to it by that name.
    pub fn add_template(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        let name = name.into();
        let template = compile::template(&self.registry, &self.options, Some(name.clone()), source)?;
        self.templates.insert(name, Arc::new(template));
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<Template<'_>> {
        self.templates
            .get(name)
            .map(|template| Template::new(self, template.clone()))
    }

    /// Remove a template from the engine.
    #[inline]
    pub fn remove_template(&mut self, name: &str) -> bool {
        self.templates.remove(name).is_some()
    }

    /// Parse a template without storing it in the engine.
    #[inline]
    pub fn parse(&self, source: &str) -> Result<Template<'_>> {
        let template = compile::template(&self.registry, &self.options, None, source)?;
        Ok(Template::new(self, Arc::new(template)))
    }

    /// Parse a template with a name, used in error messages, without
    /// storing it in the engine.
    #[inline]
    pub fn parse_named(&self, name: impl Into<String>, source: &str) -> Result<Template<'_>> {
        let template = compile::template(&self.registry, &self.options, Some(name.into()), source)?;
        Ok(Template::new(self, Arc::new(template)))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Engine");
        d.field("options", &self.options);
        #[cfg(feature = "filters")]
        d.field("filters", &self.filters.keys());
        d.field("templates", &self.templates.keys())
            .field("max_include_depth", &self.max_include_depth)
            .finish_non_exhaustive()
    }
}

impl<'engine> Template<'engine> {
    fn new(engine: &'engine Engine, template: Arc<ast::Template>) -> Self {
        Self {
            engine,
            template,
            busy: AtomicBool::new(false),
        }
    }

    /// Render the template using the provided data.
    ///
    /// Recoverable errors are written inline into the output.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[inline]
    pub fn render<S>(&self, data: S) -> Renderer<'_>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self, data, false)
    }

    /// Render the template using the provided data, failing on the first
    /// error.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[inline]
    pub fn render_strict<S>(&self, data: S) -> Renderer<'_>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self, data, true)
    }

    /// Render the template using the provided value.
    #[inline]
    pub fn render_from<'render>(&'render self, data: &'render Value) -> Renderer<'render> {
        Renderer::with_value(self, data, false)
    }

    /// Render the template using the provided value, failing on the first
    /// error.
    #[inline]
    pub fn render_from_strict<'render>(&'render self, data: &'render Value) -> Renderer<'render> {
        Renderer::with_value(self, data, true)
    }

    /// The syntax errors that were recovered from while parsing in
    /// [`ErrorMode::Warn`].
    #[inline]
    pub fn warnings(&self) -> &[Error] {
        &self.template.warnings
    }

    /// The name the template was parsed with.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.template.name.as_deref()
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &str {
        &self.template.source
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.template.name)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
