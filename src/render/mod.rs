#![allow(clippy::wrong_self_convention)]

mod condition;
mod context;
mod core;
mod iter;
mod limits;
mod registers;
mod value;

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub use crate::render::context::{Context, GlobalFn, Interrupt};
pub use crate::render::core::{render_body, write_value};
pub use crate::render::limits::ResourceLimits;
pub use crate::render::registers::Registers;
pub(crate) use crate::render::core::{render_template, template_name};
pub(crate) use crate::render::iter::forloop;
pub(crate) use crate::render::value::{evaluate, render_variable};
use crate::render::context::Settings;
use crate::types::ast;
use crate::{Error, ErrorKind, Result, Template, Value};

/// A renderer that interprets a parsed [`Template`].
///
/// This struct is created by [`Template::render`],
/// [`Template::render_strict`] and [`Template::render_from`]. Per-render
/// settings are configured with the builder methods, the template is
/// rendered by one of the terminal methods.
#[must_use = "must call `.to_string()`, `.to_fragments()` or `.to_writer(..)` on the renderer"]
pub struct Renderer<'render> {
    template: &'render Template<'render>,
    globals: Globals<'render>,
    registers: Option<&'render mut Registers>,
    warnings: Option<&'render mut Vec<Error>>,
    strict_variables: Option<bool>,
    strict_filters: Option<bool>,
    rethrow: bool,
    static_environments: Vec<Value>,
    global_filter: Option<Box<GlobalFn<'render>>>,
    max_include_depth: Option<usize>,
}

enum Globals<'render> {
    Owned(Result<Value>),
    Borrowed(&'render Value),
}

impl<'render> Renderer<'render> {
    fn new(template: &'render Template<'render>, globals: Globals<'render>, rethrow: bool) -> Self {
        Self {
            template,
            globals,
            registers: None,
            warnings: None,
            strict_variables: None,
            strict_filters: None,
            rethrow,
            static_environments: Vec::new(),
            global_filter: None,
            max_include_depth: None,
        }
    }

    #[cfg(feature = "serde")]
    pub(crate) fn with_serde<S>(
        template: &'render Template<'render>,
        globals: S,
        rethrow: bool,
    ) -> Self
    where
        S: ::serde::Serialize,
    {
        Self::new(template, Globals::Owned(crate::to_value(globals)), rethrow)
    }

    pub(crate) fn with_value(
        template: &'render Template<'render>,
        globals: &'render Value,
        rethrow: bool,
    ) -> Self {
        Self::new(template, Globals::Borrowed(globals), rethrow)
    }

    /// Whether a variable that cannot be resolved is an error instead of
    /// `nil`.
    ///
    /// Defaults to the engine setting.
    pub fn strict_variables(mut self, yes: bool) -> Self {
        self.strict_variables = Some(yes);
        self
    }

    /// Whether an unknown filter is an error instead of passing the value
    /// through.
    ///
    /// Defaults to the engine setting.
    pub fn strict_filters(mut self, yes: bool) -> Self {
        self.strict_filters = Some(yes);
        self
    }

    /// Use the given registers instead of fresh ones.
    ///
    /// State kept in the registers, like `offset: continue` positions and
    /// `cycle` positions, carries over to the next render that is given the
    /// same registers.
    pub fn registers(mut self, registers: &'render mut Registers) -> Self {
        self.registers = Some(registers);
        self
    }

    /// Collect the undefined variables and filters that rendered as nothing
    /// into `warnings`.
    ///
    /// When rendering with strict variables or strict filters these are
    /// errors instead.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dry::{Engine, ErrorKind, Value};
    /// let engine = Engine::new();
    /// let template = engine.parse("Hi {{ name }}!")?;
    /// let mut warnings = Vec::new();
    /// let result = template
    ///     .render_from(&Value::None)
    ///     .warnings(&mut warnings)
    ///     .to_string()?;
    /// assert_eq!(result, "Hi !");
    /// assert_eq!(warnings[0].kind(), ErrorKind::UndefinedVariable);
    /// # Ok::<(), dry::Error>(())
    /// ```
    pub fn warnings(mut self, warnings: &'render mut Vec<Error>) -> Self {
        self.warnings = Some(warnings);
        self
    }

    /// Add data that is looked up after the render data.
    ///
    /// May be called more than once, earlier environments take precedence.
    pub fn static_environment(mut self, env: impl Into<Value>) -> Self {
        self.static_environments.push(env.into());
        self
    }

    /// Set a function that is applied to the result of every `{{ ... }}`
    /// expression.
    pub fn global_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + 'render,
    {
        self.global_filter = Some(Box::new(f));
        self
    }

    /// Set the maximum number of nested templates, counting `include`,
    /// `render`, `embed`, `extends` and `layout`.
    ///
    /// Defaults to the engine setting.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = Some(depth);
        self
    }

    /// Render the template to a string.
    pub fn to_string(self) -> Result<String> {
        self.run(|ctx, template| {
            let mut out = String::with_capacity(template.source.len());
            match core::render_template(ctx, template, &mut out) {
                Ok(()) => Ok(out),
                Err(err) => recover_memory(ctx, err),
            }
        })
    }

    /// Render the template to a list of fragments, one for each top level
    /// node of the template.
    ///
    /// Joining the fragments gives the same output as
    /// [`to_string`][Renderer::to_string].
    pub fn to_fragments(self) -> Result<Vec<String>> {
        self.run(|ctx, template| {
            let mut out = String::with_capacity(template.source.len());
            match core::render_fragments(ctx, template, &mut out) {
                Ok(ends) => {
                    let mut start = 0;
                    let mut fragments = Vec::with_capacity(ends.len());
                    for end in ends {
                        fragments.push(out[start..end].to_owned());
                        start = end;
                    }
                    Ok(fragments)
                }
                Err(err) => recover_memory(ctx, err).map(|text| vec![text]),
            }
        })
    }

    /// Render the template to the given writer.
    pub fn to_writer<W>(self, mut w: W) -> Result<()>
    where
        W: io::Write,
    {
        let out = self.to_string()?;
        w.write_all(out.as_bytes())?;
        Ok(())
    }

    fn run<T, F>(self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>, &Arc<ast::Template>) -> Result<T>,
    {
        let template = self.template;
        let busy = &template.busy;
        if busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(Error::new(
                ErrorKind::TemplateBusy,
                "template is already being rendered",
            ));
        }
        let result = self.run_unguarded(f);
        busy.store(false, Ordering::Release);
        result
    }

    fn run_unguarded<T, F>(self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>, &Arc<ast::Template>) -> Result<T>,
    {
        let engine = self.template.engine;
        let data = match self.globals {
            Globals::Owned(result) => result?,
            Globals::Borrowed(value) => value.clone(),
        };
        let settings = Settings {
            strict_variables: self
                .strict_variables
                .unwrap_or(engine.options.strict_variables),
            strict_filters: self
                .strict_filters
                .unwrap_or(engine.options.strict_filters),
            rethrow: self.rethrow,
            max_include_depth: self.max_include_depth.unwrap_or(engine.max_include_depth),
            static_environments: self.static_environments,
            global_filter: self.global_filter.as_deref(),
        };
        let mut fresh = Registers::new();
        let registers = match self.registers {
            Some(registers) => registers,
            None => &mut fresh,
        };
        let mut ctx = Context::new(engine, data, registers, settings);
        let result = f(&mut ctx, &self.template.template);
        if let Some(warnings) = self.warnings {
            warnings.extend(ctx.take_warnings());
        }
        result
    }
}

/// Exceeding a resource limit replaces the output with the error text,
/// unless rendering strictly.
fn recover_memory(ctx: &mut Context<'_>, err: Error) -> Result<String> {
    if err.kind() == ErrorKind::Memory {
        ctx.handle_error(err, None)
    } else {
        Err(err)
    }
}
