//! The state of a single render.

use std::mem;
use std::sync::Arc;

use crate::render::limits::ResourceLimits;
use crate::render::registers::Registers;
use crate::types::ast::{self, BlockDef, BlockSet};
use crate::value::Map;
use crate::{Engine, Error, ErrorKind, Result, Value};

/// The maximum depth of scopes, including those of isolated sub-renders.
pub(crate) const MAX_DEPTH: usize = 100;

/// A function applied to the result of every `{{ ... }}` expression.
pub type GlobalFn<'a> = dyn Fn(Value) -> Value + 'a;

/// A loop control signal recorded by `break` or `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Break,
    Continue,
}

/// A named block that is currently rendering.
pub(crate) struct BlockCall {
    /// Every definition of the block, most derived first.
    pub chain: Vec<Arc<BlockDef>>,
    pub index: usize,
}

/// The state of a single render.
///
/// A context is created for every call to one of the [`Renderer`]
/// terminal methods and discarded afterwards. Custom tags receive it to
/// read and write variables and to coordinate through the
/// [`Registers`].
///
/// [`Renderer`]: crate::Renderer
pub struct Context<'a> {
    pub(crate) engine: &'a Engine,

    /// Variables set while rendering, innermost last.
    scopes: Vec<Map<String, Value>>,

    /// The data the template is rendered with.
    environments: Vec<Map<String, Value>>,

    /// Data registered with the renderer, consulted last.
    static_environments: Vec<Map<String, Value>>,

    registers: &'a mut Registers,

    pub(crate) limits: ResourceLimits,

    errors: Vec<Error>,

    /// Undefined variables and filters met while rendering leniently.
    warnings: Vec<Error>,

    interrupts: Vec<Interrupt>,

    strict_variables: bool,
    strict_filters: bool,

    /// Whether recoverable errors unwind instead of being written inline.
    rethrow: bool,

    /// The scope depth of the contexts this one is isolated from.
    base_scope_depth: usize,

    global_filter: Option<&'a GlobalFn<'a>>,

    /// The templates being rendered, the current one last.
    templates: Vec<Arc<ast::Template>>,
    max_include_depth: usize,

    /// Block overrides from descendant templates, most derived first.
    pub(crate) block_layers: Vec<Arc<BlockSet>>,
    pub(crate) block_calls: Vec<BlockCall>,

    /// Set while rendering the body of a template with a parent, whose
    /// blocks are left for the parent to render.
    pub(crate) skip_blocks: bool,

    /// The `forloop` objects of the enclosing loops.
    pub(crate) for_stack: Vec<Value>,
}

pub(crate) struct Settings<'a> {
    pub strict_variables: bool,
    pub strict_filters: bool,
    pub rethrow: bool,
    pub max_include_depth: usize,
    pub static_environments: Vec<Value>,
    pub global_filter: Option<&'a GlobalFn<'a>>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        data: Value,
        registers: &'a mut Registers,
        settings: Settings<'a>,
    ) -> Self {
        let options = &engine.options;
        Self {
            engine,
            scopes: vec![Map::new()],
            environments: vec![into_map(data)],
            static_environments: settings
                .static_environments
                .into_iter()
                .map(into_map)
                .collect(),
            registers,
            limits: ResourceLimits::new(
                options.render_length_limit,
                options.render_score_limit,
                options.assign_score_limit,
            ),
            errors: Vec::new(),
            warnings: Vec::new(),
            interrupts: Vec::new(),
            strict_variables: settings.strict_variables,
            strict_filters: settings.strict_filters,
            rethrow: settings.rethrow,
            base_scope_depth: 0,
            global_filter: settings.global_filter,
            templates: Vec::new(),
            max_include_depth: settings.max_include_depth,
            block_layers: Vec::new(),
            block_calls: Vec::new(),
            skip_blocks: false,
            for_stack: Vec::new(),
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Variables
    ////////////////////////////////////////////////////////////////////////

    /// Parses and evaluates an expression, e.g. `product.title`.
    pub fn get(&mut self, markup: &str) -> Result<Value> {
        let expr = crate::compile::expression(markup)?;
        crate::render::value::evaluate(self, &expr)
    }

    /// Sets a variable in the innermost scope.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value.into());
        }
    }

    /// Sets a variable in the outermost scope, charging the assign score.
    pub fn assign(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let score = value.assign_score();
        self.set_outermost(key, value);
        self.limits.increment_assign_score(score)
    }

    /// Sets a variable in the outermost scope without charging for it.
    pub(crate) fn set_outermost(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Whether the variable is defined anywhere.
    pub fn has(&self, key: &str) -> bool {
        self.find_variable(key).is_some()
    }

    /// Looks a variable up in the scopes, innermost first, then in the
    /// render data and finally in the static environments.
    pub fn find_variable(&self, key: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .chain(&self.environments)
            .chain(&self.static_environments)
            .find_map(|scope| scope.get(key))
    }

    /// The counters of `increment` and `decrement` live in the render data.
    pub(crate) fn counter(&mut self, key: &str) -> &mut Value {
        if self.environments.is_empty() {
            self.environments.push(Map::new());
        }
        let env = &mut self.environments[0];
        env.entry(key.to_owned()).or_insert(Value::Integer(0))
    }

    pub fn strict_variables(&self) -> bool {
        self.strict_variables
    }

    pub fn strict_filters(&self) -> bool {
        self.strict_filters
    }

    pub(crate) fn global_filter(&self) -> Option<&'a GlobalFn<'a>> {
        self.global_filter
    }

    ////////////////////////////////////////////////////////////////////////
    // Scopes
    ////////////////////////////////////////////////////////////////////////

    /// Pushes a new innermost scope.
    pub fn push(&mut self, scope: Map<String, Value>) -> Result<()> {
        self.scopes.push(scope);
        if self.base_scope_depth + self.scopes.len() > MAX_DEPTH {
            self.scopes.pop();
            return Err(Error::nesting());
        }
        Ok(())
    }

    /// Pops the innermost scope.
    pub fn pop(&mut self) -> Result<Map<String, Value>> {
        if self.scopes.len() <= 1 {
            return Err(Error::new(ErrorKind::Render, "cannot pop the outermost scope"));
        }
        self.scopes
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::Render, "cannot pop the outermost scope"))
    }

    /// Runs `f` in a new scope, the scope is popped even if `f` fails.
    pub fn stack<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.push(Map::new())?;
        let result = f(self);
        self.pop()?;
        result
    }

    /// Runs `f` with a scope stack that only contains `scope`.
    ///
    /// The render data, loop state and pending interrupts are hidden from
    /// `f`. Resource limits, registers and errors are still shared.
    pub(crate) fn isolated<T, F>(&mut self, scope: Map<String, Value>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let depth = self.base_scope_depth + self.scopes.len();
        if depth + 1 > MAX_DEPTH {
            return Err(Error::nesting());
        }
        let scopes = mem::replace(&mut self.scopes, vec![scope]);
        let environments = mem::take(&mut self.environments);
        let interrupts = mem::take(&mut self.interrupts);
        let for_stack = mem::take(&mut self.for_stack);
        let base = mem::replace(&mut self.base_scope_depth, depth);

        let result = f(self);

        self.scopes = scopes;
        self.environments = environments;
        self.interrupts = interrupts;
        self.for_stack = for_stack;
        self.base_scope_depth = base;
        result
    }

    ////////////////////////////////////////////////////////////////////////
    // Interrupts
    ////////////////////////////////////////////////////////////////////////

    pub fn push_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    pub fn pop_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupts.pop()
    }

    /// Whether a `break` or `continue` is pending.
    pub fn interrupted(&self) -> bool {
        !self.interrupts.is_empty()
    }

    ////////////////////////////////////////////////////////////////////////
    // Registers and errors
    ////////////////////////////////////////////////////////////////////////

    pub fn registers(&self) -> &Registers {
        self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        self.registers
    }

    pub fn resource_limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// The errors that were written inline so far.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The undefined variables and filters that rendered as nothing so far.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<Error> {
        mem::take(&mut self.warnings)
    }

    /// Records a problem that did not stop rendering.
    pub(crate) fn warn(&mut self, err: Error) {
        let err = match self.template_name() {
            Some(name) => err.with_template_name(name),
            None => err,
        };
        tracing::debug!(error = %err, "rendering warning");
        self.warnings.push(err);
    }

    /// Records a recoverable error and returns the text to write in its
    /// place.
    ///
    /// When rendering strictly the error is returned instead.
    pub fn handle_error(&mut self, err: Error, line: Option<usize>) -> Result<String> {
        let mut err = err;
        if let (Some(line), true) = (line, self.engine.options.line_numbers) {
            err = err.with_line(line);
        }
        if let Some(name) = self.template_name() {
            err = err.with_template_name(name);
        }
        if self.rethrow {
            return Err(err);
        }
        tracing::warn!(error = %err, "rendering error written inline");
        let text = err.to_string();
        self.errors.push(err);
        Ok(text)
    }

    ////////////////////////////////////////////////////////////////////////
    // Templates
    ////////////////////////////////////////////////////////////////////////

    /// The name of the template currently rendering.
    pub fn template_name(&self) -> Option<&str> {
        self.templates.last().and_then(|t| t.name.as_deref())
    }

    /// Runs `f` with `template` as the current template.
    pub(crate) fn with_template<T, F>(&mut self, template: Arc<ast::Template>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.templates.len() >= self.max_include_depth {
            return Err(Error::nesting());
        }
        for def in &template.macros {
            self.registers
                .macros
                .insert(def.name.clone(), def.clone());
        }
        self.templates.push(template);
        let skip_blocks = mem::replace(&mut self.skip_blocks, false);
        let result = f(self);
        self.skip_blocks = skip_blocks;
        self.templates.pop();
        result
    }

    /// Runs `f` with the given block overrides in place of the current ones.
    pub(crate) fn with_block_layers<T, F>(&mut self, layers: Vec<Arc<BlockSet>>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let layers = mem::replace(&mut self.block_layers, layers);
        let calls = mem::take(&mut self.block_calls);
        let result = f(self);
        self.block_layers = layers;
        self.block_calls = calls;
        result
    }

    /// Loads a template by name.
    ///
    /// Templates are looked up in the per-render cache, then among the
    /// templates added to the engine and finally read with the engine's
    /// loader and cached.
    pub(crate) fn load_template(&mut self, name: &str) -> Result<Arc<ast::Template>> {
        if let Some(template) = self.registers.templates.get(name) {
            tracing::trace!(name, "template cache hit");
            return Ok(template.clone());
        }
        if let Some(template) = self.engine.templates.get(name) {
            return Ok(template.clone());
        }
        let source = match &self.engine.loader {
            Some(loader) => loader.read_template_file(name)?,
            None => {
                return Err(Error::new(
                    ErrorKind::FileSystem,
                    format!("Could not find template '{name}'"),
                ))
            }
        };
        tracing::debug!(name, "loaded template");
        let template = Arc::new(crate::compile::template(
            &self.engine.registry,
            &self.engine.options,
            Some(name.to_owned()),
            &source,
        )?);
        self.registers
            .templates
            .insert(name.to_owned(), template.clone());
        Ok(template)
    }
}

/// Render data is always a map, anything else renders as if it were empty.
fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Map(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_context(data: Value, f: impl FnOnce(&mut Context<'_>)) {
        let engine = Engine::new();
        let mut registers = Registers::new();
        let settings = Settings {
            strict_variables: false,
            strict_filters: false,
            rethrow: false,
            max_include_depth: 64,
            static_environments: vec![Value::from([("site", "static")])],
            global_filter: None,
        };
        let mut ctx = Context::new(&engine, data, &mut registers, settings);
        f(&mut ctx)
    }

    #[test]
    fn find_variable_precedence() {
        with_context(Value::from([("a", 1), ("site", 2)]), |ctx| {
            assert_eq!(ctx.find_variable("a"), Some(&Value::Integer(1)));
            assert_eq!(ctx.find_variable("site"), Some(&Value::Integer(2)));
            ctx.set("a", "scoped");
            assert_eq!(ctx.find_variable("a"), Some(&Value::from("scoped")));
            assert!(ctx.find_variable("missing").is_none());
        });
        with_context(Value::None, |ctx| {
            assert_eq!(ctx.find_variable("site"), Some(&Value::from("static")));
        });
    }

    #[test]
    fn present_nil_is_not_missing() {
        with_context(Value::from([("a", ())]), |ctx| {
            assert!(ctx.has("a"));
            assert!(!ctx.has("b"));
        });
    }

    #[test]
    fn stack_pops_on_error() {
        with_context(Value::None, |ctx| {
            let result: Result<()> = ctx.stack(|ctx| {
                ctx.set("x", 1);
                Err(Error::argument("boom"))
            });
            assert!(result.is_err());
            assert!(!ctx.has("x"));
        });
    }

    #[test]
    fn pop_last_scope_fails() {
        with_context(Value::None, |ctx| {
            assert!(ctx.pop().is_err());
        });
    }

    #[test]
    fn push_overflow() {
        with_context(Value::None, |ctx| {
            for _ in 1..MAX_DEPTH {
                ctx.push(Map::new()).unwrap();
            }
            let err = ctx.push(Map::new()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::StackLevel);
        });
    }

    #[test]
    fn isolated_hides_outer_variables() {
        with_context(Value::from([("a", 1)]), |ctx| {
            ctx.set("b", 2);
            ctx.isolated(Map::new(), |ctx| {
                assert!(!ctx.has("a"));
                assert!(!ctx.has("b"));
                assert!(ctx.has("site"));
                Ok(())
            })
            .unwrap();
            assert!(ctx.has("a"));
            assert!(ctx.has("b"));
        });
    }

    #[test]
    fn handle_error_records() {
        with_context(Value::None, |ctx| {
            let err = Error::new(ErrorKind::UndefinedVariable, "undefined variable x");
            let text = ctx.handle_error(err, Some(3)).unwrap();
            assert_eq!(text, "Dry error (line 3): undefined variable x");
            assert_eq!(ctx.errors().len(), 1);
        });
    }
}
