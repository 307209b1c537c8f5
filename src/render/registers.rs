use std::collections::HashMap;
use std::sync::Arc;

use crate::types::ast;
use crate::Value;

/// A side table shared by the tags of a render.
///
/// Tags use the registers to coordinate with each other: `for` remembers
/// where `offset: continue` should resume, `cycle` remembers its position,
/// macros are looked up here and parsed partials are cached here.
///
/// By default every render gets fresh registers. Passing the same registers
/// to several renders with [`Renderer::registers`][crate::Renderer::registers]
/// carries this state over, e.g. to paginate a collection.
///
/// ```
/// # #[cfg(feature = "serde")] {
/// let engine = dry::Engine::new();
/// let template = engine.parse("{% for i in items offset:continue limit:3 %}{{i}}{% endfor %}")?;
/// let data = serde_json::json!({ "items": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10] });
/// let mut registers = dry::Registers::new();
/// assert_eq!(template.render(&data).registers(&mut registers).to_string()?, "123");
/// assert_eq!(template.render(&data).registers(&mut registers).to_string()?, "456");
/// # }
/// # Ok::<(), dry::Error>(())
/// ```
#[derive(Default)]
pub struct Registers {
    pub(crate) for_offsets: HashMap<String, usize>,
    pub(crate) cycles: HashMap<String, usize>,
    pub(crate) macros: HashMap<String, Arc<ast::MacroDef>>,
    pub(crate) templates: HashMap<String, Arc<ast::Template>>,
    values: HashMap<String, Value>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a user value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores a user value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns the position `offset: continue` resumes from for the loop
    /// with the given name, e.g. `item-products`.
    pub fn for_offset(&self, name: &str) -> usize {
        self.for_offsets.get(name).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registers")
            .field("for_offsets", &self.for_offsets)
            .field("cycles", &self.cycles)
            .field("macros", &self.macros.keys())
            .field("templates", &self.templates.keys())
            .field("values", &self.values)
            .finish()
    }
}
