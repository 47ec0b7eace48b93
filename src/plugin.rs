//! Extension points for host code: line handlers, value parsers, call-style
//! expression functions and a completion callback.

use crate::entry::ListEntry;
use crate::symbols::SymbolTable;
use std::collections::BTreeMap;

/// Call-style expression function, e.g. `isref(name)`. Receives the raw text
/// between the parentheses.
pub type ExpressionExtension = Box<dyn Fn(&str, &SymbolTable) -> Option<u16>>;

/// What a line handler can see about where it is being called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineContext<'a> {
    pub file: &'a str,
    pub line: usize,
    pub address: u16,
}

pub trait Plugin {
    fn name(&self) -> &str;

    /// Called for each active line before it is classified. Returning an entry
    /// replaces the standard handling; its output advances the address.
    fn handle_line(&mut self, _line: &str, _ctx: &LineContext<'_>) -> Option<ListEntry> {
        None
    }

    /// Called for bare expression tokens before the built-in literal parsing.
    fn evaluate_value(&self, _token: &str) -> Option<u16> {
        None
    }

    fn assembly_complete(&mut self, _entries: &[ListEntry]) {}
}

/// Registered plugins and expression extensions.
pub struct Hooks {
    pub(crate) plugins: Vec<Box<dyn Plugin>>,
    pub(crate) extensions: BTreeMap<String, ExpressionExtension>,
}

impl Default for Hooks {
    fn default() -> Self {
        let mut hooks = Self { plugins: Vec::new(), extensions: BTreeMap::new() };
        hooks.register_extension("isref", Box::new(|name: &str, symbols: &SymbolTable| {
            Some(u16::from(symbols.is_referenced(name)))
        }));
        hooks
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Hooks {
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn register_extension(&mut self, name: &str, extension: ExpressionExtension) {
        self.extensions.insert(name.to_ascii_lowercase(), extension);
    }

    pub(crate) fn handle_line(&mut self, line: &str, ctx: &LineContext<'_>) -> Option<ListEntry> {
        self.plugins.iter_mut().find_map(|p| p.handle_line(line, ctx))
    }

    pub(crate) fn assembly_complete(&mut self, entries: &[ListEntry]) {
        for plugin in &mut self.plugins {
            plugin.assembly_complete(entries);
        }
    }
}
