use crate::error::ErrorCode;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A named address. `position` is the index of the listing entry that bound it,
/// used by the resolver to decide which labels move when code shrinks or grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
    pub address: u16,
    pub position: usize,
}

/// Anonymous `$` label, keyed in the table by its root line coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelativeLabel {
    pub address: u16,
    pub position: usize,
}

/// Equates, labels and relative labels. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    equates: BTreeMap<String, u16>,
    labels: BTreeMap<String, Label>,
    relative: BTreeMap<usize, RelativeLabel>,
    referenced: BTreeSet<String>,
    #[serde(skip)]
    last_global: Option<String>,
}

/// A label or equate name: a letter, then letters, digits, `_` or `.`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Rewrites `.local` to `<scope>_local`; other names pass through.
pub fn scope_local(name: &str, scope: Option<&str>) -> String {
    match name.strip_prefix('.') {
        Some(local) => format!("{}_{}", scope.unwrap_or_default(), local),
        None => name.to_string(),
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent global label; the scope for `.local` names at this point.
    pub fn scope(&self) -> Option<&str> {
        self.last_global.as_deref()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        self.equates.contains_key(&key) || self.labels.contains_key(&key)
    }

    pub fn define_equate(&mut self, name: &str, value: u16) -> Result<(), ErrorCode> {
        if !is_valid_name(name) {
            return Err(ErrorCode::InvalidLabel);
        }
        if self.is_defined(name) {
            return Err(ErrorCode::DuplicateName);
        }
        self.equates.insert(name.to_ascii_lowercase(), value);
        Ok(())
    }

    /// Binds `name` (global, or `.local` under the current scope) to `address`.
    /// Returns the name actually stored.
    pub fn define_label(&mut self, name: &str, address: u16, position: usize) -> Result<String, ErrorCode> {
        let stored = match name.strip_prefix('.') {
            Some(local) if is_valid_name(local) => scope_local(name, self.scope()),
            Some(_) => return Err(ErrorCode::InvalidLabel),
            None if is_valid_name(name) => name.to_string(),
            None => return Err(ErrorCode::InvalidLabel),
        };
        if self.is_defined(&stored) {
            return Err(ErrorCode::DuplicateName);
        }
        if !name.starts_with('.') {
            self.last_global = Some(stored.clone());
        }
        self.labels.insert(
            stored.to_ascii_lowercase(),
            Label { name: stored.clone(), address, position },
        );
        Ok(stored)
    }

    pub fn define_relative(&mut self, root_line: usize, address: u16, position: usize) {
        self.relative.insert(root_line, RelativeLabel { address, position });
    }

    pub fn equate(&self, name: &str) -> Option<u16> {
        self.equates.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.get(&name.to_ascii_lowercase())
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn equates(&self) -> impl Iterator<Item = (&str, u16)> {
        self.equates.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `n`-th relative label after `root_line` (1-based).
    pub fn relative_forward(&self, root_line: usize, n: usize) -> Option<u16> {
        self.relative
            .range(root_line + 1..)
            .nth(n.checked_sub(1)?)
            .map(|(_, l)| l.address)
    }

    /// `n`-th relative label at or before `root_line`, walking backwards (1-based).
    pub fn relative_backward(&self, root_line: usize, n: usize) -> Option<u16> {
        self.relative
            .range(..=root_line)
            .rev()
            .nth(n.checked_sub(1)?)
            .map(|(_, l)| l.address)
    }

    pub fn mark_referenced<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.referenced.insert(name.to_ascii_lowercase());
        }
    }

    pub fn is_referenced(&self, name: &str) -> bool {
        self.referenced.contains(&name.to_ascii_lowercase())
    }

    /// Moves every label whose entry index lies in `after+1..before` by `delta` words.
    pub(crate) fn shift(&mut self, after: usize, before: usize, delta: i32) {
        let moved = |pos: usize| pos > after && pos < before;
        for label in self.labels.values_mut().filter(|l| moved(l.position)) {
            label.address = label.address.wrapping_add_signed(delta as i16);
        }
        for label in self.relative.values_mut().filter(|l| moved(l.position)) {
            label.address = label.address.wrapping_add_signed(delta as i16);
        }
    }
}
