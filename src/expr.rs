//! Expression evaluation over 16-bit wrapping values.
//!
//! Parenthesised groups are rewritten in place with their decimal value before
//! anything else is looked at. What remains is split once and both halves are
//! evaluated recursively. The split operator is the first entry of `OPERATORS`
//! that occurs at all, so `1+2*3` is `(1+2)*3` and `-1+2` is `(-1)+2`; a later,
//! longer entry takes over only when it starts at or before that occurrence
//! (`a<<b*2` is `a<<(b*2)`). There is no precedence table.

use crate::assembler::Assembler;
use crate::error::ErrorCode;
use crate::grammar::Grammar;
use crate::plugin::Hooks;
use crate::symbols::{scope_local, SymbolTable};
use crate::text::{unescape, Quote};
use serde::Serialize;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::trace;

const OPERATORS: &[&str] = &[
    "*", "/", "+", "-", "<<", ">>", "||", "&&", "^^", "|", "^", "&", "%", "===", "!==", "==", "!=", "<>",
    ">", "<", ">=", "<=",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpressionResult {
    pub value: u16,
    pub successful: bool,
    /// Lower-cased symbol names looked up, resolved or not.
    pub references: BTreeSet<String>,
    /// Derived from a label address or `$`; may move between resolver passes.
    pub relocatable: bool,
}

impl ExpressionResult {
    pub fn ok(value: u16) -> Self {
        Self { value, successful: true, ..Self::default() }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn resolved(&self) -> Option<u16> {
        self.successful.then_some(self.value)
    }

    /// True when some referenced name is neither an equate nor a label.
    pub fn has_undefined_reference(&self, symbols: &SymbolTable) -> bool {
        self.references.iter().any(|name| !symbols.is_defined(name))
    }

    /// Error code for a failed evaluation.
    pub(crate) fn failure(&self, symbols: &SymbolTable) -> ErrorCode {
        if self.has_undefined_reference(symbols) {
            ErrorCode::UndefinedReference
        } else {
            ErrorCode::IllegalExpression
        }
    }

    fn absorb(&mut self, other: ExpressionResult) {
        self.references.extend(other.references);
        self.relocatable |= other.relocatable;
    }
}

/// Where an expression is evaluated: `$`, relative labels and local scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub address: u16,
    pub root_line: usize,
    pub scope: Option<String>,
}

pub struct Evaluator<'a> {
    symbols: &'a SymbolTable,
    hooks: &'a Hooks,
    grammar: &'a Rc<Grammar>,
    position: &'a Position,
}

impl<'a> Evaluator<'a> {
    pub fn new(symbols: &'a SymbolTable, hooks: &'a Hooks, grammar: &'a Rc<Grammar>, position: &'a Position) -> Self {
        Self { symbols, hooks, grammar, position }
    }

    pub fn evaluate(&self, expr: &str) -> ExpressionResult {
        let result = self.eval(expr);
        trace!(expr, value = result.value, ok = result.successful, "evaluate");
        result
    }

    fn eval(&self, expr: &str) -> ExpressionResult {
        let expr = expr.trim();
        if expr.is_empty() {
            return ExpressionResult::failed();
        }
        if let Some((open, close)) = first_group(expr) {
            return self.eval_group(expr, open, close);
        }
        if let Some(rest) = expr.strip_prefix('~') {
            let mut inner = self.eval(rest);
            inner.value = !inner.value;
            return inner;
        }
        match split_operator(expr) {
            Some(("", "-", right)) => {
                let mut inner = self.eval(right);
                inner.value = inner.value.wrapping_neg();
                inner
            }
            Some((left, op, right)) => self.eval_binary(left, op, right),
            None => self.eval_value(expr),
        }
    }

    fn eval_group(&self, expr: &str, open: usize, close: usize) -> ExpressionResult {
        let inner = &expr[open + 1..close];
        let name_start = expr[..open]
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .map_or(0, |i| i + 1);
        let name = expr[name_start..open].to_ascii_lowercase();

        let (start, sub) = match self.hooks.extensions.get(&name) {
            Some(extension) => {
                let value = extension(inner.trim(), self.symbols);
                (name_start, value.map_or_else(ExpressionResult::failed, ExpressionResult::ok))
            }
            None => (open, self.eval(inner)),
        };
        if !sub.successful {
            return sub;
        }
        let rewritten = format!("{}{}{}", &expr[..start], sub.value, &expr[close + 1..]);
        let mut result = self.eval(&rewritten);
        result.absorb(sub);
        result
    }

    fn eval_binary(&self, left_text: &str, op: &str, right_text: &str) -> ExpressionResult {
        let left = self.eval(left_text);
        let right = self.eval(right_text);
        let mut result = ExpressionResult::ok(0);

        if op == "===" || op == "!==" {
            let same = left_text.trim().eq_ignore_ascii_case(right_text.trim());
            result.value = u16::from(same == (op == "==="));
            result.references = left.references.union(&right.references).cloned().collect();
            return result;
        }

        let (a, b) = (left.value, right.value);
        let both = left.successful && right.successful;
        result.absorb(left);
        result.absorb(right);
        if !both {
            result.successful = false;
            return result;
        }

        let value = match op {
            "*" => Some(a.wrapping_mul(b)),
            "/" => a.checked_div(b),
            "%" => a.checked_rem(b),
            "+" => Some(a.wrapping_add(b)),
            "-" => Some(a.wrapping_sub(b)),
            "<<" => Some(a.checked_shl(b as u32).unwrap_or(0)),
            ">>" => Some(a.checked_shr(b as u32).unwrap_or(0)),
            "|" => Some(a | b),
            "^" => Some(a ^ b),
            "&" => Some(a & b),
            "==" => Some(u16::from(a == b)),
            "!=" | "<>" => Some(u16::from(a != b)),
            "<" => Some(u16::from(a < b)),
            ">" => Some(u16::from(a > b)),
            "<=" => Some(u16::from(a <= b)),
            ">=" => Some(u16::from(a >= b)),
            "&&" => Some(u16::from(a != 0 && b != 0)),
            "||" => Some(u16::from(a != 0 || b != 0)),
            "^^" => Some(u16::from((a != 0) ^ (b != 0))),
            _ => None,
        };
        match value {
            Some(v) => result.value = v,
            None => result.successful = false,
        }
        result
    }

    fn eval_value(&self, token: &str) -> ExpressionResult {
        if let Some(v) = self.hooks.plugins.iter().find_map(|p| p.evaluate_value(token)) {
            return ExpressionResult::ok(v);
        }
        let lower = token.to_ascii_lowercase();
        if token.starts_with('\'') {
            return char_literal(token).map_or_else(ExpressionResult::failed, ExpressionResult::ok);
        }
        if token.starts_with('{') && token.ends_with('}') {
            return self.instruction_literal(&token[1..token.len() - 1]);
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            return number(&lower).map_or_else(ExpressionResult::failed, ExpressionResult::ok);
        }
        if token == "$" {
            return ExpressionResult { relocatable: true, ..ExpressionResult::ok(self.position.address) };
        }
        if let Some(walk) = token.strip_prefix('$') {
            return self.relative(walk);
        }
        match lower.as_str() {
            "true" => return ExpressionResult::ok(1),
            "false" => return ExpressionResult::ok(0),
            _ => {}
        }
        self.symbol(token)
    }

    fn symbol(&self, token: &str) -> ExpressionResult {
        let name = scope_local(token, self.position.scope.as_deref()).to_ascii_lowercase();
        let mut result = if let Some(v) = self.symbols.equate(&name) {
            ExpressionResult::ok(v)
        } else if let Some(label) = self.symbols.label(&name) {
            ExpressionResult { relocatable: true, ..ExpressionResult::ok(label.address) }
        } else {
            ExpressionResult::failed()
        };
        result.references.insert(name);
        result
    }

    /// `$+`, `$++`, `$-`, `$--`: walk through anonymous labels.
    fn relative(&self, walk: &str) -> ExpressionResult {
        let n = walk.len();
        let address = if walk.chars().all(|c| c == '+') {
            self.symbols.relative_forward(self.position.root_line, n)
        } else if walk.chars().all(|c| c == '-') {
            self.symbols.relative_backward(self.position.root_line, n)
        } else {
            None
        };
        match address {
            Some(a) => ExpressionResult { relocatable: true, ..ExpressionResult::ok(a) },
            None => ExpressionResult { relocatable: true, ..ExpressionResult::failed() },
        }
    }

    /// `{SET A, 1}`: assemble the text on its own and take the first word.
    fn instruction_literal(&self, text: &str) -> ExpressionResult {
        let assembly = Assembler::with_grammar(Rc::clone(self.grammar)).assemble(text, "{literal}");
        let first = assembly.entries.iter().find(|e| !e.output.is_empty());
        match first {
            Some(entry) if entry.error.is_none() => ExpressionResult::ok(entry.output[0]),
            _ => ExpressionResult::failed(),
        }
    }
}

/// Parses `0x`, `0b`, `0o`, `0d` and plain decimal literals, allowing `_` separators.
pub fn number(text: &str) -> Option<u16> {
    let text = text.to_ascii_lowercase().replace('_', "");
    let (digits, radix) = match text.get(..2) {
        Some("0x") => (&text[2..], 16),
        Some("0b") => (&text[2..], 2),
        Some("0o") => (&text[2..], 8),
        Some("0d") => (&text[2..], 10),
        _ => (text.as_str(), 10),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    u16::from_str_radix(digits, radix).ok()
}

fn char_literal(token: &str) -> Option<u16> {
    if token.len() < 3 || !token.ends_with('\'') {
        return None;
    }
    let text = unescape(&token[1..token.len() - 1])?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => u16::try_from(u32::from(c)).ok(),
        _ => None,
    }
}

/// First balanced `(...)` at the top level of `expr`, ignoring quotes and `{}`.
fn first_group(expr: &str) -> Option<(usize, usize)> {
    let mut q = Quote::empty();
    let (mut depth, mut braces) = (0usize, 0usize);
    let mut open = None;
    for (i, c) in expr.char_indices() {
        if !q.advance(c) {
            continue;
        }
        match c {
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            '(' if braces == 0 => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            ')' if braces == 0 && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }
    None
}

/// Picks the split point. Operators are tried in table order and the first
/// one present wins, unless a later, longer operator starts at or before it.
fn split_operator(expr: &str) -> Option<(&str, &'static str, &str)> {
    let mut best: Option<(usize, &'static str)> = None;
    for &op in OPERATORS {
        let Some(at) = find_operator(expr, op) else {
            continue;
        };
        match best {
            Some((start, chosen)) if at > start || op.len() <= chosen.len() => {}
            _ => best = Some((at, op)),
        }
    }
    best.map(|(at, op)| (&expr[..at], op, &expr[at + op.len()..]))
}

/// Leftmost `op` outside quotes, `{}` and `$+`/`$-` runs.
fn find_operator(expr: &str, op: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    let mut q = Quote::empty();
    let mut braces = 0usize;
    let mut skip_until = 0usize;
    for (i, c) in expr.char_indices() {
        if !q.advance(c) || i < skip_until {
            continue;
        }
        match c {
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            _ if braces > 0 => {}
            '$' => {
                let run = bytes[i + 1..].iter().take_while(|b| matches!(b, b'+' | b'-')).count();
                let end = i + 1 + run;
                if run > 0 && bytes.get(end).map_or(true, |b| b.is_ascii_whitespace()) {
                    skip_until = end;
                }
            }
            _ if expr[i..].starts_with(op) => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_and_separators() {
        assert_eq!(number("0x1_0"), Some(0x10));
        assert_eq!(number("0b1010"), Some(10));
        assert_eq!(number("0o17"), Some(15));
        assert_eq!(number("0d99"), Some(99));
        assert_eq!(number("65536"), None);
        assert_eq!(number("0x"), None);
    }

    #[test]
    fn split_follows_operator_table_order() {
        assert_eq!(split_operator("1+2*3"), Some(("1+2", "*", "3")));
        assert_eq!(split_operator("-1+2"), Some(("-1", "+", "2")));
        assert_eq!(split_operator("a<<b*2"), Some(("a", "<<", "b*2")));
        assert_eq!(split_operator("3>=2"), Some(("3", ">=", "2")));
        assert_eq!(split_operator("a<<2"), Some(("a", "<<", "2")));
        assert_eq!(split_operator("a===b"), Some(("a", "===", "b")));
        assert_eq!(split_operator("'+'+1"), Some(("'+'", "+", "1")));
        assert_eq!(split_operator("$+ + 1"), Some(("$+ ", "+", " 1")));
        assert_eq!(split_operator("$++"), None);
        assert_eq!(split_operator("{SET A, 1}"), None);
    }

    #[test]
    fn groups_skip_char_literals() {
        assert_eq!(first_group("')'+(1)"), Some((4, 6)));
        assert_eq!(first_group("1+2"), None);
    }
}
