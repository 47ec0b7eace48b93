//! Table-driven opcode and operand matcher.
//!
//! Each record pairs a pattern with an encoding value. Patterns are plain
//! text compared case-insensitively, plus a few sigils:
//! `_` required whitespace, `-` optional whitespace, `%a`/`%b` operand text,
//! `$a` a literal expression that needs its own output word.

use crate::isa::dcpu16;
use crate::text::Quote;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Opcode,
    NonBasic,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub text: String,
    pub code: u8,
}

/// Result of a successful [`Grammar::match_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub code: u8,
    pub pattern: String,
    pub a: Option<String>,
    pub b: Option<String>,
    pub literal: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grammar {
    pub opcodes: Vec<Pattern>,
    pub nonbasic: Vec<Pattern>,
    pub values: Vec<Pattern>,
}

impl Grammar {
    /// Reads `o`, `n` and `a,b` records. Blank lines and `#` comments are skipped;
    /// malformed records are logged and dropped.
    pub fn parse(table: &str) -> Self {
        let mut grammar = Grammar::default();
        for (idx, raw) in table.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(kind), Some(hex), Some(text)) = (parts.next(), parts.next(), parts.next()) else {
                warn!(line = idx + 1, record = line, "malformed grammar record");
                continue;
            };
            let Ok(code) = u8::from_str_radix(hex, 16) else {
                warn!(line = idx + 1, value = hex, "grammar record has a bad value");
                continue;
            };
            let table = match kind {
                "o" => &mut grammar.opcodes,
                "n" => &mut grammar.nonbasic,
                "a,b" => &mut grammar.values,
                other => {
                    warn!(line = idx + 1, kind = other, "unknown grammar record kind");
                    continue;
                }
            };
            table.push(Pattern { text: text.to_string(), code });
        }
        grammar
    }

    pub fn dcpu16() -> Self {
        Self::parse(dcpu16::TABLE)
    }

    pub fn table(&self, kind: TableKind) -> &[Pattern] {
        match kind {
            TableKind::Opcode => &self.opcodes,
            TableKind::NonBasic => &self.nonbasic,
            TableKind::Value => &self.values,
        }
    }

    /// First record of `kind` whose pattern consumes all of `text`.
    pub fn match_text(&self, kind: TableKind, text: &str) -> Option<Match> {
        self.table(kind).iter().find_map(|p| match_pattern(p, text))
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub fn match_pattern(pattern: &Pattern, text: &str) -> Option<Match> {
    let pat: Vec<char> = pattern.text.chars().collect();
    let input: Vec<char> = text.trim().chars().collect();
    let mut found = Match { code: pattern.code, pattern: pattern.text.clone(), ..Match::default() };
    let (mut pi, mut vi) = (0usize, 0usize);
    let mut whitespace_met = false;

    while pi < pat.len() {
        match pat[pi] {
            '_' => {
                if vi < input.len() && is_blank(input[vi]) {
                    whitespace_met = true;
                    vi += 1;
                    continue;
                }
                if !whitespace_met {
                    return None;
                }
                whitespace_met = false;
                pi += 1;
            }
            '-' => {
                while vi < input.len() && is_blank(input[vi]) {
                    vi += 1;
                }
                pi += 1;
            }
            sigil @ ('%' | '$') => {
                let id = *pat.get(pi + 1)?;
                pi += 2;
                let end = capture_end(&pat[pi..], &input, vi)?;
                let captured: String = input[vi..end].iter().collect();
                let captured = captured.trim().to_string();
                if captured.is_empty() {
                    return None;
                }
                match (sigil, id) {
                    ('$', _) => found.literal = Some(captured),
                    (_, 'a') => found.a = Some(captured),
                    _ => found.b = Some(captured),
                }
                vi = end;
            }
            c => {
                if vi >= input.len() || !input[vi].eq_ignore_ascii_case(&c) {
                    return None;
                }
                pi += 1;
                vi += 1;
            }
        }
    }
    (vi == input.len()).then_some(found)
}

/// Where a capture starting at `start` stops: at the first top-level comma when
/// the pattern continues with `,`, at the last unquoted occurrence of any other
/// terminator (`+`, `]`), or at the end of input when the capture is final.
fn capture_end(rest: &[char], input: &[char], start: usize) -> Option<usize> {
    let Some(&term) = rest.iter().find(|c| !matches!(c, '-' | '_')) else {
        return Some(input.len());
    };
    let mut q = Quote::empty();
    let mut depth = 0i32;
    let mut last = None;
    for (i, &c) in input.iter().enumerate().skip(start) {
        if !q.advance(c) {
            continue;
        }
        if term == ',' {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth <= 0 => return Some(i),
                _ => {}
            }
        } else if c.eq_ignore_ascii_case(&term) {
            last = Some(i);
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builtin_table() {
        let g = Grammar::dcpu16();
        assert_eq!(g.opcodes.len(), 27);
        assert_eq!(g.nonbasic.len(), 9);
        assert_eq!(g.values.last().map(|p| p.code), Some(0x1F));
    }

    #[test]
    fn malformed_records_are_skipped() {
        let g = Grammar::parse("o 01 SET_%b-,-%a\nbogus\nq 02 X\no zz Y\n");
        assert_eq!(g.opcodes.len(), 1);
    }

    #[test]
    fn literal_capture_stops_at_last_plus() {
        let g = Grammar::dcpu16();
        let m = g.match_text(TableKind::Value, "[label+1+A]").unwrap();
        assert_eq!(m.code, 0x10);
        assert_eq!(m.literal.as_deref(), Some("label+1"));
    }
}
