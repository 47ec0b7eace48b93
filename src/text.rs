//! Quote-aware line helpers. A `;`, `,` or `:` inside a string or character
//! literal is never a delimiter, and a backslash escapes the next literal char.

use bitflags::bitflags;

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote: u8 {
const STRING = 1 << 0; // inside "..."
const CHAR = 1 << 1;   // inside '...'
const ESCAPE = 1 << 2; // last char was a backslash inside a literal
}
}

impl Quote {
    /// Feeds one character; returns true when `c` sits outside every literal.
    pub fn advance(&mut self, c: char) -> bool {
        if self.contains(Quote::ESCAPE) {
            self.remove(Quote::ESCAPE);
            return false;
        }
        if self.intersects(Quote::STRING | Quote::CHAR) {
            match c {
                '\\' => self.insert(Quote::ESCAPE),
                '"' if self.contains(Quote::STRING) => self.remove(Quote::STRING),
                '\'' if self.contains(Quote::CHAR) => self.remove(Quote::CHAR),
                _ => {}
            }
            return false;
        }
        match c {
            '"' => {
                self.insert(Quote::STRING);
                false
            }
            '\'' => {
                self.insert(Quote::CHAR);
                false
            }
            _ => true,
        }
    }
}

/// Drops everything from the first unquoted `;`.
pub fn trim_comments(line: &str) -> &str {
    let mut q = Quote::empty();
    for (i, c) in line.char_indices() {
        if q.advance(c) && c == ';' {
            return line[..i].trim();
        }
    }
    line.trim()
}

/// Tabs become spaces and runs of whitespace outside literals collapse to one space.
pub fn collapse_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut q = Quote::empty();
    let mut prev_ws = false;
    for c in line.trim().chars() {
        let code = q.advance(c);
        let ws = c.is_whitespace();
        if code && ws {
            if !prev_ws {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
        prev_ws = code && ws;
    }
    out
}

/// Byte offset of the first `needle` outside any literal.
pub fn safe_find(s: &str, needle: char) -> Option<usize> {
    let mut q = Quote::empty();
    s.char_indices().find(|&(_, c)| q.advance(c) && c == needle).map(|(i, _)| i)
}

/// Splits on `sep` when it is outside literals and outside `()`, `[]` and `{}` groups.
/// Pieces are returned untrimmed; an empty input yields one empty piece.
pub fn safe_split(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut q = Quote::empty();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if !q.advance(c) {
            continue;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c == sep && depth <= 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Splits off the first whitespace-delimited word: `("SET", "A, 1")`.
pub fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Resolves backslash escapes. `None` on a dangling or unknown escape.
pub fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next()? {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\'' => '\'',
            '"' => '"',
            '\\' => '\\',
            '0' => '\0',
            'x' => {
                let hex: String = [chars.next()?, chars.next()?].iter().collect();
                char::from(u8::from_str_radix(&hex, 16).ok()?)
            }
            _ => return None,
        };
        out.push(decoded);
    }
    Some(out)
}

/// Strips one pair of surrounding `"` quotes.
pub fn strip_string(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_inside_literals_survive() {
        assert_eq!(trim_comments("SET A, B ; copy"), "SET A, B");
        assert_eq!(trim_comments(".dat \"a;b\" ; text"), ".dat \"a;b\"");
        assert_eq!(trim_comments("SET A, ';'"), "SET A, ';'");
        assert_eq!(trim_comments(".dat \"say \\\";\\\"\" ;x"), ".dat \"say \\\";\\\"\"");
    }

    #[test]
    fn whitespace_collapses_outside_strings() {
        assert_eq!(collapse_whitespace("  SET\tA,   B "), "SET A, B");
        assert_eq!(collapse_whitespace(".ascii \"a   b\""), ".ascii \"a   b\"");
    }

    #[test]
    fn split_respects_groups_and_quotes() {
        assert_eq!(safe_split("1, \"a,b\", ','", ','), vec!["1", " \"a,b\"", " ','"]);
        assert_eq!(safe_split("f(1,2), {SET A, 1}", ','), vec!["f(1,2)", " {SET A, 1}"]);
        assert_eq!(safe_split("", ','), vec![""]);
    }

    #[test]
    fn unescape_handles_hex_and_rejects_unknown() {
        assert_eq!(unescape("a\\n\\x41").as_deref(), Some("a\nA"));
        assert_eq!(unescape("bad\\q"), None);
        assert_eq!(unescape("dangling\\"), None);
    }

    #[test]
    fn find_skips_literals() {
        assert_eq!(safe_find("':' x: y", ':'), Some(5));
        assert_eq!(safe_find("\"a:b\"", ':'), None);
    }
}
