//! Human-readable and JSON listings of an assembly.

use organic_asm::symbols::Label;
use organic_asm::{Assembly, CodeKind, ListEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const DATA_DIRECTIVES: &[&str] = &[
    "dat", "dw", "ascii", "asciiz", "asciip", "asciic", "align", "fill", "pad", "incbin", "incpack", "reserve",
];
const WORDS_PER_ROW: usize = 8;

fn is_data(entry: &ListEntry) -> bool {
    if entry.kind != CodeKind::Directive || entry.error.is_some() {
        return false;
    }
    let name = entry.code.get(1..).unwrap_or_default();
    let name = name.split_whitespace().next().unwrap_or_default().to_ascii_lowercase();
    (entry.code.starts_with('.') || entry.code.starts_with('#')) && DATA_DIRECTIVES.contains(&name.as_str())
}

fn hex_words(words: &[u16]) -> String {
    words.iter().map(|w| format!("{w:04X}")).collect::<Vec<_>>().join(" ")
}

/// One line per entry: file, line, `[0xADDR]` or `[NOLIST]`, words, source.
/// Data directives list their words eight per row.
pub fn render_text(entries: &[ListEntry]) -> String {
    let file_width = entries.iter().map(|e| e.file.len() + 1).max().unwrap_or(0);
    let line_width = entries.iter().map(|e| format!("(line {}): ", e.line).len()).max().unwrap_or(0);
    let mut out = String::new();

    for entry in entries {
        let row = |address: u16| {
            let location = match entry.listed {
                true => format!("[0x{address:04X}] "),
                false => "[NOLIST] ".to_string(),
            };
            let line = format!("(line {}): ", entry.line);
            format!("{:<file_width$}{line:<line_width$}{location}", entry.file)
        };

        if is_data(entry) {
            let _ = writeln!(out, "{}{}", row(entry.address), entry.code);
            for (i, chunk) in entry.output.chunks(WORDS_PER_ROW).enumerate() {
                let address = entry.address.wrapping_add((i * WORDS_PER_ROW) as u16);
                let _ = writeln!(out, "{}{}", row(address), hex_words(chunk));
            }
            continue;
        }
        if let Some(error) = entry.error {
            let _ = writeln!(out, "{}ERROR: {error}", row(entry.address));
        }
        if let Some(warning) = entry.warning {
            let _ = writeln!(out, "{}WARNING: {warning}", row(entry.address));
        }
        let _ = writeln!(out, "{}{:<16}{}", row(entry.address), hex_words(&entry.output), entry.code);
    }
    out
}

/// `Error <file> (line N): message` and `Warning ...` lines, in program order.
pub fn diagnostics(entries: &[ListEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        if let Some(error) = entry.error {
            lines.push(format!("Error {} (line {}): {error}", entry.file, entry.line));
        }
        if let Some(warning) = entry.warning {
            lines.push(format!("Warning {} (line {}): {warning}", entry.file, entry.line));
        }
    }
    lines
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    passes: usize,
    fixed_point: bool,
    entries: &'a [ListEntry],
    labels: Vec<&'a Label>,
    equates: BTreeMap<&'a str, u16>,
}

pub fn render_json(assembly: &Assembly) -> serde_json::Result<String> {
    let report = Report {
        passes: assembly.passes,
        fixed_point: assembly.fixed_point,
        entries: &assembly.entries,
        labels: assembly.symbols.labels().collect(),
        equates: assembly.symbols.equates().collect(),
    };
    serde_json::to_string_pretty(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use organic_asm::Assembler;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_listing_shows_words_and_data_rows() {
        let assembly = Assembler::default().assemble("SET A, 5\n.dat 1, 2, 3, 4, 5, 6, 7, 8, 9", "t.asm");
        let text = render_text(&assembly.entries);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("[0x0000] 9801"));
        assert!(lines[0].ends_with("SET A, 5"));
        assert!(lines[2].ends_with("0001 0002 0003 0004 0005 0006 0007 0008"));
        assert!(lines[3].contains("[0x0009] 0009"));
    }

    #[test]
    fn diagnostics_name_file_and_line() {
        let assembly = Assembler::default().assemble("SET A, 1\nFOO B", "bad.asm");
        assert_eq!(diagnostics(&assembly.entries), vec!["Error bad.asm (line 2): Invalid opcode.".to_string()]);
    }

    #[test]
    fn json_report_has_labels() {
        let assembly = Assembler::default().assemble(":start SET PC, start", "j.asm");
        let json: serde_json::Value = serde_json::from_str(&render_json(&assembly).unwrap()).unwrap();
        assert_eq!(json["labels"][0]["name"], "start");
        assert_eq!(json["fixed_point"], true);
    }
}
