use organic_asm::{Assembler, Assembly, ErrorCode};
use pretty_assertions::assert_eq;

fn assemble(source: &str) -> Assembly {
    Assembler::default().assemble(source, "test.asm")
}

const PUSH2: &str = ".macro push2(x, y)\nSET PUSH, x\nSET PUSH, y\n.endmacro\n";

#[test]
fn expansion_substitutes_parameters() {
    let out = assemble(&format!("{PUSH2}push2(A, B)"));
    assert!(out.is_clean());
    assert_eq!(out.words(), vec![0x0301, 0x0701]);
}

#[test]
fn expanded_lines_report_the_call_site() {
    let out = assemble(&format!("{PUSH2}\nPUSH2(X, Y)"));
    let expanded: Vec<_> = out
        .entries
        .iter()
        .filter(|e| !e.output.is_empty())
        .map(|e| (e.code.as_str(), e.line))
        .collect();
    assert_eq!(expanded, vec![("SET PUSH, X", 6), ("SET PUSH, Y", 6)]);
    // definition lines are listed where they were written
    assert_eq!(out.entries[1].code, "SET PUSH, x");
    assert_eq!(out.entries[1].line, 2);
}

#[test]
fn arity_mismatch_falls_through_to_opcodes() {
    let out = assemble(&format!("{PUSH2}push2(A)"));
    assert_eq!(out.entries.last().and_then(|e| e.error), Some(ErrorCode::InvalidOpcode));
}

#[test]
fn brace_delimited_bodies() {
    let out = assemble(".macro zero(r) {\nSET r, 0\n}\nzero(X)");
    assert_eq!(out.words(), vec![0x8461]);
    let out = assemble(".macro clear\n{\nSET A, 0\n}\nclear()");
    assert_eq!(out.words(), vec![0x8401]);
}

#[test]
fn macros_can_call_macros() {
    let source = ".macro one(r)\nSET r, 1\n.endmacro\n.macro two(r, s)\none(r)\none(s)\n.endmacro\ntwo(A, B)";
    let out = assemble(source);
    assert_eq!(out.words(), vec![0x8801, 0x8821]);
    assert!(out.entries.iter().filter(|e| !e.output.is_empty()).all(|e| e.line == 8));
}

#[test]
fn definition_errors() {
    let out = assemble(".macro broken\nSET A, 1");
    assert_eq!(out.entries[0].error, Some(ErrorCode::UncoupledStatement));
    assert!(out.words().is_empty());

    let out = assemble(".macro 1bad\nSET A, 1\n.endmacro");
    assert_eq!(out.entries[0].error, Some(ErrorCode::InvalidMacroDefinition));
    assert!(out.words().is_empty());

    assert_eq!(assemble(".endmacro").entries[0].error, Some(ErrorCode::UncoupledStatement));
}
