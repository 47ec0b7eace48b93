use organic_asm::{Assembler, Assembly, ErrorCode};
use pretty_assertions::assert_eq;

fn assemble(source: &str) -> Assembly {
    Assembler::default().assemble(source, "test.asm")
}

fn address(out: &Assembly, name: &str) -> Option<u16> {
    out.symbols.label(name).map(|l| l.address)
}

#[test]
fn both_label_styles_bind_the_current_address() {
    let out = assemble(":loop SET A, 1\nSET B, loop");
    assert_eq!(out.words(), vec![0x8801, 0x8421]);
    assert_eq!(address(&out, "loop"), Some(0));

    let out = assemble("start:\n  SET A, 1\n:loop SUB A, 1\n  IFN A, 0\n    SET PC, loop");
    assert_eq!(out.words(), vec![0x8801, 0x8803, 0x8413, 0x8B81]);
    assert_eq!(address(&out, "start"), Some(0));
    assert_eq!(address(&out, "LOOP"), Some(1));
}

#[test]
fn duplicate_and_invalid_names() {
    let out = assemble("x: SET A, 1\nx: SET B, 1\n1bad: SET C, 1");
    let errors: Vec<_> = out.errors().map(|e| (e.code.as_str(), e.error)).collect();
    assert_eq!(
        errors,
        vec![("x:", Some(ErrorCode::DuplicateName)), ("1bad:", Some(ErrorCode::InvalidLabel))]
    );
    assert_eq!(address(&out, "x"), Some(0));
    assert_eq!(out.words().len(), 3);
}

#[test]
fn local_labels_are_scoped_to_the_last_global() {
    let source = "main:\n.wait: SET PC, .wait\nother:\n.wait: SET PC, .wait";
    let out = assemble(source);
    assert!(out.is_clean());
    assert_eq!(address(&out, "main_wait"), Some(0));
    assert_eq!(address(&out, "other_wait"), Some(1));
    assert_eq!(out.words(), vec![0x8781, 0x8B81]);
}

#[test]
fn relative_labels_walk_backward() {
    let out = assemble("SET A, 3\n$: SUB A, 1\nIFN A, 0\nSET PC, $-");
    assert_eq!(out.words(), vec![0x9001, 0x8803, 0x8413, 0x8B81]);
}

#[test]
fn relative_labels_walk_forward() {
    let out = assemble("SET PC, $+\nSET A, 1\n$: SET B, 1");
    assert!(out.fixed_point);
    assert_eq!(out.words(), vec![0x8F81, 0x8801, 0x8821]);
}

#[test]
fn equates_and_labels_share_one_namespace() {
    let out = assemble(".equ size 4\nsize: SET A, size");
    assert_eq!(out.entries[1].error, Some(ErrorCode::DuplicateName));
    assert_eq!(out.words(), vec![0x9401]);
}
