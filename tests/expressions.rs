use organic_asm::expr::number;
use organic_asm::{Assembler, SymbolTable};
use pretty_assertions::assert_eq;

fn eval(expr: &str) -> Option<u16> {
    Assembler::default().evaluate(expr).resolved()
}

#[test]
fn numeric_literals() {
    assert_eq!(eval("0x10"), Some(16));
    assert_eq!(eval("0x1_0"), eval("0x10"));
    assert_eq!(eval("0b1010"), Some(10));
    assert_eq!(eval("0o17"), Some(15));
    assert_eq!(eval("1_000"), Some(1000));
    assert_eq!(eval("70000"), None);
}

#[test]
fn operators_split_in_table_order() {
    assert_eq!(eval("2*3+1"), Some(8));
    assert_eq!(eval("1+2*3"), Some(9));
    assert_eq!(eval("8/2*2"), Some(8));
    assert_eq!(eval("1-2+3"), Some(2));
    assert_eq!(eval("-1+2"), Some(1));
    assert_eq!(eval("10-2-3"), Some(11));
    assert_eq!(eval("1<<2*2"), Some(16));
    assert_eq!(eval("(2*3)+1"), Some(7));
    assert_eq!(eval("(1+2)*(3+1)"), Some(12));
}

#[test]
fn arithmetic_wraps_at_sixteen_bits() {
    assert_eq!(eval("0xFFFF+2"), Some(1));
    assert_eq!(eval("-1"), Some(0xFFFF));
    assert_eq!(eval("3*-1"), Some(0xFFFD));
    assert_eq!(eval("~0"), Some(0xFFFF));
    assert_eq!(eval("1<<16"), Some(0));
    assert_eq!(eval("0x10 >> 2"), Some(4));
}

#[test]
fn division_by_zero_fails() {
    assert_eq!(eval("5/0"), None);
    assert_eq!(eval("7%0"), None);
    assert_eq!(eval("7%4"), Some(3));
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(eval("3 == 3"), Some(1));
    assert_eq!(eval("3 != 3"), Some(0));
    assert_eq!(eval("3 <> 4"), Some(1));
    assert_eq!(eval("3 >= 2"), Some(1));
    assert_eq!(eval("5 <= 4"), Some(0));
    assert_eq!(eval("2 && 0"), Some(0));
    assert_eq!(eval("2 || 0"), Some(1));
    assert_eq!(eval("1 ^^ 1"), Some(0));
    assert_eq!(eval("abc === ABC"), Some(1));
    assert_eq!(eval("a !== b"), Some(1));
}

#[test]
fn character_and_boolean_tokens() {
    assert_eq!(eval("'A'"), Some(65));
    assert_eq!(eval("'\\n'"), Some(10));
    assert_eq!(eval("'+'+1"), Some(44));
    assert_eq!(eval("true"), Some(1));
    assert_eq!(eval("FALSE"), Some(0));
}

#[test]
fn instruction_literal() {
    assert_eq!(eval("{SET A, 1}"), Some(0x8801));
    assert_eq!(eval("{BOGUS}"), None);
}

#[test]
fn unresolved_symbols_are_recorded() {
    let result = Assembler::default().evaluate("missing+1");
    assert!(!result.successful);
    assert!(result.references.contains("missing"));

    let here = Assembler::default().evaluate("$");
    assert_eq!(here.resolved(), Some(0));
    assert!(here.relocatable);
}

#[test]
fn equates_are_case_insensitive() {
    let mut asm = Assembler::default();
    asm.define_equate("Size", 4).unwrap();
    assert_eq!(asm.evaluate("SIZE*2").resolved(), Some(8));
    assert!(!asm.evaluate("size").relocatable);
}

#[test]
fn extensions_are_called_by_name() {
    let mut asm = Assembler::default();
    asm.register_extension(
        "double",
        Box::new(|arg: &str, _: &SymbolTable| number(arg).map(|v| v.wrapping_mul(2))),
    );
    assert_eq!(asm.evaluate("double(21)+1").resolved(), Some(43));
    assert_eq!(asm.evaluate("isref(nothing)").resolved(), Some(0));
}
