use organic_asm::{AsmError, Assembler, AssemblerConfig, ErrorCode};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn quoted_include_resolves_next_to_the_including_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lib.asm"), "helper: SET A, 1\n").unwrap();
    let main = dir.path().join("main.asm");
    fs::write(&main, ".include \"lib.asm\"\nSET PC, helper\n").unwrap();

    let out = Assembler::default().assemble_file(&main).unwrap();
    assert!(out.is_clean());
    assert_eq!(out.words(), vec![0x8801, 0x8781]);
    let set = out.entries.iter().find(|e| e.code == "SET A, 1").unwrap();
    assert!(set.file.ends_with("lib.asm"));
    assert_eq!(set.line, 1);
    let jump = out.entries.iter().find(|e| e.code == "SET PC, helper").unwrap();
    assert_eq!(jump.line, 2);
}

#[test]
fn angle_include_searches_the_include_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("consts.inc"), ".equ WIDTH 32\n").unwrap();
    let config = AssemblerConfig::default().with_include_list(&dir.path().display().to_string());
    let out = Assembler::new(config).assemble(".include <consts.inc>\n.dat WIDTH", "main.asm");
    assert!(out.is_clean());
    assert_eq!(out.words(), vec![32]);
}

#[test]
fn binary_includes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data.bin"), [0x01u8, 0x02, 0x03]).unwrap();
    let main = dir.path().join("main.asm");
    fs::write(&main, ".incbin \"data.bin\"\n.incpack \"data.bin\"\n").unwrap();

    let out = Assembler::default().assemble_file(&main).unwrap();
    assert_eq!(out.words(), vec![1, 2, 3, 0x0201, 0x0003]);
}

#[test]
fn nested_includes_unwind_in_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("inner.asm"), ".dat 2\n").unwrap();
    fs::write(dir.path().join("outer.asm"), ".dat 1\n.include \"inner.asm\"\n.dat 3\n").unwrap();
    let main = dir.path().join("main.asm");
    fs::write(&main, ".include \"outer.asm\"\n.dat 4\n").unwrap();

    let out = Assembler::default().assemble_file(&main).unwrap();
    assert_eq!(out.words(), vec![1, 2, 3, 4]);
}

#[test]
fn unreadable_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = Assembler::default().assemble_file(dir.path().join("absent.asm")).unwrap_err();
    assert!(matches!(err, AsmError::Io { .. }));
}

#[test]
fn missing_include_does_not_stop_assembly() {
    let out = Assembler::default().assemble(".include <nowhere.inc>\n.dat 1", "main.asm");
    assert_eq!(out.entries[0].error, Some(ErrorCode::FileNotFound));
    assert_eq!(out.words(), vec![1]);
}
