use organic_asm::{Assembler, LineContext, ListEntry, Plugin};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

/// Emits two marker words for `!words` lines and resolves `@magic`.
struct Magic {
    completed: Rc<Cell<usize>>,
}

impl Plugin for Magic {
    fn name(&self) -> &str {
        "magic"
    }

    fn handle_line(&mut self, line: &str, ctx: &LineContext<'_>) -> Option<ListEntry> {
        line.starts_with("!words")
            .then(|| ListEntry::new(line, ctx.file, ctx.line, ctx.address).with_output(vec![0xAAAA, 0xBBBB]))
    }

    fn evaluate_value(&self, token: &str) -> Option<u16> {
        (token == "@magic").then_some(0x42)
    }

    fn assembly_complete(&mut self, entries: &[ListEntry]) {
        self.completed.set(entries.len());
    }
}

#[test]
fn plugin_hooks_run_in_the_pipeline() {
    let completed = Rc::new(Cell::new(0));
    let mut asm = Assembler::default();
    asm.register_plugin(Box::new(Magic { completed: Rc::clone(&completed) }));
    let out = asm.assemble("!words\nhere: SET A, @magic", "test.asm");

    assert!(out.is_clean());
    assert_eq!(out.words(), vec![0xAAAA, 0xBBBB, 0x7C01, 0x0042]);
    assert_eq!(out.symbols.label("here").map(|l| l.address), Some(2));
    assert_eq!(completed.get(), 3);
}

#[test]
fn unclaimed_lines_take_the_normal_path() {
    let mut asm = Assembler::default();
    asm.register_plugin(Box::new(Magic { completed: Rc::new(Cell::new(0)) }));
    let out = asm.assemble("SET A, 1", "test.asm");
    assert_eq!(out.words(), vec![0x8801]);
}
