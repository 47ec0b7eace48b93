use crate::config::AssemblerConfig;
use crate::entry::{CodeKind, Instruction, ListEntry, Operand};
use crate::error::{AsmError, ErrorCode, WarningCode};
use crate::expr::{Evaluator, ExpressionResult, Position};
use crate::grammar::{Grammar, Match, TableKind};
use crate::isa::dcpu16::{short_literal, INDIRECT_LITERAL, LITERAL};
use crate::plugin::{ExpressionExtension, Hooks, LineContext, Plugin};
use crate::preprocess::{parse_call, Conditions, LineSource, Macro, SourceLine};
use crate::symbols::SymbolTable;
use crate::text::{collapse_whitespace, safe_find, split_word, trim_comments};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

const ADDRESS_SPACE: usize = 0x1_0000;

/// One assembly job. Build it, register hooks, then consume it with [`Assembler::assemble`].
#[derive(Debug)]
pub struct Assembler {
    pub(crate) config: AssemblerConfig,
    pub(crate) grammar: Rc<Grammar>,
    pub(crate) symbols: SymbolTable,
    pub(crate) hooks: Hooks,
    pub(crate) macros: Vec<Macro>,
    pub(crate) entries: Vec<ListEntry>,
    pub(crate) source: LineSource,
    pub(crate) conditions: Conditions,
    pub(crate) address: u16,
    pub(crate) listed: bool,
    pub(crate) force_long: bool,
}

/// Everything an assembly job produced.
#[derive(Debug)]
pub struct Assembly {
    pub entries: Vec<ListEntry>,
    pub symbols: SymbolTable,
    pub passes: usize,
    /// False when resolution hit the pass cap; output may be inaccurate.
    pub fixed_point: bool,
    pub error: Option<AsmError>,
}

impl Assembly {
    /// All output words in program order. `.org` gaps are not filled.
    pub fn words(&self) -> Vec<u16> {
        self.entries.iter().flat_map(|e| e.output.iter().copied()).collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries.iter().filter(|e| e.error.is_some())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries.iter().filter(|e| e.warning.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.errors().next().is_none()
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self::build(config, Rc::new(Grammar::dcpu16()))
    }

    /// Fresh assembler sharing an already loaded grammar.
    pub fn with_grammar(grammar: Rc<Grammar>) -> Self {
        Self::build(AssemblerConfig::default(), grammar)
    }

    fn build(config: AssemblerConfig, grammar: Rc<Grammar>) -> Self {
        let force_long = config.force_long_literals;
        Self {
            config,
            grammar,
            symbols: SymbolTable::new(),
            hooks: Hooks::default(),
            macros: Vec::new(),
            entries: Vec::new(),
            source: LineSource::default(),
            conditions: Conditions::default(),
            address: 0,
            listed: true,
            force_long,
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        debug!(plugin = plugin.name(), "register plugin");
        self.hooks.register_plugin(plugin);
    }

    pub fn register_extension(&mut self, name: &str, extension: ExpressionExtension) {
        self.hooks.register_extension(name, extension);
    }

    pub fn define_equate(&mut self, name: &str, value: u16) -> Result<(), ErrorCode> {
        self.symbols.define_equate(name, value)
    }

    /// Evaluates `expr` against the symbols defined so far, at address 0.
    pub fn evaluate(&self, expr: &str) -> ExpressionResult {
        let position = Position::default();
        Evaluator::new(&self.symbols, &self.hooks, &self.grammar, &position).evaluate(expr)
    }

    pub fn assemble_file(self, path: impl AsRef<Path>) -> Result<Assembly, AsmError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| AsmError::Io { path: path.to_path_buf(), source })?;
        Ok(self.assemble(&source, &path.display().to_string()))
    }

    pub fn assemble(mut self, source: &str, file: &str) -> Assembly {
        info!(file, "assembling");
        self.source = LineSource::new(source, file);
        while let Some(line) = self.source.next_line() {
            self.process_line(&line);
        }
        let (passes, fixed_point) = self.resolve();
        let error = if fixed_point {
            None
        } else {
            warn!(passes, "no fixed point reached");
            Some(AsmError::CircularReference { passes })
        };
        self.hooks.assembly_complete(&self.entries);
        Assembly { entries: self.entries, symbols: self.symbols, passes, fixed_point, error }
    }

    fn process_line(&mut self, line: &SourceLine) {
        let text = collapse_whitespace(trim_comments(&line.text));
        if text.is_empty() {
            return;
        }
        trace!(file = %line.file, line = line.line, text = %text, "line");
        if !self.conditions.active() {
            if is_conditional(&text) {
                self.directive(&text, line);
            }
            return;
        }

        let ctx = LineContext { file: &line.file, line: line.line, address: self.address };
        if let Some(mut entry) = self.hooks.handle_line(&text, &ctx) {
            entry.address = self.address;
            entry.listed = self.listed;
            self.push(entry);
            return;
        }

        let rest = self.take_label(&text, line);
        if rest.is_empty() {
            return;
        }
        let rest = normalize(rest);
        if rest.starts_with('.') || rest.starts_with('#') {
            self.directive(&rest, line);
        } else if !self.expand_macro(&rest, line) {
            self.instruction(&rest, line);
        }
    }

    /// Binds a leading `:name` or `name:` label and returns what follows it.
    fn take_label<'t>(&mut self, text: &'t str, line: &SourceLine) -> &'t str {
        let Some(colon) = safe_find(text, ':') else {
            return text;
        };
        let (name, rest, code) = match text.strip_prefix(':') {
            Some(stripped) => {
                let (name, rest) = split_word(stripped);
                (name, rest, format!(":{name}"))
            }
            None => (text[..colon].trim(), text[colon + 1..].trim(), text[..=colon].to_string()),
        };

        let mut entry = self.entry(&code, line);
        let position = self.entries.len();
        if name == "$" {
            debug!(root = line.root, address = self.address, "relative label");
            self.symbols.define_relative(line.root, self.address, position);
        } else {
            match self.symbols.define_label(name, self.address, position) {
                Ok(stored) => debug!(label = %stored, address = self.address, "label"),
                Err(code) => entry.error = Some(code),
            }
        }
        self.entries.push(entry);
        rest
    }

    fn expand_macro(&mut self, text: &str, line: &SourceLine) -> bool {
        let Some((name, args)) = parse_call(text) else {
            return false;
        };
        let Some(found) = self
            .macros
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name) && m.params.len() == args.len())
        else {
            return false;
        };
        let body = found.expand(&args);
        debug!(name = %found.name, lines = body.len(), "expand macro");
        let entry = self.entry(text, line);
        self.entries.push(entry);
        self.source.push_macro(body, &line.file, line.line);
        true
    }

    fn instruction(&mut self, text: &str, line: &SourceLine) {
        let mut entry = self.entry(text, line);
        let matched = self
            .grammar
            .match_text(TableKind::Opcode, text)
            .map(|m| (CodeKind::BasicInstruction, m))
            .or_else(|| self.grammar.match_text(TableKind::NonBasic, text).map(|m| (CodeKind::NonBasicInstruction, m)));
        let Some((kind, opcode)) = matched else {
            entry.error = Some(ErrorCode::InvalidOpcode);
            self.push(entry);
            return;
        };
        entry.kind = kind;

        let operand = |text: Option<&str>| text.and_then(|t| self.grammar.match_text(TableKind::Value, t));
        let a = operand(opcode.a.as_deref());
        let b = match kind {
            CodeKind::BasicInstruction => operand(opcode.b.as_deref()).map(Some),
            _ => Some(None),
        };
        let (Some(a), Some(b)) = (a, b) else {
            entry.error = Some(ErrorCode::InvalidParameter);
            self.push(entry);
            return;
        };
        if let Some(b) = &b {
            entry.warning = operand_warning(&opcode, &a, b);
        }

        let position = entry.position.clone();
        let mut instruction = Instruction {
            opcode: opcode.code,
            a: self.operand(a, &position),
            b: b.map(|b| self.operand(b, &position)),
        };
        if instruction.a.code == LITERAL && !self.force_long {
            instruction.a.short = instruction.a.resolved && short_literal(instruction.a.value).is_some();
        }
        entry.output = instruction.encode();
        entry.instruction = Some(instruction);
        self.push(entry);
    }

    fn operand(&mut self, matched: Match, position: &Position) -> Operand {
        let mut operand = Operand { code: matched.code, literal: matched.literal, value: 0, short: false, resolved: false };
        if let Some(literal) = operand.literal.clone() {
            let result = self.eval(&literal, position);
            operand.resolved = result.successful;
            operand.value = result.value;
        }
        operand
    }

    pub(crate) fn entry(&self, code: &str, line: &SourceLine) -> ListEntry {
        let mut entry = ListEntry::new(code, line.file.as_str(), line.line, self.address);
        entry.listed = self.listed;
        entry.position = Position {
            address: self.address,
            root_line: line.root,
            scope: self.symbols.scope().map(str::to_string),
        };
        entry
    }

    /// Appends `entry` and advances the address past its output.
    pub(crate) fn push(&mut self, mut entry: ListEntry) {
        if usize::from(self.address) + entry.output.len() > ADDRESS_SPACE {
            warn!(file = %entry.file, line = entry.line, "address wrapped");
            entry.warning.get_or_insert(WarningCode::AddressWrap);
        }
        self.address = self.address.wrapping_add(entry.size());
        self.entries.push(entry);
    }

    /// Evaluates and records every referenced name.
    pub(crate) fn eval(&mut self, expr: &str, position: &Position) -> ExpressionResult {
        let result = Evaluator::new(&self.symbols, &self.hooks, &self.grammar, position).evaluate(expr);
        self.symbols.mark_referenced(&result.references);
        result
    }

    /// For contexts that need a value right now (`.org`, `.if`, lengths).
    pub(crate) fn eval_immediate(&mut self, expr: &str, position: &Position) -> Result<u16, ErrorCode> {
        let result = self.eval(expr, position);
        result.resolved().ok_or_else(|| result.failure(&self.symbols))
    }
}

fn is_conditional(text: &str) -> bool {
    let Some(body) = text.strip_prefix('.').or_else(|| text.strip_prefix('#')) else {
        return false;
    };
    let name = split_word(body).0.to_ascii_lowercase();
    matches!(name.as_str(), "if" | "ifdef" | "ifndef" | "elseif" | "elif" | "else" | "end" | "endif")
}

/// TASM `name .equ value` becomes `.equ name value`; a bare `dat` gets its dot.
fn normalize(text: &str) -> String {
    let (first, rest) = split_word(text);
    let (second, tail) = split_word(rest);
    if !first.starts_with(['.', '#']) && second.eq_ignore_ascii_case(".equ") {
        return format!(".equ {first} {tail}").trim_end().to_string();
    }
    if first.eq_ignore_ascii_case("dat") {
        return format!(".{text}");
    }
    text.to_string()
}

fn operand_warning(opcode: &Match, a: &Match, b: &Match) -> Option<WarningCode> {
    let is_test = opcode.pattern.to_ascii_uppercase().starts_with("IF");
    if b.code == LITERAL && !is_test {
        Some(WarningCode::AssignToLiteral)
    } else if a.code == b.code && a.code != INDIRECT_LITERAL {
        Some(WarningCode::RedundantStatement)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasm_equ_and_bare_dat() {
        assert_eq!(normalize("size .equ 4"), ".equ size 4");
        assert_eq!(normalize("DAT 1, 2"), ".DAT 1, 2");
        assert_eq!(normalize("SET A, 1"), "SET A, 1");
    }

    #[test]
    fn conditionals_are_recognised() {
        assert!(is_conditional(".ifdef X"));
        assert!(is_conditional("#ENDIF"));
        assert!(!is_conditional(".dat 1"));
    }
}
