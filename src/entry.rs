use crate::error::{ErrorCode, WarningCode};
use crate::expr::Position;
use crate::isa::dcpu16::{encode_basic, encode_nonbasic, short_literal};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeKind {
    Directive,
    BasicInstruction,
    NonBasicInstruction,
}

/// One operand slot of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Operand {
    pub code: u8,
    /// Expression text for the literal forms (`0x1E`, `0x1F`, `[R+lit]`, `PICK lit`).
    pub literal: Option<String>,
    /// Last resolved literal value.
    pub value: u16,
    pub resolved: bool,
    /// Encoded inline as a short literal, no extra word.
    pub short: bool,
}

impl Operand {
    pub fn words(&self) -> u16 {
        u16::from(self.literal.is_some() && !self.short)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Instruction {
    pub opcode: u8,
    pub a: Operand,
    /// Absent for non-basic instructions.
    pub b: Option<Operand>,
}

impl Instruction {
    pub fn size(&self) -> u16 {
        1 + self.a.words() + self.b.as_ref().map_or(0, Operand::words)
    }

    /// Instruction word, then the A literal word, then the B literal word.
    pub fn encode(&self) -> Vec<u16> {
        let a_code = match self.a.short {
            true => short_literal(self.a.value).unwrap_or(self.a.code),
            false => self.a.code,
        };
        let mut words = vec![match &self.b {
            Some(b) => encode_basic(self.opcode, b.code, a_code),
            None => encode_nonbasic(self.opcode, a_code),
        }];
        for operand in std::iter::once(&self.a).chain(self.b.as_ref()) {
            if operand.words() == 1 {
                words.push(operand.value);
            }
        }
        words
    }
}

/// Role an entry plays for the resolver when addresses move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Marker {
    #[default]
    None,
    Origin,
    Align { target: u16 },
    LongForm,
    ShortForm,
}

/// Outcome of one processed source line.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub code: String,
    pub file: String,
    pub line: usize,
    pub kind: CodeKind,
    pub output: Vec<u16>,
    pub address: u16,
    pub error: Option<ErrorCode>,
    pub warning: Option<WarningCode>,
    pub listed: bool,
    /// Output word index to expression text, re-evaluated on every resolver pass.
    #[serde(skip)]
    pub(crate) postponed: BTreeMap<usize, String>,
    #[serde(skip)]
    pub(crate) instruction: Option<Instruction>,
    #[serde(skip)]
    pub(crate) position: Position,
    #[serde(skip)]
    pub(crate) marker: Marker,
}

impl ListEntry {
    pub fn new(code: impl Into<String>, file: impl Into<String>, line: usize, address: u16) -> Self {
        Self {
            code: code.into(),
            file: file.into(),
            line,
            kind: CodeKind::Directive,
            output: Vec::new(),
            address,
            error: None,
            warning: None,
            listed: true,
            postponed: BTreeMap::new(),
            instruction: None,
            position: Position::default(),
            marker: Marker::None,
        }
    }

    pub fn with_output(mut self, output: Vec<u16>) -> Self {
        self.output = output;
        self
    }

    /// Words this entry occupies in the address space.
    pub fn size(&self) -> u16 {
        self.output.len() as u16
    }

    pub fn has_postponed(&self) -> bool {
        !self.postponed.is_empty()
    }
}
