use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Diagnostic attached to a single listing entry. Assembly carries on past these.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[error("Invalid label name.")]
    InvalidLabel,
    #[error("Duplicate name.")]
    DuplicateName,
    #[error("Invalid opcode.")]
    InvalidOpcode,
    #[error("Invalid parameter.")]
    InvalidParameter,
    #[error("Illegal expression.")]
    IllegalExpression,
    #[error("Invalid preprocessor directive.")]
    InvalidDirective,
    #[error("Insufficient parameters.")]
    InsufficientParameters,
    #[error("Too many parameters.")]
    TooManyParameters,
    #[error("Uncoupled END, ELSEIF, ELIF, ELSE or ENDMACRO directive.")]
    UncoupledStatement,
    #[error("File not found.")]
    FileNotFound,
    #[error("Undefined reference.")]
    UndefinedReference,
    #[error("Attempted to .align to past address.")]
    AlignToPast,
    #[error("Invalid macro definition.")]
    InvalidMacroDefinition,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    #[error("Redundant statement.")]
    RedundantStatement,
    #[error("Attempted to assign to a literal.")]
    AssignToLiteral,
    #[error("Output runs past 0xFFFF; the address wrapped to 0.")]
    AddressWrap,
}

/// Failures that stop assembly as a whole rather than one line.
#[derive(thiserror::Error, Debug)]
pub enum AsmError {
    #[error("Suspected circular reference: no fixed point after {passes} passes, output may be inaccurate")]
    CircularReference { passes: usize },
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
