pub mod assembler;
pub mod config;
mod directives;
pub mod entry;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod plugin;
pub mod preprocess;
mod resolve;
pub mod symbols;
pub mod text;

pub mod isa {
    pub mod dcpu16; // DCPU-16 1.7
}

pub use assembler::{Assembler, Assembly};
pub use config::AssemblerConfig;
pub use entry::{CodeKind, ListEntry};
pub use error::{AsmError, ErrorCode, WarningCode};
pub use expr::ExpressionResult;
pub use plugin::{ExpressionExtension, LineContext, Plugin};
pub use symbols::SymbolTable;
