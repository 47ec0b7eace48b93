pub mod listing;
pub mod output;

// Re-export for the binary and for tests
pub use listing::{diagnostics, render_json, render_text};
pub use output::{to_bytes, write_binary, Endian};
