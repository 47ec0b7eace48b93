use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_PASSES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Directories searched for `.include <file>`.
    pub include_path: Vec<PathBuf>,
    /// Start every pass in `.longform` mode.
    pub force_long_literals: bool,
    pub max_passes: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            include_path: Vec::new(),
            force_long_literals: false,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl AssemblerConfig {
    /// Appends every directory of a `;`-separated list (the `ORGINCLUDE` format).
    pub fn with_include_list(mut self, list: &str) -> Self {
        self.include_path.extend(
            list.split(';')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_list_skips_empty_segments() {
        let cfg = AssemblerConfig::default().with_include_list("lib; ;/opt/dcpu/inc;");
        assert_eq!(cfg.include_path, vec![PathBuf::from("lib"), PathBuf::from("/opt/dcpu/inc")]);
        assert_eq!(cfg.max_passes, DEFAULT_MAX_PASSES);
    }
}
