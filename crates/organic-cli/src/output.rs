use anyhow::{Context, Result};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

pub fn to_bytes(words: &[u16], endian: Endian) -> Vec<u8> {
    words
        .iter()
        .flat_map(|w| match endian {
            Endian::Big => w.to_be_bytes(),
            Endian::Little => w.to_le_bytes(),
        })
        .collect()
}

/// Writes to `target`, or to stdout when it is `-`.
pub fn write_binary(target: &str, bytes: &[u8]) -> Result<()> {
    if target == "-" {
        let mut out = std::io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
        return Ok(());
    }
    std::fs::write(target, bytes).with_context(|| format!("writing {target}"))
}
