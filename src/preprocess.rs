//! Line supply, conditional assembly state and macro templates.
//!
//! Includes and macro expansions are pushed as frames on a work stack instead
//! of being spliced into one big line array; the top frame is read until it
//! runs dry, then popped.

use crate::error::ErrorCode;
use crate::symbols::is_valid_name;
use crate::text::{safe_find, safe_split};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    File,
    Macro,
}

#[derive(Debug)]
struct Frame {
    file: String,
    kind: FrameKind,
    lines: Vec<String>,
    cursor: usize,
    /// Reported line number for macro frames (the invoking line).
    origin_line: usize,
}

/// A raw line as handed out by [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceLine {
    pub text: String,
    pub file: String,
    pub line: usize,
    /// Increases with every line handed out, across files and expansions.
    pub root: usize,
}

#[derive(Debug, Default)]
pub(crate) struct LineSource {
    frames: Vec<Frame>,
    root: usize,
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

impl LineSource {
    pub fn new(source: &str, file: &str) -> Self {
        let mut src = Self::default();
        src.push_file(file, source);
        src
    }

    pub fn push_file(&mut self, file: &str, contents: &str) {
        debug!(file, depth = self.frames.len(), "enter file");
        self.frames.push(Frame {
            file: file.to_string(),
            kind: FrameKind::File,
            lines: split_lines(contents),
            cursor: 0,
            origin_line: 0,
        });
    }

    pub fn push_macro(&mut self, body: Vec<String>, file: &str, origin_line: usize) {
        self.frames.push(Frame {
            file: file.to_string(),
            kind: FrameKind::Macro,
            lines: body,
            cursor: 0,
            origin_line,
        });
    }

    /// Directory of the innermost file frame, for resolving relative includes.
    pub fn current_file(&self) -> Option<&str> {
        self.frames.iter().rev().find(|f| f.kind == FrameKind::File).map(|f| f.file.as_str())
    }

    /// Next line from the top frame, popping exhausted frames.
    pub fn next_line(&mut self) -> Option<SourceLine> {
        loop {
            let frame = self.frames.last()?;
            if frame.cursor < frame.lines.len() {
                return self.next_in_frame();
            }
            if let Some(done) = self.frames.pop() {
                if done.kind == FrameKind::File {
                    debug!(file = %done.file, "leave file");
                }
            }
        }
    }

    /// Next line of the top frame only; `None` when that frame is exhausted.
    pub fn next_in_frame(&mut self) -> Option<SourceLine> {
        let frame = self.frames.last_mut()?;
        let text = frame.lines.get(frame.cursor)?.clone();
        frame.cursor += 1;
        self.root += 1;
        let line = match frame.kind {
            FrameKind::File => frame.cursor,
            FrameKind::Macro => frame.origin_line,
        };
        Some(SourceLine { text, file: frame.file.clone(), line, root: self.root })
    }
}

#[derive(Debug, Clone, Copy)]
struct Level {
    active: bool,
    /// Some branch of this if/elseif/else chain has already been taken.
    taken: bool,
    parent_active: bool,
}

/// Conditional assembly stack. The bottom level is an always-active sentinel.
#[derive(Debug)]
pub(crate) struct Conditions {
    levels: Vec<Level>,
}

impl Default for Conditions {
    fn default() -> Self {
        Self { levels: vec![Level { active: true, taken: true, parent_active: true }] }
    }
}

impl Conditions {
    pub fn active(&self) -> bool {
        self.levels.last().map_or(true, |l| l.active)
    }

    pub fn push(&mut self, condition: bool) {
        let parent_active = self.active();
        let active = parent_active && condition;
        self.levels.push(Level { active, taken: active, parent_active });
    }

    fn top(&mut self) -> Result<&mut Level, ErrorCode> {
        if self.levels.len() < 2 {
            return Err(ErrorCode::UncoupledStatement);
        }
        self.levels.last_mut().ok_or(ErrorCode::UncoupledStatement)
    }

    /// Whether an `elseif` here would need its condition evaluated.
    pub fn wants_branch(&mut self) -> Result<bool, ErrorCode> {
        let top = self.top()?;
        Ok(top.parent_active && !top.taken)
    }

    /// `elseif` / `else`: activates this branch only if none was taken before.
    pub fn branch(&mut self, condition: bool) -> Result<(), ErrorCode> {
        let top = self.top()?;
        top.active = top.parent_active && !top.taken && condition;
        top.taken |= top.active;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), ErrorCode> {
        self.top()?;
        self.levels.pop();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<String>,
}

impl Macro {
    /// Substitutes each parameter's text with its argument, in declaration order.
    pub fn expand(&self, args: &[&str]) -> Vec<String> {
        self.body
            .iter()
            .map(|line| {
                self.params
                    .iter()
                    .zip(args)
                    .fold(line.clone(), |acc, (param, arg)| acc.replace(param.as_str(), arg.trim()))
            })
            .collect()
    }
}

/// `name(a, b)` or `name`, with an optional trailing `{`.
pub(crate) fn parse_macro_header(header: &str) -> Result<(String, Vec<String>), ErrorCode> {
    let header = header.trim();
    let header = header.strip_suffix('{').unwrap_or(header).trim();
    let Some(open) = header.find('(') else {
        return if is_valid_name(header) {
            Ok((header.to_string(), Vec::new()))
        } else {
            Err(ErrorCode::InvalidMacroDefinition)
        };
    };
    let name = header[..open].trim();
    let params = header[open + 1..].strip_suffix(')').ok_or(ErrorCode::InvalidMacroDefinition)?;
    if !is_valid_name(name) {
        return Err(ErrorCode::InvalidMacroDefinition);
    }
    if params.trim().is_empty() {
        return Ok((name.to_string(), Vec::new()));
    }
    let params: Vec<String> = params.split(',').map(|p| p.trim().to_string()).collect();
    let well_formed = params
        .iter()
        .all(|p| p.starts_with(|c: char| c.is_ascii_alphabetic()) && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !well_formed {
        return Err(ErrorCode::InvalidMacroDefinition);
    }
    Ok((name.to_string(), params))
}

/// Splits a call-style line `name(args)` into the name and its arguments.
pub(crate) fn parse_call(line: &str) -> Option<(&str, Vec<&str>)> {
    let open = safe_find(line, '(')?;
    let name = line[..open].trim();
    let inner = line[open + 1..].trim_end().strip_suffix(')')?;
    if !is_valid_name(name) {
        return None;
    }
    let args = if inner.trim().is_empty() { Vec::new() } else { safe_split(inner, ',') };
    Some((name, args))
}
