use crate::assembler::Assembler;
use crate::entry::{ListEntry, Marker};
use crate::error::ErrorCode;
use crate::preprocess::{parse_macro_header, Macro, SourceLine};
use crate::text::{collapse_whitespace, safe_split, split_word, strip_string, trim_comments, unescape};
use std::iter::once;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One comma-separated item of a data directive.
enum Datum<'a> {
    Text(String),
    Expr(&'a str),
    Bad,
}

fn data_items(args: &str) -> Vec<Datum<'_>> {
    safe_split(args, ',')
        .into_iter()
        .map(str::trim)
        .map(|item| {
            if item.starts_with('"') {
                strip_string(item).and_then(unescape).map_or(Datum::Bad, Datum::Text)
            } else if item.is_empty() {
                Datum::Bad
            } else {
                Datum::Expr(item)
            }
        })
        .collect()
}

impl Assembler {
    /// Handles a `.name args` or `#name args` line.
    pub(crate) fn directive(&mut self, text: &str, line: &SourceLine) {
        let (name, args) = split_word(&text[1..]);
        let name = name.to_ascii_lowercase();
        let mut entry = self.entry(text, line);
        let result = match name.as_str() {
            "if" | "ifdef" | "ifndef" | "elseif" | "elif" | "else" | "end" | "endif" => {
                self.conditional(&name, args, &entry)
            }
            _ if !self.conditions.active() => return,
            "equ" | "equate" | "define" => self.equate(args, &entry),
            "org" => self.origin(args, &mut entry),
            "align" => self.align(args, &mut entry),
            "reserve" => self
                .length(args, &entry)
                .map(|n| entry.output = vec![0; usize::from(n)]),
            "pad" | "fill" => self.pad(args, &mut entry),
            "dat" | "dw" => self.data(args, &mut entry),
            "ascii" | "asciiz" | "asciic" | "asciip" => ascii(&name, args, &mut entry),
            "include" => return self.include(args, entry),
            "incbin" | "incpack" => self.binary(&name, args, &mut entry),
            "macro" => return self.define_macro(args, entry, line),
            "endmacro" => Err(ErrorCode::UncoupledStatement),
            "echo" => return self.echo(args, entry),
            "ref" => self.reference(args),
            "list" | "nolist" => {
                self.listed = name == "list";
                entry.listed = self.listed;
                Ok(())
            }
            "longform" | "shortform" => {
                self.force_long = name == "longform";
                entry.marker = if self.force_long { Marker::LongForm } else { Marker::ShortForm };
                Ok(())
            }
            "region" | "endregion" => Ok(()),
            _ => Err(ErrorCode::InvalidDirective),
        };
        if let Err(code) = result {
            entry.error = Some(code);
        }
        self.push(entry);
    }

    fn conditional(&mut self, name: &str, args: &str, entry: &ListEntry) -> Result<(), ErrorCode> {
        match name {
            "if" | "ifdef" | "ifndef" => {
                if !self.conditions.active() {
                    self.conditions.push(false);
                    return Ok(());
                }
                let condition = match name {
                    "if" => self.condition(args, entry),
                    _ => single_name(args).map(|n| self.symbols.is_defined(n) == (name == "ifdef")),
                };
                // a broken condition still opens a block so its `.end` pairs up
                self.conditions.push(matches!(condition, Ok(true)));
                condition.map(|_| ())
            }
            "elseif" | "elif" => {
                if !self.conditions.wants_branch()? {
                    return self.conditions.branch(false);
                }
                let condition = self.condition(args, entry);
                self.conditions.branch(matches!(condition, Ok(true)))?;
                condition.map(|_| ())
            }
            "else" => self.conditions.branch(true),
            _ => self.conditions.pop(),
        }
    }

    fn condition(&mut self, args: &str, entry: &ListEntry) -> Result<bool, ErrorCode> {
        if args.is_empty() {
            return Err(ErrorCode::InsufficientParameters);
        }
        self.eval_immediate(args, &entry.position).map(|v| v != 0)
    }

    fn equate(&mut self, args: &str, entry: &ListEntry) -> Result<(), ErrorCode> {
        let (name, expr) = split_word(args);
        if name.is_empty() {
            return Err(ErrorCode::InsufficientParameters);
        }
        if self.symbols.is_defined(name) {
            return Err(ErrorCode::DuplicateName);
        }
        let value = if expr.is_empty() { 1 } else { self.eval_immediate(expr, &entry.position)? };
        debug!(name, value, "equate");
        self.symbols.define_equate(name, value)
    }

    fn origin(&mut self, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
        if args.is_empty() {
            return Err(ErrorCode::InsufficientParameters);
        }
        let address = self.eval_immediate(args, &entry.position)?;
        self.address = address;
        entry.address = address;
        entry.marker = Marker::Origin;
        Ok(())
    }

    fn align(&mut self, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
        let target = self.length(args, entry)?;
        entry.marker = Marker::Align { target };
        if self.address > target {
            return Err(ErrorCode::AlignToPast);
        }
        entry.output = vec![0; usize::from(target - self.address)];
        Ok(())
    }

    /// A single immediate value argument.
    fn length(&mut self, args: &str, entry: &ListEntry) -> Result<u16, ErrorCode> {
        match safe_split(args, ',').as_slice() {
            [one] if one.trim().is_empty() => Err(ErrorCode::InsufficientParameters),
            [one] => self.eval_immediate(one, &entry.position),
            _ => Err(ErrorCode::TooManyParameters),
        }
    }

    fn pad(&mut self, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
        let parts: Vec<&str> = safe_split(args, ',').into_iter().map(str::trim).filter(|p| !p.is_empty()).collect();
        let [length, value] = parts.as_slice() else {
            return Err(match parts.len() {
                0 | 1 => ErrorCode::InsufficientParameters,
                _ => ErrorCode::TooManyParameters,
            });
        };
        let length = usize::from(self.eval_immediate(length, &entry.position)?);
        let fill = self.eval(value, &entry.position);
        if !fill.successful || fill.relocatable {
            entry.postponed.extend((0..length).map(|i| (i, value.to_string())));
        }
        entry.output = vec![fill.value; length];
        Ok(())
    }

    fn data(&mut self, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
        if args.is_empty() {
            return Err(ErrorCode::InsufficientParameters);
        }
        let mut result = Ok(());
        for item in data_items(args) {
            match item {
                Datum::Text(text) => entry.output.extend(words(&text)),
                Datum::Expr(expr) => {
                    let value = self.eval(expr, &entry.position);
                    if !value.successful || value.relocatable {
                        entry.postponed.insert(entry.output.len(), expr.to_string());
                    }
                    entry.output.push(value.value);
                }
                Datum::Bad => result = Err(ErrorCode::IllegalExpression),
            }
        }
        result
    }

    fn include(&mut self, args: &str, mut entry: ListEntry) {
        match self.locate(args).and_then(|path| Some((std::fs::read_to_string(&path).ok()?, path))) {
            Some((contents, path)) => {
                self.push(entry);
                self.source.push_file(&path.display().to_string(), &contents);
            }
            None => {
                entry.error = Some(ErrorCode::FileNotFound);
                self.push(entry);
            }
        }
    }

    fn binary(&mut self, name: &str, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
        let bytes = self
            .locate(args)
            .and_then(|path| std::fs::read(path).ok())
            .ok_or(ErrorCode::FileNotFound)?;
        entry.output = match name {
            "incpack" => bytes
                .chunks(2)
                .map(|pair| u16::from(pair[0]) | pair.get(1).map_or(0, |&hi| u16::from(hi) << 8))
                .collect(),
            _ => bytes.into_iter().map(u16::from).collect(),
        };
        debug!(file = args, words = entry.output.len(), "binary include");
        Ok(())
    }

    /// `"file"` is looked up as given, then next to the including file;
    /// `<file>` is searched along the include path.
    fn locate(&self, target: &str) -> Option<PathBuf> {
        let target = target.trim();
        if let Some(name) = target.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            return self
                .config
                .include_path
                .iter()
                .map(|dir| dir.join(name))
                .chain(once(PathBuf::from(name)))
                .find(|p| p.is_file());
        }
        let name = target.trim_matches(|c| c == '"' || c == '\'');
        if name.is_empty() {
            return None;
        }
        let sibling = self
            .source
            .current_file()
            .and_then(|f| Path::new(f).parent())
            .map(|dir| dir.join(name));
        once(PathBuf::from(name)).chain(sibling).find(|p| p.is_file())
    }

    fn define_macro(&mut self, header: &str, mut entry: ListEntry, line: &SourceLine) {
        let parsed = parse_macro_header(header);
        let mut body = Vec::new();
        let mut end = None;
        while let Some(next) = self.source.next_in_frame() {
            let text = collapse_whitespace(trim_comments(&next.text));
            let lower = text.to_ascii_lowercase();
            if lower == ".endmacro" || lower == "#endmacro" || text == "}" {
                end = Some((text, next.line));
                break;
            }
            if !text.is_empty() && text != "{" {
                body.push((text, next.line));
            }
        }
        let Some((end_text, end_line)) = end else {
            entry.error = Some(ErrorCode::UncoupledStatement);
            self.push(entry);
            return;
        };

        if let Err(code) = &parsed {
            entry.error = Some(*code);
        }
        self.push(entry);
        for (text, number) in body.iter().chain(once(&(end_text, end_line))) {
            let mut listed = ListEntry::new(text.as_str(), line.file.as_str(), *number, self.address);
            listed.listed = self.listed;
            self.push(listed);
        }
        if let Ok((name, params)) = parsed {
            debug!(name = %name, params = params.len(), lines = body.len(), "define macro");
            let body = body.into_iter().map(|(text, _)| text).collect();
            self.macros.push(Macro { name, params, body });
        }
    }

    fn echo(&mut self, args: &str, mut entry: ListEntry) {
        if args.is_empty() {
            entry.error = Some(ErrorCode::InsufficientParameters);
            self.push(entry);
            return;
        }
        let mut message = String::new();
        for item in data_items(args) {
            match item {
                Datum::Text(text) => message.push_str(&text),
                Datum::Expr(expr) => match self.eval(expr, &entry.position).resolved() {
                    Some(value) => message.push_str(&format!("0x{value:X}")),
                    None => entry.error = Some(ErrorCode::IllegalExpression),
                },
                Datum::Bad => entry.error = Some(ErrorCode::IllegalExpression),
            }
        }
        info!(file = %entry.file, line = entry.line, "{message}");
        let mut echoed = ListEntry::new(message, entry.file.as_str(), entry.line, self.address);
        echoed.listed = entry.listed;
        self.push(entry);
        self.push(echoed);
    }

    fn reference(&mut self, args: &str) -> Result<(), ErrorCode> {
        let name = single_name(args)?.to_string();
        self.symbols.mark_referenced(once(&name));
        Ok(())
    }
}

/// One word per decoded character; `\xHH` escapes stay a single word.
fn words(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.chars().map(|c| c as u16)
}

fn single_name(args: &str) -> Result<&str, ErrorCode> {
    match split_word(args) {
        ("", _) => Err(ErrorCode::InsufficientParameters),
        (name, "") => Ok(name),
        _ => Err(ErrorCode::TooManyParameters),
    }
}

/// `.ascii` family: strings only, `z`/`c` add a terminator, `p` a length prefix.
fn ascii(name: &str, args: &str, entry: &mut ListEntry) -> Result<(), ErrorCode> {
    if args.is_empty() {
        return Err(ErrorCode::InsufficientParameters);
    }
    let mut result = Ok(());
    for item in data_items(args) {
        let Datum::Text(text) = item else {
            result = Err(ErrorCode::IllegalExpression);
            continue;
        };
        if name == "asciip" {
            let Ok(length) = u16::try_from(text.chars().count()) else {
                result = Err(ErrorCode::IllegalExpression);
                continue;
            };
            entry.output.push(length);
        }
        entry.output.extend(words(&text));
        if name == "asciiz" || name == "asciic" {
            entry.output.push(0);
        }
    }
    result
}
