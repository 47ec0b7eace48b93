//! Fixed-point resolution after the first pass.
//!
//! Every pass re-evaluates deferred data expressions and instruction literals,
//! re-picks the short or long form of each operand-A literal and shifts the
//! following entries (and their labels) when an instruction changes size.
//! Shifts stop at the next `.org`; an `.align` absorbs them when it can.

use crate::assembler::Assembler;
use crate::entry::{Marker, Operand};
use crate::error::ErrorCode;
use crate::expr::Position;
use crate::isa::dcpu16::{short_literal, LITERAL};
use tracing::{debug, trace};

impl Assembler {
    /// Runs passes until nothing changes. Returns the pass count and whether a
    /// fixed point was reached within `max_passes`.
    pub(crate) fn resolve(&mut self) -> (usize, bool) {
        let max = self.config.max_passes.max(1);
        for pass in 1..=max {
            let changed = self.resolve_pass();
            debug!(pass, changed, "resolver pass");
            if !changed {
                return (pass, true);
            }
        }
        (max, false)
    }

    fn resolve_pass(&mut self) -> bool {
        let mut changed = false;
        let mut force_long = self.config.force_long_literals;
        for i in 0..self.entries.len() {
            match self.entries[i].marker {
                Marker::LongForm => force_long = true,
                Marker::ShortForm => force_long = false,
                _ => {}
            }
            let position = Position { address: self.entries[i].address, ..self.entries[i].position.clone() };
            changed |= self.resolve_postponed(i, &position);
            changed |= self.resolve_instruction(i, &position, force_long);
        }
        changed
    }

    fn resolve_postponed(&mut self, i: usize, position: &Position) -> bool {
        if !self.entries[i].has_postponed() {
            return false;
        }
        let mut changed = false;
        let postponed = self.entries[i].postponed.clone();
        for (index, expr) in postponed {
            let result = self.eval(&expr, position);
            match result.resolved() {
                Some(value) => {
                    if let Some(word) = self.entries[i].output.get_mut(index) {
                        changed |= *word != value;
                        *word = value;
                    }
                }
                None => {
                    self.entries[i].error.get_or_insert(ErrorCode::IllegalExpression);
                }
            }
        }
        changed
    }

    fn resolve_instruction(&mut self, i: usize, position: &Position, force_long: bool) -> bool {
        let Some(mut instruction) = self.entries[i].instruction.take() else {
            return false;
        };
        let before = instruction.size();
        let mut failed = self.refresh(&mut instruction.a, position);
        if let Some(b) = instruction.b.as_mut() {
            failed |= self.refresh(b, position);
        }
        if instruction.a.code == LITERAL {
            instruction.a.short =
                !force_long && instruction.a.resolved && short_literal(instruction.a.value).is_some();
        }
        let after = instruction.size();
        let words = instruction.encode();

        let entry = &mut self.entries[i];
        if failed {
            entry.error.get_or_insert(ErrorCode::IllegalExpression);
        }
        let mut changed = entry.output != words;
        entry.output = words;
        entry.instruction = Some(instruction);
        if after != before {
            trace!(entry = i, before, after, "instruction resized");
            self.shift_from(i, i32::from(after) - i32::from(before));
            changed = true;
        }
        changed
    }

    /// Re-evaluates an operand literal; true when it does not resolve.
    fn refresh(&mut self, operand: &mut Operand, position: &Position) -> bool {
        let Some(literal) = operand.literal.as_deref() else {
            return false;
        };
        let result = self.eval(literal, position);
        operand.resolved = result.successful;
        if result.successful {
            operand.value = result.value;
        }
        !result.successful
    }

    /// Moves entries after `from` by `delta` words, up to the next `.org`.
    fn shift_from(&mut self, from: usize, delta: i32) {
        let mut delta = delta;
        let mut start = from;
        let mut j = from + 1;
        while j < self.entries.len() && delta != 0 {
            let entry = &mut self.entries[j];
            match entry.marker {
                Marker::Origin => break,
                Marker::Align { target } => {
                    let old_end = i32::from(entry.address) + entry.output.len() as i32;
                    entry.address = entry.address.wrapping_add_signed(delta as i16);
                    if entry.address <= target {
                        entry.output = vec![0; usize::from(target - entry.address)];
                        if entry.error == Some(ErrorCode::AlignToPast) {
                            entry.error = None;
                        }
                    } else {
                        entry.output.clear();
                        entry.error = Some(ErrorCode::AlignToPast);
                    }
                    let new_end = i32::from(entry.address) + entry.output.len() as i32;
                    self.symbols.shift(start, j, delta);
                    start = j;
                    delta = new_end - old_end;
                }
                _ => entry.address = entry.address.wrapping_add_signed(delta as i16),
            }
            j += 1;
        }
        if delta != 0 {
            self.symbols.shift(start, j, delta);
        }
    }
}
