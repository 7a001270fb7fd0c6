//! Address/line mapping for the disassembly view.
//!
//! The listing is rebuilt from scratch on every successful compile and never
//! changes afterwards: section and symbol annotations become synthetic lines
//! with no address, every instruction becomes exactly one addressed line.

use crate::proto::{AddrLabel, DisasmEntry};
use std::collections::HashMap;

/// One rendered line of the disassembly view. Synthetic annotation lines
/// (section boundaries, symbol definitions) carry no address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub pc: Option<u64>,
    pub text: String,
}

#[derive(Debug, Clone)]
struct MappedInstruction {
    line: usize,
    dis: String,
}

/// Immutable address ⇔ line translation table for one compiled program.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    lines: Vec<ListingLine>,
    by_pc: HashMap<u64, MappedInstruction>,
    gutter_width: usize,
}

impl Listing {
    /// Build the listing from the three compile-result sequences. The
    /// disassembly arrives in ascending address order; a section boundary at
    /// an instruction's address inserts one annotation line before it, a
    /// symbol at the same address a second one.
    pub fn build(
        disassembly: &[DisasmEntry],
        sections: &[AddrLabel],
        symbols: &[AddrLabel],
    ) -> Self {
        let sections: HashMap<u64, &str> =
            sections.iter().map(|s| (s.pc, s.name.as_str())).collect();
        let symbols: HashMap<u64, &str> = symbols.iter().map(|s| (s.pc, s.name.as_str())).collect();

        let mut lines = Vec::new();
        let mut by_pc = HashMap::with_capacity(disassembly.len());

        for entry in disassembly {
            if let Some(name) = sections.get(&entry.pc) {
                lines.push(ListingLine {
                    pc: None,
                    text: format!("<{name}>"),
                });
            }
            if let Some(name) = symbols.get(&entry.pc) {
                lines.push(ListingLine {
                    pc: None,
                    text: format!("{name}:"),
                });
            }
            by_pc.insert(
                entry.pc,
                MappedInstruction {
                    line: lines.len(),
                    dis: entry.dis.clone(),
                },
            );
            lines.push(ListingLine {
                pc: Some(entry.pc),
                text: format!("  {}", entry.dis),
            });
        }

        // address gutter is sized by the highest (last) address, plus the 0x prefix
        let gutter_width = disassembly
            .last()
            .map(|entry| format!("{:x}", entry.pc).len() + 2)
            .unwrap_or_default();

        Self {
            lines,
            by_pc,
            gutter_width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[ListingLine] {
        &self.lines
    }

    /// Line index of the instruction at `pc`, if the address was part of the
    /// compile result.
    pub fn line_for(&self, pc: u64) -> Option<usize> {
        self.by_pc.get(&pc).map(|instr| instr.line)
    }

    /// Raw disassembly text of the instruction at `pc`.
    pub fn disasm_at(&self, pc: u64) -> Option<&str> {
        self.by_pc.get(&pc).map(|instr| instr.dis.as_str())
    }

    /// Address printed on `line`, `None` for synthetic annotation lines.
    pub fn pc_at(&self, line: usize) -> Option<u64> {
        self.lines.get(line).and_then(|l| l.pc)
    }

    pub fn gutter_width(&self) -> usize {
        self.gutter_width
    }

    /// Gutter label of `line`: the hex address for instruction lines, a dash
    /// placeholder of the same width for annotation lines.
    pub fn gutter_label(&self, line: usize) -> String {
        match self.lines.get(line).and_then(|l| l.pc) {
            Some(pc) => format!("0x{pc:x}"),
            None => "-".repeat(self.gutter_width),
        }
    }
}
