//! Server-authoritative breakpoint bookkeeping.
//!
//! The client never decides where a breakpoint lives: it stores the sets the
//! server last reported and renders them. A toggle is a round trip and the
//! answer is folded back in here.

use crate::listing::Listing;
use log::warn;

/// Latest breakpoint sets as reported by the server: instruction addresses
/// and, independently, 1-based source lines.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    addrs: Vec<u64>,
    lines: Vec<u32>,
}

impl BreakpointSet {
    /// Fold a server payload in. Each list replaces the stored one only when
    /// the payload carries it. Returns true if anything was carried, i.e.
    /// the gutters need re-rendering.
    pub fn apply(&mut self, addrs: Option<&[u64]>, lines: Option<&[u32]>) -> bool {
        if let Some(addrs) = addrs {
            self.addrs = addrs.to_vec();
        }
        if let Some(lines) = lines {
            self.lines = lines.to_vec();
        }
        addrs.is_some() || lines.is_some()
    }

    pub fn contains_addr(&self, pc: u64) -> bool {
        self.addrs.contains(&pc)
    }

    /// `line` is 1-based, as reported by the server.
    pub fn contains_line(&self, line: u32) -> bool {
        self.lines.contains(&line)
    }

    /// Gutter marks for the disassembly view. An address the listing does not
    /// know is a contract violation by the server; it is skipped, not fatal.
    pub fn instruction_marks(&self, listing: &Listing) -> Vec<usize> {
        self.addrs
            .iter()
            .filter_map(|&pc| {
                let line = listing.line_for(pc);
                if line.is_none() {
                    warn!(target: "session", "breakpoint at {pc:#x} is not in the listing, skipped");
                }
                line
            })
            .collect()
    }

    /// Gutter marks for the source view, converted to 0-based lines.
    pub fn source_marks(&self) -> Vec<usize> {
        self.lines
            .iter()
            .map(|&line| line.saturating_sub(1) as usize)
            .collect()
    }

    pub fn clear(&mut self) {
        self.addrs.clear();
        self.lines.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proto::{AddrLabel, DisasmEntry};

    fn listing() -> Listing {
        let dis = vec![
            DisasmEntry {
                pc: 0x1000,
                dis: "mov x0, #1".to_string(),
            },
            DisasmEntry {
                pc: 0x1004,
                dis: "svc #0".to_string(),
            },
        ];
        let sections = vec![AddrLabel {
            pc: 0x1000,
            name: ".text".to_string(),
        }];
        Listing::build(&dis, &sections, &[])
    }

    #[test]
    fn test_apply_replaces_only_present_lists() {
        let mut set = BreakpointSet::default();
        assert!(set.apply(Some(&[0x1000]), None));
        assert!(set.contains_addr(0x1000));

        // a payload without addresses leaves them untouched
        assert!(set.apply(None, Some(&[5])));
        assert!(set.contains_addr(0x1000));
        assert!(set.contains_line(5));

        assert!(!set.apply(None, None));
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let listing = listing();
        let mut set = BreakpointSet::default();

        set.apply(Some(&[0x1004]), Some(&[5]));
        let first = (set.instruction_marks(&listing), set.source_marks());
        set.apply(Some(&[0x1004]), Some(&[5]));
        let second = (set.instruction_marks(&listing), set.source_marks());

        assert_eq!(first, second);
        assert_eq!(first.0, vec![2]);
        assert_eq!(first.1, vec![4]);
    }

    #[test]
    fn test_unknown_address_is_skipped() {
        let listing = listing();
        let mut set = BreakpointSet::default();
        set.apply(Some(&[0x1000, 0xdead]), None);
        assert_eq!(set.instruction_marks(&listing), vec![1]);
    }

    #[test]
    fn test_source_marks_are_zero_based() {
        let mut set = BreakpointSet::default();
        set.apply(None, Some(&[1, 5]));
        assert_eq!(set.source_marks(), vec![0, 4]);
    }
}
