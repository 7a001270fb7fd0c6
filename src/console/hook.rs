use crate::console::print::style::{
    AddressView, ErrorView, InstructionView, KeywordView, MutedView,
};
use crate::listing::Listing;
use crate::proto::VarEntry;
use crate::register::{dec_string, hex_string, Register};
use crate::session::SessionState;
use crate::view::{ConsoleKind, View};
use crossterm::style::Stylize;

/// Renders engine updates onto the terminal.
///
/// The hook keeps its own copies of the listing and the source text so a
/// highlight can re-print the affected line; a scrolling terminal has no
/// widget to move, so "scroll into view" becomes "print it again".
pub struct TerminalHook {
    listing: Listing,
    source: Vec<String>,
    state: SessionState,
}

impl TerminalHook {
    pub fn new() -> Self {
        Self {
            listing: Listing::default(),
            source: vec![],
            state: SessionState::Init,
        }
    }

    /// Install source text loaded locally (the engine only pushes source on
    /// session resume).
    pub fn set_source_text(&mut self, source: &str) {
        self.source = source.lines().map(str::to_string).collect();
    }

    fn print_source_line(&self, line: usize) {
        if let Some(text) = self.source.get(line) {
            println!("{} {}", MutedView::from(format!("{:>4}", line + 1)), text);
        }
    }
}

impl Default for TerminalHook {
    fn default() -> Self {
        Self::new()
    }
}

impl View for TerminalHook {
    fn load_source(&mut self, source: &str, lang: &str) {
        self.set_source_text(source);
        println!(
            "restored {} source ({} lines)",
            KeywordView::from(lang),
            self.source.len()
        );
    }

    fn load_listing(&mut self, listing: &Listing) {
        self.listing = listing.clone();
        let width = listing.gutter_width();
        for (i, line) in listing.lines().iter().enumerate() {
            let label = format!("{:>width$}", listing.gutter_label(i));
            if line.pc.is_some() {
                println!("{} {}", MutedView::from(label), line.text);
            } else {
                println!("{} {}", MutedView::from(label), KeywordView::from(&line.text));
            }
        }
    }

    fn render_compile_error(
        &mut self,
        line: Option<u32>,
        column: Option<u32>,
        category: &str,
        desc: &str,
    ) {
        match line {
            Some(line) => {
                println!(
                    "{} {desc}",
                    ErrorView::from(format!(
                        "{category} at line {line}:{}:",
                        column.unwrap_or(0)
                    ))
                );
                self.print_source_line(line.saturating_sub(1) as usize);
            }
            None => {
                println!("{}", ErrorView::from(category));
                println!("{}", ErrorView::from(desc));
            }
        }
    }

    fn highlight_disassembly_line(&mut self, line: usize) {
        let width = self.listing.gutter_width();
        let label = format!("{:>width$}", self.listing.gutter_label(line));
        let text = self
            .listing
            .lines()
            .get(line)
            .map(|l| l.text.trim_start())
            .unwrap_or_default();
        println!(
            "{} {} {}",
            KeywordView::from("=>"),
            AddressView::from(label),
            InstructionView::from(text)
        );
    }

    fn highlight_source_location(&mut self, line: usize, column: u32) {
        self.print_source_line(line);
        let indent = if column > 0 { column - 1 } else { column } as usize;
        println!("     {}{}", " ".repeat(indent), KeywordView::from("^"));
    }

    fn set_register_table(&mut self, regs: &[Register], changed: &[String]) {
        for reg in regs {
            let row = format!(
                "{:<10} {}  {:>22}",
                reg.name,
                hex_string(reg.value),
                dec_string(reg.value)
            );
            if changed.contains(&reg.name) {
                println!("{}", row.yellow().bold());
            } else {
                println!("{row}");
            }
        }
    }

    fn set_variable_table(&mut self, vars: &[VarEntry]) {
        for var in vars {
            println!("{:<16} = {}", var.name, var.value);
        }
    }

    fn set_stack_table(&mut self, frames: &[String]) {
        for (i, frame) in frames.iter().enumerate() {
            println!("{} {frame}", MutedView::from(format!("{i:>3}:")));
        }
    }

    fn set_breakpoint_gutters(&mut self, instruction_lines: &[usize], source_lines: &[usize]) {
        if !instruction_lines.is_empty() {
            let labels: Vec<String> = instruction_lines
                .iter()
                .map(|&line| self.listing.gutter_label(line))
                .collect();
            println!("breakpoints (instructions): {}", labels.join(", "));
        }
        if !source_lines.is_empty() {
            let lines: Vec<String> = source_lines.iter().map(|l| (l + 1).to_string()).collect();
            println!("breakpoints (source lines): {}", lines.join(", "));
        }
    }

    fn append_console_line(&mut self, kind: ConsoleKind, text: &str) {
        match kind {
            ConsoleKind::Stdout => println!("{text}"),
            ConsoleKind::Stderr => println!("{}", ErrorView::from(text)),
            ConsoleKind::Stdin => println!("{}", MutedView::from(text)),
        }
    }

    fn clear_all_highlighting(&mut self) {
        // nothing to undo on a scrolling terminal
    }

    fn state_changed(&mut self, state: SessionState) {
        if self.state == SessionState::Debug && state == SessionState::Idle {
            println!("{}", MutedView::from("session ended"));
        }
        self.state = state;
    }
}
