//! Contract between the engine and the presentation layer.

use crate::listing::Listing;
use crate::proto::VarEntry;
use crate::register::Register;
use crate::session::SessionState;

/// Console log line kinds; the view styles each differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKind {
    Stdout,
    Stderr,
    Stdin,
}

/// Update callbacks the engine drives its presentation through.
///
/// Implementations are read-only observers: they may keep copies of what
/// they are handed, but all session data stays owned by the engine and the
/// view never reaches back into it.
pub trait View {
    /// Restore the source editor content (session resume).
    fn load_source(&mut self, source: &str, lang: &str);

    /// Install a freshly built disassembly listing.
    fn load_listing(&mut self, listing: &Listing);

    /// One compiler diagnostic; `line` (1-based) and `column` are present for
    /// diagnostics with a source position, which render inline - the rest go
    /// to the console.
    fn render_compile_error(
        &mut self,
        line: Option<u32>,
        column: Option<u32>,
        category: &str,
        desc: &str,
    );

    /// Mark the instruction the program is stopped at and bring it into view.
    fn highlight_disassembly_line(&mut self, line: usize);

    /// Place the one-shot source position marker; `line` is 0-based here.
    fn highlight_source_location(&mut self, line: usize, column: u32);

    /// Replace the register table; `changed` names get one-shot emphasis.
    fn set_register_table(&mut self, regs: &[Register], changed: &[String]);

    /// Replace the variable table wholesale.
    fn set_variable_table(&mut self, vars: &[VarEntry]);

    /// Replace the stack trace wholesale.
    fn set_stack_table(&mut self, frames: &[String]);

    /// Replace both breakpoint gutters; line indexes are 0-based and already
    /// resolved against the mapping table.
    fn set_breakpoint_gutters(&mut self, instruction_lines: &[usize], source_lines: &[usize]);

    fn append_console_line(&mut self, kind: ConsoleKind, text: &str);

    /// Drop every highlight and marker widget. Must be idempotent.
    fn clear_all_highlighting(&mut self);

    /// Lifecycle notification, drives enabling/disabling of step controls.
    fn state_changed(&mut self, state: SessionState);
}
