//! Interactive terminal front-end over the session engine.

mod help;
pub mod hook;
pub mod print;

use crate::console::hook::TerminalHook;
use crate::console::print::style::{ErrorView, MutedView};
use crate::error::Error;
use crate::proto::{Language, StepKind};
use crate::register::{dec_string, hex_string};
use crate::session::{BreakpointTarget, Session};
use crate::transport::HttpTransport;
use rustyline::error::ReadlineError;
use rustyline::history::MemHistory;
use rustyline::Editor;
use std::fs;
use std::time::Duration;

const WELCOME_TEXT: &str = "steptrace - remote debugging from a terminal\ntype `help` for available commands";
const PROMT: &str = "(st) ";

type STEditor = Editor<(), MemHistory>;

pub struct AppBuilder {
    server: String,
    lang: Language,
    auto_step_delay: Option<Duration>,
    compile_args: String,
    source: Option<String>,
    resume: Option<String>,
}

impl AppBuilder {
    pub fn new(server: impl Into<String>, lang: Language) -> Self {
        Self {
            server: server.into(),
            lang,
            auto_step_delay: None,
            compile_args: String::new(),
            source: None,
            resume: None,
        }
    }

    pub fn with_auto_step_delay(mut self, delay: Duration) -> Self {
        self.auto_step_delay = Some(delay);
        self
    }

    pub fn with_compile_args(mut self, args: String) -> Self {
        self.compile_args = args;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_resume(mut self, session: Option<String>) -> Self {
        self.resume = session;
        self
    }

    pub fn build(self) -> anyhow::Result<TerminalApplication> {
        let editor: STEditor = Editor::with_history(rustyline::Config::default(), MemHistory::new())?;

        let mut session = Session::new(HttpTransport::new(&self.server), TerminalHook::new(), self.lang);
        if let Some(delay) = self.auto_step_delay {
            session = session.with_auto_step_delay(delay);
        }

        Ok(TerminalApplication {
            session,
            editor,
            compile_args: self.compile_args,
            source: self.source,
            resume: self.resume,
        })
    }
}

pub struct TerminalApplication {
    session: Session<HttpTransport, TerminalHook>,
    editor: STEditor,
    compile_args: String,
    source: Option<String>,
    resume: Option<String>,
}

impl TerminalApplication {
    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("{WELCOME_TEXT}");

        if let Some(text) = self.source.as_deref() {
            self.session.view_mut().set_source_text(text);
        }
        self.session.start();

        if let Some(sid) = self.resume.take() {
            // a failed resume already reported through the console hook
            _ = self.session.resume(&sid).await;
        }

        loop {
            let line = match self.editor.readline(PROMT) {
                Ok(line) => line,
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
                Err(err) => return Err(err.into()),
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            _ = self.editor.add_history_entry(&line);

            if line == "q" || line == "quit" {
                break;
            }
            if let Err(err) = self.handle_command(&line).await {
                // fatal errors already produced a console line via the engine
                if !err.is_fatal() {
                    println!("{}", ErrorView::from(err));
                }
            }
        }

        Ok(())
    }

    async fn handle_command(&mut self, line: &str) -> Result<(), Error> {
        let (cmd, arg) = line
            .split_once(' ')
            .map(|(cmd, arg)| (cmd, arg.trim()))
            .unwrap_or((line, ""));

        match cmd {
            "r" | "run" => {
                let Some(source) = self.source.clone() else {
                    println!("no source loaded, use `source <file>` first");
                    return Ok(());
                };
                self.session.compile(&source, &self.compile_args).await?;
            }
            "u" | "upload" => {
                if arg.is_empty() {
                    println!("usage: upload <file>");
                    return Ok(());
                }
                let binary = fs::read(arg)?;
                self.session.upload(&binary).await?;
            }
            "si" | "stepi" => {
                self.session.step(StepKind::Instruction).await?;
            }
            "s" | "step" => {
                self.session.step(StepKind::Line).await?;
            }
            "c" | "continue" => {
                self.session.step(StepKind::Continue).await?;
            }
            "loop" => self.session.run_auto_step().await?,
            "b" | "break" => self.toggle_breakpoint(arg).await?,
            "in" | "stdin" => self.session.send_stdin(arg).await?,
            "download" => {
                if arg.is_empty() {
                    println!("usage: download <file>");
                    return Ok(());
                }
                if let Some(binary) = self.session.download().await? {
                    fs::write(arg, binary)?;
                    println!("artifact saved to {arg}");
                }
            }
            "stop" => self.session.stop().await?,
            "source" => {
                if arg.is_empty() {
                    println!("usage: source <file>");
                    return Ok(());
                }
                let text = fs::read_to_string(arg)?;
                self.session.view_mut().set_source_text(&text);
                self.source = Some(text);
                println!("loaded {arg}");
            }
            "lang" => match arg.parse::<Language>() {
                Ok(lang) => self.session.set_language(lang),
                Err(_) => return Err(Error::UnknownLanguage(arg.to_string())),
            },
            "list" => self.print_listing(),
            "regs" => self.print_registers(),
            "vars" => self.print_variables(),
            "stack" => self.print_stack(),
            "h" | "help" => println!("{}", help::HELP),
            _ => println!("unknown command `{cmd}`, try `help`"),
        }
        Ok(())
    }

    /// A breakpoint argument is either a 1-based source line or a `0x`
    /// prefixed instruction address; toggling flips whatever the server
    /// reported last.
    async fn toggle_breakpoint(&mut self, arg: &str) -> Result<(), Error> {
        if let Some(hex) = arg.strip_prefix("0x") {
            let Ok(pc) = u64::from_str_radix(hex, 16) else {
                println!("invalid address `{arg}`");
                return Ok(());
            };
            let set = !self.session.breakpoints().contains_addr(pc);
            self.session
                .toggle_breakpoint(set, BreakpointTarget::Addr(pc))
                .await
        } else {
            let Ok(line) = arg.parse::<u32>() else {
                println!("usage: break <line> or break 0x<addr>");
                return Ok(());
            };
            let set = !self.session.breakpoints().contains_line(line);
            self.session
                .toggle_breakpoint(set, BreakpointTarget::Line(line))
                .await
        }
    }

    fn print_listing(&self) {
        let listing = self.session.listing();
        if listing.is_empty() {
            println!("no listing, compile something first");
            return;
        }
        let width = listing.gutter_width();
        for (i, line) in listing.lines().iter().enumerate() {
            let label = format!("{:>width$}", listing.gutter_label(i));
            println!("{} {}", MutedView::from(label), line.text);
        }
    }

    fn print_registers(&self) {
        for reg in self.session.last_registers() {
            println!(
                "{:<10} {}  {:>22}",
                reg.name,
                hex_string(reg.value),
                dec_string(reg.value)
            );
        }
    }

    fn print_variables(&self) {
        for var in self.session.last_variables() {
            println!("{:<16} = {}", var.name, var.value);
        }
    }

    fn print_stack(&self) {
        for (i, frame) in self.session.last_stack().iter().enumerate() {
            println!("{} {frame}", MutedView::from(format!("{i:>3}:")));
        }
    }
}
