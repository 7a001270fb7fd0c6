//! The debug-session state machine.
//!
//! A [`Session`] owns the client's picture of one remote compile-and-debug
//! instance: the lifecycle state, the disassembly listing, register and
//! breakpoint snapshots. It mutates that picture only in reaction to server
//! responses and publishes every change through the injected [`View`].

pub mod autostep;

use crate::breakpoint::BreakpointSet;
use crate::error::Error;
use crate::listing::Listing;
use crate::poll::{self, PollState, Verdict, RETRY_DELAY};
use crate::proto::{
    CompileAck, Language, StateReply, StepAck, StepKind, StdinAck, VarEntry, BKPT_ENDPOINT,
    COMPILE_ENDPOINT, DOWNLOAD_ENDPOINT, SESSION_STATE_ENDPOINT, STDIN_ENDPOINT,
    STEP_STATE_ENDPOINT, STOP_ENDPOINT, UPLOAD_ENDPOINT,
};
use crate::register::{Register, RegisterTracker};
use crate::session::autostep::AutoStep;
use crate::transport::{Request, Transport};
use crate::view::{ConsoleKind, View};
use crate::weak_error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;
use strum_macros::Display;
use tokio::time::sleep;

/// Grace period between a step ack and the first step-state poll.
pub const STEP_POLL_DELAY: Duration = Duration::from_millis(100);

#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SessionState {
    /// Before presentation setup completed.
    Init,
    /// No active debug session; editing and compiling.
    Idle,
    /// A program is loaded on the remote target and can be stepped.
    Debug,
}

/// Where a breakpoint toggle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointTarget {
    /// 1-based source line.
    Line(u32),
    /// Instruction address.
    Addr(u64),
}

/// Result of one step/continue round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The program stopped at a new location.
    Stopped,
    /// The program ran to completion; the session is torn down.
    Finished,
    /// The request was ignored (wrong state, poll in flight).
    Skipped,
}

pub struct Session<T: Transport, V: View> {
    transport: T,
    view: V,
    state: SessionState,
    sid: String,
    lang: Language,
    arch: Option<String>,

    listing: Listing,
    registers: RegisterTracker,
    last_regs: Vec<Register>,
    last_vars: Vec<VarEntry>,
    last_stack: Vec<String>,
    breakpoints: BreakpointSet,

    poll: PollState,
    /// At most one poll sequence runs per session; user actions arriving
    /// while it is pending are dropped by the guards below.
    poll_in_flight: bool,
    auto_step: AutoStep,
}

impl<T: Transport, V: View> Session<T, V> {
    pub fn new(transport: T, view: V, lang: Language) -> Self {
        Self {
            transport,
            view,
            state: SessionState::Init,
            sid: String::new(),
            lang,
            arch: None,
            listing: Listing::default(),
            registers: RegisterTracker::default(),
            last_regs: vec![],
            last_vars: vec![],
            last_stack: vec![],
            breakpoints: BreakpointSet::default(),
            poll: PollState::default(),
            poll_in_flight: false,
            auto_step: AutoStep::default(),
        }
    }

    pub fn with_auto_step_delay(mut self, delay: Duration) -> Self {
        self.auto_step = AutoStep::new(delay);
        self
    }

    /// Leave `INIT` once the presentation side is ready. No network traffic.
    pub fn start(&mut self) {
        self.change_state(SessionState::Idle);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The injected presentation hook. The engine stays the only writer of
    /// session data; this is for view-local concerns (e.g. installing source
    /// text the view should render around highlights).
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Opaque session token, empty while no session is active.
    pub fn session_id(&self) -> &str {
        &self.sid
    }

    pub fn language(&self) -> Language {
        self.lang
    }

    pub fn set_language(&mut self, lang: Language) {
        self.lang = lang;
    }

    /// Architecture of the remote target, as reported by the server.
    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn last_registers(&self) -> &[Register] {
        &self.last_regs
    }

    pub fn last_variables(&self) -> &[VarEntry] {
        &self.last_vars
    }

    pub fn last_stack(&self) -> &[String] {
        &self.last_stack
    }

    pub fn auto_step_armed(&self) -> bool {
        self.auto_step.is_armed()
    }

    /// Re-attach to a session created earlier (the token survives the client
    /// restart). If the server still knows the session, the next state
    /// answer replays the whole picture and the machine goes straight to
    /// `DEBUG`; if it does not, the attempt is abandoned silently.
    pub async fn resume(&mut self, sid: &str) -> Result<(), Error> {
        if self.state != SessionState::Idle || self.poll_in_flight {
            warn!(target: "session", "resume ignored in state {}", self.state);
            return Ok(());
        }
        self.sid = sid.to_string();
        match self.poll_session_state(false).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Submit `source` for remote compilation. On an accepted request the
    /// server hands out a session token and the compile result is fetched
    /// from the session-state dashboard.
    pub async fn compile(&mut self, source: &str, args: &str) -> Result<(), Error> {
        if self.state != SessionState::Idle || self.poll_in_flight {
            warn!(target: "session", "compile ignored in state {}", self.state);
            return Ok(());
        }
        let req = Request::post(COMPILE_ENDPOINT)
            .query("lang", self.lang)
            .query("args", args)
            .text(source);
        match self.begin_session(req).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Hand a prebuilt binary to the server instead of compiling; the rest of
    /// the lifecycle is identical to [`Session::compile`].
    pub async fn upload(&mut self, binary: &[u8]) -> Result<(), Error> {
        if self.state != SessionState::Idle || self.poll_in_flight {
            warn!(target: "session", "upload ignored in state {}", self.state);
            return Ok(());
        }
        let req = Request::post(UPLOAD_ENDPOINT).text(BASE64.encode(binary));
        match self.begin_session(req).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn begin_session(&mut self, req: Request) -> Result<(), Error> {
        let ack: CompileAck = self.send(req).await?;
        self.view.clear_all_highlighting();
        if !ack.compile {
            return Err(Error::CompileRejected);
        }
        self.sid = ack.session;
        info!(target: "session", "request accepted, session {}", self.sid);

        // the toolchain needs a moment; don't bother the server right away
        sleep(RETRY_DELAY).await;
        self.poll_session_state(true).await
    }

    /// Execute one step of the given granularity and reconcile the view with
    /// the state the program stopped in.
    pub async fn step(&mut self, kind: StepKind) -> Result<StepOutcome, Error> {
        if self.state != SessionState::Debug || self.poll_in_flight {
            warn!(target: "session", "{kind} step ignored in state {}", self.state);
            return Ok(StepOutcome::Skipped);
        }
        match self.try_step(kind).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn try_step(&mut self, kind: StepKind) -> Result<StepOutcome, Error> {
        let ack: StepAck = self
            .send(Request::post(kind.endpoint()).query("sid", &self.sid))
            .await?;
        if !ack.step {
            return Err(Error::StepRejected);
        }

        sleep(STEP_POLL_DELAY).await;
        let reply = self.poll_step_state().await?;

        self.view.clear_all_highlighting();
        if let (Some(pc), Some(dis)) = (reply.pc, reply.disasm.as_deref()) {
            info!(target: "session", "stopped at {pc:#x}: {dis}");
        }
        if self.common_state_update(&reply).await {
            Ok(StepOutcome::Finished)
        } else {
            Ok(StepOutcome::Stopped)
        }
    }

    /// Toggle a breakpoint. The gutter is never updated optimistically: the
    /// server answers with its authoritative sets and those are rendered.
    pub async fn toggle_breakpoint(
        &mut self,
        set: bool,
        target: BreakpointTarget,
    ) -> Result<(), Error> {
        if self.state != SessionState::Debug || self.poll_in_flight {
            warn!(target: "session", "can't modify breakpoints while not debugging");
            return Ok(());
        }

        let field = match target {
            BreakpointTarget::Line(line) => ("line", line.to_string()),
            // hex, no 0x prefix on the wire
            BreakpointTarget::Addr(pc) => ("addr", format!("{pc:x}")),
        };
        let req = Request::post(BKPT_ENDPOINT)
            .query("sid", &self.sid)
            .form(vec![("set", set.to_string()), field]);

        let reply = match self.send::<crate::proto::BkptReply>(req).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.fail(err)),
        };
        if reply.error {
            return Err(self.fail(Error::BreakpointFailed));
        }
        if reply.bkpt
            && self
                .breakpoints
                .apply(reply.bkpts.as_deref(), reply.bkpt_lines.as_deref())
        {
            self.render_breakpoints();
        }
        Ok(())
    }

    /// Forward one line of input to the target's stdin.
    pub async fn send_stdin(&mut self, text: &str) -> Result<(), Error> {
        if self.state != SessionState::Debug {
            warn!(target: "session", "stdin ignored in state {}", self.state);
            return Ok(());
        }
        let req = Request::post(STDIN_ENDPOINT)
            .query("sid", &self.sid)
            .text(text);
        match self.send::<StdinAck>(req).await {
            Ok(ack) if ack.stdin => {
                self.view.append_console_line(ConsoleKind::Stdin, text);
                Ok(())
            }
            Ok(_) => Err(self.fail(Error::StdinRejected)),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Fetch the compiled artifact. `None` outside of a debug session.
    pub async fn download(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.state != SessionState::Debug {
            warn!(target: "session", "download ignored in state {}", self.state);
            return Ok(None);
        }
        let req = Request::get(DOWNLOAD_ENDPOINT).query("sid", &self.sid);
        match self.transport.roundtrip(req).await {
            Ok(binary) => Ok(Some(binary)),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Tear the session down on user request.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Debug {
            warn!(target: "session", "stop ignored in state {}", self.state);
            return Ok(());
        }
        self.auto_step.disarm();
        match self.request_stop().await {
            Ok(()) => {
                self.change_state(SessionState::Idle);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Keep issuing single-instruction steps, one delay apart, until the
    /// program finishes, the controller is disarmed, or the session leaves
    /// the debug state.
    pub async fn run_auto_step(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Debug {
            warn!(target: "session", "auto-step ignored in state {}", self.state);
            return Ok(());
        }
        self.auto_step.arm();
        loop {
            match self.step(StepKind::Instruction).await? {
                StepOutcome::Stopped => {}
                StepOutcome::Finished | StepOutcome::Skipped => break,
            }
            sleep(self.auto_step.delay()).await;
            // disarmed or torn down while the delay was pending: fall through
            if !self.auto_step.is_armed() || self.state != SessionState::Debug {
                break;
            }
        }
        self.auto_step.disarm();
        Ok(())
    }

    pub fn cancel_auto_step(&mut self) {
        self.auto_step.disarm();
    }

    // ------------------------------- internals ---------------------------------------------------

    async fn send<R: DeserializeOwned>(&mut self, req: Request) -> Result<R, Error> {
        let raw = self.transport.roundtrip(req).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn poll_session_state(&mut self, force_retry: bool) -> Result<(), Error> {
        let req = Request::get(SESSION_STATE_ENDPOINT).query("sid", &self.sid);
        self.poll_in_flight = true;
        let polled = poll::retrying(&mut self.transport, req, &mut self.poll, |reply| {
            if reply.state {
                Verdict::Ready
            } else if force_retry || reply.retry {
                Verdict::NotReady
            } else {
                Verdict::Abandon
            }
        })
        .await;
        self.poll_in_flight = false;

        let Some(reply) = polled? else {
            debug!(target: "session", "no session to wait for, abandoning poll");
            return Ok(());
        };
        self.apply_session_reply(reply).await
    }

    async fn poll_step_state(&mut self) -> Result<StateReply, Error> {
        let req = Request::get(STEP_STATE_ENDPOINT).query("sid", &self.sid);
        self.poll_in_flight = true;
        let polled = poll::retrying(&mut self.transport, req, &mut self.poll, |reply| {
            if !reply.state {
                Verdict::NotReady
            } else if reply.step == Some(true) {
                Verdict::Ready
            } else {
                // a state answer without a step result is a broken contract
                Verdict::Failed(Error::StepRejected)
            }
        })
        .await;
        self.poll_in_flight = false;

        Ok(polled?.expect("step classifier never abandons"))
    }

    async fn apply_session_reply(&mut self, reply: StateReply) -> Result<(), Error> {
        if let Some(arch) = reply.arch.clone() {
            self.arch = Some(arch);
        }

        if reply.compile != Some(true) {
            warn!(target: "session", "compile failed with {} diagnostics", reply.failures.len());
            for failure in &reply.failures {
                self.view
                    .render_compile_error(failure.line, failure.column, &failure.category, &failure.desc);
            }
            return Ok(());
        }

        // a resumed session replays source and language
        if let (Some(source), Some(lang)) = (reply.source.as_deref(), reply.lang.as_deref()) {
            if !source.is_empty() && !lang.is_empty() {
                if let Ok(known) = lang.parse::<Language>() {
                    self.lang = known;
                }
                self.view.load_source(source, lang);
            }
        }

        info!(
            target: "session",
            "compile ok: {} instructions, {} sections, {} symbols",
            reply.disassembly.len(),
            reply.sections.len(),
            reply.symbols.len()
        );
        self.listing = Listing::build(&reply.disassembly, &reply.sections, &reply.symbols);
        self.view.load_listing(&self.listing);
        self.registers.clear();
        self.last_regs.clear();
        self.breakpoints.clear();

        let finished = self.common_state_update(&reply).await;
        if !finished {
            self.change_state(SessionState::Debug);
        }
        Ok(())
    }

    /// The one reconciliation routine for every state-bearing response.
    /// The order is fixed: completion teardown runs last, after the final
    /// instruction's state has been rendered. Returns true when the program
    /// reported completion.
    async fn common_state_update(&mut self, reply: &StateReply) -> bool {
        if !reply.done {
            if let Some(line) = reply.pc.and_then(|pc| self.listing.line_for(pc)) {
                self.view.highlight_disassembly_line(line);
            }
        }

        if let Some(regs) = &reply.regs {
            let regs: Vec<Register> = regs.iter().map(Register::from).collect();
            let changed = self.registers.changed(&regs);
            self.view.set_register_table(&regs, &changed);
            // the view has seen the snapshot, now it may become the baseline
            self.registers.commit(&regs);
            self.last_regs = regs;
        }

        if let Some(vars) = &reply.vars {
            self.view.set_variable_table(vars);
            self.last_vars = vars.clone();
        }

        if let Some(stack) = &reply.stacktrace {
            self.view.set_stack_table(stack);
            self.last_stack = stack.clone();
        }

        if self
            .breakpoints
            .apply(reply.bkpts.as_deref(), reply.bkpt_lines.as_deref())
        {
            self.render_breakpoints();
        }

        if !reply.done {
            if let Some(location) = reply.location {
                let line = location.line.saturating_sub(1) as usize;
                self.view.highlight_source_location(line, location.column);
            }
        }

        for line in &reply.stdout {
            self.view.append_console_line(ConsoleKind::Stdout, line);
        }

        if reply.done {
            self.view
                .append_console_line(ConsoleKind::Stderr, "Program Finished");
            // let the server reap the session; it is gone either way
            weak_error!(self.request_stop().await, "stop request failed:");
            self.change_state(SessionState::Idle);
            return true;
        }
        false
    }

    fn render_breakpoints(&mut self) {
        let instruction_lines = self.breakpoints.instruction_marks(&self.listing);
        let source_lines = self.breakpoints.source_marks();
        self.view
            .set_breakpoint_gutters(&instruction_lines, &source_lines);
    }

    async fn request_stop(&mut self) -> Result<(), Error> {
        // any 2xx answer is enough
        self.transport
            .roundtrip(Request::post(STOP_ENDPOINT).query("sid", &self.sid))
            .await?;
        Ok(())
    }

    /// Every fatal path converges here: one console error, then idle, which
    /// guarantees the same cleanup no matter which path failed.
    fn fail(&mut self, err: Error) -> Error {
        warn!(target: "session", "session failed: {err:#}");
        self.view
            .append_console_line(ConsoleKind::Stderr, "Error communicating with server");
        self.change_state(SessionState::Idle);
        err
    }

    fn change_state(&mut self, next: SessionState) {
        if next != SessionState::Debug {
            self.view.clear_all_highlighting();
            self.view.set_breakpoint_gutters(&[], &[]);
            self.breakpoints.clear();
            self.auto_step.disarm();
            self.poll_in_flight = false;
            if !self.sid.is_empty() {
                debug!(target: "session", "session {} closed", self.sid);
                self.sid.clear();
            }
        }
        if self.state != next {
            debug!(target: "session", "{} -> {next}", self.state);
        }
        self.state = next;
        self.view.state_changed(next);
    }
}
