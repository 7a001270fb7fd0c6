#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use steptrace::listing::Listing;
use steptrace::proto::{Language, VarEntry};
use steptrace::register::Register;
use steptrace::session::{Session, SessionState};
use steptrace::transport::{Body, Request, Transport, TransportError};
use steptrace::view::{ConsoleKind, View};

/// Canned answer for one scripted exchange.
pub enum Canned {
    Json(Value),
    Raw(Vec<u8>),
    Unreachable,
}

pub struct RequestRecord {
    pub endpoint: &'static str,
    pub target: String,
    pub body: Option<String>,
}

/// Transport that plays back a script and records everything the engine
/// sends. A request for an unexpected endpoint fails the test.
pub struct MockTransport {
    script: VecDeque<(&'static str, Canned)>,
    pub requests: Vec<RequestRecord>,
}

impl MockTransport {
    pub fn new(script: Vec<(&'static str, Canned)>) -> Self {
        Self {
            script: script.into(),
            requests: vec![],
        }
    }

    pub fn hits(&self, endpoint: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    pub fn last_body(&self, endpoint: &str) -> Option<String> {
        self.requests
            .iter()
            .rev()
            .find(|r| r.endpoint == endpoint)
            .and_then(|r| r.body.clone())
    }

    pub fn extend_script(&mut self, script: Vec<(&'static str, Canned)>) {
        self.script.extend(script);
    }

    pub fn assert_drained(&self) {
        assert!(
            self.script.is_empty(),
            "{} scripted answers were never requested",
            self.script.len()
        );
    }
}

impl Transport for MockTransport {
    async fn roundtrip(&mut self, req: Request) -> Result<Vec<u8>, TransportError> {
        let body = match &req.body {
            Body::Empty => None,
            Body::Text(text) => Some(text.clone()),
            Body::Form(fields) => Some(
                fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
        };
        self.requests.push(RequestRecord {
            endpoint: req.endpoint,
            target: req.target(),
            body,
        });

        let Some((expected, canned)) = self.script.pop_front() else {
            panic!("unexpected request to {}", req.endpoint);
        };
        assert_eq!(req.endpoint, expected, "request order mismatch");
        match canned {
            Canned::Json(value) => Ok(value.to_string().into_bytes()),
            Canned::Raw(bytes) => Ok(bytes),
            Canned::Unreachable => Err(TransportError::IO(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoadSource(String),
    LoadListing(usize),
    CompileError(Option<u32>, String),
    HighlightDisasm(usize),
    HighlightSource(usize, u32),
    Registers(Vec<(String, u64)>, Vec<String>),
    Variables(Vec<(String, String)>),
    Stack(Vec<String>),
    Gutters(Vec<usize>, Vec<usize>),
    Console(ConsoleKind, String),
    ClearAll,
    State(SessionState),
}

/// View that records every callback for later assertions.
#[derive(Default)]
pub struct RecordingView {
    pub events: Vec<Event>,
}

impl RecordingView {
    pub fn console_lines(&self) -> Vec<(ConsoleKind, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Console(kind, text) => Some((*kind, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_gutters(&self) -> Option<(Vec<usize>, Vec<usize>)> {
        self.events.iter().rev().find_map(|e| match e {
            Event::Gutters(instr, src) => Some((instr.clone(), src.clone())),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl View for RecordingView {
    fn load_source(&mut self, source: &str, _lang: &str) {
        self.events.push(Event::LoadSource(source.to_string()));
    }

    fn load_listing(&mut self, listing: &Listing) {
        self.events.push(Event::LoadListing(listing.len()));
    }

    fn render_compile_error(
        &mut self,
        line: Option<u32>,
        _column: Option<u32>,
        _category: &str,
        desc: &str,
    ) {
        self.events.push(Event::CompileError(line, desc.to_string()));
    }

    fn highlight_disassembly_line(&mut self, line: usize) {
        self.events.push(Event::HighlightDisasm(line));
    }

    fn highlight_source_location(&mut self, line: usize, column: u32) {
        self.events.push(Event::HighlightSource(line, column));
    }

    fn set_register_table(&mut self, regs: &[Register], changed: &[String]) {
        self.events.push(Event::Registers(
            regs.iter().map(|r| (r.name.clone(), r.value)).collect(),
            changed.to_vec(),
        ));
    }

    fn set_variable_table(&mut self, vars: &[VarEntry]) {
        self.events.push(Event::Variables(
            vars.iter()
                .map(|v| (v.name.clone(), v.value.clone()))
                .collect(),
        ));
    }

    fn set_stack_table(&mut self, frames: &[String]) {
        self.events.push(Event::Stack(frames.to_vec()));
    }

    fn set_breakpoint_gutters(&mut self, instruction_lines: &[usize], source_lines: &[usize]) {
        self.events.push(Event::Gutters(
            instruction_lines.to_vec(),
            source_lines.to_vec(),
        ));
    }

    fn append_console_line(&mut self, kind: ConsoleKind, text: &str) {
        self.events.push(Event::Console(kind, text.to_string()));
    }

    fn clear_all_highlighting(&mut self) {
        self.events.push(Event::ClearAll);
    }

    fn state_changed(&mut self, state: SessionState) {
        self.events.push(Event::State(state));
    }
}

/// The two-instruction program used across the tests: a `.text` section at
/// 0x1000, so line 0 is the annotation and 0x1000/0x1004 map to lines 1/2.
pub fn compile_result() -> Value {
    json!({
        "state": true, "retry": false, "arch": "aarch64",
        "compile": true, "done": false,
        "source": "", "lang": "",
        "sections": [{"pc": 0x1000, "name": ".text"}],
        "symbols": [],
        "disassembly": [
            {"pc": 0x1000, "dis": "mov x0, #1"},
            {"pc": 0x1004, "dis": "svc #0"}
        ],
        "pc": 0x1000,
        "stdout": []
    })
}

pub fn compile_ack(sid: &str) -> Canned {
    Canned::Json(json!({"compile": true, "session": sid}))
}

pub fn not_ready() -> Canned {
    Canned::Json(json!({"state": false, "retry": true, "arch": "aarch64"}))
}

pub fn step_ack() -> Canned {
    Canned::Json(json!({"step": true}))
}

pub fn step_reply(pc: u64, done: bool) -> Value {
    json!({
        "state": true, "step": true, "retry": false, "done": done,
        "arch": "aarch64", "pc": pc, "disasm": "svc #0",
        "stdout": []
    })
}

/// Drive a fresh session through a successful compile, leaving it in DEBUG
/// with `extra` still scripted.
pub async fn debug_session(
    extra: Vec<(&'static str, Canned)>,
) -> Session<MockTransport, RecordingView> {
    let mut script = vec![
        ("/compile/", compile_ack("sess-1")),
        ("/session-state/", Canned::Json(compile_result())),
    ];
    script.extend(extra);

    let mut session = Session::new(
        MockTransport::new(script),
        RecordingView::default(),
        Language::C,
    );
    session.start();
    session.compile("int main() { return 0; }", "").await.unwrap();
    assert_eq!(session.state(), SessionState::Debug);
    session
}
