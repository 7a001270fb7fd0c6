//! Wire-level data model of the trace-server protocol.
//!
//! Every response is a flat JSON record; fields are optional depending on
//! which dashboard produced the record, so the structs below deserialize
//! with permissive defaults and the engine interprets presence/absence.

use serde::Deserialize;
use strum_macros::{Display, EnumString};

pub const COMPILE_ENDPOINT: &str = "/compile/";
pub const UPLOAD_ENDPOINT: &str = "/upload/";
pub const STEP_ENDPOINT: &str = "/step/";
pub const STEP_LINE_ENDPOINT: &str = "/step-line/";
pub const CONTINUE_ENDPOINT: &str = "/continue/";
pub const STOP_ENDPOINT: &str = "/stop/";
pub const BKPT_ENDPOINT: &str = "/breakpoint/";
pub const SESSION_STATE_ENDPOINT: &str = "/session-state/";
pub const STEP_STATE_ENDPOINT: &str = "/step-state/";
pub const STDIN_ENDPOINT: &str = "/stdin/";
pub const DOWNLOAD_ENDPOINT: &str = "/download/";

/// Source languages accepted by the remote compiler. The serialized form is
/// the wire key of the `lang` query parameter.
#[derive(Copy, Clone, PartialEq, Eq, Debug, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    C,
    Cxx,
    Asm,
}

/// Granularity of one execution request.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepKind {
    Instruction,
    Line,
    Continue,
}

impl StepKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            StepKind::Instruction => STEP_ENDPOINT,
            StepKind::Line => STEP_LINE_ENDPOINT,
            StepKind::Continue => CONTINUE_ENDPOINT,
        }
    }
}

/// One disassembled instruction.
#[derive(Debug, Clone, Deserialize)]
pub struct DisasmEntry {
    pub pc: u64,
    pub dis: String,
}

/// Address-keyed label, used for both section boundaries and symbol definitions.
#[derive(Debug, Clone, Deserialize)]
pub struct AddrLabel {
    pub pc: u64,
    pub name: String,
}

/// A register value as transmitted: split into two 32-bit halves.
#[derive(Debug, Clone, Deserialize)]
pub struct RegEntry {
    pub name: String,
    pub high: u32,
    pub low: u32,
}

impl RegEntry {
    pub fn value(&self) -> u64 {
        (self.high as u64) << 32 | self.low as u64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VarEntry {
    pub name: String,
    pub value: String,
}

/// Source-level position; `line` is 1-based on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// One compiler diagnostic. `line`/`column` are absent for diagnostics that
/// have no source position (linker errors, driver failures).
#[derive(Debug, Clone, Deserialize)]
pub struct CompileFailure {
    pub category: String,
    pub desc: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Ack returned by compile and upload requests. The compile result itself
/// arrives later, on the session-state dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileAck {
    #[serde(default)]
    pub compile: bool,
    #[serde(default)]
    pub session: String,
}

/// Ack for step, step-line and continue requests.
#[derive(Debug, Clone, Deserialize)]
pub struct StepAck {
    #[serde(default)]
    pub step: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StdinAck {
    #[serde(default)]
    pub stdin: bool,
}

/// Breakpoint toggle response; on success carries the updated authoritative sets.
#[derive(Debug, Clone, Deserialize)]
pub struct BkptReply {
    #[serde(default)]
    pub bkpt: bool,
    #[serde(default)]
    pub error: bool,
    pub bkpts: Option<Vec<u64>>,
    #[serde(rename = "bkptLines")]
    pub bkpt_lines: Option<Vec<u32>>,
}

/// One record from the session-state or step-state dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateReply {
    /// False means "nothing to report yet" - the poll loop decides between
    /// retrying (`retry`) and abandoning the sequence.
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub retry: bool,
    pub arch: Option<String>,
    pub compile: Option<bool>,
    pub step: Option<bool>,
    #[serde(default)]
    pub done: bool,

    // compile result payload
    pub source: Option<String>,
    pub lang: Option<String>,
    #[serde(default)]
    pub failures: Vec<CompileFailure>,
    #[serde(default)]
    pub sections: Vec<AddrLabel>,
    #[serde(default)]
    pub symbols: Vec<AddrLabel>,
    #[serde(default)]
    pub disassembly: Vec<DisasmEntry>,

    // execution state payload
    pub pc: Option<u64>,
    pub disasm: Option<String>,
    pub regs: Option<Vec<RegEntry>>,
    pub vars: Option<Vec<VarEntry>>,
    pub stacktrace: Option<Vec<String>>,
    pub bkpts: Option<Vec<u64>>,
    #[serde(rename = "bkptLines")]
    pub bkpt_lines: Option<Vec<u32>>,
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub stdout: Vec<String>,
}
