use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- communication errors --------------------------------------
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed server response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("server not ready after {0} poll attempts")]
    RetryBudgetExhausted(u32),

    // --------------------------------- protocol errors -------------------------------------------
    #[error("compile request rejected")]
    CompileRejected,
    #[error("step request rejected")]
    StepRejected,
    #[error("breakpoint request failed")]
    BreakpointFailed,
    #[error("stdin request rejected")]
    StdinRejected,

    // --------------------------------- local errors ----------------------------------------------
    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Return a hint to an interface - whether the session was torn down because of this error.
    /// Every communication or protocol error forces the session back to idle; local errors
    /// (bad user input, file io) leave it untouched.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::InvalidResponse(_) => true,
            Error::RetryBudgetExhausted(_) => true,
            Error::CompileRejected => true,
            Error::StepRejected => true,
            Error::BreakpointFailed => true,
            Error::StdinRejected => true,

            Error::UnknownLanguage(_) => false,
            Error::IO(_) => false,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "session", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "session", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}
