//! Bounded-retry polling, shared by the session-state and step-state
//! dashboards. Both dashboards answer "not ready yet" while a command is
//! still in the server's queue; the loop below re-asks on a fixed cadence
//! until a classifier declares the answer terminal or the budget runs out.

use crate::error::Error;
use crate::proto::StateReply;
use crate::transport::{Request, Transport};
use std::time::Duration;

/// "Not ready" answers allowed per sequence; together with [`RETRY_DELAY`]
/// this bounds a sequence to roughly 15 seconds.
pub const MAX_POLL_TRIES: u32 = 30;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Retry bookkeeping for one poll sequence. The counter restarts with every
/// new sequence; it never carries over from a previous user action.
#[derive(Debug)]
pub struct PollState {
    tries: u32,
    max: u32,
}

impl PollState {
    pub fn new(max: u32) -> Self {
        Self { tries: 0, max }
    }

    /// Start a fresh sequence.
    pub fn begin(&mut self) {
        self.tries = 0;
    }

    /// Account one "not ready" answer; false once the budget is spent.
    pub fn try_again(&mut self) -> bool {
        if self.tries >= self.max {
            return false;
        }
        self.tries += 1;
        true
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new(MAX_POLL_TRIES)
    }
}

/// What a classifier decided about one dashboard answer.
pub enum Verdict {
    /// Predicate satisfied, the reply is the result of the sequence.
    Ready,
    /// Application-level "not yet": ask again after [`RETRY_DELAY`].
    NotReady,
    /// Nothing to wait for (e.g. resuming a session id the server no longer
    /// knows, without a forced retry): end the sequence without a result.
    Abandon,
    /// Protocol inconsistency: the sequence failed.
    Failed(Error),
}

/// Re-issue `req` until `classify` is satisfied or the budget is exhausted.
/// Transport-level failures and unparsable responses are terminal
/// immediately - the budget applies only to "not ready" answers.
pub async fn retrying<T: Transport>(
    transport: &mut T,
    req: Request,
    state: &mut PollState,
    classify: impl Fn(&StateReply) -> Verdict,
) -> Result<Option<StateReply>, Error> {
    state.begin();
    loop {
        let raw = transport.roundtrip(req.clone()).await?;
        let reply: StateReply = serde_json::from_slice(&raw)?;
        match classify(&reply) {
            Verdict::Ready => return Ok(Some(reply)),
            Verdict::Abandon => return Ok(None),
            Verdict::Failed(err) => return Err(err),
            Verdict::NotReady => {
                if !state.try_again() {
                    return Err(Error::RetryBudgetExhausted(state.tries()));
                }
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
