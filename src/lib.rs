pub mod breakpoint;
pub mod config;
pub mod console;
pub mod error;
pub mod listing;
pub mod poll;
pub mod proto;
pub mod register;
pub mod session;
pub mod transport;
pub mod view;

pub use error::Error;
pub use session::{Session, SessionState};
