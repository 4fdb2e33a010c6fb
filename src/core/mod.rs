pub mod controller;
pub mod engine;
pub mod export;
pub mod import;
pub mod outcome;
pub mod parser;
pub mod reconciler;

pub use crate::domain::model::{
    CallbackOutcome, FilterResult, OutputLine, ParseError, Payload, Record, RecordError, Session,
    Timestamp,
};
pub use crate::domain::ports::{ExecutionBackend, SessionStore, Storage};
pub use crate::utils::error::Result;
