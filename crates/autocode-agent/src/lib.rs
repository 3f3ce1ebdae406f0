//! # autocode-agent
//!
//! Everything between a pipeline stage and the generative service.
//!
//! - [`Gateway`]: one logical chat-completion request per call, with failures
//!   sorted into retryable and non-retryable kinds
//! - [`RetryPolicy`]: exponential backoff wrapped around a gateway call by the
//!   caller, never by the gateway itself
//! - [`UsageLedger`]: run-scoped token and cost accounting, injected into the
//!   gateway at construction

mod auth;
mod client;
mod retry;
mod transport;
mod types;
mod usage;

pub use auth::credential_from_env;
pub use client::{Completion, Gateway};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{ChatTransport, HttpReply, HttpTransport};
pub use types::*;
pub use usage::{UsageEntry, UsageLedger, UsageSummary};
