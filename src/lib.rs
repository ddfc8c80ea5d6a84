//! Rule Router
//!
//! An HTTP server that routes requests by their headers: every request
//! is scored against a weighted rule set and answered with the canned
//! JSON payloads of the best-scoring rules.
//!
//! # Features
//!
//! - **Additive Scoring**: One point per satisfied header comparison;
//!   a single failing comparison zeroes the whole rule
//! - **Best-Match Routing**: The highest score wins, and ties serve
//!   every tied payload
//! - **Concurrent Evaluation**: The rule list is scored across
//!   configurable partitions
//! - **Decision Caching**: Repeated header signatures skip rule
//!   evaluation entirely
//! - **Payload Caching**: Each response file is read from disk once
//! - **Fallback Responses**: Unmatched requests get a configurable
//!   default payload
//!
//! # Example Rules File
//!
//! ```yaml
//! rules:
//!   - conditions:
//!       equals:
//!         x-tenant: acme
//!       contains:
//!         user-agent: curl
//!     response: responses/acme.json
//!   - conditions:
//!       not_equals:
//!         x-env: prod
//!     response: responses/staging.json
//! fallback_response: no_match.json
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod server;

pub use config::RouterConfig;
pub use engine::{MatchOutcome, RuleEngine};
