//! Database access: one authenticated session per call, one statement per
//! session.
//!
//! Layout:
//! - `session.rs`: token-authenticated session factory and the open-session
//!   gauge
//! - `query.rs`: parameterized statement execution and result normalization

pub mod query;
pub mod session;

pub use query::{QueryExecutor, QueryResult, QuerySpec, SqlParam, SqlValue};
pub use session::{DbSession, SessionFactory, SessionGauge};
