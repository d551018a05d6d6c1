//! Route handlers. Thin by design: each one validates input through the
//! egress guard where applicable, calls into the core layers, and shapes
//! the JSON body.

pub mod meta;
pub mod net;
pub mod pi;
pub mod sql;
