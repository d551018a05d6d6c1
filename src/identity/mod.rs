//! Managed-identity token acquisition.
//!
//! Layout:
//! - `chain.rs`: the credential chain (environment, App-Service endpoint,
//!   IMDS) and the [`AccessToken`] it produces

pub mod chain;

pub use chain::{AccessToken, CredentialChain};
