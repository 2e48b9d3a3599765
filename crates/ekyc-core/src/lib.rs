//! Core types, engines, and the verification pipeline for the eKYC service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! external collaborators (image storage, OCR, face similarity, the remote
//! extraction model, and the record store) are reached only through the traits
//! in [`collaborator`] and [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod collaborator;
pub mod decision;
pub mod error;
pub mod extract;
pub mod identity;
pub mod pipeline;
pub mod record;
pub mod store;

pub use collaborator::CollaboratorError;
pub use error::{Error, Result};
