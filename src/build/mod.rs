// src/build/mod.rs

//! Per-configuration build plumbing.
//!
//! - [`invoker`] wraps one signed configuration into a [`Compiler`] handle
//!   that can build once or start a registered watch session.
//! - [`reporter`] turns a single [`BuildOutcome`](crate::bundler::BuildOutcome)
//!   into a normalised [`ResultRecord`], logging diagnostics on the way.

pub mod invoker;
pub mod reporter;

pub use invoker::Compiler;
pub use reporter::{report, BuildStatus, ResultMap, ResultRecord};
