//! Protocol adapters
//!
//! Adapters sit outside the pipeline: they build the input and correlation id
//! of a run and hand the resolved outcome to their transport.

pub mod cli;
pub mod http;
