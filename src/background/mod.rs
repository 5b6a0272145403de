//! Background analysis module - runs the accent pipeline off the request path
//!
//! Structure:
//! - `processors`: stage logic (download, audio extraction, accent classification, setup)
//! - `pipeline`: one submission's download-extract-classify chain and its failure taxonomy
//! - `registry`: task table, worker pool, and result hand-off to the API
//! - `scratch`: per-task temporary files and their cleanup

pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod scratch;
