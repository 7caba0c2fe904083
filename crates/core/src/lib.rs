//! Domain logic for dispatching text-to-image jobs to a Grid Engine cluster.
//!
//! Everything here is free of configuration and global state: correlation
//! IDs, prompt normalization, per-request path derivation, submission-script
//! templating, job lifecycle states, and the subprocess layer used to invoke
//! the scheduler's submission command.

pub mod correlation;
pub mod descriptor;
pub mod error;
pub mod job_state;
pub mod prompt;
pub mod request;
pub mod scheduler;
