//! Scheduler submission plumbing.
//!
//! [`JobSubmitter`](executor::JobSubmitter) abstracts "hand this script to the
//! cluster". [`QsubSubmitter`](qsub::QsubSubmitter) is the Grid Engine
//! implementation; all spawn, capture and timeout handling lives in
//! [`subprocess`] so alternative submitters can reuse it.

pub mod executor;
pub mod qsub;
pub mod subprocess;
