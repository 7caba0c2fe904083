//! Dispatch pipeline for cluster-side image generation.
//!
//! Materializes the prompt, writes the submission script, submits it through
//! a [`JobSubmitter`](imagen_core::scheduler::executor::JobSubmitter) behind
//! the [`GenerationGate`](gate::GenerationGate), then polls the filesystem for
//! the output image. [`generation::ImageGeneration`] drives the whole flow.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod generation;
pub mod materialize;
pub mod poller;
pub mod submit;
