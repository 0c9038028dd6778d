//! leancanvas: a keyword-to-lean-canvas business plan wizard.
//!
//! A five-stage generation pipeline (personas, business ideas, product
//! names, lean canvas) backed by an external LLM workflow service, with a
//! terminal wizard and a thin HTTP backend-for-frontend.

pub mod bootstrap;
pub mod channels;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod settings;
pub mod workflow;

pub use error::{Error, ErrorPayload};
