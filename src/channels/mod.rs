//! Front ends driving the wizard: the terminal REPL and the BFF HTTP server.

pub mod repl;
pub mod web;
