//! Adventure Bench - text-adventure benchmark harness for language models
//!
//! This crate plays goal-driven text adventures against model-backed players
//! and scores the resulting interaction logs. The world simulation and the
//! model backends are ports ([`interpreter::WorldInterpreter`],
//! [`player::ModelBackend`]) supplied by the caller.

pub mod adventure;
pub mod config;
pub mod harness;
pub mod interpreter;
pub mod player;
pub mod report;
pub mod runner;
pub mod scorer;
