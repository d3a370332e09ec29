//! `biocalm` - guided biofeedback session orchestrator
//!
//! Drives one anxiety-regulation session against a physiological
//! acquisition service: questionnaires, a resting baseline, a cognitive
//! stressor game, paced breathing and a charted comparison of the
//! recorded signals.

pub mod breathing;
pub mod chart;
pub mod cli;
pub mod config;
pub mod error;
pub mod game;
pub mod link;
pub mod observability;
pub mod results;
pub mod sensor;
pub mod session;
pub mod status;
pub mod timer;
