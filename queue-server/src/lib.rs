//! Multi-outlet customer queue service: admission with per-day tokens and
//! dense queue positions, the service state machine, wait-time estimates and
//! daily queue aggregates, served over a JSON REST API.

pub mod backend;
pub mod config;
