//! Shared types for the fieldmux control plane.
//!
//! This crate contains:
//! - **Protocol messages** — the field→hub envelope and hub→dashboard events
//! - **Data model** — streamer records, live snapshots, and their sub-fields
//! - **ID generation** — streamer IDs and write/read credential tokens

pub mod ids;
pub mod models;
pub mod protocol;
