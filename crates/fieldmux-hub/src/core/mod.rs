//! Core control-plane components (C1-C10 — see crate-level docs for how
//! they compose into a streamer pipeline).

pub mod health;
pub mod obs;
pub mod pipeline;
pub mod port_allocator;
pub mod relay;
pub mod relay_group;
pub mod srt_group;
pub mod srt_link;
pub mod supervisor;
