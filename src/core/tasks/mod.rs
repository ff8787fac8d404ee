// src/core/tasks/mod.rs

//! Long-running background tasks: the per-record keepalive scheduler and the
//! pool-wide idle reaper.

pub mod idle_reaper;
pub mod keepalive;
