//! Logic modules: translates configuration choices into concrete plan values.
//!
//! # Modules
//!
//! - `resolver`: architecture-specific packages and partition types
//! - `late_commands`: ordered post-install command list

pub mod late_commands;
pub mod resolver;
