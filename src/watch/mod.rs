// src/watch/mod.rs

//! Watch Multiplexer.
//!
//! This module is responsible for:
//! - Keeping one OS watch (`notify`) per directory that holds a tracked
//!   module, shared by every module in it.
//! - Translating raw notifications into module identities and handing them
//!   to the collector; files nobody tracks are dropped.
//! - Exclude globs for third-party trees and the optional content-hash
//!   filter.
//!
//! It does **not** know about the dependency graph; it only turns
//! filesystem changes into "this module changed".

pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use hash::ContentDigests;
pub use patterns::{ExcludeSet, DEFAULT_EXCLUDES};
pub use watcher::{is_content_event, spawn_multiplexer, WatchEvent, WatchTable};
