//! Workspace facade crate.
//!
//! Exposes the workspace feature flags (`desktop-shims`, `audio-output`) so
//! host applications can depend on `cutting-machinery-workspace` without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
