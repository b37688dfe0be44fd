//! Pipeline building blocks for document conversion.
//!
//! Each submodule owns one concern, so the orchestration in
//! [`crate::convert`] reads as a straight chain of calls and each piece can
//! be tested alone.
//!
//! ## Data Flow
//!
//! ```text
//! stage ──▶ render ──▶ invoke ──▶ (stage ──▶ render ──▶ invoke)
//! (bytes→file) (argv)  (process)   only for JPEG output
//! ```
//!
//! 1. [`stage`]: write a byte payload to a uniquely named temp file and
//!    guarantee its removal
//! 2. [`render`]: build the argv/env for the HTML→PDF and PDF→JPEG steps
//! 3. [`invoke`]: run a renderer process with timeout, concurrency cap and
//!    output policy

pub mod invoke;
pub mod render;
pub mod stage;
