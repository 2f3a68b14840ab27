//! Per-page plumbing around the remote model.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others (and without pdfium or a network).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ (model) ──▶ postprocess
//! (files)   (pdfium)   (base64)               (cleanup)
//! ```
//!
//! 1. [`input`]: list source files, validate PDFs, name output files
//! 2. [`render`]: rasterise one page on demand; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: PNG-encode and base64-wrap the page image
//! 4. [`postprocess`]: deterministic cleanup of the model's answer

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod render;
