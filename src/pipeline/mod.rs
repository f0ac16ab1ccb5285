//! Pipeline stages for invoice auditing.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the model call is the only stage with network I/O.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ llm ──▶ parse
//! (upload)   (lopdf)    (template)  (model)  (report + record)
//! ```
//!
//! 1. [`input`]  : normalise an upload, path or URL to an [`input::UploadedDocument`]
//!    and gate on the declared MIME type
//! 2. [`extract`]: one line of text per page; runs in `spawn_blocking`
//!    because PDF parsing is CPU-bound
//! 3. [`crate::prompts`]: interpolate the text into the audit template
//! 4. [`llm`]    : the single model call behind the [`llm::ModelClient`] seam
//! 5. [`parse`]  : split the reply on the separator and deserialize the record

pub mod extract;
pub mod input;
pub mod llm;
pub mod parse;
