//! # Noteroom Merge
//!
//! Character-level diffing and fuzzy context patching.
//!
//! This crate implements the text half of the merge resolver: given the text
//! a client started from and the text it proposes, it computes an edit
//! script, packages the edits as context-carrying hunks, and re-applies
//! those hunks against a third text that may have drifted in the meantime.
//!
//! ## Design Principles
//!
//! - Hunks are located by their surrounding context, not by absolute offset,
//!   so unrelated edits elsewhere in the document do not break application.
//! - Context is trimmed progressively when an exact match fails (the fuzz);
//!   the removed text itself must always match exactly. The tolerance is a
//!   replaceable strategy, not a contract.
//! - Application is all-or-nothing per hunk, never per patch set: the report
//!   says which hunks applied, and the caller decides whether a partial
//!   result is acceptable.
//! - No I/O, no async, no dependencies. Inputs are treated as sequences of
//!   `char`s, so multi-byte text patches cleanly.
//!
//! ## Example
//!
//! ```rust
//! use noteroom_merge::PatchSet;
//!
//! // The client appended "y" while the server gained an unrelated "x".
//! let patches = PatchSet::from_texts("ab", "aby");
//! let report = patches.apply("axb");
//! assert!(report.all_applied());
//! assert_eq!(report.merged, "axby");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod patch;

pub use diff::{diff, DiffOp};
pub use patch::{ApplyReport, Hunk, PatchSet};
