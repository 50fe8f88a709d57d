//! Heuristic detectors and repairers.
//!
//! Every component takes the database explicitly and re-queries it on each
//! call; nothing is cached between addresses.
//!
//! - `classify`: fail-closed instruction predicates.
//! - `xrefs`: spurious data reference removal.
//! - `align`: padding detection and alignment items.
//! - `functions`: truncated function repair.
//! - `tags`: four-character tag immediates.
//! - `listing`: audit listings for the log.
//! - `driver`: per-address code and data paths.

pub mod align;
pub mod classify;
pub mod driver;
pub mod functions;
pub mod listing;
pub mod tags;
pub mod xrefs;

pub use align::{is_padding_run, AlignOutcome, AlignmentMaterializer, ALIGNMENT};
pub use driver::{classify_data, CleanupDriver, DataVerdict};
pub use functions::{scan_for_end, FunctionRepairer, ScanStop, MAX_REPAIR_ATTEMPTS, MAX_SCAN_STEPS};
pub use listing::{render_listing, strip_comment};
pub use tags::{candidate_tag, tag_verdict, TagDetector, TagVerdict, FLOAT_HINT_COMMENT};
pub use xrefs::{
    is_jump_table, source_verdict, target_verdict, SourceVerdict, TargetVerdict, XrefSanitizer,
    JUMP_TABLE_MARKER,
};
