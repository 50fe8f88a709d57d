//! Sweep orchestration and its supporting services.

pub mod report;
pub mod sweep;
pub mod wordlist;

pub use report::{Finding, FindingKind, SweepReport, SweepStatus};
pub use sweep::{run_sweep, Confirm, SegmentPlan, Sweeper};
pub use wordlist::{Wordlist, WordlistError};
