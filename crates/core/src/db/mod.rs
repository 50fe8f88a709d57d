//! Analysis database integration.
//!
//! The cleanup engine reads and mutates an existing analysis database through
//! the [`AnalysisDb`] port. Nothing in the engine holds global state: every
//! component receives the database explicitly, so tests can substitute the
//! in-memory [`MemoryDb`].
//!
//! This module also hosts:
//! - `SweepConfig`: serializable sweep configuration.
//! - `Snapshot`: serializable address-space snapshot backing `MemoryDb`.
//! - `HistoryDb`: a small SQLite store of past sweeps.

use thiserror::Error;

use crate::model::{Address, Flags, Function, Instruction, ListingLine, OperandRepr, Segment};

pub mod config;
pub mod history;
pub mod memory;
pub mod snapshot;

pub use config::{load_config, save_config, RenderOptions, SegmentRules, SweepConfig};
pub use history::{timestamp_now, FindingRecord, HistoryDb, HistoryError, SweepRunRecord};
pub use memory::MemoryDb;
pub use snapshot::{load_snapshot, save_snapshot, Snapshot};

/// Error type for rejected database mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    /// The requested range overlaps items that must be removed first.
    #[error("{op} at {address} conflicts with the existing item at {existing}")]
    Conflict { op: &'static str, address: Address, existing: Address },

    /// Nothing of the expected kind exists at the address.
    #[error("{what} not found at {address}")]
    NotFound { what: &'static str, address: Address },

    /// The database refused the change for another reason.
    #[error("{op} rejected at {address}: {reason}")]
    Rejected { op: &'static str, address: Address, reason: String },

    /// No instruction could be decoded at the address.
    #[error("cannot decode an instruction at {0}")]
    Undecodable(Address),
}

/// Convenience result type for database mutations.
pub type DbResult<T> = Result<T, DbError>;

/// Query/mutation port onto an analysis database.
///
/// Queries never fail: absent information is reported as empty flags, `None`
/// or an empty list. Mutations are applied immediately and are visible to the
/// next query; there are no transactions.
pub trait AnalysisDb {
    // Address queries.

    fn flags(&self, ea: Address) -> Flags;

    /// Alignment in bytes of an alignment item at `ea`.
    fn alignment(&self, ea: Address) -> Option<u64>;

    fn comment(&self, ea: Address) -> Option<String>;

    /// Little-endian 32-bit value stored at `ea`.
    fn read_u32(&self, ea: Address) -> Option<u32>;

    /// Size of the item at `ea` (1 for unexplored bytes).
    fn item_size(&self, ea: Address) -> u64;

    /// Element size of the data item at `ea` (equals `item_size` for scalars).
    fn element_size(&self, ea: Address) -> u64;

    /// Next location in listing order after `ea`.
    fn next_head(&self, ea: Address) -> Address;

    /// Head of the item preceding `ea`.
    fn prev_head(&self, ea: Address) -> Option<Address>;

    // Instructions.

    fn decode(&self, ea: Address) -> Option<Instruction>;

    /// Whether the instruction at `ea` is a padding encoding (no-op filler).
    fn is_padding_insn(&self, ea: Address) -> bool;

    // Functions.

    fn function_at(&self, ea: Address) -> Option<Function>;

    /// First function whose start is strictly greater than `ea`.
    fn next_function(&self, ea: Address) -> Option<Function>;

    fn create_function(&mut self, ea: Address) -> DbResult<()>;

    fn delete_function(&mut self, start: Address) -> DbResult<()>;

    fn set_function_end(&mut self, start: Address, end: Address) -> DbResult<()>;

    fn same_function(&self, a: Address, b: Address) -> bool {
        match (self.function_at(a), self.function_at(b)) {
            (Some(fa), Some(fb)) => fa.start == fb.start,
            _ => false,
        }
    }

    // Cross-references.

    /// Sources of every data reference to `ea`, in address order.
    fn data_refs_to(&self, ea: Address) -> Vec<Address>;

    fn delete_data_ref(&mut self, from: Address, to: Address) -> DbResult<()>;

    /// Switch statement owning the jump-table location `ea`, if any.
    fn switch_parent(&self, ea: Address) -> Option<Address>;

    // Items.

    fn create_instruction(&mut self, ea: Address) -> DbResult<()>;

    /// Create a fixed-width scalar data item.
    fn create_scalar(&mut self, ea: Address, width: u64) -> DbResult<()>;

    fn create_alignment(&mut self, ea: Address, size: u64, alignment: u64) -> DbResult<()>;

    /// Undefine every item overlapping `[ea, ea + size)`.
    fn delete_items(&mut self, ea: Address, size: u64) -> DbResult<()>;

    fn set_operand_repr(&mut self, ea: Address, n: usize, repr: OperandRepr) -> DbResult<()>;

    // Segments and names.

    /// All segments, ordered by start address.
    fn segments(&self) -> Vec<Segment>;

    fn delete_name(&mut self, ea: Address) -> DbResult<()>;

    // Presentation.

    /// Rendered disassembly lines for `[start, end)`.
    fn render_lines(&self, start: Address, end: Address) -> Vec<ListingLine>;

    // Host auto-analysis queue.

    fn auto_analysis_idle(&self) -> bool {
        true
    }

    fn cancel_pending_analysis(&mut self) {}
}
