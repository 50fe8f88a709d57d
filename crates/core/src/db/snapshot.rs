//! Serializable address-space snapshot.
//!
//! A snapshot captures what an auto-analysis pass produced: segments, image
//! bytes, decoded instructions, defined items, functions, cross-references,
//! comments, names and switch tables. [`crate::db::MemoryDb`] is built from a
//! snapshot and can be turned back into one after a sweep.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Address, Function, Instruction, OperandRepr, Segment};

fn default_true() -> bool {
    true
}

/// Raw image bytes starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteChunk {
    pub start: Address,
    pub bytes: Vec<u8>,
}

/// What a defined item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemData {
    Code,
    Data { element_size: u64 },
    Align { alignment: u64 },
}

/// A defined item occupying `[address, address + size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub address: Address,
    pub size: u64,
    pub data: ItemData,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub struct_member: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strlit: bool,
    #[serde(default)]
    pub operands: [OperandRepr; 2],
}

impl Item {
    pub fn code(address: impl Into<Address>, size: u64) -> Self {
        Self::with_data(address, size, ItemData::Code)
    }

    pub fn data(address: impl Into<Address>, size: u64, element_size: u64) -> Self {
        Self::with_data(address, size, ItemData::Data { element_size })
    }

    pub fn align(address: impl Into<Address>, size: u64, alignment: u64) -> Self {
        Self::with_data(address, size, ItemData::Align { alignment })
    }

    fn with_data(address: impl Into<Address>, size: u64, data: ItemData) -> Self {
        Self {
            address: address.into(),
            size: size.max(1),
            data,
            struct_member: false,
            strlit: false,
            operands: [OperandRepr::Default; 2],
        }
    }

    pub fn struct_member(mut self) -> Self {
        self.struct_member = true;
        self
    }

    pub fn string_literal(mut self) -> Self {
        self.strlit = true;
        self
    }

    pub fn with_operand(mut self, n: usize, repr: OperandRepr) -> Self {
        if let Some(slot) = self.operands.get_mut(n) {
            *slot = repr;
        }
        self
    }

    pub fn end(&self) -> Address {
        self.address.offset(self.size)
    }

    pub fn contains(&self, ea: Address) -> bool {
        ea >= self.address && ea < self.end()
    }
}

/// Kind of cross-reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XrefKind {
    Code,
    #[default]
    Data,
}

/// A directed cross-reference `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Xref {
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub kind: XrefKind,
}

impl Xref {
    pub fn data(from: impl Into<Address>, to: impl Into<Address>) -> Self {
        Self { from: from.into(), to: to.into(), kind: XrefKind::Data }
    }

    pub fn code(from: impl Into<Address>, to: impl Into<Address>) -> Self {
        Self { from: from.into(), to: to.into(), kind: XrefKind::Code }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub address: Address,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub address: Address,
    pub name: String,
}

/// A jump-table location and the switch statement that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEntry {
    pub table: Address,
    pub parent: Address,
}

/// Complete serializable state of an analyzed address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Architecture hint for raw-byte decoding (e.g. `x86`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Whether the host's auto-analysis had finished when the snapshot was taken.
    #[serde(default = "default_true")]
    pub auto_analysis_complete: bool,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub chunks: Vec<ByteChunk>,
    /// Pre-decoded instructions, consulted before raw-byte decoding.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub xrefs: Vec<Xref>,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
    #[serde(default)]
    pub names: Vec<NameEntry>,
    #[serde(default)]
    pub switch_tables: Vec<SwitchEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            arch: None,
            auto_analysis_complete: true,
            segments: Vec::new(),
            chunks: Vec::new(),
            instructions: Vec::new(),
            items: Vec::new(),
            functions: Vec::new(),
            xrefs: Vec::new(),
            comments: Vec::new(),
            names: Vec::new(),
            switch_tables: Vec::new(),
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

/// Load a snapshot from JSON or YAML (chosen by extension).
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot at {}", path.display()))?;
    let snapshot = if is_yaml(path) {
        serde_yaml::from_str(&text).context("Failed to parse snapshot YAML")?
    } else {
        serde_json::from_str(&text).context("Failed to parse snapshot JSON")?
    };
    Ok(snapshot)
}

/// Write a snapshot as JSON or YAML (chosen by extension).
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let text = if is_yaml(path) {
        serde_yaml::to_string(snapshot).context("Failed to serialize snapshot to YAML")?
    } else {
        serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot to JSON")?
    };
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write snapshot at {}", path.display()))
}
