use serde::{Deserialize, Serialize};

use crate::model::Address;

/// Category of a [`Finding`], used for counting and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    XrefRemoved,
    AlignmentCreated,
    FunctionCreated,
    FunctionRemoved,
    PartialFunction,
    FunctionExtended,
    TagDetected,
    FunctionReference,
    DataReference,
    Defect,
}

impl FindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::XrefRemoved => "xref_removed",
            FindingKind::AlignmentCreated => "alignment_created",
            FindingKind::FunctionCreated => "function_created",
            FindingKind::FunctionRemoved => "function_removed",
            FindingKind::PartialFunction => "partial_function",
            FindingKind::FunctionExtended => "function_extended",
            FindingKind::TagDetected => "tag_detected",
            FindingKind::FunctionReference => "function_reference",
            FindingKind::DataReference => "data_reference",
            FindingKind::Defect => "defect",
        }
    }
}

/// One repair, detection or defect observed during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    XrefRemoved { from: Address, to: Address },
    AlignmentCreated { address: Address, size: u64 },
    FunctionCreated { address: Address },
    /// A function deleted because it was the byproduct of its predecessor's truncation.
    FunctionRemoved { address: Address },
    PartialFunction { address: Address },
    FunctionExtended { start: Address, from: Address, to: Address, listing: Vec<String> },
    TagDetected { address: Address, tag: String },
    FunctionReference { address: Address },
    DataReference { address: Address },
    /// Non-fatal failure; the sweep moved on.
    Defect { address: Address, message: String },
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Finding::XrefRemoved { .. } => FindingKind::XrefRemoved,
            Finding::AlignmentCreated { .. } => FindingKind::AlignmentCreated,
            Finding::FunctionCreated { .. } => FindingKind::FunctionCreated,
            Finding::FunctionRemoved { .. } => FindingKind::FunctionRemoved,
            Finding::PartialFunction { .. } => FindingKind::PartialFunction,
            Finding::FunctionExtended { .. } => FindingKind::FunctionExtended,
            Finding::TagDetected { .. } => FindingKind::TagDetected,
            Finding::FunctionReference { .. } => FindingKind::FunctionReference,
            Finding::DataReference { .. } => FindingKind::DataReference,
            Finding::Defect { .. } => FindingKind::Defect,
        }
    }

    /// Address the finding is reported against.
    pub fn address(&self) -> Address {
        match self {
            Finding::XrefRemoved { from, .. } => *from,
            Finding::FunctionExtended { start, .. } => *start,
            Finding::AlignmentCreated { address, .. }
            | Finding::FunctionCreated { address }
            | Finding::FunctionRemoved { address }
            | Finding::PartialFunction { address }
            | Finding::TagDetected { address, .. }
            | Finding::FunctionReference { address }
            | Finding::DataReference { address }
            | Finding::Defect { address, .. } => *address,
        }
    }

    /// Diagnostic line for the log sink.
    pub fn message(&self) -> String {
        match self {
            Finding::XrefRemoved { from, to } => {
                format!("Removed bad xref at address {from} to {to}")
            }
            Finding::AlignmentCreated { address, size } => {
                format!("Created function alignment at address {address} ({size} bytes)")
            }
            Finding::FunctionCreated { address } => format!("Created function at {address}"),
            Finding::FunctionRemoved { address } => format!("Removed bad function at {address}"),
            Finding::PartialFunction { address } => format!("Found partial function at {address}"),
            Finding::FunctionExtended { from, to, .. } => {
                format!("Extended function end from {from} to {to}")
            }
            Finding::TagDetected { address, tag } => format!("Found '{tag}' tag at {address}"),
            Finding::FunctionReference { address } => {
                format!("Function reference detected at {address}")
            }
            Finding::DataReference { address } => format!("Data reference detected at {address}"),
            Finding::Defect { address, message } => format!("{message} at {address}"),
        }
    }
}

/// Outcome of the sweep's confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    #[default]
    Completed,
    /// The caller declined to sweep while auto-analysis was still running.
    Declined,
}

impl SweepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SweepStatus::Completed => "completed",
            SweepStatus::Declined => "declined",
        }
    }

    /// Inverse of [`SweepStatus::as_str`]; unknown names read as completed.
    pub fn from_name(name: &str) -> Self {
        match name {
            "declined" => SweepStatus::Declined,
            _ => SweepStatus::Completed,
        }
    }
}

/// Everything one sweep did.
///
/// Findings are recorded in the order they happened. Recording also emits the
/// finding's diagnostic line through `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub status: SweepStatus,
    pub segments: usize,
    pub addresses_visited: u64,
    pub wordlist_entries: usize,
    pub elapsed_ms: u64,
    pub findings: Vec<Finding>,
}

impl SweepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, finding: Finding) {
        match &finding {
            Finding::Defect { .. } => tracing::warn!("{}", finding.message()),
            Finding::FunctionExtended { listing, .. } => {
                tracing::info!("{}", finding.message());
                for line in listing {
                    tracing::info!("{line}");
                }
            }
            _ => tracing::info!("{}", finding.message()),
        }
        self.findings.push(finding);
    }

    pub fn defect(&mut self, address: Address, message: impl Into<String>) {
        self.record(Finding::Defect { address, message: message.into() });
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind() == kind).count()
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind() == kind)
    }

    /// Diagnostic lines for every finding, in order.
    pub fn messages(&self) -> Vec<String> {
        self.findings.iter().map(Finding::message).collect()
    }
}
