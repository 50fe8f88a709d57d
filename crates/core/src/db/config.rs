use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Segment, SegmentKind};

/// Name heuristics used to decide whether a segment carries code and/or data.
///
/// Matching is by substring. A segment may be both code- and data-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRules {
    /// Name fragments of middleware/engine segments that contain code.
    pub code_markers: Vec<String>,
    /// A code marker is ignored when the name also contains one of these.
    pub code_exclusions: Vec<String>,
    /// Name fragments of segments that contain data.
    pub data_markers: Vec<String>,
}

impl Default for SegmentRules {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            code_markers: owned(&["BINK"]),
            code_exclusions: owned(&["DATA"]),
            data_markers: owned(&["D3D", "DSOUND", "XNET", "XPP", "DOLBY", "DATA", "$$X"]),
        }
    }
}

impl SegmentRules {
    pub fn has_code(&self, segment: &Segment) -> bool {
        let name = segment.name.as_str();
        segment.kind == SegmentKind::Code
            || (self.code_markers.iter().any(|m| name.contains(m.as_str()))
                && !self.code_exclusions.iter().any(|m| name.contains(m.as_str())))
    }

    pub fn has_data(&self, segment: &Segment) -> bool {
        let name = segment.name.as_str();
        segment.kind == SegmentKind::Data
            || self.data_markers.iter().any(|m| name.contains(m.as_str()))
    }
}

/// Formatting of the audit listing printed after a function is extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub indent: bool,
    /// Keep only the items' own lines (drop headers and separators).
    pub only_instructions: bool,
    pub strip_comments: bool,
    pub skip_blank: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { indent: true, only_instructions: true, strip_comments: true, skip_blank: true }
    }
}

/// Serializable configuration for a cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub segments: SegmentRules,
    /// Optional word list (one entry per line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordlist: Option<PathBuf>,
    pub render: RenderOptions,
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

/// Load a sweep config from JSON or YAML (chosen by extension).
pub fn load_config(path: &Path) -> Result<SweepConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sweep config at {}", path.display()))?;
    let config = if is_yaml(path) {
        serde_yaml::from_str(&text).context("Failed to parse sweep config YAML")?
    } else {
        serde_json::from_str(&text).context("Failed to parse sweep config JSON")?
    };
    Ok(config)
}

/// Write a sweep config as JSON or YAML (chosen by extension).
pub fn save_config(path: &Path, config: &SweepConfig) -> Result<()> {
    let text = if is_yaml(path) {
        serde_yaml::to_string(config).context("Failed to serialize sweep config to YAML")?
    } else {
        serde_json::to_string_pretty(config).context("Failed to serialize sweep config to JSON")?
    };
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write sweep config at {}", path.display()))
}
