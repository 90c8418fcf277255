//! Point-based atlas records.
//!
//! Each record is a fixed-schema `{id, position, system, color}` entry.
//! On disk the position is spelled as three scalar fields:
//!
//! ```json
//! [{ "id": 1, "x": -25, "y": -98, "z": -12, "system": "visual", "color": [0, 0, 255] }]
//! ```
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Functional system (network) an ROI belongs to.
///
/// Accepts both snake_case names and the spelled-out labels used by the
/// Power 264-node atlas (e.g. `"Default mode"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum System {
    #[serde(alias = "Sensory/somatomotor Hand")]
    SomatomotorHand,
    #[serde(alias = "Sensory/somatomotor Mouth")]
    SomatomotorMouth,
    #[serde(alias = "Cingulo-opercular Task Control")]
    CinguloOpercular,
    #[serde(alias = "Auditory")]
    Auditory,
    #[serde(alias = "Default mode")]
    DefaultMode,
    #[serde(alias = "Memory retrieval?", alias = "Memory retrieval")]
    MemoryRetrieval,
    #[serde(alias = "Visual")]
    Visual,
    #[serde(alias = "Fronto-parietal Task Control")]
    FrontoParietal,
    #[serde(alias = "Salience")]
    Salience,
    #[serde(alias = "Subcortical")]
    Subcortical,
    #[serde(alias = "Ventral attention")]
    VentralAttention,
    #[serde(alias = "Dorsal attention")]
    DorsalAttention,
    #[serde(alias = "Cerebellar")]
    Cerebellar,
    #[serde(alias = "Uncertain")]
    Uncertain,
}

impl System {
    /// Display label; always accepted back by deserialisation.
    pub fn label(&self) -> &'static str {
        match self {
            System::SomatomotorHand => "Sensory/somatomotor Hand",
            System::SomatomotorMouth => "Sensory/somatomotor Mouth",
            System::CinguloOpercular => "Cingulo-opercular Task Control",
            System::Auditory => "Auditory",
            System::DefaultMode => "Default mode",
            System::MemoryRetrieval => "Memory retrieval",
            System::Visual => "Visual",
            System::FrontoParietal => "Fronto-parietal Task Control",
            System::Salience => "Salience",
            System::Subcortical => "Subcortical",
            System::VentralAttention => "Ventral attention",
            System::DorsalAttention => "Dorsal attention",
            System::Cerebellar => "Cerebellar",
            System::Uncertain => "Uncertain",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One atlas ROI centre in reference (template) space, millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AtlasRecord", into = "AtlasRecord")]
pub struct AtlasPoint {
    pub id: u32,
    pub position: [f64; 3],
    pub system: Option<System>,
    pub color: [u8; 3],
}

#[derive(Serialize, Deserialize)]
struct AtlasRecord {
    id: u32,
    x: f64,
    y: f64,
    z: f64,
    #[serde(default)]
    system: Option<System>,
    #[serde(default)]
    color: [u8; 3],
}

impl From<AtlasRecord> for AtlasPoint {
    fn from(r: AtlasRecord) -> Self {
        Self { id: r.id, position: [r.x, r.y, r.z], system: r.system, color: r.color }
    }
}

impl From<AtlasPoint> for AtlasRecord {
    fn from(p: AtlasPoint) -> Self {
        let [x, y, z] = p.position;
        Self { id: p.id, x, y, z, system: p.system, color: p.color }
    }
}

/// Ordered collection of atlas points.  Node `i` of every downstream matrix
/// is `points[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Atlas {
    pub points: Vec<AtlasPoint>,
}

impl Atlas {
    pub fn new(points: Vec<AtlasPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Distinct systems present, sorted.
    pub fn systems(&self) -> Vec<System> {
        let set: BTreeSet<System> = self.points.iter().filter_map(|p| p.system).collect();
        set.into_iter().collect()
    }
}
