//! Pipeline stage identifiers.
//!
//! A stage is one atomic remote job within an asset's pipeline. Stage
//! names appear in events, log lines, and error messages, so they are a
//! closed enum rather than free-form strings.

use serde::{Deserialize, Serialize};

/// One atomic remote job within an asset's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Draft mesh generation from a prompt (plus optional style image).
    MeshGenerate,
    /// Rig-eligibility pre-check on a draft mesh.
    PrerigCheck,
    /// Skeleton rigging of a draft mesh.
    Rig,
    /// Retargeting of one animation preset onto a rigged mesh.
    AnimateRetarget,
}

impl Stage {
    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::MeshGenerate => "mesh_generate",
            Stage::PrerigCheck => "prerig_check",
            Stage::Rig => "rig",
            Stage::AnimateRetarget => "animate_retarget",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for stage in [
            Stage::MeshGenerate,
            Stage::PrerigCheck,
            Stage::Rig,
            Stage::AnimateRetarget,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }
}
