//! Control hazard handling.
//!
//! Branches are resolved in the execute stage, so by the time we know a branch is taken the two
//! instructions behind it (one in IF/ID, one being fetched) came from the wrong path and must be
//! replaced with bubbles.

use crate::signals::{ControlSignals, PCSrc};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// Which of the younger pipeline slots to squash this cycle.
pub enum Flush {
    #[default]
    None,
    /// squash the instruction moving from IF/ID into ID/EX, and the one being fetched into IF/ID
    IfIdAndIdEx,
}

impl Flush {
    pub fn is_flushing(self) -> bool {
        self == Self::IfIdAndIdEx
    }
}

/// The hazard detection unit decides, from the instruction in the execute stage, where the next PC comes from
/// and whether the speculatively fetched instructions behind it must be discarded.
///
/// # Fields
///
/// * `branch` - whether the instruction in the execute stage is a branch
/// * `alu_zero` - the ALU zero flag for that instruction, set when both operands were equal
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HazardDetectionUnit {
    branch: bool,
    alu_zero: bool,
}

impl HazardDetectionUnit {
    /// prime the hazard detection unit with the relevant execute stage state
    pub fn prime(control_signals: ControlSignals, alu_zero: bool) -> Self {
        Self {
            branch: control_signals.branch,
            alu_zero,
        }
    }

    pub fn pc_src(self) -> PCSrc {
        if self.branch && self.alu_zero {
            PCSrc::BranchTarget
        } else {
            PCSrc::Next
        }
    }

    /// Detect whether the younger instructions must be flushed
    pub fn detect_flush(self) -> Flush {
        match self.pc_src() {
            PCSrc::BranchTarget => Flush::IfIdAndIdEx,
            PCSrc::Next => Flush::None,
        }
    }
}
