//! Structs that represent the state carried between the stages of the pipeline.

use crate::instruction::{Instruction, MachineCode};

/// One pipeline register slot: the encoded instruction that just left a stage, and the address it was fetched from.
///
/// A slot is always overwritten as a whole, never field by field.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct PipelineRegister {
    pub code: MachineCode,
    /// where `code` was fetched from, meaningless for a bubble
    pub pc: u32,
}

impl PipelineRegister {
    pub const BUBBLE: Self = Self {
        code: MachineCode::BUBBLE,
        pc: 0,
    };

    pub const fn new(code: MachineCode, pc: u32) -> Self {
        Self { code, pc }
    }

    pub fn is_bubble(&self) -> bool {
        self.code.is_bubble()
    }

    pub fn instruction(&self) -> Instruction {
        Instruction::decode(self.code)
    }
}

/// The four pipeline registers, named by the stage boundary they sit on.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct PipelineRegisters {
    pub if_id: PipelineRegister,
    pub id_ex: PipelineRegister,
    pub ex_mem: PipelineRegister,
    pub mem_wb: PipelineRegister,
}

impl PipelineRegisters {
    pub fn all_bubbles(&self) -> bool {
        [self.if_id, self.id_ex, self.ex_mem, self.mem_wb]
            .iter()
            .all(PipelineRegister::is_bubble)
    }
}

/// Values produced by one stage and consumed by the next one a cycle later.
///
/// Each is single-buffered: a bubble passing through a stage leaves the value it would have produced untouched.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Transients {
    /// contents of `rs1`, read by decode
    pub operand_a: u32,
    /// contents of `rs2`, read by decode
    pub operand_b: u32,
    /// computed by execute
    pub alu_result: u32,
    /// passed along by the memory stage, written back by write back
    pub mem_value: u32,
}
