use ux::{u1, u2, u7};

use crate::{alu::ALUOp, instruction::Format};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// a struct that holds the control signals that the Control Unit generates.
///
/// The default value (everything off) is what a bubble carries through the pipeline.
pub struct ControlSignals {
    /// tells the register file to write to the register specified by the instruction.
    pub reg_write: bool,
    /// The branch signal is a 1 bit signal that controls whether a branch *can* be taken. (It is not the branch condition itself. That is determined by the ALU zero signal.)
    pub branch: bool,
    /// The ALUSrc signal is a 1 bit signal that tells the ALU whether to use the register value (0) or the immediate value (1) as the second operand.
    pub alu_src: u1,
    /// The ALU operation signal is a 2 bit signal that tells the ALU Control Unit what type of instruction is being executed.
    pub alu_op: u2,
    /// The mem_write signal is a 1 bit signal that tells the data memory unit whether to write to memory.
    pub mem_write: bool,
}

/// a 1 bit signal that tells the ALU whether to use the register value (0) or the immediate value (1) as the second operand.
pub struct ALUSrc();

impl ALUSrc {
    pub const REGISTER: u1 = u1::new(0);
    pub const IMMEDIATE: u1 = u1::new(1);
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 1 bit signal that specifies where the next PC should come from.
pub enum PCSrc {
    #[default]
    /// The next PC value comes from PC + 4
    Next = 0b0,
    /// The next PC value comes from the branch target address
    BranchTarget = 0b1,
}

/// The main control unit, generates the control signals for an instruction from its opcode.
///
/// Opcodes we don't recognize get every signal turned off, so they flow through the pipeline as bubbles.
pub fn control_unit(opcode: u7) -> ControlSignals {
    match Format::from_opcode(opcode) {
        Format::RegReg => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::REGISTER,
            alu_op: ALUOp::REGISTER_OP,
            ..Default::default()
        },
        Format::RegImm => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::IMMEDIATE,
            alu_op: ALUOp::IMMEDIATE_OP,
            ..Default::default()
        },
        Format::Store => ControlSignals {
            mem_write: true,
            alu_src: ALUSrc::IMMEDIATE,
            alu_op: ALUOp::LOAD_STORE_OP,
            ..Default::default()
        },
        Format::BranchEq => ControlSignals {
            branch: true,
            alu_src: ALUSrc::REGISTER,
            alu_op: ALUOp::BRANCH_OP,
            ..Default::default()
        },
        Format::Bubble => ControlSignals::default(),
    }
}
