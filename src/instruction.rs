//! Encoded and decoded forms of the four instruction shapes the pipeline understands.
//!
//! Field positions follow the standard RISC-V layout:
//!
//! | Format   | 31..25            | 24..20 | 19..15 | 14..12 | 11..7            | 6..0   |
//! |----------|-------------------|--------|--------|--------|------------------|--------|
//! | RegReg   | funct7            | rs2    | rs1    | funct3 | rd               | opcode |
//! | RegImm   | imm[11:5]         | imm[4:0] | rs1  | funct3 | rd               | opcode |
//! | Store    | imm[11:5]         | rs2    | rs1    | funct3 | imm[4:0]         | opcode |
//! | BranchEq | imm[12], imm[10:5]| rs2    | rs1    | funct3 | imm[4:1], imm[11]| opcode |

use std::fmt;

use ux::{i12, i13, u5, u7};

use crate::{registers::RegisterMapping, utils::sign_extend};

/// the width of an instruction, in bytes. The PC advances by this much on every fetch.
pub const INSTRUCTION_WIDTH: u32 = 4;

/// Opcode values, in the low 7 bits of the encoding.
pub struct Opcode();

impl Opcode {
    pub const REG_REG: u7 = u7::new(0b0110011);
    pub const REG_IMM: u7 = u7::new(0b0010011);
    pub const STORE: u7 = u7::new(0b0100011);
    pub const BRANCH_EQ: u7 = u7::new(0b1100011);
}

const STORE_FUNCT3: u32 = 0b010;

/// A 32-bit encoded instruction, as fetched from instruction memory.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct MachineCode(u32);

impl Default for MachineCode {
    fn default() -> Self {
        Self::BUBBLE
    }
}

impl MachineCode {
    /// the "no instruction" marker. Its opcode is not one we recognize, so it decodes to a bubble.
    pub const BUBBLE: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// extract bits `hi..=lo` (inclusive, bit 0 is the least significant) as an unsigned value
    const fn bits(self, hi: u32, lo: u32) -> u32 {
        (self.0 >> lo) & ((1 << (hi - lo + 1)) - 1)
    }

    pub fn opcode(self) -> u7 {
        u7::new(self.bits(6, 0) as u8)
    }

    pub fn rd(self) -> RegisterMapping {
        RegisterMapping::from(u5::new(self.bits(11, 7) as u8))
    }

    pub fn rs1(self) -> RegisterMapping {
        RegisterMapping::from(u5::new(self.bits(19, 15) as u8))
    }

    pub fn rs2(self) -> RegisterMapping {
        RegisterMapping::from(u5::new(self.bits(24, 20) as u8))
    }

    /// the I-type immediate, `imm[11:0]` from bits 31..20, sign extended
    pub fn imm_i(self) -> i12 {
        i12::new(sign_extend(self.bits(31, 20), 12) as i16)
    }

    /// the S-type immediate, reassembled from `imm[11:5]` (bits 31..25) and `imm[4:0]` (bits 11..7)
    pub fn imm_s(self) -> i12 {
        let raw = (self.bits(31, 25) << 5) | self.bits(11, 7);
        i12::new(sign_extend(raw, 12) as i16)
    }

    /// the B-type byte offset, reassembled from `imm[12]` (bit 31), `imm[11]` (bit 7),
    /// `imm[10:5]` (bits 30..25) and `imm[4:1]` (bits 11..8). Bit 0 is always zero.
    pub fn imm_b(self) -> i13 {
        let raw = (self.bits(31, 31) << 12)
            | (self.bits(7, 7) << 11)
            | (self.bits(30, 25) << 5)
            | (self.bits(11, 8) << 1);
        i13::new(sign_extend(raw, 13) as i16)
    }

    pub fn format(self) -> Format {
        Format::from_opcode(self.opcode())
    }

    pub fn is_bubble(self) -> bool {
        self.format() == Format::Bubble
    }
}

impl fmt::Display for MachineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032b}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Format {
    RegReg,
    RegImm,
    Store,
    BranchEq,
    /// anything we don't recognize, including the no-instruction marker
    Bubble,
}

impl Format {
    pub fn from_opcode(opcode: u7) -> Self {
        match u8::from(opcode) {
            0b0110011 => Self::RegReg,
            0b0010011 => Self::RegImm,
            0b0100011 => Self::Store,
            0b1100011 => Self::BranchEq,
            _ => Self::Bubble,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum Instruction {
    /// `add rd, rs1, rs2`
    RegReg {
        rs2: RegisterMapping,
        rs1: RegisterMapping,
        rd: RegisterMapping,
    },
    /// `addi rd, rs1, imm`
    RegImm {
        imm: i12,
        rs1: RegisterMapping,
        rd: RegisterMapping,
    },
    /// `sw rs2, imm(rs1)`
    Store {
        imm: i12,
        rs2: RegisterMapping,
        rs1: RegisterMapping,
    },
    /// `beq rs1, rs2, imm`
    BranchEq {
        imm: i13,
        rs2: RegisterMapping,
        rs1: RegisterMapping,
    },
    #[default]
    Bubble,
}

impl Instruction {
    pub fn decode(code: MachineCode) -> Self {
        match code.format() {
            Format::RegReg => Self::RegReg {
                rs2: code.rs2(),
                rs1: code.rs1(),
                rd: code.rd(),
            },
            Format::RegImm => Self::RegImm {
                imm: code.imm_i(),
                rs1: code.rs1(),
                rd: code.rd(),
            },
            Format::Store => Self::Store {
                imm: code.imm_s(),
                rs2: code.rs2(),
                rs1: code.rs1(),
            },
            Format::BranchEq => Self::BranchEq {
                imm: code.imm_b(),
                rs2: code.rs2(),
                rs1: code.rs1(),
            },
            Format::Bubble => Self::Bubble,
        }
    }

    /// Produce the canonical encoding of this instruction.
    ///
    /// `funct3`/`funct7` are filled in with the values for `add`, `addi`, `sw` and `beq`.
    pub fn encode(self) -> MachineCode {
        let reg = |r: RegisterMapping| r as u32;
        let opcode = |op: u7| u32::from(u8::from(op));
        MachineCode::new(match self {
            Self::RegReg { rs2, rs1, rd } => {
                (reg(rs2) << 20) | (reg(rs1) << 15) | (reg(rd) << 7) | opcode(Opcode::REG_REG)
            }
            Self::RegImm { imm, rs1, rd } => {
                let imm = i32::from(imm) as u32 & 0xfff;
                (imm << 20) | (reg(rs1) << 15) | (reg(rd) << 7) | opcode(Opcode::REG_IMM)
            }
            Self::Store { imm, rs2, rs1 } => {
                let imm = i32::from(imm) as u32 & 0xfff;
                ((imm >> 5) << 25)
                    | (reg(rs2) << 20)
                    | (reg(rs1) << 15)
                    | (STORE_FUNCT3 << 12)
                    | ((imm & 0x1f) << 7)
                    | opcode(Opcode::STORE)
            }
            Self::BranchEq { imm, rs2, rs1 } => {
                let imm = i32::from(imm) as u32 & 0x1fff;
                (((imm >> 12) & 0x1) << 31)
                    | (((imm >> 5) & 0x3f) << 25)
                    | (reg(rs2) << 20)
                    | (reg(rs1) << 15)
                    | (((imm >> 1) & 0xf) << 8)
                    | (((imm >> 11) & 0x1) << 7)
                    | opcode(Opcode::BRANCH_EQ)
            }
            Self::Bubble => MachineCode::BUBBLE.raw(),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            Self::RegReg { .. } => Format::RegReg,
            Self::RegImm { .. } => Format::RegImm,
            Self::Store { .. } => Format::Store,
            Self::BranchEq { .. } => Format::BranchEq,
            Self::Bubble => Format::Bubble,
        }
    }

    pub fn rd(&self) -> Option<RegisterMapping> {
        match self {
            Self::RegReg { rd, .. } | Self::RegImm { rd, .. } => Some(*rd),
            _ => None,
        }
    }

    pub fn rs1(&self) -> Option<RegisterMapping> {
        match self {
            Self::RegReg { rs1, .. }
            | Self::RegImm { rs1, .. }
            | Self::Store { rs1, .. }
            | Self::BranchEq { rs1, .. } => Some(*rs1),
            Self::Bubble => None,
        }
    }

    pub fn rs2(&self) -> Option<RegisterMapping> {
        match self {
            Self::RegReg { rs2, .. } | Self::Store { rs2, .. } | Self::BranchEq { rs2, .. } => {
                Some(*rs2)
            }
            _ => None,
        }
    }

    /// the sign-extended immediate, if this shape carries one
    pub fn immediate(&self) -> Option<i32> {
        match self {
            Self::RegImm { imm, .. } | Self::Store { imm, .. } => Some(i32::from(*imm)),
            Self::BranchEq { imm, .. } => Some(i32::from(*imm)),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegReg { rs2, rs1, rd } => write!(f, "add {rd}, {rs1}, {rs2}"),
            Self::RegImm { imm, rs1, rd } => write!(f, "addi {rd}, {rs1}, {}", i32::from(*imm)),
            Self::Store { imm, rs2, rs1 } => write!(f, "sw {rs2}, {}({rs1})", i32::from(*imm)),
            Self::BranchEq { imm, rs2, rs1 } => write!(f, "beq {rs1}, {rs2}, {}", i32::from(*imm)),
            Self::Bubble => write!(f, "nop"),
        }
    }
}
