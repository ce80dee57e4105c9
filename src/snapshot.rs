//! A read-only view of the CPU after a clock cycle, and the text report the command line prints from it.

use std::fmt;

use crate::{
    cpu::MEMORY_WORDS,
    registers::REGISTERS_COUNT,
    stages::{PipelineRegister, PipelineRegisters, Transients},
};

/// Something went wrong during a cycle, but not badly enough to stop the pipeline.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Diagnostic {
    /// the cycle it happened in (0-indexed)
    pub cycle: u64,
    /// address of the instruction responsible
    pub pc: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} (instruction at {:#x}): {}",
            self.cycle, self.pc, self.message
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    /// the cycle that just completed (0-indexed), or `None` before the first cycle
    pub cycle: Option<u64>,
    pub pc: u32,
    pub registers: [u32; REGISTERS_COUNT as usize],
    pub memory: [u32; MEMORY_WORDS],
    pub pipeline: PipelineRegisters,
    pub transients: Transients,
    /// whether a taken branch flushed the younger instructions this cycle
    pub flushed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

fn fmt_signed_words(f: &mut fmt::Formatter<'_>, words: &[u32]) -> fmt::Result {
    write!(f, "[")?;
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", *word as i32)?;
    }
    writeln!(f, "]")
}

fn fmt_slot(slot: &PipelineRegister) -> String {
    if slot.is_bubble() {
        "NOP".to_string()
    } else {
        format!("{} ({} @ {:#x})", slot.code, slot.instruction(), slot.pc)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cycle {
            Some(cycle) => writeln!(f, "Cycle: {cycle}")?,
            None => writeln!(f, "Initial state")?,
        }
        writeln!(f, "PC: {}", self.pc)?;
        write!(f, "Regs: ")?;
        fmt_signed_words(f, &self.registers)?;
        write!(f, "Memory: ")?;
        fmt_signed_words(f, &self.memory)?;

        let Transients {
            operand_a,
            operand_b,
            alu_result,
            mem_value,
        } = self.transients;
        writeln!(f, "IF/ID: {}", fmt_slot(&self.pipeline.if_id))?;
        writeln!(
            f,
            "ID/EX: {}, A: {}, B: {}",
            fmt_slot(&self.pipeline.id_ex),
            operand_a as i32,
            operand_b as i32
        )?;
        writeln!(
            f,
            "EX/MEM: {}, ALUOut: {}",
            fmt_slot(&self.pipeline.ex_mem),
            alu_result as i32
        )?;
        writeln!(
            f,
            "MEM/WB: {}, Value: {}",
            fmt_slot(&self.pipeline.mem_wb),
            mem_value as i32
        )?;
        if self.flushed {
            writeln!(f, "pipeline flushed")?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "error: {diagnostic}")?;
        }
        writeln!(f, "======================================")
    }
}
