use anyhow::{bail, Result};

use crate::{
    alu::{alu, alu_control_unit},
    hazard_detection::{Flush, HazardDetectionUnit},
    instruction::{Instruction, MachineCode, INSTRUCTION_WIDTH},
    registers::{RegisterFile, RegisterMapping},
    signals::{control_unit, ALUSrc, PCSrc},
    snapshot::{Diagnostic, Snapshot},
    stages::{PipelineRegister, PipelineRegisters, Transients},
};

/// the number of words in data memory
pub const MEMORY_WORDS: usize = 256;

/// the number of cycles it takes the last instruction to drain out of the pipeline after it is fetched
pub const PIPELINE_DEPTH: u64 = 4;

/// an array that holds the instructions of the program.
/// Each instruction is a 32-bit integer.
/// The program counter (PC) will be used to index this array to get the current instruction.
/// The PC will be updated by the Fetch() function to get the next instruction in the next cycle.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InstructionMemory {
    rom: Vec<MachineCode>,
}

impl InstructionMemory {
    pub fn new(rom: Vec<MachineCode>) -> Self {
        Self { rom }
    }

    /// the instruction at `pc`, or `None` once the PC has run off the end of the program
    pub fn get_instruction(&self, pc: u32) -> Option<MachineCode> {
        self.rom.get((pc / INSTRUCTION_WIDTH) as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.rom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }

    /// the address one past the last instruction
    pub fn end(&self) -> u32 {
        self.rom.len() as u32 * INSTRUCTION_WIDTH
    }
}

/// an array that holds the data of the program.
/// Each entry is a 32-bit word, addressed directly by the effective address computed in Execute().
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DataMemory {
    d_mem: [u32; MEMORY_WORDS],
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataMemory {
    pub const fn new() -> Self {
        Self {
            d_mem: [0; MEMORY_WORDS],
        }
    }

    fn check_address(address: u32) -> Result<usize> {
        if address as usize >= MEMORY_WORDS {
            bail!(
                "Invalid memory address for sw: {} (memory holds {MEMORY_WORDS} words)",
                address as i32
            );
        }
        Ok(address as usize)
    }

    pub fn read(&self, address: u32) -> Result<u32> {
        Ok(self.d_mem[Self::check_address(address)?])
    }

    pub fn write(&mut self, address: u32, value: u32) -> Result<()> {
        self.d_mem[Self::check_address(address)?] = value;
        log::debug!("memory {address:#x} is modified to {value:#x}");
        Ok(())
    }

    pub const fn as_array(&self) -> [u32; MEMORY_WORDS] {
        self.d_mem
    }
}

/// The pipeline engine: owns all architectural and pipeline state, and advances it one clock cycle at a time.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CPU {
    pc: u32,
    total_clock_cycles: u64,
    /// an integer array that has 32 entries.
    /// Every register starts out holding its own index, unless otherwise specified.
    /// This register file will be updated by WriteBack() function.
    /// This register file can be indexed by with `RegisterMapping` enum variants for ergonomics.
    rf: RegisterFile,
    /// 256 words of data memory, zeroed unless otherwise specified.
    /// Only the Mem() function writes to it.
    d_mem: DataMemory,
    i_mem: InstructionMemory,
    pipeline: PipelineRegisters,
    transients: Transients,
    /// whether the last cycle flushed the younger instructions behind a taken branch
    flushed: bool,
    /// problems reported during the last cycle
    diagnostics: Vec<Diagnostic>,
}

impl CPU {
    /// Initialize the CPU state
    pub fn new(rom: Vec<MachineCode>) -> Self {
        Self {
            pc: 0,
            total_clock_cycles: 0,
            rf: RegisterFile::new(),
            d_mem: DataMemory::new(),
            i_mem: InstructionMemory::new(rom),
            pipeline: PipelineRegisters::default(),
            transients: Transients::default(),
            flushed: false,
            diagnostics: Vec::new(),
        }
    }

    fn ensure_not_started(&self) -> Result<()> {
        if self.total_clock_cycles > 0 {
            bail!(
                "The CPU can only be initialized before it runs, {} cycles have already run",
                self.total_clock_cycles
            );
        }
        Ok(())
    }

    pub fn initialize_rf(&mut self, mappings: &[(RegisterMapping, u32)]) -> Result<()> {
        self.ensure_not_started()?;
        self.rf.initialize(mappings);
        Ok(())
    }

    pub fn initialize_dmem(&mut self, mappings: &[(u32, u32)]) -> Result<()> {
        self.ensure_not_started()?;
        for (address, value) in mappings {
            self.d_mem.write(*address, *value)?;
        }
        Ok(())
    }

    pub fn get_total_clock_cycles(&self) -> u64 {
        self.total_clock_cycles
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.rf
    }

    pub fn data_memory(&self) -> &DataMemory {
        &self.d_mem
    }

    /// enough cycles for every instruction in the program to drain out of the pipeline, if no branch is taken
    pub fn cycle_budget(&self) -> u64 {
        self.i_mem.len() as u64 + PIPELINE_DEPTH
    }

    /// whether the PC has run off the end of the program and everything in flight has retired
    pub fn is_done(&self) -> bool {
        self.pc >= self.i_mem.end() && self.pipeline.all_bubbles()
    }

    /// Main loop of the CPU simulator: runs the program for [`CPU::cycle_budget`] cycles,
    /// handing the state after each one to `report`.
    pub fn run(&mut self, report: impl FnMut(&Snapshot)) {
        self.run_for(self.cycle_budget(), report);
    }

    pub fn run_for(&mut self, cycles: u64, mut report: impl FnMut(&Snapshot)) {
        for _ in 0..cycles {
            let snapshot = self.run_step();
            report(&snapshot);
        }
    }

    /// Body of the main loop of the CPU simulator, separated for testing purposes.
    ///
    /// The stages run back to front, so that every stage sees what its upstream neighbour produced in the
    /// previous cycle rather than in this one.
    pub fn run_step(&mut self) -> Snapshot {
        self.diagnostics.clear();

        self.write_back();
        self.mem();
        let flush = self.execute();
        self.decode(flush);
        self.fetch(flush);

        self.flushed = flush.is_flushing();
        self.total_clock_cycles += 1;
        self.snapshot()
    }

    /// The state of the CPU after the most recent cycle.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.total_clock_cycles.checked_sub(1),
            pc: self.pc,
            registers: self.rf.as_array(),
            memory: self.d_mem.as_array(),
            pipeline: self.pipeline,
            transients: self.transients,
            flushed: self.flushed,
            diagnostics: self.diagnostics.clone(),
        }
    }

    fn report(&mut self, pc: u32, message: String) {
        let diagnostic = Diagnostic {
            cycle: self.total_clock_cycles,
            pc,
            message,
        };
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// the Fetch stage of the CPU.
    fn fetch(&mut self, flush: Flush) {
        if flush.is_flushing() {
            // execute already redirected the PC, start fetching from there next cycle
            self.pipeline.if_id = PipelineRegister::BUBBLE;
            return;
        }

        match self.i_mem.get_instruction(self.pc) {
            Some(code) => {
                log::trace!("fetched {code} from {:#x}", self.pc);
                self.pipeline.if_id = PipelineRegister::new(code, self.pc);
                self.pc = self.pc.wrapping_add(INSTRUCTION_WIDTH);
            }
            None => self.pipeline.if_id = PipelineRegister::BUBBLE,
        }
    }

    /// the Decode stage of the CPU: reads the source registers of the instruction in IF/ID.
    fn decode(&mut self, flush: Flush) {
        let ifid = self.pipeline.if_id;
        if flush.is_flushing() || ifid.is_bubble() {
            if flush.is_flushing() && !ifid.is_bubble() {
                log::debug!("flushing {} at {:#x}", ifid.instruction(), ifid.pc);
            }
            self.pipeline.id_ex = PipelineRegister::BUBBLE;
            return;
        }

        self.transients.operand_a = self.rf.read(ifid.code.rs1());
        self.transients.operand_b = self.rf.read(ifid.code.rs2());
        self.pipeline.id_ex = ifid;
    }

    /// the Execute stage of the CPU, also resolves branches.
    fn execute(&mut self) -> Flush {
        let idex = self.pipeline.id_ex;
        self.pipeline.ex_mem = idex;

        let instruction = idex.instruction();
        if instruction == Instruction::Bubble {
            return Flush::None;
        }

        let control_signals = control_unit(idex.code.opcode());
        let operand_b = match instruction.immediate() {
            Some(imm) if control_signals.alu_src == ALUSrc::IMMEDIATE => imm as u32,
            _ => self.transients.operand_b,
        };
        let output = alu(
            alu_control_unit(control_signals.alu_op),
            self.transients.operand_a,
            operand_b,
        );

        let hazard_detection_unit = HazardDetectionUnit::prime(control_signals, output.zero);
        if !control_signals.branch {
            self.transients.alu_result = output.result;
            return Flush::None;
        }

        if let (Instruction::BranchEq { imm, .. }, PCSrc::BranchTarget) =
            (instruction, hazard_detection_unit.pc_src())
        {
            let target = idex.pc.wrapping_add_signed(i32::from(imm));
            log::debug!(
                "branch at {:#x} taken, pc is modified to {target:#x}",
                idex.pc
            );
            if target % INSTRUCTION_WIDTH != 0 {
                self.report(
                    idex.pc,
                    format!("branch target {target:#x} is not aligned to {INSTRUCTION_WIDTH} bytes"),
                );
            }
            self.pc = target;
        }
        hazard_detection_unit.detect_flush()
    }

    /// the Memory stage of the CPU.
    fn mem(&mut self) {
        let exmem = self.pipeline.ex_mem;
        self.pipeline.mem_wb = exmem;
        if exmem.is_bubble() {
            return;
        }

        let control_signals = control_unit(exmem.code.opcode());
        if control_signals.mem_write {
            let value = self.rf.read(exmem.code.rs2());
            if let Err(e) = self.d_mem.write(self.transients.alu_result, value) {
                self.report(exmem.pc, e.to_string());
            }
        } else {
            self.transients.mem_value = self.transients.alu_result;
        }
    }

    /// the Write Back stage of the CPU, the only stage that writes to the register file.
    fn write_back(&mut self) {
        let memwb = self.pipeline.mem_wb;
        if control_unit(memwb.code.opcode()).reg_write {
            self.rf.write(memwb.code.rd(), self.transients.mem_value);
        }
    }
}
