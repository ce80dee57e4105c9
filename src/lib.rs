//! A cycle-by-cycle model of a classic 5-stage RISC-V pipeline (fetch, decode, execute, memory, write back)
//! for `add`, `addi`, `sw` and `beq`.
//!
//! Branches are resolved in execute; a taken branch flushes the two instructions fetched behind it.
//! There is no forwarding or stalling, so back-to-back dependent instructions read stale registers.

pub mod alu;
pub mod cpu;
pub mod hazard_detection;
pub mod instruction;
pub mod registers;
pub mod signals;
pub mod snapshot;
pub mod stages;
pub mod utils;

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;
    use cpu::CPU;
    use instruction::{Instruction, MachineCode};
    use pretty_assertions::assert_eq;
    use registers::RegisterMapping::{self, *};
    use snapshot::Snapshot;
    use stages::PipelineRegister;
    use ux::{i12, i13};

    fn sample_rom() -> Result<Vec<MachineCode>> {
        utils::parse_program(include_str!("../sample_program.txt"))

        // pipeline table (expected, cycles 0-indexed):
        // | cycle | IF | ID | EX | MEM | WB |  | PC after |
        // |-------|----|----|----|-----|----|--|----------|
        // | 0     | I1 |    |    |     |    |  | 4        |
        // | 1     | I2 | I1 |    |     |    |  | 8        |
        // | 2     | I3 | I2 | I1 |     |    |  | 12       |
        // | 3     | I4 | I3 | I2 | I1  |    |  | 16       |
        // | 4     | .. | .. | I3 | I2  | I1 |  | 16       | // I3 taken, I4 and I5's fetch are flushed
        // | 5     | I5 | .. | .. | I3  | I2 |  | 20       |
        // | 6     | I6 | I5 | .. | ..  | I3 |  | 24       |
        // | 7     |    | I6 | I5 | ..  | .. |  | 24       |
        // | 8     |    |    | I6 | I5  | .. |  | 24       |
        // | 9     |    |    |    | I6  | I5 |  | 24       |
    }

    fn addi(rd: RegisterMapping, rs1: RegisterMapping, imm: i16) -> MachineCode {
        Instruction::RegImm {
            imm: i12::new(imm),
            rs1,
            rd,
        }
        .encode()
    }

    fn beq(rs1: RegisterMapping, rs2: RegisterMapping, imm: i16) -> MachineCode {
        Instruction::BranchEq {
            imm: i13::new(imm),
            rs2,
            rs1,
        }
        .encode()
    }

    fn sw(rs2: RegisterMapping, imm: i16, rs1: RegisterMapping) -> MachineCode {
        Instruction::Store {
            imm: i12::new(imm),
            rs2,
            rs1,
        }
        .encode()
    }

    fn run_until_done(cpu: &mut CPU) -> Vec<Snapshot> {
        let mut snapshots = Vec::new();
        while !cpu.is_done() {
            assert!(cpu.get_total_clock_cycles() < 100, "program never finished");
            snapshots.push(cpu.run_step());
        }
        snapshots
    }

    #[test]
    fn test_sample_rom() -> Result<()> {
        let decoded = sample_rom()?
            .into_iter()
            .map(|code| Instruction::decode(code).to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            decoded,
            vec![
                "add x16, x6, x2",
                "addi x17, x4, 4",
                "beq x8, x8, 8",
                "add x25, x6, x2",
                "beq x10, x3, 4",
                "sw x30, 4(x28)",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_sample_program() -> Result<()> {
        let rom = sample_rom()?;
        let mut cpu = CPU::new(rom.clone());
        assert_eq!(cpu.cycle_budget(), 10);

        let mut snapshots = Vec::new();
        cpu.run(|snapshot| snapshots.push(snapshot.clone()));
        assert_eq!(snapshots.len(), 10);
        assert_eq!(
            snapshots.iter().map(|s| s.pc).collect::<Vec<_>>(),
            vec![4, 8, 12, 16, 16, 20, 24, 24, 24, 24]
        );

        // the add retires in cycle 4, the same cycle the branch resolves
        let resolved = &snapshots[4];
        assert_eq!(resolved.registers[16], 8);
        assert!(resolved.flushed);
        assert!(resolved.pipeline.if_id.is_bubble());
        assert!(resolved.pipeline.id_ex.is_bubble());
        assert_eq!(resolved.pipeline.ex_mem, PipelineRegister::new(rom[2], 8));
        assert_eq!(resolved.pipeline.mem_wb, PipelineRegister::new(rom[1], 4));

        // fetch resumes at the branch target
        assert_eq!(snapshots[5].pipeline.if_id, PipelineRegister::new(rom[4], 16));
        assert_eq!(snapshots[5].registers[17], 8);

        // the second branch is not taken
        assert!(snapshots.iter().filter(|s| s.flushed).count() == 1);
        assert!(snapshots.iter().all(|s| s.diagnostics.is_empty()));

        let last = snapshots.last().unwrap();
        assert_eq!(last.registers[25], 25, "flushed add must never write back");
        assert_eq!(last.memory[32], 30);
        assert_eq!(last.memory.iter().filter(|&&word| word != 0).count(), 1);

        // the store still sits in MEM/WB
        assert!(!cpu.is_done());
        let _ = cpu.run_step();
        assert!(cpu.is_done());
        Ok(())
    }

    #[test]
    fn test_add_writes_back_after_five_cycles() -> Result<()> {
        let add = Instruction::RegReg {
            rs2: Sp,
            rs1: T1,
            rd: A6,
        }
        .encode();
        let mut cpu = CPU::new(vec![add]);
        cpu.initialize_rf(&[(T1, 6), (Sp, 2)])?;

        for _ in 0..4 {
            assert_eq!(cpu.run_step().registers[A6 as usize], 16);
        }
        assert_eq!(cpu.run_step().registers[A6 as usize], 8);
        assert!(cpu.is_done());
        Ok(())
    }

    #[test]
    fn test_taken_branch_flushes_two_younger_instructions() {
        let rom = vec![
            addi(S1, Zero, 42),  // 0x0
            beq(S0, S0, 8),      // 0x4, to 0xc
            addi(T0, Zero, 111), // 0x8, wrong path
            addi(T1, Zero, 222), // 0xc
            addi(T2, Zero, 333), // 0x10
        ];
        let mut cpu = CPU::new(rom.clone());

        let snapshots = run_until_done(&mut cpu);
        let resolved = &snapshots[3];
        assert!(resolved.flushed);
        assert_eq!(resolved.pc, 0x4 + 8);
        assert!(resolved.pipeline.if_id.is_bubble());
        assert!(resolved.pipeline.id_ex.is_bubble());
        // the branch itself and everything older keep going
        assert_eq!(resolved.pipeline.ex_mem, PipelineRegister::new(rom[1], 0x4));
        assert_eq!(resolved.pipeline.mem_wb, PipelineRegister::new(rom[0], 0x0));
        assert_eq!(snapshots[4].pipeline.if_id, PipelineRegister::new(rom[3], 0xc));

        let rf = cpu.registers();
        assert_eq!(rf[S1], 42);
        assert_eq!(rf[T0], 5);
        assert_eq!(rf[T1], 222);
        assert_eq!(rf[T2], 333);
        assert_eq!(cpu.pc(), 0x14);
    }

    #[test]
    fn test_backward_branch() {
        // x5 starts at 5 and counts up until it matches x8, then exits the loop
        let rom = vec![
            addi(T0, T0, 1),     // 0x0
            beq(T0, S0, 8),      // 0x4, exit to 0xc
            beq(Zero, Zero, -8), // 0x8, back to 0x0
            addi(A0, Zero, 99),  // 0xc
        ];
        let mut cpu = CPU::new(rom);
        let snapshots = run_until_done(&mut cpu);
        assert_eq!(snapshots.iter().filter(|s| s.flushed).count(), 4);
        assert_eq!(cpu.registers()[A0], 99);
        // without forwarding the exit branch decodes before the addi ahead of it writes back,
        // so it sees x5 one iteration late and the loop runs once more than it should
        assert_eq!(cpu.registers()[T0], 9);
    }

    #[test]
    fn test_out_of_range_store_is_reported_and_skipped() {
        // 20 + 280 = 300, past the end of the 256 word memory
        let mut cpu = CPU::new(vec![sw(T0, 280, S4)]);
        let mut snapshots = Vec::new();
        cpu.run(|snapshot| snapshots.push(snapshot.clone()));

        let with_errors = snapshots
            .iter()
            .filter(|s| !s.diagnostics.is_empty())
            .collect::<Vec<_>>();
        assert_eq!(with_errors.len(), 1);
        let diagnostic = &with_errors[0].diagnostics[0];
        assert_eq!(diagnostic.cycle, 3);
        assert_eq!(diagnostic.pc, 0);
        assert!(diagnostic.message.contains("300"));

        assert!(cpu.data_memory().as_array().iter().all(|&word| word == 0));
        assert_eq!(cpu.get_total_clock_cycles(), 5);
    }

    #[test]
    fn test_negative_store_address_is_reported() {
        let mut cpu = CPU::new(vec![sw(Ra, -4, Zero), sw(Ra, 4, Zero)]);
        let snapshots = run_until_done(&mut cpu);
        let diagnostics = snapshots
            .iter()
            .flat_map(|s| s.diagnostics.clone())
            .collect::<Vec<_>>();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("-4"));
        // the next store still goes through
        assert_eq!(cpu.data_memory().as_array()[4], 1);
    }

    #[test]
    fn test_misaligned_branch_target_is_reported() {
        let rom = vec![
            beq(Zero, Zero, 6), // to 0x6
            addi(T0, Zero, 1),
            addi(T1, Zero, 2),
        ];
        let mut cpu = CPU::new(rom);
        let _ = cpu.run_step();
        let _ = cpu.run_step();
        let resolved = cpu.run_step();
        assert_eq!(resolved.pc, 6);
        assert_eq!(resolved.diagnostics.len(), 1);
        assert_eq!(resolved.diagnostics[0].cycle, 2);
    }

    #[test]
    fn test_bubbles_have_no_side_effects() {
        let add = Instruction::RegReg {
            rs2: Sp,
            rs1: T1,
            rd: A6,
        }
        .encode();
        // lw x3, 4(x10): not an instruction we know, so it flows through as a bubble
        let load = MachineCode::new(0b00000000010001010010000110000011);
        let mut cpu = CPU::new(vec![add, load, load]);
        let initial = cpu.snapshot();

        let snapshots = run_until_done(&mut cpu);
        let after_add_decode = snapshots[1].transients;
        assert_eq!(snapshots[2].transients.operand_a, after_add_decode.operand_a);
        assert_eq!(snapshots[2].transients.operand_b, after_add_decode.operand_b);
        assert_eq!(snapshots[3].transients.alu_result, 8);
        assert_eq!(snapshots[4].transients.mem_value, 8);
        assert_eq!(cpu.run_step().transients, snapshots[4].transients);
        assert!(snapshots[2].pipeline.id_ex.is_bubble());

        let last = snapshots.last().unwrap();
        for (i, (&before, &after)) in initial.registers.iter().zip(&last.registers).enumerate() {
            if i == A6 as usize {
                assert_eq!(after, 8);
            } else {
                assert_eq!(before, after, "x{i} changed");
            }
        }
        assert_eq!(initial.memory, last.memory);
        assert!(snapshots.iter().all(|s| !s.flushed && s.diagnostics.is_empty()));
    }

    #[test]
    fn test_snapshot_is_idempotent() -> Result<()> {
        let mut cpu = CPU::new(sample_rom()?);
        let _ = cpu.run_step();
        let stepped = cpu.run_step();
        assert_eq!(cpu.snapshot(), stepped);
        assert_eq!(cpu.snapshot(), cpu.snapshot());
        assert_eq!(cpu.get_total_clock_cycles(), 2);
        Ok(())
    }

    #[test]
    fn test_report_rendering() -> Result<()> {
        let mut cpu = CPU::new(sample_rom()?);
        let initial = cpu.snapshot().to_string();
        assert!(initial.starts_with("Initial state\nPC: 0\n"));
        assert!(initial.contains("IF/ID: NOP\n"));

        let mut reports = Vec::new();
        cpu.run(|snapshot| reports.push(snapshot.to_string()));
        assert!(reports[0].contains("IF/ID: 00000000001000110000100000110011 (add x16, x6, x2 @ 0x0)"));
        assert!(reports[2].contains("ID/EX: 00000000010000100000100010010011 (addi x17, x4, 4 @ 0x4), A: 4, B: 4"));
        assert!(reports[4].contains("pipeline flushed"));
        assert!(!reports[5].contains("pipeline flushed"));
        Ok(())
    }
}
