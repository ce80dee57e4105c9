use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use riscv_pipeline_sim::{
    cpu::CPU,
    registers::RegisterMapping,
    snapshot::Snapshot,
    utils::parse_program,
};

/// the program that runs when no file is given
const DEMO_PROGRAM: &str = include_str!("../sample_program.txt");

/// Step a program through a 5-stage RISC-V pipeline, printing the pipeline registers after every cycle.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// File with one 32-bit binary instruction per line (`//` and `#` start comments).
    /// Runs a built-in demo program when omitted.
    program: Option<PathBuf>,

    /// Number of cycles to run. Defaults to the number of instructions plus the pipeline depth.
    #[arg(short, long)]
    cycles: Option<u64>,

    /// Preset a register before running, e.g. `--reg a0=0x70` or `--reg x8=-3`.
    /// Registers not mentioned start out holding their own index.
    #[arg(long = "reg", value_name = "REG=VALUE", value_parser = parse_register_assignment)]
    registers: Vec<(RegisterMapping, u32)>,

    /// Preset a word of data memory before running, e.g. `--mem 32=7`.
    #[arg(long = "mem", value_name = "ADDR=VALUE", value_parser = parse_memory_assignment)]
    memory: Vec<(u32, u32)>,

    /// Only print the state after the last cycle.
    #[arg(short, long)]
    quiet: bool,
}

/// parse a decimal or `0x` prefixed hexadecimal integer, negative values are stored in two's complement
fn parse_word(text: &str) -> Result<u32> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => digits.parse::<u32>(),
    }
    .with_context(|| format!("Invalid number {text:?}"))?;
    Ok(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

fn split_assignment(text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got {text:?}"))
}

fn parse_register_assignment(text: &str) -> Result<(RegisterMapping, u32)> {
    let (name, value) = split_assignment(text)?;
    Ok((RegisterMapping::parse(name)?, parse_word(value)?))
}

fn parse_memory_assignment(text: &str) -> Result<(u32, u32)> {
    let (address, value) = split_assignment(text)?;
    Ok((parse_word(address)?, parse_word(value)?))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    // read and parse the program
    let source = match &args.program {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => DEMO_PROGRAM.to_string(),
    };
    let i_mem = parse_program(&source)?;
    log::info!("loaded {} instructions", i_mem.len());

    // Initialize the CPU state
    let mut cpu = CPU::new(i_mem);
    cpu.initialize_rf(&args.registers)?;
    cpu.initialize_dmem(&args.memory)?;

    // Run the CPU
    let cycles = args.cycles.unwrap_or_else(|| cpu.cycle_budget());
    let mut last: Option<Snapshot> = None;
    cpu.run_for(cycles, |snapshot| {
        if args.quiet {
            last = Some(snapshot.clone());
        } else {
            print!("{snapshot}");
        }
    });
    if let Some(snapshot) = last {
        print!("{snapshot}");
    }

    if !cpu.is_done() {
        log::info!(
            "stopped after {} cycles with instructions still in flight",
            cpu.get_total_clock_cycles()
        );
    }

    Ok(())
}
