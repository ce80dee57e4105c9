//! Helpers for getting programs into the simulator, and a few bit-twiddling utilities.

use anyhow::{bail, Result};

use crate::instruction::MachineCode;

/// the width, in bits, of every encoded instruction.
pub const INSTRUCTION_BITS: usize = 32;

/// Parse a string of `0`s and `1`s into a vector of bits, most significant bit first.
///
/// Whitespace anywhere in the string is ignored, so `"0000000 00010 00110 000 10000 0110011"` is accepted.
pub fn bit_vec_from_string(line: &str) -> Result<Vec<bool>> {
    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => bail!("Invalid character {other:?} in binary string {line:?}"),
        })
        .collect()
}

/// Fold a vector of bits (most significant bit first) into an integer.
///
/// Bits beyond the 32nd are shifted out.
pub fn bit_vec_to_int(bits: &[bool]) -> u32 {
    bits.iter()
        .fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit))
}

/// Parse a single line into an encoded instruction, rejecting anything that isn't exactly 32 bits wide.
pub fn parse_machine_code(line: &str) -> Result<MachineCode> {
    let bits = bit_vec_from_string(line)?;
    if bits.len() != INSTRUCTION_BITS {
        bail!(
            "Instruction {line:?} is {} bits wide, expected {INSTRUCTION_BITS}",
            bits.len()
        );
    }
    Ok(MachineCode::new(bit_vec_to_int(&bits)))
}

/// Parse a program listing: one binary-encoded instruction per line.
///
/// Blank lines are skipped, and anything after `//` or `#` is treated as a comment.
pub fn parse_program(text: &str) -> Result<Vec<MachineCode>> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(index, line)| {
            parse_machine_code(line).map_err(|e| e.context(format!("on line {}", index + 1)))
        })
        .collect()
}

fn strip_comment(line: &str) -> &str {
    let end = [line.find("//"), line.find('#')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

/// Sign-extend the low `width` bits of `value` to a full 32-bit signed integer.
pub const fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}
