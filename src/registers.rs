use std::{fmt, ops::Index};

use anyhow::bail;
use strum::{EnumString, VariantNames};
use ux::u5;

/// the number of registers in the RISC-V ISA
pub const REGISTERS_COUNT: u8 = 32;

#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, VariantNames, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum RegisterMapping {
    Zero = 0,
    Ra = 1,
    Sp = 2,
    Gp = 3,
    Tp = 4,
    T0 = 5,
    T1 = 6,
    T2 = 7,
    S0 = 8,
    S1 = 9,
    A0 = 10,
    A1 = 11,
    A2 = 12,
    A3 = 13,
    A4 = 14,
    A5 = 15,
    A6 = 16,
    A7 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    S8 = 24,
    S9 = 25,
    S10 = 26,
    S11 = 27,
    T3 = 28,
    T4 = 29,
    T5 = 30,
    T6 = 31,
}

impl fmt::Display for RegisterMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", *self as u8)
    }
}

impl From<u5> for RegisterMapping {
    fn from(value: u5) -> Self {
        // this is safe because:
        // 1. a u5 can only hold 0..=31, which is exactly the range of the enum
        // 2. the enum is repr(u8), so the memory layout is the same as u8
        // 3. we explicityly define the src and dst generics to ensure that future changes to the enum's memory size are caught at compile time
        unsafe { std::mem::transmute::<u8, Self>(u8::from(value)) }
    }
}

impl TryFrom<u8> for RegisterMapping {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, anyhow::Error> {
        if value >= REGISTERS_COUNT {
            bail!(
                "Invalid register number provided to RegisterMapping::from(u8): {}",
                value
            );
        }
        Ok(Self::from(u5::new(value)))
    }
}

impl RegisterMapping {
    /// Parse either an ABI name (`a0`, `sp`, ...) or a numbered name (`x10`).
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(number) = name.strip_prefix('x') {
            if let Ok(number) = number.parse::<u8>() {
                return Self::try_from(number);
            }
        }
        name.parse::<Self>().map_err(|_| {
            anyhow::anyhow!(
                "Unknown register {name:?}, expected x0..x31 or one of {:?}",
                Self::VARIANTS
            )
        })
    }
}

/// The architectural register file.
///
/// `x0` is hardwired to zero, writes to it are discarded.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct RegisterFile {
    registers: [u32; REGISTERS_COUNT as usize],
}

impl Index<RegisterMapping> for RegisterFile {
    type Output = u32;
    fn index(&self, index: RegisterMapping) -> &Self::Output {
        &self.registers[index as usize]
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// A register file where every register holds its own index (`x5 == 5`), which makes
    /// it easy to see which registers an instruction read.
    #[must_use]
    pub const fn new() -> Self {
        let mut registers = [0; REGISTERS_COUNT as usize];
        let mut i = 0;
        while i < registers.len() {
            registers[i] = i as u32;
            i += 1;
        }
        Self { registers }
    }

    /// Override the provided registers, leaves everything else as is
    pub fn initialize(&mut self, mappings: &[(RegisterMapping, u32)]) {
        for (mapping, value) in mappings {
            if *mapping == RegisterMapping::Zero {
                log::warn!("ignoring attempt to initialize {mapping} to {value:#x}");
                continue;
            }
            self.registers[*mapping as usize] = *value;
        }
    }

    #[must_use]
    pub const fn read(&self, reg: RegisterMapping) -> u32 {
        self.registers[reg as usize]
    }

    pub fn write(&mut self, reg: RegisterMapping, value: u32) {
        if reg == RegisterMapping::Zero {
            log::trace!("discarding write of {value:#x} to {reg}");
            return;
        }
        self.registers[reg as usize] = value;
        log::debug!("{reg} is modified to {value:#x}");
    }

    #[must_use]
    pub const fn as_array(&self) -> [u32; REGISTERS_COUNT as usize] {
        self.registers
    }
}
