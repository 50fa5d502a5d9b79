//! # Architectures
//!
//! The closed set of target architectures the extension knows a register layout for.
//!
//! The host debugger reports the architecture of the inferior as a string. Parsing it into an
//! [`Arch`] is the one place where an unknown target turns into
//! [`ExtensionError::UnsupportedArchitecture`].

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ExtensionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
    I386,
    /// 16-bit real mode, shares the register layout of [`Arch::I386`]
    I8086,
    X86_64,
    Mips,
    Sparc,
    Arm,
    /// ARM Cortex-M, uses `xpsr` instead of `cpsr`
    ArmCm,
    Aarch64,
    PowerPc,
    RiscV64,
}

impl Arch {
    pub const ALL: [Arch; 10] = [
        Arch::I386,
        Arch::I8086,
        Arch::X86_64,
        Arch::Mips,
        Arch::Sparc,
        Arch::Arm,
        Arch::ArmCm,
        Arch::Aarch64,
        Arch::PowerPc,
        Arch::RiscV64,
    ];

    /// The identifier the host debugger uses for this architecture
    pub fn identifier(&self) -> &'static str {
        match self {
            Arch::I386 => "i386",
            Arch::I8086 => "i8086",
            Arch::X86_64 => "x86-64",
            Arch::Mips => "mips",
            Arch::Sparc => "sparc",
            Arch::Arm => "arm",
            Arch::ArmCm => "armcm",
            Arch::Aarch64 => "aarch64",
            Arch::PowerPc => "powerpc",
            Arch::RiscV64 => "riscv:rv64",
        }
    }

    #[inline]
    pub fn is_x86(&self) -> bool {
        matches!(self, Arch::I386 | Arch::I8086 | Arch::X86_64)
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl FromStr for Arch {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self> {
        Arch::ALL
            .into_iter()
            .find(|a| a.identifier() == s)
            .ok_or_else(|| ExtensionError::UnsupportedArchitecture(s.to_string()))
    }
}
