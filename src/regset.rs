//! # Register Set Catalog
//!
//! Static description of the registers of every supported [`Arch`].
//!
//! Each [`RegisterSet`] is built once, on first use of [`catalog()`], and never changes
//! afterwards. It knows which register plays which role (program counter, stack pointer, link
//! register, ...) and derives the list of registers that make up the register context shown to
//! the user.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::OnceLock;

use serde::Serialize;

use crate::arch::Arch;
use crate::errors::Result;

/// Names of the flag bits of a flags register, with their bit index
pub type FlagBits = &'static [(&'static str, u8)];

/// A flags register and the meaning of its bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagRegister {
    pub name: &'static str,
    pub bits: FlagBits,
}

impl FlagRegister {
    /// Names of all flags set in `value`, in declaration order
    pub fn set_flags(&self, value: u64) -> Vec<&'static str> {
        self.bits
            .iter()
            .filter(|(_, bit)| value & (1u64 << bit) != 0)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Input for [`RegisterSet::new`]
///
/// Everything that is not given falls back to the defaults of [`Layout::default`]: `pc` and
/// `sp` as program counter and stack pointer, and nothing else.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub pc: &'static str,
    pub stack: &'static str,
    pub frame: Option<&'static str>,
    pub retaddr: &'static [&'static str],
    pub flags: &'static [FlagRegister],
    pub gpr: &'static [&'static str],
    pub misc: &'static [&'static str],
    pub args: &'static [&'static str],
    pub retval: &'static [&'static str],
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            pc: "pc",
            stack: "sp",
            frame: None,
            retaddr: &[],
            flags: &[],
            gpr: &[],
            misc: &[],
            args: &[],
            retval: &[],
        }
    }
}

/// The registers of one architecture, by role
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSet {
    pc: &'static str,
    stack: &'static str,
    frame: Option<&'static str>,
    retaddr: &'static [&'static str],
    flags: &'static [FlagRegister],
    gpr: &'static [&'static str],
    misc: &'static [&'static str],
    args: &'static [&'static str],
    retval: &'static [&'static str],
    common: Vec<&'static str>,
    all: BTreeSet<&'static str>,
}

impl RegisterSet {
    pub fn new(layout: Layout) -> Self {
        // the order of `common` is the display order of the register context
        let mut common: Vec<&'static str> = Vec::new();
        let candidates = layout
            .gpr
            .iter()
            .copied()
            .chain(layout.frame)
            .chain([layout.stack, layout.pc])
            .chain(layout.flags.iter().map(|f| f.name));
        for reg in candidates {
            if !reg.is_empty() && !common.contains(&reg) {
                common.push(reg);
            }
        }

        let all: BTreeSet<&'static str> = layout
            .misc
            .iter()
            .copied()
            .chain(layout.flags.iter().map(|f| f.name))
            .chain(layout.retaddr.iter().copied())
            .chain(common.iter().copied())
            .filter(|r| !r.is_empty())
            .collect();

        Self {
            pc: layout.pc,
            stack: layout.stack,
            frame: layout.frame,
            retaddr: layout.retaddr,
            flags: layout.flags,
            gpr: layout.gpr,
            misc: layout.misc,
            args: layout.args,
            retval: layout.retval,
            common,
            all,
        }
    }

    /// Program counter register
    pub fn pc(&self) -> &'static str {
        self.pc
    }

    /// Stack pointer register
    pub fn stack(&self) -> &'static str {
        self.stack
    }

    /// Frame pointer register, if the architecture has a dedicated one
    pub fn frame(&self) -> Option<&'static str> {
        self.frame
    }

    /// Registers holding the return address (link registers)
    pub fn retaddr(&self) -> &'static [&'static str] {
        self.retaddr
    }

    pub fn flags(&self) -> &'static [FlagRegister] {
        self.flags
    }

    pub fn flag_register(&self, name: &str) -> Option<&'static FlagRegister> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Native-size general purpose registers
    pub fn gpr(&self) -> &'static [&'static str] {
        self.gpr
    }

    /// Miscellaneous valid registers (segment and sub-registers)
    pub fn misc(&self) -> &'static [&'static str] {
        self.misc
    }

    /// Argument registers of the most common calling convention
    pub fn args(&self) -> &'static [&'static str] {
        self.args
    }

    /// Return value registers
    pub fn retval(&self) -> &'static [&'static str] {
        self.retval
    }

    /// Registers shown in the register context, in display order
    pub fn common(&self) -> &[&'static str] {
        &self.common
    }

    /// All valid registers. The order carries no meaning.
    pub fn all(&self) -> &BTreeSet<&'static str> {
        &self.all
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all.contains(name)
    }
}

const ARM_CPSR_FLAGS: FlagBits = &[
    ("N", 31),
    ("Z", 30),
    ("C", 29),
    ("V", 28),
    ("Q", 27),
    ("J", 24),
    ("T", 5),
    ("E", 9),
    ("A", 8),
    ("I", 7),
    ("F", 6),
];

const ARM_XPSR_FLAGS: FlagBits = &[
    ("N", 31),
    ("Z", 30),
    ("C", 29),
    ("V", 28),
    ("Q", 27),
    ("T", 24),
];

const X86_EFLAGS: FlagBits = &[
    ("CF", 0),
    ("PF", 2),
    ("AF", 4),
    ("ZF", 6),
    ("SF", 7),
    ("IF", 9),
    ("DF", 10),
    ("OF", 11),
];

const X86_FLAGS: &[FlagRegister] = &[FlagRegister {
    name: "eflags",
    bits: X86_EFLAGS,
}];

const ARM_R_GPR: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12",
];

const X86_SEGMENTS_AND_SUBREGS: [&str; 25] = [
    "cs", "ss", "ds", "es", "fs", "gs", "fsbase", "gsbase", "ax", "ah", "al", "bx", "bh", "bl",
    "cx", "ch", "cl", "dx", "dh", "dl", "di", "si", "bp", "sp", "ip",
];

fn arm() -> RegisterSet {
    RegisterSet::new(Layout {
        retaddr: &["lr"],
        flags: &[FlagRegister {
            name: "cpsr",
            bits: ARM_CPSR_FLAGS,
        }],
        gpr: ARM_R_GPR,
        args: &["r0", "r1", "r2", "r3"],
        retval: &["r0"],
        ..Default::default()
    })
}

fn armcm() -> RegisterSet {
    RegisterSet::new(Layout {
        retaddr: &["lr"],
        flags: &[FlagRegister {
            name: "xpsr",
            bits: ARM_XPSR_FLAGS,
        }],
        gpr: ARM_R_GPR,
        args: &["r0", "r1", "r2", "r3"],
        retval: &["r0"],
        ..Default::default()
    })
}

fn aarch64() -> RegisterSet {
    // x29 is the frame pointer, but declaring it as `frame` would move it out of the gpr block
    // in the register context
    RegisterSet::new(Layout {
        retaddr: &["lr"],
        flags: &[FlagRegister {
            name: "cpsr",
            bits: &[],
        }],
        gpr: &[
            "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
            "x14", "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25",
            "x26", "x27", "x28", "x29", "x30",
        ],
        misc: &[
            "w0", "w1", "w2", "w3", "w4", "w5", "w6", "w7", "w8", "w9", "w10", "w11", "w12", "w13",
            "w14", "w15", "w16", "w17", "w18", "w19", "w20", "w21", "w22", "w23", "w24", "w25",
            "w26", "w27", "w28",
        ],
        args: &["x0", "x1", "x2", "x3"],
        retval: &["x0"],
        ..Default::default()
    })
}

fn amd64() -> RegisterSet {
    const MISC: [&str; 29] = [
        "cs", "ss", "ds", "es", "fs", "gs", "fsbase", "gsbase", "ax", "ah", "al", "bx", "bh",
        "bl", "cx", "ch", "cl", "dx", "dh", "dl", "dil", "sil", "spl", "bpl", "di", "si", "bp",
        "sp", "ip",
    ];
    RegisterSet::new(Layout {
        pc: "rip",
        stack: "rsp",
        frame: Some("rbp"),
        flags: X86_FLAGS,
        gpr: &[
            "rax", "rbx", "rcx", "rdx", "rdi", "rsi", "r8", "r9", "r10", "r11", "r12", "r13",
            "r14", "r15",
        ],
        misc: &MISC,
        args: &["rdi", "rsi", "rdx", "rcx", "r8", "r9"],
        retval: &["rax"],
        ..Default::default()
    })
}

fn i386() -> RegisterSet {
    RegisterSet::new(Layout {
        pc: "eip",
        stack: "esp",
        frame: Some("ebp"),
        flags: X86_FLAGS,
        gpr: &["eax", "ebx", "ecx", "edx", "edi", "esi"],
        misc: &X86_SEGMENTS_AND_SUBREGS,
        retval: &["eax"],
        ..Default::default()
    })
}

fn powerpc() -> RegisterSet {
    // r1 is the stack frame pointer, r3-r10 carry arguments, r3 the return value
    RegisterSet::new(Layout {
        retaddr: &["lr"],
        flags: &[
            FlagRegister {
                name: "msr",
                bits: &[],
            },
            FlagRegister {
                name: "xer",
                bits: &[],
            },
        ],
        gpr: &[
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
            "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25",
            "r26", "r27", "r28", "r29", "r30", "r31", "cr", "ctr",
        ],
        args: &["r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10"],
        retval: &["r3"],
        ..Default::default()
    })
}

fn sparc() -> RegisterSet {
    // %o6 is %sp, %i6 is %fp and %i7 holds the return address
    RegisterSet::new(Layout {
        stack: "sp",
        frame: Some("fp"),
        retaddr: &["i7"],
        flags: &[FlagRegister {
            name: "psr",
            bits: &[],
        }],
        gpr: &[
            "g1", "g2", "g3", "g4", "g5", "g6", "g7", "o0", "o1", "o2", "o3", "o4", "o5", "o7",
            "l0", "l1", "l2", "l3", "l4", "l5", "l6", "l7", "i0", "i1", "i2", "i3", "i4", "i5",
        ],
        args: &["i0", "i1", "i2", "i3", "i4", "i5"],
        retval: &["o0"],
        ..Default::default()
    })
}

fn mips() -> RegisterSet {
    RegisterSet::new(Layout {
        frame: Some("fp"),
        retaddr: &["ra"],
        gpr: &[
            "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7",
            "t8", "t9", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "gp",
        ],
        args: &["a0", "a1", "a2", "a3"],
        retval: &["v0"],
        ..Default::default()
    })
}

fn riscv64() -> RegisterSet {
    RegisterSet::new(Layout {
        pc: "pc",
        stack: "sp",
        frame: Some("fp"),
        retaddr: &["ra"],
        gpr: &[
            "ra", "gp", "tp", "t0", "t1", "t2", "fp", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
            "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
            "t5", "t6", "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1",
            "fa0", "fa1", "fa2", "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5",
            "fs6", "fs7", "fs8", "fs9", "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
        ],
        args: &[
            "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "fa0", "fa1", "fa2", "fa3", "fa4",
            "fa5", "fa6", "fa7",
        ],
        retval: &["a0", "a1", "fa0", "fa1"],
        ..Default::default()
    })
}

impl Display for RegisterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<10}{}", "pc", self.pc)?;
        writeln!(f, "{:<10}{}", "stack", self.stack)?;
        writeln!(f, "{:<10}{}", "frame", self.frame.unwrap_or("-"))?;
        writeln!(f, "{:<10}{}", "retaddr", self.retaddr.join(" "))?;
        for flag in self.flags {
            let bits: Vec<String> = flag
                .bits
                .iter()
                .map(|(name, bit)| format!("{name}:{bit}"))
                .collect();
            writeln!(f, "{:<10}{} [{}]", "flags", flag.name, bits.join(" "))?;
        }
        writeln!(f, "{:<10}{}", "common", self.common.join(" "))?;
        writeln!(f, "{:<10}{}", "args", self.args.join(" "))?;
        write!(f, "{:<10}{}", "retval", self.retval.join(" "))
    }
}

/// Mapping from [`Arch`] to its [`RegisterSet`]
#[derive(Debug)]
pub struct Catalog {
    i386: RegisterSet,
    amd64: RegisterSet,
    mips: RegisterSet,
    sparc: RegisterSet,
    arm: RegisterSet,
    armcm: RegisterSet,
    aarch64: RegisterSet,
    powerpc: RegisterSet,
    riscv64: RegisterSet,
}

impl Catalog {
    fn build() -> Self {
        Self {
            i386: i386(),
            amd64: amd64(),
            mips: mips(),
            sparc: sparc(),
            arm: arm(),
            armcm: armcm(),
            aarch64: aarch64(),
            powerpc: powerpc(),
            riscv64: riscv64(),
        }
    }

    pub fn get(&self, arch: Arch) -> &RegisterSet {
        match arch {
            Arch::I386 | Arch::I8086 => &self.i386,
            Arch::X86_64 => &self.amd64,
            Arch::Mips => &self.mips,
            Arch::Sparc => &self.sparc,
            Arch::Arm => &self.arm,
            Arch::ArmCm => &self.armcm,
            Arch::Aarch64 => &self.aarch64,
            Arch::PowerPc => &self.powerpc,
            Arch::RiscV64 => &self.riscv64,
        }
    }

    /// Look up the [`RegisterSet`] for an architecture identifier as the host reports it
    ///
    /// # Errors
    ///
    /// Fails with [`UnsupportedArchitecture`](crate::errors::ExtensionError::UnsupportedArchitecture)
    /// if the identifier names no known architecture.
    pub fn lookup(&self, identifier: &str) -> Result<&RegisterSet> {
        Ok(self.get(identifier.parse()?))
    }
}

/// The process-wide [`Catalog`], built on first use
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::build)
}
