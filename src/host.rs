//! # Host Debugger Interface
//!
//! Everything this crate knows about the debuggee comes through the [`Host`] trait. The host
//! debugger loads the extension, implements [`Host`] on top of its own introspection API and
//! forwards its stop, continue and prompt notifications to a [`Session`](crate::session::Session).
//!
//! Implementations report failures of their evaluator as
//! [`ExtensionError::HostEvaluation`](crate::errors::ExtensionError::HostEvaluation). The
//! register accessor turns those into "value unknown".

use std::ops::Range;

use nix::unistd::Pid;

use crate::addr::Addr;
use crate::errors::Result;

#[cfg(test)]
pub(crate) mod mock;

/// A value as produced by the host evaluator, together with the byte size of its native type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawValue {
    pub value: i128,
    pub size: usize,
}

impl RawValue {
    pub fn new(value: i128, size: usize) -> Self {
        Self { value, size }
    }

    /// Reinterpret the value as an unsigned integer of its native size
    ///
    /// Sizes other than 1, 2, 4 or 8 bytes fall back to the pointer size of the target.
    pub fn reinterpret(&self, ptrsize: usize) -> u64 {
        let width = match self.size {
            1 | 2 | 4 | 8 => self.size,
            _ => ptrsize.clamp(1, 8),
        };
        (self.value as u128 & width_mask(width) as u128) as u64
    }

    /// Reinterpret the value as `u32`, whatever its native size
    pub fn as_u32(&self) -> u32 {
        self.value as u32
    }
}

/// Mask with the lowest `bytes * 8` bits set
pub fn width_mask(bytes: usize) -> u64 {
    if bytes >= 8 {
        u64::MAX
    } else {
        (1u64 << (bytes * 8)) - 1
    }
}

/// Identifier of the currently selected thread of the debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadId {
    pub pid: Pid,
    /// Lightweight process id, the id the kernel knows the thread by
    pub lwp: Pid,
    pub tid: u64,
}

/// A mapped region of the debuggee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub start: Addr,
    pub end: Addr,
    pub name: Option<String>,
}

impl Mapping {
    pub fn range(&self) -> Range<Addr> {
        self.start..self.end
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.range().contains(&addr)
    }
}

/// The introspection API of the host debugger
pub trait Host {
    /// Identifier of the architecture of the inferior, e.g. `x86-64` or `riscv:rv64`
    fn arch(&self) -> String;

    /// Size of a pointer of the inferior in bytes
    fn ptrsize(&self) -> usize;

    fn ptrmask(&self) -> u64 {
        width_mask(self.ptrsize())
    }

    /// Whether there currently is a live inferior process
    fn is_alive(&self) -> bool;

    /// Whether the inferior is debugged over a remote connection
    fn is_remote(&self) -> bool;

    /// Whether the host can read registers of the selected frame directly
    ///
    /// Older hosts only offer [`Host::eval_register`].
    fn supports_frame_registers(&self) -> bool;

    /// Read a register of the selected frame
    ///
    /// Returns `Ok(None)` if the host has no register by that name.
    fn read_frame_register(&self, name: &str) -> Result<Option<RawValue>>;

    /// Evaluate a register through the expression evaluator (`$name`)
    fn eval_register(&self, name: &str) -> Result<RawValue>;

    /// Evaluate an arbitrary expression
    fn parse_and_eval(&self, expression: &str) -> Result<RawValue>;

    /// Prefix that marks a register in expressions of the host
    fn register_sigil(&self) -> &str {
        "$"
    }

    fn selected_thread(&self) -> Option<ThreadId>;

    fn read_memory(&self, addr: Addr, len: usize) -> Result<Vec<u8>>;

    /// Read one pointer sized word in target byte order
    fn read_pointer(&self, addr: Addr) -> Result<u64>;

    /// Read a NUL terminated string, at most `max` bytes long, without the terminator
    fn read_c_string(&self, addr: Addr, max: usize) -> Result<Vec<u8>> {
        const CHUNK: usize = 64;
        let mut buf = Vec::new();
        let mut cursor = addr;
        while buf.len() < max {
            let chunk = self.read_memory(cursor, CHUNK.min(max - buf.len()))?;
            if chunk.is_empty() {
                break;
            }
            if let Some(nul) = chunk.iter().position(|b| *b == 0) {
                buf.extend_from_slice(&chunk[..nul]);
                return Ok(buf);
            }
            cursor += chunk.len() as u64;
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }

    /// Program counters of all frames, newest first
    fn frame_pcs(&self) -> Result<Vec<Addr>>;

    fn find_mapping(&self, addr: Addr) -> Option<Mapping>;

    fn symbol_address(&self, name: &str) -> Option<Addr>;

    /// All addresses in the debuggee where `needle` occurs
    fn search_memory(&self, needle: &[u8]) -> Vec<Addr>;

    fn libc_has_debug_syms(&self) -> bool;

    /// Run a command of the host and capture what it prints
    fn execute(&self, command: &str) -> Result<String>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reinterpret_native_sizes() {
        assert_eq!(RawValue::new(-1, 1).reinterpret(8), 0xff);
        assert_eq!(RawValue::new(-1, 2).reinterpret(8), 0xffff);
        assert_eq!(RawValue::new(-1, 4).reinterpret(8), 0xffff_ffff);
        assert_eq!(RawValue::new(-1, 8).reinterpret(4), u64::MAX);
    }

    #[test]
    fn test_reinterpret_unknown_size_uses_pointer_size() {
        let xmm = RawValue::new(0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00, 16);
        assert_eq!(xmm.reinterpret(8), 0x99aa_bbcc_ddee_ff00);
        assert_eq!(xmm.reinterpret(4), 0xddee_ff00);
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(width_mask(4), 0xffff_ffff);
        assert_eq!(width_mask(8), u64::MAX);
        assert_eq!(width_mask(2), 0xffff);
    }

    #[test]
    fn test_mapping_contains() {
        let m = Mapping {
            start: 0x1000u64.into(),
            end: 0x2000u64.into(),
            name: Some("[stack]".to_string()),
        };
        assert!(m.contains(0x1000u64.into()));
        assert!(!m.contains(0x2000u64.into()));
    }
}
