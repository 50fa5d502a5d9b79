//! # Segment Bases
//!
//! Base addresses of the `fs` and `gs` segments of x86 targets, used to resolve thread local
//! storage (`fs:[0x28]`).
//!
//! Hosts that read frame registers expose them as `fs_base` and `gs_base` on x86-64. Otherwise
//! the kernel is asked directly with `PTRACE_ARCH_PRCTL` for the selected thread, which only
//! works for a local inferior.

use nix::errno::Errno;
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use crate::arch::Arch;
use crate::errors::Result;
use crate::regs::{ReadStrategy, Registers};

/// `ptrace` request to query and set segment bases on x86-64 Linux
pub const PTRACE_ARCH_PRCTL: u32 = 30;
pub const ARCH_GET_FS: u64 = 0x1003;
pub const ARCH_GET_GS: u64 = 0x1004;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Fs,
    Gs,
}

impl Segment {
    /// Name of the base register as the host knows it
    pub fn base_register(&self) -> &'static str {
        match self {
            Segment::Fs => "fs_base",
            Segment::Gs => "gs_base",
        }
    }

    /// `arch_prctl` code that reads the base of this segment
    pub fn arch_prctl_code(&self) -> u64 {
        match self {
            Segment::Fs => ARCH_GET_FS,
            Segment::Gs => ARCH_GET_GS,
        }
    }
}

/// Direct access to the segment bases of a thread, bypassing the host
pub trait ArchPrctl {
    /// Read the base of `segment` for the thread `lwp`
    ///
    /// # Errors
    ///
    /// Returns the errno of the failed request.
    fn get_base(&self, lwp: Pid, segment: Segment) -> std::result::Result<u64, Errno>;
}

/// [`ArchPrctl`] through `ptrace(PTRACE_ARCH_PRCTL, ...)`
#[derive(Debug, Clone, Copy, Default)]
pub struct PtraceArchPrctl;

impl ArchPrctl for PtraceArchPrctl {
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    fn get_base(&self, lwp: Pid, segment: Segment) -> std::result::Result<u64, Errno> {
        let mut value: u64 = 0;
        // SAFETY: the kernel writes one word to `value`, which lives until the call returns
        let res = unsafe {
            nix::libc::ptrace(
                PTRACE_ARCH_PRCTL as _,
                lwp.as_raw(),
                &mut value as *mut u64 as *mut nix::libc::c_void,
                segment.arch_prctl_code() as nix::libc::c_ulong,
            )
        };
        Errno::result(res)?;
        Ok(value)
    }

    #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
    fn get_base(&self, _lwp: Pid, _segment: Segment) -> std::result::Result<u64, Errno> {
        Err(Errno::ENOSYS)
    }
}

impl Registers {
    /// Base address of the `fs` segment
    pub fn fsbase(&self) -> Result<Option<u64>> {
        self.segment_base(Segment::Fs)
    }

    /// Base address of the `gs` segment
    pub fn gsbase(&self) -> Result<Option<u64>> {
        self.segment_base(Segment::Gs)
    }

    /// Base address of `segment`, cached like any register
    ///
    /// Over a remote connection the base cannot be found out, that yields `Some(0)`. So does a
    /// failed request to the kernel.
    pub fn segment_base(&self, segment: Segment) -> Result<Option<u64>> {
        let arch = self.arch()?;
        if let Some(base) = self.bases.get(&segment) {
            return Ok(base);
        }
        let base = self.resolve_segment_base(arch, segment);
        self.bases.insert(segment, base);
        Ok(base)
    }

    fn resolve_segment_base(&self, arch: Arch, segment: Segment) -> Option<u64> {
        if arch == Arch::X86_64 && self.strategy() == ReadStrategy::FrameScoped {
            return self
                .fetch_raw(segment.base_register())
                .map(|raw| raw.reinterpret(self.host.ptrsize()) & self.host.ptrmask());
        }

        if self.host.is_remote() {
            debug!("can not get the {segment:?} base of a remote target");
            return Some(0);
        }

        let Some(thread) = self.host.selected_thread() else {
            warn!("no thread is selected, can not get the {segment:?} base");
            return Some(0);
        };

        match self.arch_prctl.get_base(thread.lwp, segment) {
            Ok(base) => Some(base & self.host.ptrmask()),
            Err(e) => {
                trace!("arch_prctl for {segment:?} of {} failed: {e}", thread.lwp);
                Some(0)
            }
        }
    }
}
