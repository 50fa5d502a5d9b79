//! # Live Registers
//!
//! Reads registers of the stopped debuggee through the [`Host`] and presents them the same way
//! for every [`Arch`].
//!
//! Registers are looked up by name. Names are case-insensitive, may carry the register sigil of
//! the host (`$rax`) and may use the universal aliases `pc` and `sp`. A lookup that cannot be
//! answered, be it an unknown register, a dead process or a failure of the host evaluator, yields
//! [`None`]: the value is unknown, not zero. Only an architecture missing from the
//! [catalog](crate::regset) is an error.
//!
//! Values are cached in a [`Memo`] that the [`Session`](crate::session::Session) empties on every
//! stop, continue and prompt redraw.
//!
//! The accessor also keeps the register values of the last two stops, see
//! [`Registers::update_last`] and [`Registers::changed`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use regex::{Captures, Regex};
use tracing::{debug, error, trace};

use crate::arch::Arch;
use crate::cache::{Event, Invalidate, Memo};
use crate::errors::Result;
use crate::host::{Host, RawValue};
use crate::regset::{catalog, FlagRegister, RegisterSet};
use crate::segment::{ArchPrctl, PtraceArchPrctl, Segment};

/// Flags registers the host only exposes as 32 bit unsigned values
pub const FIXED_WIDTH_FLAGS: &[&str] = &["eflags", "cpsr"];

/// In real mode the program counter is `cs:ip`, the linear address is `cs * 16 + ip`
pub const REAL_MODE_SEGMENT_SHIFT: u32 = 4;

/// Events after which cached register values must be read again
pub const INVALIDATED_BY: [Event; 3] = [Event::Stop, Event::Continue, Event::Prompt];

/// Aliases every architecture understands, besides its own register names
pub const UNIVERSAL_ALIASES: [&str; 2] = ["pc", "sp"];

/// How register values are fetched from the host, decided once per [`Registers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Read from the selected frame
    FrameScoped,
    /// Evaluate `$name`, for hosts that cannot read frame registers
    Evaluate,
}

/// Registers that callers commonly know by role rather than by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    Pc,
    Sp,
    Frame,
    Retval,
}

/// Register values captured at one lifecycle event, in register context order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: Vec<(&'static str, Option<u64>)>,
}

impl Snapshot {
    pub fn new(values: Vec<(&'static str, Option<u64>)>) -> Self {
        Self { values }
    }

    /// `None` if the register is not part of the snapshot, `Some(None)` if it is but its value
    /// was unknown
    pub fn get(&self, name: &str) -> Option<Option<u64>> {
        self.values
            .iter()
            .find(|(reg, _)| *reg == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, Option<u64>)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The snapshots of the last and the one before the last lifecycle event
#[derive(Debug, Clone, Default)]
pub struct Snapshots {
    pub last: Snapshot,
    pub previous: Snapshot,
}

impl Snapshots {
    fn rotate(&mut self, next: Snapshot) {
        self.previous = std::mem::replace(&mut self.last, next);
    }
}

/// Accessor for the registers of the debuggee
pub struct Registers {
    pub(crate) host: Rc<dyn Host>,
    strategy: ReadStrategy,
    values: Rc<Memo<String, Option<u64>>>,
    pub(crate) bases: Rc<Memo<Segment, Option<u64>>>,
    pub(crate) arch_prctl: Box<dyn ArchPrctl>,
    snapshots: RefCell<Snapshots>,
}

impl Registers {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self::with_arch_prctl(host, Box::new(PtraceArchPrctl))
    }

    /// Like [`Registers::new`], with a custom way to ask the kernel for segment bases
    pub fn with_arch_prctl(host: Rc<dyn Host>, arch_prctl: Box<dyn ArchPrctl>) -> Self {
        let strategy = if host.supports_frame_registers() {
            ReadStrategy::FrameScoped
        } else {
            ReadStrategy::Evaluate
        };
        debug!("reading registers with strategy {strategy:?}");
        Self {
            host,
            strategy,
            values: Rc::new(Memo::new("registers")),
            bases: Rc::new(Memo::new("segment bases")),
            arch_prctl,
            snapshots: RefCell::new(Snapshots::default()),
        }
    }

    #[inline]
    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    /// The caches of this accessor that must be dropped when the debuggee changes
    pub fn caches(&self) -> [Rc<dyn Invalidate>; 2] {
        [
            self.values.clone() as Rc<dyn Invalidate>,
            self.bases.clone() as Rc<dyn Invalidate>,
        ]
    }

    /// The architecture the host currently debugs
    ///
    /// # Errors
    ///
    /// Fails with [`UnsupportedArchitecture`](crate::errors::ExtensionError::UnsupportedArchitecture)
    /// if the catalog knows nothing about it.
    pub fn arch(&self) -> Result<Arch> {
        self.host.arch().parse()
    }

    /// The [`RegisterSet`] of the current architecture
    pub fn current(&self) -> Result<&'static RegisterSet> {
        Ok(catalog().get(self.arch()?))
    }

    pub fn gpr(&self) -> Result<&'static [&'static str]> {
        Ok(self.current()?.gpr())
    }

    pub fn common(&self) -> Result<&'static [&'static str]> {
        Ok(self.current()?.common())
    }

    pub fn frame(&self) -> Result<Option<&'static str>> {
        Ok(self.current()?.frame())
    }

    pub fn retaddr(&self) -> Result<&'static [&'static str]> {
        Ok(self.current()?.retaddr())
    }

    pub fn flags(&self) -> Result<&'static [FlagRegister]> {
        Ok(self.current()?.flags())
    }

    pub fn stack(&self) -> Result<&'static str> {
        Ok(self.current()?.stack())
    }

    pub fn pc_name(&self) -> Result<&'static str> {
        Ok(self.current()?.pc())
    }

    pub fn retval(&self) -> Result<&'static [&'static str]> {
        Ok(self.current()?.retval())
    }

    pub fn args(&self) -> Result<&'static [&'static str]> {
        Ok(self.current()?.args())
    }

    /// The unordered set of all valid registers of the current architecture
    pub fn all_set(&self) -> Result<&'static BTreeSet<&'static str>> {
        Ok(self.current()?.all())
    }

    /// Every register of the current architecture, grouped by role
    ///
    /// Program counter, stack, frame, return address, flags, general purpose and miscellaneous
    /// registers, each name once.
    pub fn all(&self) -> Result<Vec<&'static str>> {
        let set = self.current()?;
        let mut all: Vec<&'static str> = Vec::new();
        let grouped = [set.pc(), set.stack()]
            .into_iter()
            .chain(set.frame())
            .chain(set.retaddr().iter().copied())
            .chain(set.flags().iter().map(|f| f.name))
            .chain(set.gpr().iter().copied())
            .chain(set.misc().iter().copied());
        for reg in grouped {
            if !all.contains(&reg) {
                all.push(reg);
            }
        }
        Ok(all)
    }

    /// All names [`Registers::read`] can answer for the current architecture
    pub fn names(&self) -> Result<BTreeSet<&'static str>> {
        let mut names = self.current()?.all().clone();
        names.extend(UNIVERSAL_ALIASES);
        Ok(names)
    }

    /// Read a register by name
    ///
    /// Returns `Ok(None)` if the value can not be known right now. Repeated reads of the same
    /// name are served from the cache until the next stop, continue or prompt.
    ///
    /// # Errors
    ///
    /// Fails only if the current architecture is not supported.
    pub fn read(&self, name: &str) -> Result<Option<u64>> {
        let arch = self.arch()?;
        let name = normalize(name);
        if let Some(value) = self.values.get(&name) {
            return Ok(value);
        }
        let value = self.fetch(arch, &name)?;
        self.values.insert(name, value);
        Ok(value)
    }

    /// Indexed access for callers that only have a dynamically typed key
    ///
    /// # Panics
    ///
    /// A key that is neither a [`String`] nor a `&'static str` is a bug of the caller, this
    /// panics after logging a backtrace.
    pub fn get(&self, key: &dyn Any) -> Result<Option<u64>> {
        let name: &str = if let Some(s) = key.downcast_ref::<String>() {
            s
        } else if let Some(s) = key.downcast_ref::<&'static str>() {
            s
        } else {
            misuse(key)
        };
        self.read(name)
    }

    pub fn read_well_known(&self, which: WellKnown) -> Result<Option<u64>> {
        let set = self.current()?;
        match which {
            WellKnown::Pc => self.read("pc"),
            WellKnown::Sp => self.read("sp"),
            WellKnown::Frame => match set.frame() {
                Some(frame) => self.read(frame),
                None => Ok(None),
            },
            WellKnown::Retval => match set.retval().first() {
                Some(reg) => self.read(reg),
                None => Ok(None),
            },
        }
    }

    #[inline]
    pub fn pc(&self) -> Result<Option<u64>> {
        self.read_well_known(WellKnown::Pc)
    }

    #[inline]
    pub fn sp(&self) -> Result<Option<u64>> {
        self.read_well_known(WellKnown::Sp)
    }

    #[inline]
    pub fn retval_value(&self) -> Result<Option<u64>> {
        self.read_well_known(WellKnown::Retval)
    }

    /// Name and value of every register in [`Registers::all`]
    pub fn items(&self) -> Result<Vec<(&'static str, Option<u64>)>> {
        self.all()?
            .into_iter()
            .map(|reg| Ok((reg, self.read(reg)?)))
            .collect()
    }

    /// Rewrite bare register names in `expression` so the host evaluator sees them as registers
    ///
    /// `rax+8` becomes `$rax+8`. Names already carrying the sigil are left as they are, and so
    /// is any identifier that merely contains a register name (`foobar_rax`).
    pub fn fix(&self, expression: &str) -> Result<String> {
        let mut names = self.all()?;
        names.extend(UNIVERSAL_ALIASES);
        names.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        names.dedup();

        let sigil = self.host.register_sigil();
        let optional_sigil = if sigil.is_empty() {
            String::new()
        } else {
            format!("(?:{})?", regex::escape(sigil))
        };
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"{optional_sigil}\b({alternation})\b"))?;

        let fixed = pattern.replace_all(expression, |caps: &Captures| format!("{sigil}{}", &caps[1]));
        trace!("fixed expression {expression:?} to {fixed:?}");
        Ok(fixed.into_owned())
    }

    /// Take a new snapshot of the register context and keep the current one as the previous
    ///
    /// With `with_retaddr`, the return address registers are captured as well.
    pub fn update_last(&self, with_retaddr: bool) -> Result<()> {
        let set = self.current()?;
        let mut values: Vec<(&'static str, Option<u64>)> = Vec::new();
        for reg in set.common() {
            values.push((*reg, self.read(reg)?));
        }
        if with_retaddr {
            for reg in set.retaddr() {
                if !values.iter().any(|(r, _)| r == reg) {
                    values.push((*reg, self.read(reg)?));
                }
            }
        }
        self.snapshots.borrow_mut().rotate(Snapshot::new(values));
        Ok(())
    }

    /// Forget both snapshots, they belong to a process that is gone
    pub fn reset_snapshots(&self) {
        trace!("resetting register snapshots");
        *self.snapshots.borrow_mut() = Snapshots::default();
    }

    pub fn snapshots(&self) -> Ref<'_, Snapshots> {
        self.snapshots.borrow()
    }

    /// Registers whose current value differs from the previous snapshot
    ///
    /// Registers missing from the previous snapshot are never reported.
    pub fn changed(&self) -> Result<Vec<&'static str>> {
        let previous = self.snapshots.borrow().previous.clone();
        let mut delta = Vec::new();
        for (reg, value) in previous.iter() {
            if self.read(reg)? != *value {
                delta.push(*reg);
            }
        }
        Ok(delta)
    }

    fn fetch(&self, arch: Arch, name: &str) -> Result<Option<u64>> {
        if !self.host.is_alive() {
            debug!("{name}: The program is not being run.");
            return Ok(None);
        }

        let set = catalog().get(arch);
        let resolved = match name {
            "pc" => set.pc(),
            "sp" => set.stack(),
            other => other,
        };
        if !set.contains(resolved) {
            trace!("{resolved} is no register of {arch}");
            return Ok(None);
        }
        match resolved {
            "fsbase" => return self.segment_base(Segment::Fs),
            "gsbase" => return self.segment_base(Segment::Gs),
            _ => {}
        }

        let ptrsize = self.host.ptrsize();
        let value = if FIXED_WIDTH_FLAGS.iter().any(|f| resolved.contains(f)) {
            match self.host.eval_register(resolved) {
                Ok(raw) => u64::from(raw.as_u32()),
                Err(e) => {
                    trace!("could not read {resolved}: {e}");
                    return Ok(None);
                }
            }
        } else {
            let raw = match self.fetch_raw(resolved) {
                Some(raw) => raw,
                // the host is inconsistent about the case of this one
                None if resolved == "xpsr" => match self.fetch_raw("xPSR") {
                    Some(raw) => raw,
                    None => return Ok(None),
                },
                None => return Ok(None),
            };
            let mut value = raw.reinterpret(ptrsize);
            // only the `pc` alias is linear, the register itself keeps its raw value
            if arch == Arch::I8086 && name == "pc" {
                match self.read("cs")? {
                    Some(cs) => value = value.wrapping_add(cs << REAL_MODE_SEGMENT_SHIFT),
                    None => {
                        debug!("real mode pc without cs is meaningless");
                        return Ok(None);
                    }
                }
            }
            value
        };

        Ok(Some(value & self.host.ptrmask()))
    }

    /// Fetch a register from the host, bypassing catalog and cache
    pub(crate) fn fetch_raw(&self, name: &str) -> Option<RawValue> {
        let res = match self.strategy {
            ReadStrategy::FrameScoped => self.host.read_frame_register(name),
            ReadStrategy::Evaluate => self.host.eval_register(name).map(Some),
        };
        match res {
            Ok(raw) => raw,
            Err(e) => {
                trace!("could not read {name}: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registers")
            .field("strategy", &self.strategy)
            .field("cached", &self.values.len())
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

/// Strip the register sigil and lower the case of a register name
pub fn normalize(name: &str) -> String {
    name.trim_start_matches('$').to_lowercase()
}

fn misuse(key: &dyn Any) -> ! {
    let backtrace = Backtrace::force_capture();
    error!(
        "Unknown register type: {:?}, registers are looked up by name\n{backtrace}",
        key.type_id()
    );
    panic!("register lookup with a non-string key")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::ExtensionError;
    use crate::host::mock::MockHost;

    fn amd64() -> (Rc<MockHost>, Registers) {
        let host = Rc::new(MockHost::amd64());
        let regs = Registers::new(host.clone());
        (host, regs)
    }

    fn invalidate(regs: &Registers) {
        for cache in regs.caches() {
            cache.invalidate();
        }
    }

    #[test]
    fn test_read_is_case_and_sigil_insensitive() {
        let (_host, regs) = amd64();
        let plain = regs.read("rax").unwrap();
        assert_eq!(plain, Some(0x1000));
        assert_eq!(regs.read("RAX").unwrap(), plain);
        assert_eq!(regs.read("$rax").unwrap(), plain);
        assert_eq!(regs.read("$Rax").unwrap(), plain);
    }

    #[test]
    fn test_aliases() {
        let (_host, regs) = amd64();
        assert_eq!(regs.read("pc").unwrap(), Some(0x0040_1000));
        assert_eq!(regs.read("sp").unwrap(), Some(0x10000));
        assert_eq!(regs.pc().unwrap(), regs.read("rip").unwrap());
        assert_eq!(regs.sp().unwrap(), regs.read("rsp").unwrap());
        assert_eq!(regs.retval_value().unwrap(), Some(0x1000));
        assert_eq!(
            regs.read_well_known(WellKnown::Frame).unwrap(),
            regs.read("rbp").unwrap()
        );
    }

    #[test]
    fn test_unknown_register_is_absent() {
        let (host, regs) = amd64();
        assert_eq!(regs.read("x0").unwrap(), None);
        assert_eq!(regs.read("definitely_not_a_register").unwrap(), None);
        // the catalog already knows, the host is never asked
        assert_eq!(host.register_reads.get(), 0);
    }

    #[test]
    fn test_host_failure_is_absent() {
        let (host, regs) = amd64();
        host.break_register("rbx");
        assert_eq!(regs.read("rbx").unwrap(), None);
        // valid for the arch, but the host has no value
        assert_eq!(regs.read("fs").unwrap(), None);
    }

    #[test]
    fn test_dead_process_is_absent() {
        let (host, regs) = amd64();
        host.alive.set(false);
        assert_eq!(regs.read("rax").unwrap(), None);
    }

    #[test]
    fn test_unsupported_architecture_propagates() {
        let (host, regs) = amd64();
        *host.arch.borrow_mut() = "m68k".to_string();
        assert!(matches!(
            regs.read("pc"),
            Err(ExtensionError::UnsupportedArchitecture(_))
        ));
        assert!(regs.common().is_err());
        assert!(regs.fix("d0+4").is_err());
    }

    #[test]
    fn test_values_are_masked_to_pointer_width() {
        let host = Rc::new(MockHost::new("i386", 4));
        host.set_register_sized("eax", 0x1_0000_0001, 8);
        host.set_register_sized("ebx", -2, 8);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.read("eax").unwrap(), Some(1));
        assert_eq!(regs.read("ebx").unwrap(), Some(0xffff_fffe));

        let (host, regs) = amd64();
        host.set_register_sized("rcx", -1, 8);
        let mask = host.ptrmask();
        let value = regs.read("rcx").unwrap().unwrap();
        assert_eq!(value, value & mask);
        assert_eq!(value, u64::MAX);
    }

    #[test]
    fn test_sub_registers_keep_their_width() {
        let (host, regs) = amd64();
        host.set_register_sized("al", -1, 1);
        host.set_register_sized("ax", -1, 2);
        assert_eq!(regs.read("al").unwrap(), Some(0xff));
        assert_eq!(regs.read("ax").unwrap(), Some(0xffff));
    }

    #[test]
    fn test_flags_are_read_as_u32() {
        let (host, regs) = amd64();
        host.set_register_sized("eflags", -1, 8);
        assert_eq!(regs.read("eflags").unwrap(), Some(0xffff_ffff));
    }

    #[test]
    fn test_xpsr_falls_back_to_mixed_case() {
        let host = Rc::new(MockHost::new("armcm", 4));
        host.set_register_sized("xPSR", 0x6100_0000, 4);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.read("xpsr").unwrap(), Some(0x6100_0000));
        assert_eq!(regs.read("XPSR").unwrap(), Some(0x6100_0000));
    }

    #[test]
    fn test_real_mode_pc_adds_code_segment() {
        let host = Rc::new(MockHost::new("i8086", 4));
        host.set_register_sized("eip", 0x100, 4);
        host.set_register_sized("cs", 0x1000, 4);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.read("pc").unwrap(), Some(0x10100));
        assert_eq!(regs.pc().unwrap(), Some(0x10100));
        assert_eq!(regs.read("eip").unwrap(), Some(0x100));
        regs.update_last(false).unwrap();
        assert_eq!(regs.snapshots().last.get("eip"), Some(Some(0x100)));

        // not in protected mode
        let host = Rc::new(MockHost::new("i386", 4));
        host.set_register_sized("eip", 0x100, 4);
        host.set_register_sized("cs", 0x1000, 4);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.read("pc").unwrap(), Some(0x100));
    }

    #[test]
    fn test_real_mode_pc_without_cs_is_absent() {
        let host = Rc::new(MockHost::new("i8086", 4));
        host.set_register_sized("eip", 0x100, 4);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.read("pc").unwrap(), None);
    }

    #[test]
    fn test_legacy_evaluation_strategy() {
        let host = Rc::new(MockHost::amd64());
        host.frame_registers.set(false);
        let regs = Registers::new(host.clone());
        assert_eq!(regs.strategy(), ReadStrategy::Evaluate);
        assert_eq!(regs.read("rdx").unwrap(), Some(0x4000));
        // valid name the host does not know: the evaluator errors, we return nothing
        assert_eq!(regs.read("gs").unwrap(), None);
    }

    #[test]
    fn test_strategy_is_chosen_once() {
        let (host, regs) = amd64();
        host.frame_registers.set(false);
        assert_eq!(regs.strategy(), ReadStrategy::FrameScoped);
    }

    #[test]
    fn test_reads_are_cached_until_invalidated() {
        let (host, regs) = amd64();
        assert_eq!(regs.read("pc").unwrap(), Some(0x0040_1000));
        host.set_register("rip", 0x0040_2000);
        assert_eq!(regs.read("pc").unwrap(), Some(0x0040_1000));
        let reads = host.register_reads.get();
        regs.read("pc").unwrap();
        assert_eq!(host.register_reads.get(), reads);

        invalidate(&regs);
        assert_eq!(regs.read("pc").unwrap(), Some(0x0040_2000));
    }

    #[test]
    fn test_absent_values_are_cached_too() {
        let (host, regs) = amd64();
        host.break_register("r8");
        assert_eq!(regs.read("r8").unwrap(), None);
        let reads = host.register_reads.get();
        assert_eq!(regs.read("r8").unwrap(), None);
        assert_eq!(host.register_reads.get(), reads);
    }

    #[test]
    fn test_segment_bases_are_registers() {
        let (host, regs) = amd64();
        host.set_register("fs_base", 0x7fff_f7d8_a740);
        host.set_register("gs_base", 0x7fff_f7d8_0000);
        assert_eq!(regs.read("fsbase").unwrap(), Some(0x7fff_f7d8_a740));
        assert_eq!(regs.read("$FSBASE").unwrap(), regs.fsbase().unwrap());
        assert_eq!(regs.read("gsbase").unwrap(), regs.gsbase().unwrap());

        let items = regs.items().unwrap();
        assert!(items.contains(&("fsbase", Some(0x7fff_f7d8_a740))));
    }

    #[test]
    fn test_reset_snapshots() {
        let (_host, regs) = amd64();
        regs.update_last(false).unwrap();
        regs.update_last(false).unwrap();
        assert!(!regs.snapshots().previous.is_empty());

        regs.reset_snapshots();
        assert!(regs.snapshots().last.is_empty());
        assert!(regs.snapshots().previous.is_empty());
        assert!(regs.changed().unwrap().is_empty());
    }

    #[test]
    fn test_get_with_string_keys() {
        let (_host, regs) = amd64();
        assert_eq!(regs.get(&"RCX").unwrap(), Some(0x3000));
        assert_eq!(regs.get(&String::from("$rcx")).unwrap(), Some(0x3000));
    }

    #[test]
    #[should_panic(expected = "non-string key")]
    fn test_get_with_integer_key_aborts() {
        let (_host, regs) = amd64();
        let _ = regs.get(&42u32);
    }

    #[test]
    fn test_names_contain_aliases() {
        let (_host, regs) = amd64();
        let names = regs.names().unwrap();
        assert!(names.contains("pc"));
        assert!(names.contains("sp"));
        assert!(names.contains("rip"));
        assert!(names.contains("fsbase"));

        let host = Rc::new(MockHost::new("aarch64", 8));
        let regs = Registers::new(host);
        let names = regs.names().unwrap();
        assert!(names.contains("pc"));
        assert!(names.contains("w28"));
        assert!(!names.contains("w29"));
    }

    #[test]
    fn test_views_follow_the_architecture() {
        let (host, regs) = amd64();
        assert_eq!(regs.frame().unwrap(), Some("rbp"));
        assert_eq!(regs.stack().unwrap(), "rsp");
        assert_eq!(regs.args().unwrap()[0], "rdi");
        assert!(regs.retaddr().unwrap().is_empty());

        *host.arch.borrow_mut() = "arm".to_string();
        assert_eq!(regs.frame().unwrap(), None);
        assert_eq!(regs.retaddr().unwrap(), &["lr"]);
        assert_eq!(regs.flags().unwrap()[0].name, "cpsr");
        assert_eq!(regs.gpr().unwrap().len(), 13);
    }

    #[test]
    fn test_all_is_grouped_by_role() {
        let (_host, regs) = amd64();
        let all = regs.all().unwrap();
        assert_eq!(&all[..4], &["rip", "rsp", "rbp", "eflags"]);
        assert_eq!(all.len(), regs.all_set().unwrap().len());
    }

    #[test]
    fn test_items() {
        let (_host, regs) = amd64();
        let items = regs.items().unwrap();
        assert_eq!(items[0], ("rip", Some(0x0040_1000)));
        assert!(items.contains(&("gs", None)));
    }

    #[test]
    fn test_fix_prefixes_registers() {
        let (_host, regs) = amd64();
        assert_eq!(regs.fix("rax+8").unwrap(), "$rax+8");
        assert_eq!(regs.fix("$rax+8").unwrap(), "$rax+8");
        assert_eq!(regs.fix("*(rsp+0x10)").unwrap(), "*($rsp+0x10)");
        assert_eq!(regs.fix("pc-4").unwrap(), "$pc-4");
        assert_eq!(regs.fix("spl+sp").unwrap(), "$spl+$sp");
    }

    #[test]
    fn test_fix_respects_word_boundaries() {
        let (_host, regs) = amd64();
        assert_eq!(regs.fix("foobar_rax").unwrap(), "foobar_rax");
        assert_eq!(regs.fix("raxx+1").unwrap(), "raxx+1");
        assert_eq!(regs.fix("main+rip").unwrap(), "main+$rip");
    }

    #[test]
    fn test_changed_after_pc_advanced() {
        let (host, regs) = amd64();
        regs.update_last(false).unwrap();
        invalidate(&regs);
        host.set_register("rip", 0x0040_1004);
        regs.update_last(false).unwrap();

        assert_eq!(regs.changed().unwrap(), vec!["rip"]);
        assert_eq!(regs.snapshots().previous.get("rip"), Some(Some(0x0040_1000)));
        assert_eq!(regs.snapshots().last.get("rip"), Some(Some(0x0040_1004)));
    }

    #[test]
    fn test_nothing_changed_without_previous() {
        let (_host, regs) = amd64();
        regs.update_last(false).unwrap();
        assert!(regs.snapshots().previous.is_empty());
        assert!(regs.changed().unwrap().is_empty());
    }

    #[test]
    fn test_registers_missing_from_previous_are_not_changed() {
        let host = Rc::new(MockHost::new("arm", 4));
        host.set_register_sized("r0", 1, 4);
        host.set_register_sized("lr", 0x8000, 4);
        let regs = Registers::new(host.clone());
        regs.update_last(false).unwrap();
        invalidate(&regs);
        host.set_register_sized("lr", 0x9000, 4);
        regs.update_last(false).unwrap();
        // lr is not part of the snapshot unless asked for
        assert!(regs.changed().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_with_return_address() {
        let host = Rc::new(MockHost::new("arm", 4));
        host.set_register_sized("lr", 0x8000, 4);
        let regs = Registers::new(host.clone());
        regs.update_last(true).unwrap();
        assert_eq!(regs.snapshots().last.get("lr"), Some(Some(0x8000)));
        let common_len = regs.common().unwrap().len();
        assert_eq!(regs.snapshots().last.len(), common_len + 1);
    }
}
