//! Scriptable [`Host`] for the unit tests

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

use nix::unistd::Pid;

use super::{Host, Mapping, RawValue, ThreadId};
use crate::addr::Addr;
use crate::errors::{ExtensionError, Result};

pub(crate) struct MockHost {
    pub arch: RefCell<String>,
    pub ptrsize: Cell<usize>,
    pub alive: Cell<bool>,
    pub remote: Cell<bool>,
    pub frame_registers: Cell<bool>,
    pub registers: RefCell<HashMap<String, RawValue>>,
    /// Registers whose read makes the host evaluator fail
    pub broken: RefCell<HashSet<String>>,
    pub thread: Cell<Option<ThreadId>>,
    pub memory: RefCell<BTreeMap<u64, u8>>,
    pub frames: RefCell<Vec<Addr>>,
    pub mappings: RefCell<Vec<Mapping>>,
    pub symbols: RefCell<HashMap<String, Addr>>,
    pub debug_syms: Cell<bool>,
    pub commands: RefCell<HashMap<String, String>>,
    /// Number of register reads that reached the host
    pub register_reads: Cell<usize>,
    pub executed: Cell<usize>,
    pub searches: Cell<usize>,
}

impl MockHost {
    pub fn new(arch: &str, ptrsize: usize) -> Self {
        Self {
            arch: RefCell::new(arch.to_string()),
            ptrsize: Cell::new(ptrsize),
            alive: Cell::new(true),
            remote: Cell::new(false),
            frame_registers: Cell::new(true),
            registers: RefCell::new(HashMap::new()),
            broken: RefCell::new(HashSet::new()),
            thread: Cell::new(Some(ThreadId {
                pid: Pid::from_raw(1337),
                lwp: Pid::from_raw(1338),
                tid: 0,
            })),
            memory: RefCell::new(BTreeMap::new()),
            frames: RefCell::new(Vec::new()),
            mappings: RefCell::new(Vec::new()),
            symbols: RefCell::new(HashMap::new()),
            debug_syms: Cell::new(false),
            commands: RefCell::new(HashMap::new()),
            register_reads: Cell::new(0),
            executed: Cell::new(0),
            searches: Cell::new(0),
        }
    }

    pub fn amd64() -> Self {
        let host = Self::new("x86-64", 8);
        for (idx, reg) in [
            "rax", "rbx", "rcx", "rdx", "rdi", "rsi", "r8", "r9", "r10", "r11", "r12", "r13",
            "r14", "r15", "rbp", "rsp",
        ]
        .into_iter()
        .enumerate()
        {
            host.set_register(reg, 0x1000 * (idx as u64 + 1));
        }
        host.set_register("rip", 0x0040_1000);
        host.set_register_sized("eflags", 0x246, 4);
        host.set_register_sized("cs", 0x33, 4);
        host
    }

    pub fn set_register(&self, name: &str, value: u64) {
        self.set_register_sized(name, value as i128, self.ptrsize.get());
    }

    pub fn set_register_sized(&self, name: &str, value: i128, size: usize) {
        self.registers
            .borrow_mut()
            .insert(name.to_string(), RawValue::new(value, size));
    }

    pub fn break_register(&self, name: &str) {
        self.broken.borrow_mut().insert(name.to_string());
    }

    pub fn write_bytes(&self, addr: u64, data: &[u8]) {
        let mut mem = self.memory.borrow_mut();
        for (off, byte) in data.iter().enumerate() {
            mem.insert(addr + off as u64, *byte);
        }
    }

    pub fn write_pointer(&self, addr: u64, value: u64) {
        let size = self.ptrsize.get();
        self.write_bytes(addr, &value.to_le_bytes()[..size]);
    }

    fn lookup(&self, name: &str) -> Result<Option<RawValue>> {
        self.register_reads.set(self.register_reads.get() + 1);
        if self.broken.borrow().contains(name) {
            return Err(ExtensionError::HostEvaluation(format!(
                "could not fetch register \"{name}\""
            )));
        }
        Ok(self.registers.borrow().get(name).copied())
    }

    fn eval_term(&self, term: &str) -> Result<u64> {
        let term = term.trim();
        if let Some(reg) = term.strip_prefix('$') {
            return Ok(self.eval_register(reg)?.reinterpret(self.ptrsize.get()));
        }
        if let Some(hex) = term.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map_err(|e| ExtensionError::HostEvaluation(e.to_string()));
        }
        if let Ok(dec) = term.parse::<u64>() {
            return Ok(dec);
        }
        self.symbols
            .borrow()
            .get(term)
            .map(|a| a.u64())
            .ok_or_else(|| {
                ExtensionError::HostEvaluation(format!("No symbol \"{term}\" in current context."))
            })
    }
}

impl Host for MockHost {
    fn arch(&self) -> String {
        self.arch.borrow().clone()
    }

    fn ptrsize(&self) -> usize {
        self.ptrsize.get()
    }

    fn is_alive(&self) -> bool {
        self.alive.get()
    }

    fn is_remote(&self) -> bool {
        self.remote.get()
    }

    fn supports_frame_registers(&self) -> bool {
        self.frame_registers.get()
    }

    fn read_frame_register(&self, name: &str) -> Result<Option<RawValue>> {
        self.lookup(name)
    }

    fn eval_register(&self, name: &str) -> Result<RawValue> {
        self.lookup(name)?.ok_or_else(|| {
            ExtensionError::HostEvaluation(format!("History has not yet reached ${name}."))
        })
    }

    fn parse_and_eval(&self, expression: &str) -> Result<RawValue> {
        let mut sum: u64 = 0;
        for term in expression.split('+') {
            sum = sum.wrapping_add(self.eval_term(term)?);
        }
        Ok(RawValue::new(sum as i128, 8))
    }

    fn selected_thread(&self) -> Option<ThreadId> {
        self.thread.get()
    }

    fn read_memory(&self, addr: Addr, len: usize) -> Result<Vec<u8>> {
        let mem = self.memory.borrow();
        let mut out = Vec::with_capacity(len);
        for off in 0..len as u64 {
            match mem.get(&(addr.u64() + off)) {
                Some(b) => out.push(*b),
                None => break,
            }
        }
        if out.is_empty() && len > 0 {
            return Err(ExtensionError::HostEvaluation(format!(
                "Cannot access memory at address {addr}"
            )));
        }
        Ok(out)
    }

    fn read_pointer(&self, addr: Addr) -> Result<u64> {
        let size = self.ptrsize.get();
        let data = self.read_memory(addr, size)?;
        if data.len() < size {
            return Err(ExtensionError::HostEvaluation(format!(
                "Cannot access memory at address {addr}"
            )));
        }
        let mut raw = [0u8; 8];
        raw[..size].copy_from_slice(&data);
        Ok(u64::from_le_bytes(raw))
    }

    fn frame_pcs(&self) -> Result<Vec<Addr>> {
        Ok(self.frames.borrow().clone())
    }

    fn find_mapping(&self, addr: Addr) -> Option<Mapping> {
        self.mappings
            .borrow()
            .iter()
            .find(|m| m.contains(addr))
            .cloned()
    }

    fn symbol_address(&self, name: &str) -> Option<Addr> {
        self.symbols.borrow().get(name).copied()
    }

    fn search_memory(&self, needle: &[u8]) -> Vec<Addr> {
        self.searches.set(self.searches.get() + 1);
        let mem = self.memory.borrow();
        mem.keys()
            .filter(|start| {
                needle
                    .iter()
                    .enumerate()
                    .all(|(off, b)| mem.get(&(**start + off as u64)) == Some(b))
            })
            .map(|start| Addr::from(*start))
            .collect()
    }

    fn libc_has_debug_syms(&self) -> bool {
        self.debug_syms.get()
    }

    fn execute(&self, command: &str) -> Result<String> {
        self.executed.set(self.executed.get() + 1);
        self.commands
            .borrow()
            .get(command)
            .cloned()
            .ok_or_else(|| ExtensionError::HostEvaluation(format!("Undefined command: \"{command}\"")))
    }
}
