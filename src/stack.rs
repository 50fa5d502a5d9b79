//! # Return Addresses on the Stack
//!
//! Finds the stack slots that hold the return address of a live frame, walking up from the
//! stack pointer.

use std::fmt::Display;

use tracing::{debug, trace, warn};

use crate::addr::Addr;
use crate::commands::require_running;
use crate::errors::Result;
use crate::regs::Registers;

/// A stack slot and the word stored in it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackSlot {
    pub addr: Addr,
    pub value: Addr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackSlots {
    slots: Vec<StackSlot>,
}

impl StackSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: StackSlot) {
        self.slots.push(slot);
    }

    pub fn slots(&self) -> &[StackSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Display for StackSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for slot in &self.slots {
            writeln!(f, "{:<24}\t{:016x}", slot.addr, slot.value.u64())?;
        }
        Ok(())
    }
}

/// Stack slots holding the program counter of a frame, from the stack pointer upwards
///
/// When a slot matches a frame, newer frames are no longer looked for. The walk ends at the end
/// of the stack mapping or when every frame was found.
///
/// # Errors
///
/// Fails if there is no process, if the frames cannot be listed or if the stack cannot be read.
pub fn return_addresses(registers: &Registers) -> Result<StackSlots> {
    let host = &*registers.host;
    require_running(host, "retaddr")?;

    let mut found = StackSlots::new();
    let Some(sp) = registers.sp()? else {
        debug!("stack pointer is unknown");
        return Ok(found);
    };
    let mut sp = Addr::from(sp);
    let Some(stack) = host.find_mapping(sp) else {
        warn!("the stack pointer {sp} is not mapped");
        return Ok(found);
    };

    let mut frames = host.frame_pcs()?;
    let step = host.ptrsize() as u64;
    while !frames.is_empty() && stack.start < sp && sp < stack.end {
        let value = Addr::from(host.read_pointer(sp)?);
        if let Some(idx) = frames.iter().position(|pc| *pc == value) {
            trace!("frame #{idx} returns to {value}, stored at {sp}");
            frames.drain(..idx);
            found.push(StackSlot { addr: sp, value });
        }
        sp += step;
    }
    Ok(found)
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::errors::ExtensionError;
    use crate::host::mock::MockHost;
    use crate::host::Mapping;

    fn host() -> Rc<MockHost> {
        let host = Rc::new(MockHost::amd64());
        host.set_register("rsp", 0x7ffe_0010);
        host.mappings.borrow_mut().push(Mapping {
            start: Addr::from(0x7ffe_0000u64),
            end: Addr::from(0x7ffe_0040u64),
            name: Some("[stack]".to_string()),
        });
        for (idx, word) in [0x41u64, 0x0040_1200, 0x42, 0x0040_1300, 0x0040_1200, 0x43]
            .into_iter()
            .enumerate()
        {
            host.write_pointer(0x7ffe_0010 + 8 * idx as u64, word);
        }
        host.frames.borrow_mut().extend([
            Addr::from(0x0040_1100u64),
            Addr::from(0x0040_1200u64),
            Addr::from(0x0040_1300u64),
        ]);
        host
    }

    #[test]
    fn test_finds_return_addresses() {
        let host = host();
        let regs = Registers::new(host);
        let found = return_addresses(&regs).unwrap();
        let addrs: Vec<u64> = found.slots().iter().map(|s| s.addr.u64()).collect();
        // the 0x401200 at 0x7ffe0030 belongs to a frame newer than the one found before it
        assert_eq!(addrs, vec![0x7ffe_0018, 0x7ffe_0028]);
        assert_eq!(found.slots()[1].value, Addr::from(0x0040_1300u64));
    }

    #[test]
    fn test_display() {
        let mut slots = StackSlots::new();
        slots.push(StackSlot {
            addr: Addr::from(0x7ffe_0018u64),
            value: Addr::from(0x0040_1200u64),
        });
        let s = slots.to_string();
        assert!(s.starts_with("0x000000007ffe0018"), "{s}");
        assert!(s.trim_end().ends_with("0000000000401200"), "{s}");
    }

    #[test]
    fn test_unmapped_stack() {
        let host = host();
        host.mappings.borrow_mut().clear();
        let regs = Registers::new(host);
        assert!(return_addresses(&regs).unwrap().is_empty());
    }

    #[test]
    fn test_not_running() {
        let host = host();
        host.alive.set(false);
        let regs = Registers::new(host);
        assert!(matches!(
            return_addresses(&regs),
            Err(ExtensionError::NotRunning(_))
        ));
    }
}
