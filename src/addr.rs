use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// An address in the address space of the debuggee
///
/// Kept as [`u64`] regardless of the host, since the target may well be wider than the machine
/// the debugger runs on.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Addr(u64);

impl Addr {
    pub const NULL: Addr = Addr(0);

    pub fn u64(&self) -> u64 {
        self.0
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl std::fmt::Debug for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl Add<u64> for Addr {
    type Output = Self;
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u64> for Addr {
    fn add_assign(&mut self, rhs: u64) {
        self.0 = self.0.wrapping_add(rhs)
    }
}

impl Sub for Addr {
    type Output = u64;
    fn sub(self, rhs: Self) -> Self::Output {
        self.0.wrapping_sub(rhs.0)
    }
}

impl From<u64> for Addr {
    fn from(value: u64) -> Self {
        Addr(value)
    }
}

impl From<Addr> for u64 {
    fn from(value: Addr) -> Self {
        value.0
    }
}
