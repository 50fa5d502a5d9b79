//! # regminer
//!
//! Register access for a debugger extension that has to work the same on every architecture
//! its host debugger supports.
//!
//! The host debugger is abstracted as [`Host`](host::Host). On top of it,
//! [`Registers`](regs::Registers) reads registers by name, with caching, well-known roles like
//! program counter and stack pointer, and a snapshot of the last two stops to see what changed.
//! The per-architecture knowledge lives in the static [catalog](regset::catalog).
//!
//! A [`Session`](session::Session) wires it all together and reacts to the lifecycle
//! notifications of the host.
//!
//! ## Features
//!
//! - `plugins`: plugin hooks through [`steckrs`], see [`plugins`]
//! - `cli`: the `regcat` binary

pub mod addr;
pub mod arch;
pub mod cache;
pub mod commands;
pub mod config;
pub mod errors;
pub mod glibc;
pub mod host;
pub mod info;
pub mod regs;
pub mod regset;
pub mod segment;
pub mod session;
pub mod stack;

#[cfg(feature = "plugins")]
pub mod plugins;

pub use addr::Addr;
