//! # Command Arguments
//!
//! Helpers for user commands: evaluating their arguments leniently and refusing to run when the
//! debuggee is not in the right state.

use tracing::{debug, warn};

use crate::arch::Arch;
use crate::errors::{ExtensionError, Result};
use crate::host::{Host, RawValue};
use crate::regs::Registers;
use crate::session::Session;

/// How [`fix_arg`] handles an argument that does not evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    /// Hand back the argument text instead of nothing
    pub sloppy: bool,
    /// Do not log the failure
    pub quiet: bool,
    /// Return the failure as error
    pub reraise: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            sloppy: false,
            quiet: true,
            reraise: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedArg {
    Value(RawValue),
    /// The argument as given, for sloppy evaluation
    Text(String),
}

/// Fail with [`ExtensionError::NotRunning`] if there is no process
pub fn require_running(host: &dyn Host, command: &str) -> Result<()> {
    if host.is_alive() {
        Ok(())
    } else {
        Err(ExtensionError::NotRunning(command.to_string()))
    }
}

/// Fail with [`ExtensionError::OnlyAmd64`] unless the debuggee is x86-64
pub fn only_amd64(registers: &Registers, command: &str) -> Result<()> {
    if registers.host.arch() == Arch::X86_64.identifier() {
        Ok(())
    } else {
        Err(ExtensionError::OnlyAmd64(command.to_string()))
    }
}

/// Evaluate a command argument
///
/// An argument that does not evaluate as is gets a second try with register names marked for
/// the host, so `rax+8` works like `$rax+8`.
///
/// # Errors
///
/// Fails if the architecture is not supported, or with the evaluation error if
/// [`FixOptions::reraise`] is set.
pub fn fix_arg(session: &Session, arg: &str, options: FixOptions) -> Result<Option<FixedArg>> {
    let host = session.host();
    if let Ok(value) = host.parse_and_eval(arg) {
        return Ok(Some(FixedArg::Value(value)));
    }

    let fixed = session.registers().fix(arg)?;
    match host.parse_and_eval(&fixed) {
        Ok(value) => Ok(Some(FixedArg::Value(value))),
        Err(e) => {
            if !options.quiet {
                warn!("{e}");
            } else {
                debug!("could not evaluate {arg:?}: {e}");
            }
            if options.reraise {
                Err(e)
            } else if options.sloppy {
                Ok(Some(FixedArg::Text(arg.to_string())))
            } else {
                Ok(None)
            }
        }
    }
}

/// Like [`fix_arg`], for arguments that must be integers
///
/// Sloppy text is not an integer and counts as nothing.
pub fn fix_int(session: &Session, arg: &str, options: FixOptions) -> Result<Option<u64>> {
    let ptrsize = session.host().ptrsize();
    Ok(match fix_arg(session, arg, options)? {
        Some(FixedArg::Value(raw)) => Some(raw.reinterpret(ptrsize)),
        Some(FixedArg::Text(_)) | None => None,
    })
}

/// Evaluate `s` with the host, as unsigned 64 bit integer
pub fn sloppy_parse(host: &dyn Host, s: &str) -> Option<u64> {
    match host.parse_and_eval(s) {
        Ok(raw) => Some(raw.value as u64),
        Err(e) => {
            debug!("{s:?} is no expression: {e}");
            None
        }
    }
}

/// Parse an address argument
///
/// # Errors
///
/// Fails with [`ExtensionError::InvalidAddressExpression`] if `s` does not evaluate.
pub fn address_expr(host: &dyn Host, s: &str) -> Result<u64> {
    sloppy_parse(host, s).ok_or_else(|| ExtensionError::InvalidAddressExpression(s.to_string()))
}

/// Parse an argument that is hexadecimal even without `0x`, or else an address expression
///
/// # Errors
///
/// Fails with [`ExtensionError::InvalidAddressExpression`] if `s` is neither.
pub fn hex_or_address_expr(host: &dyn Host, s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    match u64::from_str_radix(digits, 16) {
        Ok(value) => Ok(value),
        Err(_) => address_expr(host, s),
    }
}
