//! # glibc Version
//!
//! Heap inspection depends on the glibc version of the debuggee. The version can be pinned with
//! the `glibc` parameter, otherwise it is found in the loaded library itself, either through the
//! `__libc_version` symbol or by searching memory for the banner glibc embeds.

use std::fmt::Display;
use std::rc::Rc;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::cache::{Event, Invalidate, Memo, Subscriptions};
use crate::config::{Config, SafeLinking};
use crate::errors::{ExtensionError, Result};
use crate::host::Host;

/// First glibc release that mangles its tcache and fastbin pointers
pub const SAFE_LINKING_SINCE: GlibcVersion = GlibcVersion {
    major: 2,
    minor: 32,
};

const BANNER: &[u8] = b"GNU C Library";
/// Upper bound for reading the banner, which is a single line of text
const BANNER_MAX: usize = 256;
const VERSION_SYMBOL: &str = "__libc_version";

/// Events after which the detected version must be looked up again
pub const INVALIDATED_BY: [Event; 2] = [Event::Start, Event::NewObjfile];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GlibcVersion {
    pub major: u32,
    pub minor: u32,
}

impl GlibcVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Display for GlibcVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parse a version given by the user, like `2.31`
///
/// The first `<major>.<minor>` pair in `s` is used.
///
/// # Errors
///
/// Fails with [`ExtensionError::InvalidConfigurationValue`] if there is no such pair.
pub fn parse_version(s: &str) -> Result<GlibcVersion> {
    let invalid = || ExtensionError::InvalidConfigurationValue {
        name: "glibc".to_string(),
        value: s.to_string(),
        expected: "2.31 or 2.34",
    };
    let re = Regex::new(r"(\d+)\.(\d+)")?;
    let caps = re.captures(s).ok_or_else(invalid)?;
    let major = caps[1].parse().map_err(|_| invalid())?;
    let minor = caps[2].parse().map_err(|_| invalid())?;
    Ok(GlibcVersion::new(major, minor))
}

/// Detected glibc version of the debuggee, memoized until a new object file shows up
#[derive(Debug)]
pub struct Glibc {
    detected: Rc<Memo<(), Option<GlibcVersion>>>,
}

impl Default for Glibc {
    fn default() -> Self {
        Self::new()
    }
}

impl Glibc {
    pub fn new() -> Self {
        Self {
            detected: Rc::new(Memo::new("glibc version")),
        }
    }

    pub fn subscribe(&self, subscriptions: &mut Subscriptions) {
        subscriptions.subscribe_all(&INVALIDATED_BY, self.detected.clone() as Rc<dyn Invalidate>);
    }

    /// Version of the glibc the debuggee uses
    ///
    /// Returns `None` if there is no process or no glibc could be found in it.
    ///
    /// # Errors
    ///
    /// Fails if the configured override is not a version.
    pub fn version(&self, host: &dyn Host, config: &Config) -> Result<Option<GlibcVersion>> {
        if !host.is_alive() {
            debug!("no process, no glibc");
            return Ok(None);
        }
        if let Some(pinned) = config.glibc.as_deref().filter(|v| !v.trim().is_empty()) {
            return parse_version(pinned).map(Some);
        }
        self.detected.get_or_try_insert_with((), || detect(host))
    }

    /// Whether the heap of the debuggee uses safe-linking
    ///
    /// `safe-linking on` or `off` overrides what the version says. Returns `None` if glibc is
    /// not loaded yet.
    pub fn check_safe_linking(&self, host: &dyn Host, config: &Config) -> Result<Option<bool>> {
        let Some(version) = self.version(host, config)? else {
            info!("glibc is not loaded yet");
            return Ok(None);
        };
        Ok(Some(
            (version >= SAFE_LINKING_SINCE || config.safe_linking == SafeLinking::On)
                && config.safe_linking != SafeLinking::Off,
        ))
    }
}

fn detect(host: &dyn Host) -> Result<Option<GlibcVersion>> {
    if host.libc_has_debug_syms() {
        if let Some(version) = from_symbol(host) {
            debug!("glibc {version} from {VERSION_SYMBOL}");
            return Ok(Some(version));
        }
    }

    let release = regex::bytes::Regex::new(r"release version (\d+)\.(\d+)")?;
    for addr in host.search_memory(BANNER) {
        let banner = match host.read_c_string(addr, BANNER_MAX) {
            Ok(b) => b,
            Err(e) => {
                trace!("could not read the banner at {addr}: {e}");
                continue;
            }
        };
        let Some(caps) = release.captures(&banner) else {
            continue;
        };
        let number = |idx: usize| -> Option<u32> {
            std::str::from_utf8(&caps[idx]).ok()?.parse().ok()
        };
        if let (Some(major), Some(minor)) = (number(1), number(2)) {
            let version = GlibcVersion::new(major, minor);
            debug!("glibc {version} from the banner at {addr}");
            return Ok(Some(version));
        }
    }

    debug!("could not find out the glibc version");
    Ok(None)
}

fn from_symbol(host: &dyn Host) -> Option<GlibcVersion> {
    let addr = host.symbol_address(VERSION_SYMBOL)?;
    let raw = host
        .read_c_string(addr, 32)
        .map_err(|e| trace!("could not read {VERSION_SYMBOL}: {e}"))
        .ok()?;
    let text = String::from_utf8_lossy(&raw);
    let mut parts = text.split('.').map(|p| p.trim().parse::<u32>());
    match (parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor))) => Some(GlibcVersion::new(major, minor)),
        _ => None,
    }
}
