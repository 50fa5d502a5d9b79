//! # Cached `info` Output
//!
//! Some `info` commands of the host are slow and their output only changes on certain events.
//! The memory map and the auxiliary vector stay the same for the lifetime of a process, the
//! section list only needs a refresh after a stop.

use std::rc::Rc;

use tracing::debug;

use crate::cache::{Event, Invalidate, Memo, Subscriptions};
use crate::host::Host;

#[derive(Debug)]
pub struct Info {
    per_process: Rc<Memo<&'static str, String>>,
    per_stop: Rc<Memo<&'static str, String>>,
}

impl Default for Info {
    fn default() -> Self {
        Self::new()
    }
}

impl Info {
    pub fn new() -> Self {
        Self {
            per_process: Rc::new(Memo::new("info (process)")),
            per_stop: Rc::new(Memo::new("info (stop)")),
        }
    }

    pub fn subscribe(&self, subscriptions: &mut Subscriptions) {
        subscriptions.subscribe(Event::Exit, self.per_process.clone() as Rc<dyn Invalidate>);
        subscriptions.subscribe(Event::Stop, self.per_stop.clone() as Rc<dyn Invalidate>);
    }

    /// Output of `info proc mapping`
    pub fn proc_mapping(&self, host: &dyn Host) -> String {
        cached(&self.per_process, host, "info proc mapping")
    }

    /// Output of `info auxv`
    pub fn auxv(&self, host: &dyn Host) -> String {
        cached(&self.per_process, host, "info auxv")
    }

    /// Output of `info files`
    pub fn files(&self, host: &dyn Host) -> String {
        cached(&self.per_stop, host, "info files")
    }
}

/// Failed commands are remembered as empty output
fn cached(memo: &Memo<&'static str, String>, host: &dyn Host, command: &'static str) -> String {
    if let Some(output) = memo.get(&command) {
        return output;
    }
    let output = host.execute(command).unwrap_or_else(|e| {
        debug!("`{command}` failed: {e}");
        String::new()
    });
    memo.insert(command, output.clone());
    output
}
