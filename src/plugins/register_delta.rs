use std::collections::HashMap;
use std::sync::Mutex;

use steckrs::simple_plugin;
use tracing::{debug, info, warn};

use crate::cache::Event;
use crate::errors::Result;

use super::extension_points::{ERegistersChanged, ERegistersChangedF};

simple_plugin!(
    /// This plugin logs which registers changed between two stops, and keeps count of how often
    /// each of them did.
    RegisterDeltaPlugin,
    "register_delta",
    "Logs the registers that changed since the last stop",
    hooks: [(ERegistersChanged, RegisterDeltaLog::default())]
);

#[derive(Default, Debug)]
struct Tally {
    stops: usize,
    counts: HashMap<&'static str, usize>,
}

#[derive(Default)]
struct RegisterDeltaLog {
    tally: Mutex<Tally>,
}

impl ERegistersChangedF for RegisterDeltaLog {
    fn registers_changed(&self, event: &Event, changed: &[&'static str]) -> Result<()> {
        if *event != Event::Stop {
            debug!("ignoring register changes on {event}");
            return Ok(());
        }
        let Ok(mut tally) = self.tally.lock() else {
            warn!("register tally is poisoned, skipping this stop");
            return Ok(());
        };
        tally.stops += 1;
        for reg in changed {
            *tally.counts.entry(reg).or_default() += 1;
        }
        if changed.is_empty() {
            debug!("stop #{}: no register changed", tally.stops);
        } else {
            info!("stop #{}: changed {}", tally.stops, changed.join(", "));
        }
        Ok(())
    }
}
