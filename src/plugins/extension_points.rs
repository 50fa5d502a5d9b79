#![allow(clippy::missing_errors_doc)]

use steckrs::extension_point;

use crate::cache::Event;
use crate::errors::Result;

extension_point!(
    // [ExtensionPoint](steckrs::hook::ExtensionPoint) called after the register snapshot was
    // taken on a stop or continue
    ERegistersChanged:
    // Functions implemented by [ERegistersChanged]
    ERegistersChangedF;
    // `changed` holds the registers whose value differs from the previous snapshot, in the
    // order of the snapshot.
    //
    // # Errors
    //
    // Will error when the implementing plugin somehow fails
    fn registers_changed(&self, event: &Event, changed: &[&'static str]) -> Result<()>;
);
