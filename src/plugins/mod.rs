//! # Plugin System
//!
//! Lets plugins react to what the extension observes, using the [`steckrs`] crate.
//!
//! The [`Session`](crate::session::Session) owns a [`PluginManager`] and calls the hooks of the
//! enabled plugins at the [`ExtensionPoint`](steckrs::hook::ExtensionPoint)s defined in
//! [`extension_points`]. Right now that is [`ERegistersChanged`](extension_points::ERegistersChanged),
//! which runs after every stop and continue with the registers whose value changed.
//!
//! ## Default Plugins
//!
//! - [`RegisterDeltaPlugin`]: logs the changed registers on every stop
//!
//! ## Usage
//!
//! The plugin system is conditionally compiled when the `plugins` feature is enabled.
//! The [`for_hooks!`](crate::for_hooks) macro iterates over all enabled hooks for one extension
//! point.
//!
//! # Examples
//!
//! ```no_run
//! # use regminer::for_hooks;
//! # use regminer::cache::Event;
//! # use regminer::plugins::extension_points::ERegistersChanged;
//! # use regminer::session::Session;
//! # use tracing::trace;
//! # fn helper(session: &Session) {
//! for_hooks!(
//!     for hook[ERegistersChanged] in session {
//!         hook.inner().registers_changed(&Event::Stop, &["rax"]).unwrap();
//!     }
//! );
//! # }
//! ```

use steckrs::{Plugin, PluginManager};
use tracing::{error, warn};

use self::register_delta::RegisterDeltaPlugin;

pub mod extension_points;

pub mod register_delta;

/// Creates the default plugin manager with built-in plugins already loaded and activated
#[must_use]
pub fn default_plugin_manager() -> PluginManager {
    let mut manager = PluginManager::new();

    load_plugin(&mut manager, RegisterDeltaPlugin::new());

    manager
}

/// Loads and enables a [`Plugin`] in the [`PluginManager`]
///
/// If the plugin cannot be enabled, it is unloaded again.
pub fn load_plugin<P: Plugin>(manager: &mut PluginManager, plugin: P) {
    let id = plugin.id();
    if let Err(e) = manager.load_plugin(Box::new(plugin)) {
        error!("Could not load plugin {id}: {e}");
    }
    if let Err(e) = manager.enable_plugin(id) {
        error!("Could not enable plugin {id}: {e}");
        warn!("Trying to unload plugin {id} because of previous error");
        match manager.unload_plugin(id) {
            Ok(()) => warn!("unloading {id} was successful"),
            Err(e) => error!("unloading {id} failed: {e}"),
        }
    }
}

/// Executes code for each enabled hook implementing a specific extension point
///
/// `$session` must have a `plugins()` method returning the shared [`PluginManager`], and
/// [`tracing::trace`] must be in scope.
///
/// # Panics
///
/// This macro will panic if it cannot acquire the lock on the plugin manager.
#[macro_export]
macro_rules! for_hooks {
    (for $hook_var:ident[$extension_point:ident] in $session:ident $body:block) => {
        let plugins = $session.plugins();
        trace!("locking plugins");
        let mut plugins_lock = plugins
            .lock()
            .expect("failed to lock the plugin manager of the session");
        let hooks: Vec<(_, &mut steckrs::hook::Hook<$extension_point>)> =
            plugins_lock.get_enabled_hooks_by_ep_mut::<$extension_point>();
        for (_, $hook_var) in hooks {
            {
                $body
            }
        }
        drop(plugins_lock);
        trace!("unlocking plugins");
    };
}
