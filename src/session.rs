//! # Session
//!
//! A [`Session`] is everything the extension keeps while it is loaded into a host debugger: the
//! register accessor, the configuration, every cache and, with the `plugins` feature, the
//! plugins. The host creates it once with [`Session::start`] and forwards its lifecycle
//! notifications to [`Session::notify`].
//!
//! Hosts that drive command callbacks from a single control thread can park the session in the
//! [`context`] of that thread instead of passing it around.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
#[cfg(feature = "plugins")]
use std::sync::{Arc, Mutex};

#[cfg(feature = "plugins")]
use steckrs::PluginManager;
#[cfg(feature = "plugins")]
use tracing::{trace, warn};
use tracing::{debug, info};

use crate::cache::{Event, Subscriptions};
use crate::config::Config;
use crate::errors::Result;
use crate::glibc::{Glibc, GlibcVersion};
use crate::host::Host;
use crate::info::Info;
#[cfg(feature = "plugins")]
use crate::plugins::extension_points::ERegistersChanged;
#[cfg(feature = "plugins")]
use crate::{for_hooks, plugins::default_plugin_manager};
use crate::regs::{self, Registers};
use crate::segment::ArchPrctl;

pub struct Session {
    host: Rc<dyn Host>,
    registers: Registers,
    config: RefCell<Config>,
    subscriptions: Subscriptions,
    glibc: Glibc,
    info: Info,
    #[cfg(feature = "plugins")]
    plugins: Arc<Mutex<PluginManager>>,
}

impl Session {
    /// Set up a session on top of `host`
    ///
    /// # Errors
    ///
    /// If the host already debugs a process, its architecture must be one the catalog knows.
    pub fn start(host: Rc<dyn Host>, config: Config) -> Result<Self> {
        let registers = Registers::new(host.clone());
        Self::assemble(host, registers, config)
    }

    /// Like [`Session::start`], with a custom way to ask the kernel for segment bases
    pub fn start_with(
        host: Rc<dyn Host>,
        config: Config,
        arch_prctl: Box<dyn ArchPrctl>,
    ) -> Result<Self> {
        let registers = Registers::with_arch_prctl(host.clone(), arch_prctl);
        Self::assemble(host, registers, config)
    }

    fn assemble(host: Rc<dyn Host>, registers: Registers, config: Config) -> Result<Self> {
        if host.is_alive() {
            let arch = registers.arch()?;
            info!("attaching to a running {arch} process");
        }

        let mut subscriptions = Subscriptions::new();
        for cache in registers.caches() {
            subscriptions.subscribe_all(&regs::INVALIDATED_BY, cache);
        }
        let glibc = Glibc::new();
        glibc.subscribe(&mut subscriptions);
        let info = Info::new();
        info.subscribe(&mut subscriptions);
        debug!("session caches: {subscriptions:?}");

        Ok(Self {
            host,
            registers,
            config: RefCell::new(config),
            subscriptions,
            glibc,
            info,
            #[cfg(feature = "plugins")]
            plugins: Arc::new(Mutex::new(default_plugin_manager())),
        })
    }

    /// End the session, dropping every cache and plugin
    pub fn teardown(self) {
        info!("tearing down the session");
        drop(self);
    }

    #[inline]
    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn config(&self) -> Ref<'_, Config> {
        self.config.borrow()
    }

    #[cfg(feature = "plugins")]
    #[must_use]
    pub fn plugins(&self) -> Arc<Mutex<PluginManager>> {
        self.plugins.clone()
    }

    /// Change a parameter, as `set <name> <value>` in the host does
    pub fn set_parameter(&self, name: &str, value: &str) -> Result<()> {
        self.config.borrow_mut().set(name, value)
    }

    /// Handle a notification of the host
    ///
    /// Caches subscribed to `event` are dropped first. On a stop or continue the register
    /// snapshot is then rotated, after which the plugins learn which registers changed. A new
    /// process starts without snapshots.
    ///
    /// # Errors
    ///
    /// Fails if the architecture of the process is not supported.
    pub fn notify(&self, event: Event) -> Result<()> {
        debug!("event: {event}");
        self.subscriptions.fire(event);

        if event == Event::Start {
            self.registers.reset_snapshots();
        }
        if matches!(event, Event::Stop | Event::Continue) {
            let with_retaddr = self.config.borrow().show_retaddr_reg;
            self.registers.update_last(with_retaddr)?;
            #[cfg(feature = "plugins")]
            self.run_change_hooks(event)?;
        }
        Ok(())
    }

    #[cfg(feature = "plugins")]
    fn run_change_hooks(&self, event: Event) -> Result<()> {
        let changed = self.registers.changed()?;
        let session = self;
        for_hooks!(
            for hook[ERegistersChanged] in session {
                if let Err(e) = hook.inner().registers_changed(&event, &changed) {
                    warn!("a plugin failed on {event}: {e}");
                }
            }
        );
        Ok(())
    }

    pub fn on_start(&self) -> Result<()> {
        self.notify(Event::Start)
    }

    pub fn on_stop(&self) -> Result<()> {
        self.notify(Event::Stop)
    }

    pub fn on_continue(&self) -> Result<()> {
        self.notify(Event::Continue)
    }

    pub fn on_prompt(&self) -> Result<()> {
        self.notify(Event::Prompt)
    }

    pub fn on_exit(&self) -> Result<()> {
        self.notify(Event::Exit)
    }

    pub fn on_new_objfile(&self) -> Result<()> {
        self.notify(Event::NewObjfile)
    }

    pub fn glibc_version(&self) -> Result<Option<GlibcVersion>> {
        self.glibc.version(self.host(), &self.config())
    }

    pub fn check_safe_linking(&self) -> Result<Option<bool>> {
        self.glibc.check_safe_linking(self.host(), &self.config())
    }

    #[inline]
    pub fn info(&self) -> &Info {
        &self.info
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registers", &self.registers)
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

/// The active [`Session`] of the current thread
pub mod context {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing::warn;

    use super::Session;
    use crate::errors::{ExtensionError, Result};

    thread_local! {
        static ACTIVE: RefCell<Option<Rc<Session>>> = const { RefCell::new(None) };
    }

    /// Make `session` the active one, replacing any other
    pub fn install(session: Session) -> Rc<Session> {
        let session = Rc::new(session);
        let replaced = ACTIVE.with(|slot| slot.replace(Some(session.clone())));
        if replaced.is_some() {
            warn!("replacing the active session");
        }
        session
    }

    /// Run `f` with the active session
    ///
    /// # Errors
    ///
    /// Fails with [`ExtensionError::NoSession`] if none is installed, and with whatever `f`
    /// returns.
    pub fn with<T>(f: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        let session = ACTIVE
            .with(|slot| slot.borrow().clone())
            .ok_or(ExtensionError::NoSession)?;
        f(&session)
    }

    pub fn uninstall() -> Option<Rc<Session>> {
        ACTIVE.with(RefCell::take)
    }

    pub fn is_installed() -> bool {
        ACTIVE.with(|slot| slot.borrow().is_some())
    }
}
