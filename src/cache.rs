//! # Caches and Lifecycle Events
//!
//! Values read from the debuggee are only valid until the debuggee moves again. Every cached
//! value therefore lives in a [`Memo`], and every [`Memo`] is subscribed to the [`Event`]s after
//! which its content can no longer be trusted. The [`Session`](crate::session::Session) fires the
//! events as the host debugger reports them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Notifications of the host debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A new inferior was started
    Start,
    /// Execution halted (breakpoint, step, signal)
    Stop,
    /// Execution resumes
    Continue,
    /// The interactive prompt is about to be redrawn
    Prompt,
    /// The inferior exited
    Exit,
    /// A new object file was loaded
    NewObjfile,
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Event::Start => "start",
            Event::Stop => "stop",
            Event::Continue => "continue",
            Event::Prompt => "prompt",
            Event::Exit => "exit",
            Event::NewObjfile => "new objfile",
        };
        write!(f, "{s}")
    }
}

/// Something that holds state that must be dropped on certain [`Event`]s
pub trait Invalidate {
    fn invalidate(&self);
}

/// A named key-value cache that is emptied by [`Invalidate::invalidate`]
#[derive(Debug)]
pub struct Memo<K, V> {
    name: &'static str,
    entries: RefCell<HashMap<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Memo<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.borrow_mut().insert(key, value);
    }

    /// Return the cached value for `key`, computing and storing it first if there is none
    ///
    /// Errors of `compute` are passed on and nothing is stored.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        // compute may recurse into this memo, so no borrow is held while it runs
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<K, V> Invalidate for Memo<K, V> {
    fn invalidate(&self) {
        trace!("invalidating cache {}", self.name);
        self.entries.borrow_mut().clear();
    }
}

/// Which caches are dropped on which [`Event`]
#[derive(Default)]
pub struct Subscriptions {
    subscribers: HashMap<Event, Vec<Rc<dyn Invalidate>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, event: Event, cache: Rc<dyn Invalidate>) {
        self.subscribers.entry(event).or_default().push(cache);
    }

    /// Subscribe `cache` to each of `events`
    pub fn subscribe_all(&mut self, events: &[Event], cache: Rc<dyn Invalidate>) {
        for event in events {
            self.subscribe(*event, cache.clone());
        }
    }

    /// Invalidate every cache subscribed to `event`
    pub fn fire(&self, event: Event) {
        if let Some(caches) = self.subscribers.get(&event) {
            for cache in caches {
                cache.invalidate();
            }
        }
    }

    pub fn count(&self, event: Event) -> usize {
        self.subscribers.get(&event).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&Event, usize> =
            self.subscribers.iter().map(|(e, v)| (e, v.len())).collect();
        f.debug_struct("Subscriptions")
            .field("subscribers", &counts)
            .finish()
    }
}
