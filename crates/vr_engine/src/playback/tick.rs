//! Per-frame tick dispatch
//!
//! The composition root owns one [`TickDispatcher`] and calls
//! [`TickDispatcher::dispatch`] once per display refresh, after the audio
//! clock has been sampled. Subscribers run in subscription order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::playback::AudioClock;
use crate::render::SceneResources;

/// Everything a subscriber may read or write during one tick
pub struct TickContext<'a> {
    /// Audio clock sampled for this tick
    pub audio: AudioClock,
    /// Shared instance pools
    pub resources: &'a mut SceneResources,
    /// Whether a scene transition is running
    pub in_transition: bool,
}

/// Receives one call per tick
pub trait TickSubscriber {
    /// Handle one tick
    fn tick(&mut self, ctx: &mut TickContext<'_>);
}

/// Handle returned by [`TickDispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(u64);

/// Ordered subscriber registry
#[derive(Default)]
pub struct TickDispatcher {
    subscribers: BTreeMap<u64, Rc<RefCell<dyn TickSubscriber>>>,
    next_id: u64,
}

impl std::fmt::Debug for TickDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickDispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl TickDispatcher {
    /// Empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber after every existing one
    pub fn subscribe<S: TickSubscriber + 'static>(&mut self, subscriber: Rc<RefCell<S>>) -> TickHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id, subscriber);
        TickHandle(id)
    }

    /// Remove a subscriber; false if the handle was already removed
    pub fn unsubscribe(&mut self, handle: TickHandle) -> bool {
        self.subscribers.remove(&handle.0).is_some()
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Call every subscriber once, in subscription order
    ///
    /// A subscriber that is already borrowed elsewhere is skipped for this
    /// tick. Returns the number of subscribers that ran.
    pub fn dispatch(
        &self,
        audio: AudioClock,
        resources: &mut SceneResources,
        in_transition: bool,
    ) -> usize {
        let mut ctx = TickContext {
            audio,
            resources,
            in_transition,
        };
        let mut ran = 0;
        for (id, subscriber) in &self.subscribers {
            match subscriber.try_borrow_mut() {
                Ok(mut subscriber) => {
                    subscriber.tick(&mut ctx);
                    ran += 1;
                }
                Err(_) => log::warn!("Tick subscriber {} busy, skipped", id),
            }
        }
        ran
    }
}
