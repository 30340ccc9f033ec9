//! A small state holder for data loaded from the backend.
//!
//! [`Resource`] moves through `Idle → Loading → Ready | Failed` on every
//! explicit load and notifies its subscribers on each transition.  The last
//! successfully loaded value stays available through [`Resource::latest`] so
//! callers can keep showing it while a reload is in flight or after one
//! fails.

use std::fmt;

/// Current state of a [`Resource`].
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceState<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

/// Handle returned by [`Resource::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Box<dyn Fn(&ResourceState<T>)>;

/// Holder of asynchronously loaded data and its loading state.
pub struct Resource<T> {
    state: ResourceState<T>,
    latest: Option<T>,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: u64,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<T> Resource<T> {
    /// Creates an idle resource.
    pub fn new() -> Self {
        Self {
            state: ResourceState::Idle,
            latest: None,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ResourceState<T> {
        &self.state
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, ResourceState::Loading)
    }

    /// Error message of the last failed load, if the resource is in the failed state.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ResourceState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Last successfully loaded value, even if a later load failed.
    pub fn latest(&self) -> Option<&T> {
        match &self.state {
            ResourceState::Ready(value) => Some(value),
            _ => self.latest.as_ref(),
        }
    }

    /// Registers `subscriber` to be called after every state transition.
    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&ResourceState<T>) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Removes a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Marks the resource as loading.
    pub fn start(&mut self) {
        self.transition(ResourceState::Loading);
    }

    /// Stores a loaded value.
    pub fn succeed(&mut self, value: T) {
        self.transition(ResourceState::Ready(value));
    }

    /// Records a failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.transition(ResourceState::Failed(message.into()));
    }

    /// Runs `load` between the loading and ready/failed transitions.
    ///
    /// Returns whether the load succeeded.
    pub fn load_with<E, F>(&mut self, load: F) -> bool
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.start();
        match load() {
            Ok(value) => {
                self.succeed(value);
                true
            }
            Err(err) => {
                self.fail(err.to_string());
                false
            }
        }
    }

    fn transition(&mut self, next: ResourceState<T>) {
        let previous = std::mem::replace(&mut self.state, next);
        if let ResourceState::Ready(value) = previous {
            self.latest = Some(value);
        }
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.state);
        }
    }
}
