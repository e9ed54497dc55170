//! Lifecycle event registration.
//!
//! The platform layer turns host events (install, startup, fired wake-ups)
//! into [`LifecycleEvent`]s and hands them to [`EventRegistry::dispatch`].
//! Components subscribe with [`EventRegistry::register`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Installed,
    Startup,
    Alarm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Installed,
    Startup,
    /// A named wake-up fired.
    Alarm(String),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Installed => EventKind::Installed,
            LifecycleEvent::Startup => EventKind::Startup,
            LifecycleEvent::Alarm(_) => EventKind::Alarm,
        }
    }
}

type Handler = Arc<dyn Fn(LifecycleEvent) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| handler(event).boxed());
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Run every handler registered for the event's kind, in registration
    /// order. Returns how many ran.
    pub async fn dispatch(&self, event: LifecycleEvent) -> usize {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            debug!(?event, "No handlers for lifecycle event");
            return 0;
        };
        for handler in handlers {
            handler(event.clone()).await;
        }
        handlers.len()
    }
}
