//! In-process event dispatcher
//!
//! Maps event names to ordered handler lists. The dispatcher is an ordinary
//! value: the process wiring builds one and passes it (usually behind an
//! `Arc`) to whoever registers or dispatches.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::domain::result::{DispatchError, Error, HandlerFailure, Result};
use crate::domain::DomainEvent;

use super::EventHandler;

/// Registry of event handlers keyed by event name
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

/// Handler identity is the allocation, not the vtable
fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `event_name`
    ///
    /// Registering the same handler instance twice for one event fails with
    /// `Error::DuplicateHandler`.
    pub fn register(&self, event_name: &str, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let list = handlers.entry(event_name.to_string()).or_default();
        if list.iter().any(|h| same_handler(h, &handler)) {
            return Err(Error::DuplicateHandler(event_name.to_string()));
        }
        debug!(event = event_name, handler = handler.name(), "registered event handler");
        list.push(handler);
        Ok(())
    }

    /// Remove `handler` from `event_name`. Returns false if it was not registered.
    pub fn unregister(&self, event_name: &str, handler: &Arc<dyn EventHandler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(event_name) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !same_handler(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event_name);
        }
        removed
    }

    /// Whether `handler` is registered for `event_name`
    pub fn has(&self, event_name: &str, handler: &Arc<dyn EventHandler>) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(event_name)
            .is_some_and(|list| list.iter().any(|h| same_handler(h, handler)))
    }

    /// Number of handlers registered for `event_name`
    pub fn handler_count(&self, event_name: &str) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(event_name).map_or(0, Vec::len)
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Run every handler registered for the event's name, in registration order
    ///
    /// Handlers run on the calling thread. A handler that errors or panics
    /// does not stop the ones after it; all failures are collected into
    /// `Error::Dispatch`. On success returns how many handlers ran.
    pub fn dispatch(&self, event: &DomainEvent) -> Result<usize> {
        // Snapshot so handlers can touch the registry without deadlocking
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let registry = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            registry.get(&event.name).cloned().unwrap_or_default()
        };

        let mut failures = Vec::new();
        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event = %event.name, handler = handler.name(), error = %err, "event handler failed");
                    failures.push(HandlerFailure {
                        handler: handler.name().to_string(),
                        message: err.to_string(),
                        panicked: false,
                    });
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(event = %event.name, handler = handler.name(), panic = %message, "event handler panicked");
                    failures.push(HandlerFailure {
                        handler: handler.name().to_string(),
                        message,
                        panicked: true,
                    });
                }
            }
        }

        debug!(event = %event.name, handlers = handlers.len(), failed = failures.len(), "dispatched event");

        if failures.is_empty() {
            Ok(handlers.len())
        } else {
            Err(DispatchError {
                event: event.name.clone(),
                failures,
            }
            .into())
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::events::FnHandler;

    fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn EventHandler> {
        let log = Arc::clone(log);
        let label = name.to_string();
        Arc::new(FnHandler::new(name, move |event: &DomainEvent| {
            log.lock().unwrap().push(format!("{}:{}", label, event.name));
            Ok(())
        }))
    }

    #[test]
    fn test_dispatch_runs_handlers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register("evt", recording("h1", &log)).unwrap();
        dispatcher.register("evt", recording("h2", &log)).unwrap();
        dispatcher.register("other", recording("h3", &log)).unwrap();

        let ran = dispatcher.dispatch(&DomainEvent::new("evt", json!({}))).unwrap();

        assert_eq!(ran, 2);
        assert_eq!(*log.lock().unwrap(), vec!["h1:evt", "h2:evt"]);
    }

    #[test]
    fn test_dispatch_without_handlers_is_a_no_op() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.dispatch(&DomainEvent::new("evt", json!(null))).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recording("h1", &log);

        dispatcher.register("evt", Arc::clone(&handler)).unwrap();
        let err = dispatcher.register("evt", Arc::clone(&handler)).unwrap_err();
        assert!(matches!(err, Error::DuplicateHandler(name) if name == "evt"));

        // Same instance under another event name is fine, and so is a distinct instance
        dispatcher.register("other", Arc::clone(&handler)).unwrap();
        dispatcher.register("evt", recording("h1", &log)).unwrap();
        assert_eq!(dispatcher.handler_count("evt"), 2);
    }

    #[test]
    fn test_unregister_and_clear() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let h1 = recording("h1", &log);
        let h2 = recording("h2", &log);
        dispatcher.register("evt", Arc::clone(&h1)).unwrap();
        dispatcher.register("evt", Arc::clone(&h2)).unwrap();

        assert!(dispatcher.unregister("evt", &h1));
        assert!(!dispatcher.unregister("evt", &h1));
        assert!(!dispatcher.has("evt", &h1));
        assert!(dispatcher.has("evt", &h2));

        dispatcher.dispatch(&DomainEvent::new("evt", json!({}))).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["h2:evt"]);

        dispatcher.clear();
        assert_eq!(dispatcher.handler_count("evt"), 0);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_the_loop() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher
            .register("evt", Arc::new(FnHandler::new("erroring", |_: &DomainEvent| {
                Err(Error::persistence("broker unavailable"))
            })))
            .unwrap();
        dispatcher
            .register("evt", Arc::new(FnHandler::new("panicking", |_: &DomainEvent| -> Result<()> {
                panic!("handler blew up")
            })))
            .unwrap();
        dispatcher.register("evt", recording("last", &log)).unwrap();

        let err = dispatcher.dispatch(&DomainEvent::new("evt", json!({}))).unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["last:evt"]);
        let Error::Dispatch(dispatch) = err else {
            panic!("expected dispatch error");
        };
        assert_eq!(dispatch.event, "evt");
        assert_eq!(dispatch.failures.len(), 2);
        assert_eq!(dispatch.failures[0].handler, "erroring");
        assert!(!dispatch.failures[0].panicked);
        assert_eq!(dispatch.failures[1].handler, "panicking");
        assert!(dispatch.failures[1].panicked);
        assert_eq!(dispatch.failures[1].message, "handler blew up");
    }

    #[test]
    fn test_handler_may_unregister_itself_during_dispatch() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let slot: Arc<Mutex<Option<Arc<dyn EventHandler>>>> = Arc::new(Mutex::new(None));

        let handler: Arc<dyn EventHandler> = {
            let dispatcher = Arc::clone(&dispatcher);
            let slot = Arc::clone(&slot);
            Arc::new(FnHandler::new("once", move |event: &DomainEvent| {
                if let Some(me) = slot.lock().unwrap().take() {
                    dispatcher.unregister(&event.name, &me);
                }
                Ok(())
            }))
        };
        *slot.lock().unwrap() = Some(Arc::clone(&handler));
        dispatcher.register("evt", handler).unwrap();

        assert_eq!(dispatcher.dispatch(&DomainEvent::new("evt", json!({}))).unwrap(), 1);
        assert_eq!(dispatcher.dispatch(&DomainEvent::new("evt", json!({}))).unwrap(), 0);
    }
}
