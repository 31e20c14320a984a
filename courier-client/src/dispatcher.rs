//! Routes inbound messages to per-filter callbacks, falling back to the
//! catch-all message hook.

use std::collections::HashMap;

use courier_core::{message::Message, topic};
use tracing::debug;

use crate::event::{EventRegistry, MessageHook};

/// Filter-keyed callback table. A message runs every callback whose
/// filter matches its topic; only if none match does it fall through to
/// the registry's message hook.
#[derive(Default)]
pub struct Dispatcher {
    filters: HashMap<String, MessageHook>,
}

impl Dispatcher {
    /// Registers `callback` for `filter`. A second registration for the
    /// same filter replaces the first.
    pub fn add_filter(&mut self, filter: String, callback: MessageHook) {
        debug!(%filter, "filter callback added");
        self.filters.insert(filter, callback);
    }

    /// Returns whether a callback was registered for `filter`.
    pub fn remove_filter(&mut self, filter: &str) -> bool {
        let removed = self.filters.remove(filter).is_some();
        debug!(%filter, removed, "filter callback removed");
        removed
    }

    pub fn dispatch(&mut self, message: &Message, registry: &mut EventRegistry) {
        let mut matched = false;
        for (filter, callback) in self.filters.iter_mut() {
            if topic::matches(filter, &message.topic) {
                matched = true;
                callback(message);
            }
        }

        if !matched && !registry.message(message) {
            debug!(topic = %message.topic, "message matched no callback, dropped");
        }
    }
}

/// Callback state shared between the client handle and the connection
/// task, so hooks and filters can be changed while connected and
/// survive reconnects.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub registry: EventRegistry,
    pub dispatcher: Dispatcher,
}

impl Callbacks {
    pub fn dispatch_message(&mut self, message: &Message) {
        self.dispatcher.dispatch(message, &mut self.registry);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use courier_core::qos::QoS;

    use super::*;
    use crate::event::Hook;

    fn counting_hook(counter: &Arc<AtomicUsize>) -> MessageHook {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn matching_filter_takes_message_over_fallback() {
        let filtered = Arc::new(AtomicUsize::new(0));
        let fallback = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::default();
        let mut registry = EventRegistry::default();
        dispatcher.add_filter("sensors/+/temp".into(), counting_hook(&filtered));
        registry.install(Hook::Message(counting_hook(&fallback)));

        let message = Message::new("sensors/attic/temp", "21.5", QoS::AtMostOnce);
        dispatcher.dispatch(&message, &mut registry);

        assert_eq!(filtered.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unmatched_message_falls_back_to_hook() {
        let filtered = Arc::new(AtomicUsize::new(0));
        let fallback = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::default();
        let mut registry = EventRegistry::default();
        dispatcher.add_filter("sensors/#".into(), counting_hook(&filtered));
        registry.install(Hook::Message(counting_hook(&fallback)));

        let message = Message::new("alarms/door", "open", QoS::AtMostOnce);
        dispatcher.dispatch(&message, &mut registry);

        assert_eq!(filtered.load(Ordering::SeqCst), 0);
        assert_eq!(fallback.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overlapping_filters_all_fire() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::default();
        let mut registry = EventRegistry::default();
        dispatcher.add_filter("a/#".into(), counting_hook(&first));
        dispatcher.add_filter("a/+".into(), counting_hook(&second));

        let message = Message::new("a/b", "x", QoS::AtMostOnce);
        dispatcher.dispatch(&message, &mut registry);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_filter_stops_matching() {
        let filtered = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::default();
        let mut registry = EventRegistry::default();
        dispatcher.add_filter("a/b".into(), counting_hook(&filtered));

        assert!(dispatcher.remove_filter("a/b"));
        assert!(!dispatcher.remove_filter("a/b"));

        let message = Message::new("a/b", "x", QoS::AtMostOnce);
        dispatcher.dispatch(&message, &mut registry);
        assert_eq!(filtered.load(Ordering::SeqCst), 0);
    }
}
