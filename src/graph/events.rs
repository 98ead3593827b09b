//! Scoped event subscriptions.
//!
//! Listeners are registered on an [`EventBus`] and stay attached only as long
//! as the returned [`Subscription`] guard is alive. Dropping the guard detaches
//! the listener, so tearing down the owner of the guards tears down every
//! listener it registered.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<E> = Box<dyn FnMut(&E)>;

struct Slots<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
    /// Set while listeners are moved out for dispatch
    emitting: bool,
    /// Ids detached during dispatch, applied once listeners are put back
    detached: Vec<u64>,
}

impl<E> Slots<E> {
    fn detach(&mut self, id: u64) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        if self.emitting {
            self.detached.push(id);
        }
    }
}

/// Single-threaded publish/subscribe channel.
pub struct EventBus<E> {
    slots: Rc<RefCell<Slots<E>>>,
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
                emitting: false,
                detached: Vec::new(),
            })),
        }
    }

    /// Attach a listener. It is called for every event emitted until the
    /// returned guard is dropped.
    #[must_use = "dropping the subscription detaches the listener immediately"]
    pub fn subscribe(&self, listener: impl FnMut(&E) + 'static) -> Subscription {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.listeners.push((id, Box::new(listener)));

        let weak: Weak<RefCell<Slots<E>>> = Rc::downgrade(&self.slots);
        Subscription {
            id,
            detach: Some(Box::new(move |id| {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().detach(id);
                }
            })),
        }
    }

    /// Deliver an event to every attached listener, in subscription order.
    ///
    /// Listeners may subscribe or drop subscriptions while being called.
    pub fn emit(&self, event: &E) {
        let mut dispatching = {
            let mut slots = self.slots.borrow_mut();
            slots.emitting = true;
            std::mem::take(&mut slots.listeners)
        };

        for (_, listener) in dispatching.iter_mut() {
            listener(event);
        }

        let mut slots = self.slots.borrow_mut();
        slots.emitting = false;
        let detached = std::mem::take(&mut slots.detached);
        dispatching.retain(|(id, _)| !detached.contains(id));
        // Listeners added during dispatch go after the existing ones
        let added = std::mem::take(&mut slots.listeners);
        dispatching.extend(added);
        slots.listeners = dispatching;
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.slots.borrow().listeners.len()
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for an attached listener; detaches on drop.
pub struct Subscription {
    id: u64,
    detach: Option<Box<dyn FnOnce(u64)>>,
}

impl Subscription {
    /// Detach now instead of at end of scope.
    pub fn cancel(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listener_receives_until_dropped() {
        let bus = EventBus::<u32>::new();
        let seen = Rc::new(Cell::new(0));

        let sink = Rc::clone(&seen);
        let subscription = bus.subscribe(move |value| sink.set(sink.get() + *value));
        bus.emit(&2);
        bus.emit(&3);
        assert_eq!(seen.get(), 5);

        drop(subscription);
        assert_eq!(bus.listener_count(), 0);
        bus.emit(&10);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn test_subscription_outliving_bus_is_harmless() {
        let bus = EventBus::<u32>::new();
        let subscription = bus.subscribe(|_| {});
        drop(bus);
        subscription.cancel();
    }

    #[test]
    fn test_detach_during_dispatch() {
        let bus = EventBus::<u32>::new();
        let holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(Cell::new(0));

        let holder_inner = Rc::clone(&holder);
        let calls_inner = Rc::clone(&calls);
        let subscription = bus.subscribe(move |_| {
            calls_inner.set(calls_inner.get() + 1);
            holder_inner.borrow_mut().take();
        });
        *holder.borrow_mut() = Some(subscription);

        bus.emit(&1);
        bus.emit(&1);
        assert_eq!(calls.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
