//! Single-threaded observable value with explicit subscribe/unsubscribe.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

pub struct Observable<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Observable<T> {
    pub fn new() -> Self {
        Observable {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// `Subscription` is dropped or cancelled.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id;
            reg.next_id += 1;
            reg.listeners.push((id, Rc::new(listener)));
            id
        };
        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(reg) = weak.upgrade() {
                    reg.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Notify every listener. Listeners may subscribe or unsubscribe while
    /// being notified; the set notified is the one registered at emit time.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }
}

pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dropping_subscription_unregisters() {
        let obs = Observable::<u32>::new();
        let seen = Rc::new(Cell::new(0));
        let s = {
            let seen = Rc::clone(&seen);
            obs.subscribe(move |v| seen.set(*v))
        };
        obs.emit(&4);
        assert_eq!(seen.get(), 4);

        drop(s);
        obs.emit(&9);
        assert_eq!(seen.get(), 4);
        assert_eq!(obs.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_during_emit() {
        let obs = Observable::<u32>::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(Cell::new(0));
        let sub = {
            let slot = Rc::clone(&slot);
            let calls = Rc::clone(&calls);
            obs.subscribe(move |_| {
                calls.set(calls.get() + 1);
                slot.borrow_mut().take();
            })
        };
        *slot.borrow_mut() = Some(sub);

        obs.emit(&1);
        obs.emit(&2);
        assert_eq!(calls.get(), 1);
    }
}
