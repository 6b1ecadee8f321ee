//! Trailing-edge debounce over a pluggable timer.

use std::cell::RefCell;
use std::rc::Rc;

/// Schedules one-shot callbacks. Dropping the returned handle cancels the
/// callback if it has not fired yet.
pub trait TimerDriver {
    type Handle;

    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Self::Handle;
}

/// Browser timers via `setTimeout`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlooTimers;

impl TimerDriver for GlooTimers {
    type Handle = gloo::timers::callback::Timeout;

    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Self::Handle {
        gloo::timers::callback::Timeout::new(delay_ms, callback)
    }
}

struct State<T, H> {
    pending: Option<H>,
    latest: Option<T>,
}

/// Coalesces bursts of calls into one call of the action, `quiet_ms` after
/// the last call of the burst, with that call's argument.
///
/// Clones share the same pending timer.
pub struct Debouncer<T, D: TimerDriver> {
    driver: Rc<D>,
    quiet_ms: u32,
    action: Rc<dyn Fn(T)>,
    state: Rc<RefCell<State<T, D::Handle>>>,
}

impl<T, D: TimerDriver> Clone for Debouncer<T, D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            quiet_ms: self.quiet_ms,
            action: self.action.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: 'static, D: TimerDriver + 'static> Debouncer<T, D> {
    pub fn new(driver: D, quiet_ms: u32, action: impl Fn(T) + 'static) -> Self {
        Self {
            driver: Rc::new(driver),
            quiet_ms: quiet_ms.max(1),
            action: Rc::new(action),
            state: Rc::new(RefCell::new(State {
                pending: None,
                latest: None,
            })),
        }
    }

    pub fn call(&self, value: T) {
        let state = Rc::downgrade(&self.state);
        let action = self.action.clone();
        let fire = Box::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let latest = {
                let mut state = state.borrow_mut();
                state.pending = None;
                state.latest.take()
            };
            if let Some(value) = latest {
                action(value);
            }
        });

        // Replacing the handle drops, and so cancels, the previous timer.
        let handle = self.driver.schedule(self.quiet_ms, fire);
        let previous = {
            let mut state = self.state.borrow_mut();
            state.latest = Some(value);
            state.pending.replace(handle)
        };
        drop(previous);
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        let previous = {
            let mut state = self.state.borrow_mut();
            state.latest = None;
            state.pending.take()
        };
        drop(previous);
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    pub fn quiet_ms(&self) -> u32 {
        self.quiet_ms
    }
}

/// Wraps `action` so bursts of calls collapse into one trailing call.
pub fn wrap<T: 'static>(action: impl Fn(T) + 'static, quiet_ms: u32) -> impl Fn(T) {
    let debouncer = Debouncer::new(GlooTimers, quiet_ms, action);
    move |value| debouncer.call(value)
}

/// Virtual clock for driving debouncers in tests.
#[cfg(test)]
pub(crate) mod manual {
    use super::TimerDriver;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Entry {
        id: u64,
        due: u64,
        callback: Option<Box<dyn FnOnce()>>,
    }

    #[derive(Default)]
    struct Inner {
        now: u64,
        next_id: u64,
        entries: Vec<Entry>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct ManualClock {
        inner: Rc<RefCell<Inner>>,
    }

    pub(crate) struct ManualHandle {
        id: u64,
        inner: Rc<RefCell<Inner>>,
    }

    impl Drop for ManualHandle {
        fn drop(&mut self) {
            if let Ok(mut inner) = self.inner.try_borrow_mut() {
                inner.entries.retain(|entry| entry.id != self.id);
            }
        }
    }

    impl TimerDriver for ManualClock {
        type Handle = ManualHandle;

        fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> ManualHandle {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let due = inner.now + u64::from(delay_ms);
            inner.entries.push(Entry {
                id,
                due,
                callback: Some(callback),
            });
            ManualHandle {
                id,
                inner: self.inner.clone(),
            }
        }
    }

    impl ManualClock {
        pub(crate) fn now(&self) -> u64 {
            self.inner.borrow().now
        }

        pub(crate) fn pending(&self) -> usize {
            self.inner.borrow().entries.len()
        }

        /// Moves time to `target`, firing due callbacks in order.
        pub(crate) fn advance_to(&self, target: u64) {
            loop {
                let next = {
                    let mut inner = self.inner.borrow_mut();
                    let due = inner
                        .entries
                        .iter()
                        .filter(|entry| entry.due <= target)
                        .min_by_key(|entry| (entry.due, entry.id))
                        .map(|entry| (entry.id, entry.due));
                    match due {
                        Some((id, at)) => {
                            inner.now = at;
                            let index = inner.entries.iter().position(|e| e.id == id);
                            index.and_then(|i| inner.entries.remove(i).callback)
                        }
                        None => {
                            inner.now = target;
                            None
                        }
                    }
                };
                match next {
                    Some(callback) => callback(),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::manual::ManualClock;
    use super::*;

    fn recorder(clock: &ManualClock) -> (Rc<RefCell<Vec<(u64, i32)>>>, impl Fn(i32) + 'static) {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        let clock = clock.clone();
        (fired, move |value| sink.borrow_mut().push((clock.now(), value)))
    }

    #[test]
    fn burst_fires_once_after_quiet_period_with_last_value() {
        let clock = ManualClock::default();
        let (fired, action) = recorder(&clock);
        let debounced = Debouncer::new(clock.clone(), 200, action);

        debounced.call(0);
        clock.advance_to(50);
        debounced.call(1);
        clock.advance_to(100);
        debounced.call(2);

        clock.advance_to(299);
        assert!(fired.borrow().is_empty());
        assert_eq!(clock.pending(), 1);

        clock.advance_to(1_000);
        assert_eq!(*fired.borrow(), vec![(300, 2)]);
        assert!(!debounced.is_pending());
    }

    #[test]
    fn separate_bursts_fire_separately() {
        let clock = ManualClock::default();
        let (fired, action) = recorder(&clock);
        let debounced = Debouncer::new(clock.clone(), 100, action);

        debounced.call(1);
        clock.advance_to(150);
        debounced.call(2);
        clock.advance_to(400);

        assert_eq!(*fired.borrow(), vec![(100, 1), (250, 2)]);
    }

    #[test]
    fn cancel_drops_pending_call() {
        let clock = ManualClock::default();
        let (fired, action) = recorder(&clock);
        let debounced = Debouncer::new(clock.clone(), 100, action);

        debounced.call(7);
        debounced.cancel();
        clock.advance_to(500);

        assert!(fired.borrow().is_empty());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn action_reads_shared_state_when_it_fires() {
        let clock = ManualClock::default();
        let source = Rc::new(RefCell::new("typed".to_string()));
        let rendered = Rc::new(RefCell::new(Vec::new()));
        let (read, sink) = (source.clone(), rendered.clone());
        let refresh = Debouncer::new(clock.clone(), 100, move |()| {
            sink.borrow_mut().push(read.borrow().clone())
        });

        refresh.call(());
        *source.borrow_mut() = "beautified".to_string();
        clock.advance_to(100);
        assert_eq!(*rendered.borrow(), vec!["beautified".to_string()]);

        // A forced refresh cancels the queued one instead of racing it.
        refresh.call(());
        *source.borrow_mut() = String::new();
        refresh.cancel();
        rendered.borrow_mut().push(source.borrow().clone());
        clock.advance_to(500);
        assert_eq!(*rendered.borrow(), vec!["beautified".to_string(), String::new()]);
    }

    #[test]
    fn clones_share_one_timer() {
        let clock = ManualClock::default();
        let (fired, action) = recorder(&clock);
        let first = Debouncer::new(clock.clone(), 100, action);
        let second = first.clone();

        first.call(1);
        clock.advance_to(60);
        second.call(2);
        clock.advance_to(500);

        assert_eq!(*fired.borrow(), vec![(160, 2)]);
    }

    #[test]
    fn zero_quiet_period_is_raised_to_one() {
        let clock = ManualClock::default();
        let (_, action) = recorder(&clock);
        let debounced = Debouncer::new(clock, 0, action);
        assert_eq!(debounced.quiet_ms(), 1);
    }
}
