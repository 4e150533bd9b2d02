//! Ordered hook lists with named aggregation policies.

use std::fmt;

/// Ordered list of hooks taking `&A` and returning `bool`.
///
/// Hooks run in registration order. What their results mean depends on
/// the call site, so the list offers one method per policy instead of a
/// single "run" operation.
///
/// # Example
///
/// ```rust
/// use wakekit_core::callbacks::CallbackList;
///
/// let mut ready: CallbackList<u32> = CallbackList::new();
/// ready.add(|elapsed| *elapsed > 10);
/// ready.add(|_| true);
///
/// assert!(!ready.until_false(&5, true));
/// assert!(ready.until_false(&20, true));
/// ```
pub struct CallbackList<A: ?Sized> {
    callbacks: Vec<Box<dyn FnMut(&A) -> bool + Send>>,
}

impl<A: ?Sized> Default for CallbackList<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for CallbackList<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

impl<A: ?Sized> CallbackList<A> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Appends a hook.
    pub fn add<F>(&mut self, callback: F)
    where
        F: FnMut(&A) -> bool + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Returns the number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Removes every hook.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Runs every hook, ignoring results.
    pub fn run_all(&mut self, arg: &A) {
        for callback in &mut self.callbacks {
            callback(arg);
        }
    }

    /// Runs hooks until one returns `true`.
    ///
    /// Returns the last result, or `default` if the list is empty.
    pub fn until_true(&mut self, arg: &A, default: bool) -> bool {
        let mut result = default;
        for callback in &mut self.callbacks {
            result = callback(arg);
            if result {
                break;
            }
        }
        result
    }

    /// Runs hooks until one returns `false`.
    ///
    /// Returns the last result, or `default` if the list is empty.
    pub fn until_false(&mut self, arg: &A, default: bool) -> bool {
        let mut result = default;
        for callback in &mut self.callbacks {
            result = callback(arg);
            if !result {
                break;
            }
        }
        result
    }

    /// Runs every hook and reports whether any returned `true`.
    pub fn any_true(&mut self, arg: &A) -> bool {
        let mut any = false;
        for callback in &mut self.callbacks {
            any |= callback(arg);
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(results: &[bool]) -> (CallbackList<()>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut list = CallbackList::new();
        for &result in results {
            let calls = Arc::clone(&calls);
            list.add(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                result
            });
        }
        (list, calls)
    }

    #[test]
    fn empty_list_returns_default() {
        let mut list: CallbackList<()> = CallbackList::new();
        assert!(list.until_true(&(), true));
        assert!(!list.until_false(&(), false));
        assert!(!list.any_true(&()));
    }

    #[test]
    fn run_all_calls_everything() {
        let (mut list, calls) = counting(&[true, false, true]);
        list.run_all(&());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn until_true_stops_early() {
        let (mut list, calls) = counting(&[false, true, false]);
        assert!(list.until_true(&(), false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn until_false_stops_early() {
        let (mut list, calls) = counting(&[true, false, true]);
        assert!(!list.until_false(&(), true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn until_false_all_true() {
        let (mut list, calls) = counting(&[true, true]);
        assert!(list.until_false(&(), false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn any_true_runs_all() {
        let (mut list, calls) = counting(&[false, true, false]);
        assert!(list.any_true(&()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn hooks_see_argument() {
        let mut list: CallbackList<str> = CallbackList::new();
        list.add(|s| s.starts_with("wake"));
        assert!(list.until_true("wake-up", false));
        assert!(!list.until_true("sleep", false));
        list.clear();
        assert!(list.is_empty());
    }
}
