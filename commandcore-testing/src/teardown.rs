//! Running code while a thread's locals are being destroyed.
//!
//! Thread-local destructors run in reverse order of first use, so a slot
//! touched before the hook is registered is still alive when the hook runs,
//! and a slot touched after it is already gone. This makes the ambient
//! store's "slot unavailable" paths reachable from a test.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

struct AtThreadExit(Option<Box<dyn FnOnce()>>);

impl Drop for AtThreadExit {
    fn drop(&mut self) {
        if let Some(hook) = self.0.take() {
            hook();
        }
    }
}

thread_local! {
    static AT_EXIT: RefCell<Option<AtThreadExit>> = const { RefCell::new(None) };
}

/// Runs `at_exit` on a fresh thread while its locals are destroyed.
///
/// Thread-local slots touched by `outlive` are still usable inside `at_exit`;
/// slots touched by `destroyed` have already been torn down.
///
/// # Panics
///
/// Panics if the thread panics or the hook never runs.
pub fn run_during_thread_teardown<T, O, D, F>(outlive: O, destroyed: D, at_exit: F) -> T
where
    T: Send + 'static,
    O: FnOnce() + Send + 'static,
    D: FnOnce() + Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);

    thread::spawn(move || {
        outlive();
        AT_EXIT.with(|slot| {
            *slot.borrow_mut() = Some(AtThreadExit(Some(Box::new(move || {
                *sink.lock() = Some(at_exit());
            }))));
        });
        destroyed();
    })
    .join()
    .expect("teardown thread panicked");

    let value = outcome.lock().take();
    value.expect("thread-exit hook did not run")
}
