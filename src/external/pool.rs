use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::debug;

use super::{Conversion, ConvertStatus, Direction, TranscodeHandle, Transcoder};
use crate::error::BridgeError;

type PoolKey = (ThreadId, Direction, String);
type IdleMap = Mutex<HashMap<PoolKey, Box<dyn TranscodeHandle>>>;

thread_local! {
    static THREAD_HANDLES: ThreadHandles = ThreadHandles {
        thread: thread::current().id(),
        pools: RefCell::new(Vec::new()),
    };
}

/// The pools the current thread has checked handles out of. Dropped at
/// thread exit, closing whatever this thread left idle in each of them.
struct ThreadHandles {
    thread: ThreadId,
    pools: RefCell<Vec<Weak<IdleMap>>>,
}

impl ThreadHandles {
    fn track(&self, idle: &Arc<IdleMap>) {
        let mut pools = self.pools.borrow_mut();
        if pools.iter().any(|p| p.as_ptr() == Arc::as_ptr(idle)) {
            return;
        }
        pools.retain(|p| p.strong_count() > 0);
        pools.push(Arc::downgrade(idle));
    }
}

impl Drop for ThreadHandles {
    fn drop(&mut self) {
        for idle in self.pools.get_mut().drain(..).filter_map(|p| p.upgrade()) {
            let closed = release(&idle, self.thread);
            if closed > 0 {
                debug!(closed, "closed transcoder handles of exiting thread");
            }
        }
    }
}

fn release(idle: &IdleMap, thread: ThreadId) -> usize {
    let mut idle = idle.lock();
    let before = idle.len();
    idle.retain(|(owner, _, _), _| *owner != thread);
    before - idle.len()
}

/// Idle transcoder handles, at most one per thread, direction and encoding.
///
/// A handle checked out by one thread is never handed to another. Checked
/// out handles come back through [`PooledHandle`]'s `Drop`, reset to their
/// initial shift state. A thread's idle handles are closed when it exits.
#[derive(Default)]
pub struct HandlePool {
    idle: Arc<IdleMap>,
    opened: AtomicUsize,
}

impl HandlePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes this thread's idle handle for `(direction, encoding)`, opening
    /// one through `transcoder` if there is none.
    pub fn checkout(
        &self,
        transcoder: &dyn Transcoder,
        direction: Direction,
        encoding: &str,
    ) -> Result<PooledHandle<'_>, BridgeError> {
        let key = (thread::current().id(), direction, encoding.to_owned());
        let cached = self.idle.lock().remove(&key);

        let handle = match cached {
            Some(handle) => handle,
            None => {
                let handle = match direction {
                    Direction::ToUnicode => transcoder.open(super::UNICODE_ENCODING, encoding)?,
                    Direction::FromUnicode => transcoder.open(encoding, super::UNICODE_ENCODING)?,
                };
                self.opened.fetch_add(1, Ordering::Relaxed);
                debug!(?direction, encoding, "opened transcoder handle");
                handle
            }
        };

        // Fails only while the thread is being torn down.
        let _ = THREAD_HANDLES.try_with(|owned| owned.track(&self.idle));

        Ok(PooledHandle {
            pool: self,
            key,
            handle,
        })
    }

    /// Closes every idle handle owned by the calling thread without waiting
    /// for it to exit. Returns the number closed.
    pub fn release_current_thread(&self) -> usize {
        release(&self.idle, thread::current().id())
    }

    /// Number of handles waiting in the pool.
    pub fn idle_handles(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of handles opened over the pool's lifetime.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool")
            .field("idle", &self.idle_handles())
            .field("opened", &self.opened())
            .finish()
    }
}

/// Stands in for a handle that has gone back to the pool.
struct Returned;

impl TranscodeHandle for Returned {
    fn convert(&mut self, _input: &[u8], _output: &mut [u8]) -> Conversion {
        Conversion::new(0, 0, ConvertStatus::Complete)
    }

    fn reset(&mut self) {}
}

/// A handle borrowed from a [`HandlePool`]; returned to it on drop.
pub struct PooledHandle<'a> {
    pool: &'a HandlePool,
    key: PoolKey,
    handle: Box<dyn TranscodeHandle>,
}

impl Deref for PooledHandle<'_> {
    type Target = dyn TranscodeHandle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref()
    }
}

impl DerefMut for PooledHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle.as_mut()
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        let mut handle = std::mem::replace(&mut self.handle, Box::new(Returned));
        // Past thread teardown nothing would close it again.
        if THREAD_HANDLES.try_with(|_| ()).is_err() {
            return;
        }
        handle.reset();
        // A nested checkout may already have returned a handle for this key.
        self.pool
            .idle
            .lock()
            .entry(self.key.clone())
            .or_insert(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::testing::ErrnoTranscoder;

    #[test]
    fn test_reuse_on_same_thread() {
        let pool = HandlePool::new();
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
        assert_eq!(pool.opened(), 1);
        assert_eq!(pool.idle_handles(), 1);
    }

    #[test]
    fn test_directions_are_separate() {
        let pool = HandlePool::new();
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
        drop(pool.checkout(&ErrnoTranscoder, Direction::FromUnicode, "x-pair").unwrap());
        assert_eq!(pool.opened(), 2);
    }

    #[test]
    fn test_nested_checkout_opens_second_handle() {
        let pool = HandlePool::new();
        let outer = pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap();
        let inner = pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap();
        assert_eq!(pool.opened(), 2);
        drop(inner);
        drop(outer);
        assert_eq!(pool.idle_handles(), 1);
    }

    #[test]
    fn test_threads_do_not_share() {
        let pool = Arc::new(HandlePool::new());
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());

        let worker = {
            let pool = pool.clone();
            thread::spawn(move || {
                drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
                pool.release_current_thread()
            })
        };
        assert_eq!(worker.join().unwrap(), 1);
        assert_eq!(pool.opened(), 2);
        assert_eq!(pool.idle_handles(), 1);
    }

    #[test]
    fn test_exited_threads_leave_nothing_idle() {
        let pool = Arc::new(HandlePool::new());
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());

        for _ in 0..8 {
            let pool = pool.clone();
            thread::spawn(move || {
                drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
                drop(pool.checkout(&ErrnoTranscoder, Direction::FromUnicode, "x-pair").unwrap());
                assert_eq!(pool.idle_handles(), 3);
            })
            .join()
            .unwrap();
        }
        assert_eq!(pool.opened(), 17);
        assert_eq!(pool.idle_handles(), 1);
    }

    #[test]
    fn test_dropped_pool_not_kept_alive() {
        let pool = HandlePool::new();
        drop(pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-pair").unwrap());
        let weak = Arc::downgrade(&pool.idle);
        drop(pool);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_open_error_propagates() {
        let pool = HandlePool::new();
        let err = pool.checkout(&ErrnoTranscoder, Direction::ToUnicode, "x-none").err();
        assert!(matches!(err, Some(BridgeError::UnsupportedConversion { .. })));
        assert_eq!(pool.opened(), 0);
    }
}
