//! The wallet re-locking worker.
//!
//! `walletpassphrase <pass> <timeout>` schedules a relock. One worker
//! thread guards the wake time: scheduling while a worker is alive only
//! extends its wake time, never spawns a second thread. The worker holds
//! nothing but the narrow unlock-state lock while waiting and touches
//! the key store only at the moment of relocking.

use crate::keystore::KeyStore;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Unlock deadline state, guarded by its own lock.
struct RelockState {
    /// Relock deadline in unix milliseconds; zero when no relock is
    /// pending.
    unlock_until_ms: i64,
    /// Whether a worker thread is alive.
    worker_alive: bool,
}

/// The relocker.
pub struct Relocker {
    state: Arc<(Mutex<RelockState>, Condvar)>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Relocker {
    /// New relocker with no pending deadline.
    pub fn new() -> Self {
        Self {
            state: Arc::new((
                Mutex::new(RelockState {
                    unlock_until_ms: 0,
                    worker_alive: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Schedule a relock `timeout_secs` from now.
    pub fn schedule(&self, keystore: Arc<KeyStore>, timeout_secs: i64) {
        self.schedule_ms(keystore, timeout_secs.saturating_mul(1000));
    }

    /// Schedule a relock `timeout_ms` from now, extending an already
    /// running worker instead of spawning a second one.
    pub fn schedule_ms(&self, keystore: Arc<KeyStore>, timeout_ms: i64) {
        let wake_at = now_ms() + timeout_ms.max(0);
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();

        if state.worker_alive {
            if wake_at > state.unlock_until_ms {
                debug!(wake_at, "Extending relock deadline");
                state.unlock_until_ms = wake_at;
                condvar.notify_all();
            }
            return;
        }

        state.unlock_until_ms = wake_at;
        state.worker_alive = true;
        drop(state);

        let shared = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("wallet-relocker".into())
            .spawn(move || {
                let (lock, condvar) = &*shared;
                let mut state = lock.lock();
                loop {
                    if state.unlock_until_ms == 0 {
                        break;
                    }
                    let to_sleep = state.unlock_until_ms - now_ms();
                    if to_sleep <= 0 {
                        break;
                    }
                    condvar.wait_for(&mut state, Duration::from_millis(to_sleep as u64));
                }
                let relock = state.unlock_until_ms != 0;
                state.unlock_until_ms = 0;
                state.worker_alive = false;
                drop(state);

                if relock {
                    info!("Relock deadline reached, locking wallet");
                    keystore.lock();
                }
            })
            .expect("failed to spawn wallet-relocker thread");
    }

    /// Cancel any pending relock (the wallet is being locked
    /// explicitly).
    pub fn cancel(&self) {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        state.unlock_until_ms = 0;
        condvar.notify_all();
    }

    /// Current relock deadline in unix seconds; zero when none.
    pub fn unlocked_until_secs(&self) -> i64 {
        self.state.0.lock().unlock_until_ms / 1000
    }

    /// Whether a worker thread is alive.
    pub fn worker_alive(&self) -> bool {
        self.state.0.lock().worker_alive
    }
}

impl Default for Relocker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked_store() -> Arc<KeyStore> {
        let store = Arc::new(KeyStore::new());
        store.generate_key().unwrap();
        store.encrypt("p").unwrap();
        store.unlock("p", false).unwrap();
        store
    }

    #[test]
    fn test_relocks_after_timeout() {
        let store = unlocked_store();
        let relocker = Relocker::new();
        relocker.schedule_ms(Arc::clone(&store), 150);

        assert!(!store.is_locked());
        std::thread::sleep(Duration::from_millis(400));
        assert!(store.is_locked());
        assert!(!relocker.worker_alive());
    }

    #[test]
    fn test_second_schedule_extends_not_spawns() {
        // schedule(t) then schedule(3t) shortly after: the wallet stays
        // unlocked past the first deadline and exactly one worker runs.
        let store = unlocked_store();
        let relocker = Relocker::new();

        relocker.schedule_ms(Arc::clone(&store), 300);
        std::thread::sleep(Duration::from_millis(100));
        relocker.schedule_ms(Arc::clone(&store), 900);

        assert!(relocker.worker_alive());

        // Past the first deadline the wallet must still be unlocked.
        std::thread::sleep(Duration::from_millis(400));
        assert!(!store.is_locked());
        assert!(relocker.worker_alive());

        // Past the extended deadline it relocks.
        std::thread::sleep(Duration::from_millis(700));
        assert!(store.is_locked());
        assert!(!relocker.worker_alive());
    }

    #[test]
    fn test_shorter_schedule_does_not_shrink_deadline() {
        let store = unlocked_store();
        let relocker = Relocker::new();

        relocker.schedule_ms(Arc::clone(&store), 600);
        relocker.schedule_ms(Arc::clone(&store), 50);

        std::thread::sleep(Duration::from_millis(250));
        assert!(!store.is_locked());

        std::thread::sleep(Duration::from_millis(600));
        assert!(store.is_locked());
    }

    #[test]
    fn test_cancel_stops_worker_without_relock() {
        let store = unlocked_store();
        let relocker = Relocker::new();
        relocker.schedule_ms(Arc::clone(&store), 5_000);

        relocker.cancel();
        std::thread::sleep(Duration::from_millis(200));

        assert!(!relocker.worker_alive());
        // Cancel leaves locking to the caller.
        assert!(!store.is_locked());
        assert_eq!(relocker.unlocked_until_secs(), 0);
    }
}
