use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

/// How long callers wait for the commit gate and how they back off while waiting.
#[derive(Debug, Clone)]
pub struct ContentionPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub acquisition_timeout: Duration,
}

impl Default for ContentionPolicy {
    fn default() -> Self {
        Self::with_timeout(Duration::from_millis(2_000))
    }
}

impl ContentionPolicy {
    pub fn with_timeout(acquisition_timeout: Duration) -> Self {
        Self {
            initial_backoff: Duration::from_micros(200),
            max_backoff: Duration::from_millis(20),
            acquisition_timeout,
        }
    }

    /// Delay before retry `attempt` (0-indexed), doubling up to `max_backoff`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// The gate was still held when the acquisition timeout ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("commit gate busy after waiting {waited_ms} ms")]
pub struct GateTimeout {
    pub waited_ms: u64,
}

/// Single mutual-exclusion boundary around every read-validate-write sequence.
///
/// With a lock file attached, holding the gate also means holding an exclusive advisory
/// lock on that file, which excludes other processes using the same storage.
#[derive(Debug, Default)]
pub struct CommitGate {
    lock: Mutex<()>,
    file: Option<Arc<File>>,
    policy: ContentionPolicy,
}

/// Held gate. Releases the file lock, then the in-process lock, on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    _local: MutexGuard<'a, ()>,
    file: Option<&'a File>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.file {
            if let Err(err) = FileExt::unlock(file) {
                warn!(error = %err, "failed to release commit lock file");
            }
        }
    }
}

impl CommitGate {
    pub fn new(policy: ContentionPolicy) -> Self {
        Self {
            lock: Mutex::new(()),
            file: None,
            policy,
        }
    }

    pub fn with_lock_file(policy: ContentionPolicy, file: Arc<File>) -> Self {
        Self {
            file: Some(file),
            ..Self::new(policy)
        }
    }

    pub fn policy(&self) -> &ContentionPolicy {
        &self.policy
    }

    /// Acquire the gate, retrying with backoff until the policy timeout elapses.
    ///
    /// Blocks the calling thread; async callers run this on a blocking thread.
    pub fn acquire(&self) -> Result<GateGuard<'_>, GateTimeout> {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let local = match self.lock.try_lock() {
                Ok(guard) => Some(guard),
                // Guards `()`: a poisoned gate holds no state to repair.
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            };
            if let Some(local) = local {
                if self.try_lock_file() {
                    return Ok(GateGuard {
                        _local: local,
                        file: self.file.as_deref(),
                    });
                }
            }

            let waited = started.elapsed();
            if waited >= self.policy.acquisition_timeout {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                warn!(waited_ms, "commit gate acquisition timed out");
                return Err(GateTimeout { waited_ms });
            }

            let remaining = self.policy.acquisition_timeout - waited;
            thread::sleep(self.policy.backoff_delay(attempt).min(remaining));
            attempt += 1;
        }
    }

    fn try_lock_file(&self) -> bool {
        let Some(file) = self.file.as_deref() else {
            return true;
        };
        match FileExt::try_lock_exclusive(file) {
            Ok(()) => true,
            Err(err) => {
                if err.kind() != fs2::lock_contended_error().kind() {
                    debug!(error = %err, "commit lock file not acquired");
                }
                false
            }
        }
    }
}
