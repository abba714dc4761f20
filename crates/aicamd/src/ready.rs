//! Readiness signal bus.
//!
//! Each managed service owns one bit in a shared 32-bit word. Bits are
//! sticky: set on start, cleared only by stop/deinit, and observing a
//! bit never consumes it, so any number of waiters can block on the
//! same services concurrently.

use aicam_common::{AicamError, Result};
use std::time::Duration;
use tokio::sync::watch;

/// Shared readiness word. Cheap to clone; all clones see the same bits.
#[derive(Clone)]
pub struct ReadinessBus {
    tx: watch::Sender<u32>,
}

impl ReadinessBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        ReadinessBus { tx }
    }

    /// Marks a service ready. `bit` is the bit index, not a mask.
    pub fn set(&self, bit: u32) {
        self.tx.send_modify(|flags| *flags |= 1 << bit);
    }

    pub fn clear(&self, bit: u32) {
        self.tx.send_modify(|flags| *flags &= !(1 << bit));
    }

    pub fn flags(&self) -> u32 {
        *self.tx.borrow()
    }

    /// Non-blocking readiness check against a mask of bits.
    pub fn is_ready(&self, mask: u32, check_all: bool) -> bool {
        satisfied(self.flags(), mask, check_all)
    }

    /// Blocks until the mask predicate holds or the timeout passes.
    ///
    /// Returns the readiness word that satisfied the wait. Bits are not
    /// cleared by a successful wait. `Err(Timeout)` is the normal
    /// deadline outcome and carries no other failure meaning.
    pub async fn wait(&self, mask: u32, wait_all: bool, timeout: Duration) -> Result<u32> {
        let mut rx = self.tx.subscribe();
        let watch_loop = async {
            loop {
                let flags = *rx.borrow_and_update();
                if satisfied(flags, mask, wait_all) {
                    return Ok(flags);
                }
                if rx.changed().await.is_err() {
                    return Err(AicamError::Internal("readiness bus closed".into()));
                }
            }
        };
        match tokio::time::timeout(timeout, watch_loop).await {
            Ok(result) => result,
            Err(_) => Err(AicamError::Timeout),
        }
    }
}

impl Default for ReadinessBus {
    fn default() -> Self {
        Self::new()
    }
}

fn satisfied(flags: u32, mask: u32, all: bool) -> bool {
    if all {
        flags & mask == mask
    } else {
        flags & mask != 0
    }
}
