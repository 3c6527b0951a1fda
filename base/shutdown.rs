// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2021 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

//! Tools for propagating a graceful shutdown signal through the program.
//!
//! Workers poll [`Receiver::check`] between work items and can also `.await`
//! [`Receiver::notified`] from async code. Dropping every clone of the
//! [`Sender`] requests shutdown; there is exactly one `Sender` per daemon run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("shutdown requested")]
pub struct ShutdownError;

struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

pub struct Sender(Arc<Inner>);

impl Drop for Sender {
    fn drop(&mut self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }
}

#[derive(Clone)]
pub struct Receiver(Arc<Inner>);

impl Receiver {
    pub fn is_shutdown(&self) -> bool {
        self.0.stopped.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ShutdownError> {
        if self.is_shutdown() {
            Err(ShutdownError)
        } else {
            Ok(())
        }
    }

    /// Resolves once shutdown has been requested. Safe to call repeatedly.
    pub async fn notified(&self) {
        if self.is_shutdown() {
            return;
        }
        // `Notify::notified` can miss a notification that happened strictly
        // before the call; re-check afterward to close that race.
        let notified = self.0.notify.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }

    /// Sleeps until either `dur` elapses or shutdown is requested, returning
    /// `Err` in the latter case so callers can bail out of a retry loop.
    pub async fn sleep(&self, dur: std::time::Duration) -> Result<(), ShutdownError> {
        tokio::select! {
            _ = tokio::time::sleep(dur) => Ok(()),
            _ = self.notified() => Err(ShutdownError),
        }
    }
}

pub fn channel() -> (Sender, Receiver) {
    let inner = Arc::new(Inner {
        stopped: AtomicBool::new(false),
        notify: Notify::new(),
    });
    (Sender(inner.clone()), Receiver(inner))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[tokio::test]
    async fn check_before_and_after() {
        let (tx, rx) = super::channel();
        rx.check().unwrap();
        drop(tx);
        rx.check().unwrap_err();
    }

    #[tokio::test]
    async fn notified_resolves_on_drop() {
        let (tx, rx) = super::channel();
        let rx2 = rx.clone();
        let handle = tokio::spawn(async move { rx2.notified().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sleep_interrupted_by_shutdown() {
        let (tx, rx) = super::channel();
        let handle = tokio::spawn(async move { rx.sleep(Duration::from_secs(1000)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);
        assert!(handle.await.unwrap().is_err());
    }
}
