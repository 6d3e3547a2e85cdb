// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Observable values.
//!
//! A [`Subject`] holds the current value of one mutable input (an encryption
//! session, a viewing key, a query state). Readers either take a snapshot
//! with [`Subject::get`], hold a `watch::Receiver`, or register a callback
//! with [`Subject::subscribe`]. A [`Subscription`] stays active until it is
//! unsubscribed or dropped.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared, observable value. Clones observe the same value.
pub struct Subject<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify every observer.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Modify the value in place and notify every observer.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Replace the value only if it differs. Returns whether it changed.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current != value {
                *current = value;
                true
            } else {
                false
            }
        })
    }

    pub fn receiver(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of live receivers, subscriptions included.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Call `f` with every value set after this call. Must be called inside
    /// a Tokio runtime.
    pub fn subscribe<F>(&self, mut f: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        rx.mark_unchanged();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let value = rx.borrow_and_update().clone();
                        f(value);
                    }
                }
            }
        });

        Subscription { token }
    }
}

/// Handle of a [`Subject::subscribe`] callback.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn get_set_and_changed() {
        let subject = Subject::new(1);
        let clone = subject.clone();
        clone.set(2);
        assert_eq!(subject.get(), 2);

        assert!(!subject.set_if_changed(2));
        assert!(subject.set_if_changed(3));
        subject.update(|v| *v += 1);
        assert_eq!(clone.get(), 4);
    }

    #[tokio::test]
    async fn subscription_sees_updates_until_unsubscribed() {
        let subject = Subject::new(String::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subject.subscribe(move |value| {
            let _ = tx.send(value);
        });
        tokio::task::yield_now().await;

        subject.set("a".to_string());
        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(seen.as_deref(), Some("a"));

        assert!(subscription.is_active());
        subscription.unsubscribe();
        tokio::time::timeout(Duration::from_secs(1), async {
            while subject.observer_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        subject.set("b".to_string());
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
