//! Resilient store connection.
//!
//! Wraps a [`StorePort`] so every operation is preceded by a liveness check
//! and, if the link is down, exactly one reconnect attempt.  An operation
//! that fails with [`StoreError::Unreachable`] on a link that looked alive
//! is reconnected and retried once.  There is no backoff here: the next
//! attempt happens on the next operation or tick.

use chrono::NaiveDate;
use log::{info, warn};

use crate::config::StoreCredentials;

use super::events::{AppEvent, ReconnectContext};
use super::ports::{EventSink, StoreError, StorePort};
use super::reminder::{ReminderId, ReminderRow};

pub struct ResilientStore<S: StorePort> {
    store: S,
    credentials: StoreCredentials,
    reconnect_attempts: u32,
    reconnect_failures: u32,
}

impl<S: StorePort> ResilientStore<S> {
    pub fn new(store: S, credentials: StoreCredentials) -> Self {
        Self {
            store,
            credentials,
            reconnect_attempts: 0,
            reconnect_failures: 0,
        }
    }

    /// Make sure the link is up, reconnecting once if it is not.
    pub fn ensure_connected(
        &mut self,
        context: ReconnectContext,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        if self.store.is_connected() {
            return Ok(());
        }
        warn!("Store: connection lost ({:?}), reconnecting", context);
        self.reconnect(context, sink)
    }

    fn reconnect(
        &mut self,
        context: ReconnectContext,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        sink.emit(&AppEvent::Reconnecting(context));
        self.reconnect_attempts += 1;

        match self.store.connect(&self.credentials) {
            Ok(()) => {
                info!("Store: reconnected ({:?})", context);
                sink.emit(&AppEvent::Reconnected(context));
                Ok(())
            }
            Err(e) => {
                warn!("Store: reconnect failed ({:?}): {}", context, e);
                self.reconnect_failures += 1;
                sink.emit(&AppEvent::ReconnectFailed(context));
                Err(StoreError::Unreachable)
            }
        }
    }

    /// Run `op` on a live link.  A transport may only notice a dead link
    /// when a request fails, so an `Unreachable` result gets one reconnect
    /// and one retry.
    fn call<T>(
        &mut self,
        context: ReconnectContext,
        sink: &mut impl EventSink,
        mut op: impl FnMut(&mut S) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.ensure_connected(context, sink)?;
        match op(&mut self.store) {
            Err(StoreError::Unreachable) => {
                warn!("Store: request failed on a dead link ({:?})", context);
                self.reconnect(context, sink)?;
                op(&mut self.store)
            }
            result => result,
        }
    }

    pub fn latest_date(
        &mut self,
        sink: &mut impl EventSink,
    ) -> Result<Option<NaiveDate>, StoreError> {
        self.call(ReconnectContext::Fetch, sink, S::latest_date)
    }

    pub fn fetch_open_batch(
        &mut self,
        date: NaiveDate,
        sink: &mut impl EventSink,
    ) -> Result<Vec<ReminderRow>, StoreError> {
        self.call(ReconnectContext::Fetch, sink, |s| s.fetch_open_batch(date))
    }

    pub fn fetch_waiting(
        &mut self,
        date: NaiveDate,
        sink: &mut impl EventSink,
    ) -> Result<Vec<ReminderRow>, StoreError> {
        self.call(ReconnectContext::Fetch, sink, |s| s.fetch_waiting(date))
    }

    pub fn mark_closed(
        &mut self,
        id: ReminderId,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        self.call(ReconnectContext::WriteBack, sink, |s| s.mark_closed(id))
    }

    /// Guarded, so a retry after a lost response reports `false`.
    pub fn mark_completed(
        &mut self,
        id: ReminderId,
        sink: &mut impl EventSink,
    ) -> Result<bool, StoreError> {
        self.call(ReconnectContext::WriteBack, sink, |s| s.mark_completed(id))
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn reconnect_failures(&self) -> u32 {
        self.reconnect_failures
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
