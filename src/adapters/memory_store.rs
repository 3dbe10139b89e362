//! In-memory schedule store.
//!
//! Implements [`StorePort`] over a `Vec` of reminders with the same query
//! semantics as the remote store.  Used off-target and by the test suites;
//! the link can be scripted to drop or refuse reconnects.

use std::cell::Cell;

use chrono::NaiveDate;
use log::debug;

use crate::app::events::StoreWrite;
use crate::app::ports::{StoreError, StorePort};
use crate::app::reminder::{BoxStatus, Reminder, ReminderId, ReminderRow, ReminderStatus};
use crate::config::StoreCredentials;

#[derive(Debug)]
pub struct InMemoryStore {
    rows: Vec<Reminder>,
    connected: Cell<bool>,
    /// Liveness checks left before the link drops on its own.
    drop_after: Cell<Option<u32>>,
    /// Writes left before one fails and takes the link down with it.
    drop_on_write: Option<u32>,
    refuse_connects: u32,
    failing_queries: u32,
    connects: u32,
    writes: Vec<(StoreWrite, ReminderId)>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// An empty, connected store.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            connected: Cell::new(true),
            drop_after: Cell::new(None),
            drop_on_write: None,
            refuse_connects: 0,
            failing_queries: 0,
            connects: 0,
            writes: Vec::new(),
        }
    }

    /// Append a row.  Rows keep insertion order as their native order.
    pub fn insert(&mut self, reminder: Reminder) {
        self.rows.push(reminder);
    }

    pub fn reminder(&self, id: ReminderId) -> Option<&Reminder> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn reminder_mut(&mut self, id: ReminderId) -> Option<&mut Reminder> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.rows
    }

    /// Drop the link now.
    pub fn sever(&mut self) {
        self.connected.set(false);
        self.drop_after.set(None);
    }

    /// Drop the link after `checks` more successful liveness checks.
    pub fn drop_connection_after(&mut self, checks: u32) {
        self.drop_after.set(Some(checks));
    }

    /// Let `writes` more writes land, then fail the next one with
    /// [`StoreError::Unreachable`] and drop the link.  Liveness checks keep
    /// reporting up until that write, as with a transport that only notices
    /// a dead peer when a request fails.
    pub fn drop_link_on_write(&mut self, writes: u32) {
        self.drop_on_write = Some(writes);
    }

    /// Fail the next `n` connect attempts.
    pub fn refuse_connects(&mut self, n: u32) {
        self.refuse_connects = n;
    }

    /// Fail the next `n` queries with [`StoreError::QueryFailed`].
    pub fn fail_queries(&mut self, n: u32) {
        self.failing_queries = n;
    }

    pub fn connect_count(&self) -> u32 {
        self.connects
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> &[(StoreWrite, ReminderId)] {
        &self.writes
    }

    fn query(&mut self) -> Result<(), StoreError> {
        if !self.connected.get() {
            return Err(StoreError::Unreachable);
        }
        if self.failing_queries > 0 {
            self.failing_queries -= 1;
            return Err(StoreError::QueryFailed);
        }
        Ok(())
    }

    fn write_gate(&mut self) -> Result<(), StoreError> {
        match self.drop_on_write {
            Some(0) => {
                debug!("InMemoryStore: link dropped on write");
                self.drop_on_write = None;
                self.connected.set(false);
                Err(StoreError::Unreachable)
            }
            Some(n) => {
                self.drop_on_write = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn select(&self, date: NaiveDate, pred: impl Fn(&Reminder) -> bool) -> Vec<ReminderRow> {
        let mut rows: Vec<ReminderRow> = self
            .rows
            .iter()
            .filter(|r| r.date == date && pred(r))
            .map(Reminder::row)
            .collect();
        // Stable: ties keep native row order.
        rows.sort_by_key(|r| r.time);
        rows
    }
}

impl StorePort for InMemoryStore {
    fn is_connected(&self) -> bool {
        if self.connected.get() {
            match self.drop_after.get() {
                Some(0) => {
                    debug!("InMemoryStore: scripted disconnect");
                    self.connected.set(false);
                    self.drop_after.set(None);
                }
                Some(n) => self.drop_after.set(Some(n - 1)),
                None => {}
            }
        }
        self.connected.get()
    }

    fn connect(&mut self, _credentials: &StoreCredentials) -> Result<(), StoreError> {
        self.connects += 1;
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(StoreError::Unreachable);
        }
        self.connected.set(true);
        Ok(())
    }

    fn latest_date(&mut self) -> Result<Option<NaiveDate>, StoreError> {
        self.query()?;
        Ok(self.rows.iter().map(|r| r.date).max())
    }

    fn fetch_open_batch(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError> {
        self.query()?;
        Ok(self.select(date, |r| {
            r.box_status == BoxStatus::Open && r.status != ReminderStatus::Completed
        }))
    }

    fn fetch_waiting(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError> {
        self.query()?;
        Ok(self.select(date, |r| r.status == ReminderStatus::Waiting))
    }

    fn mark_closed(&mut self, id: ReminderId) -> Result<(), StoreError> {
        self.query()?;
        self.write_gate()?;
        if let Some(r) = self.reminder_mut(id) {
            r.box_status = BoxStatus::Closed;
        }
        self.writes.push((StoreWrite::MarkClosed, id));
        Ok(())
    }

    fn mark_completed(&mut self, id: ReminderId) -> Result<bool, StoreError> {
        self.query()?;
        self.write_gate()?;
        let changed = match self.reminder_mut(id) {
            Some(r) if r.status == ReminderStatus::Waiting => {
                r.status = ReminderStatus::Completed;
                true
            }
            _ => false,
        };
        if changed {
            self.writes.push((StoreWrite::MarkCompleted, id));
        }
        Ok(changed)
    }
}
