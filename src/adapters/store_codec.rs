//! JSON wire format of the schedule store's HTTP query endpoint.
//!
//! Every request is a single `POST` whose body names one fixed operation
//! and its typed parameters; the endpoint never receives query text.
//!
//! ```text
//! → {"database":"pillbox","op":"fetch_waiting","date":"2024-06-03"}
//! ← {"rows":[{"id":1,"time":"08:00:00","medication_slot":1}, …]}
//!
//! → {"database":"pillbox","op":"latest_date"}
//! ← {"latest_date":"2024-06-03"}          (null when the table is empty)
//!
//! → {"database":"pillbox","op":"mark_completed","id":7}
//! ← {"affected":1}
//! ```
//!
//! Decoding lives here, apart from the ESP-IDF transport, so it can be
//! tested and fuzzed on the host.

use chrono::{NaiveDate, NaiveTime};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::StoreError;
use crate::app::reminder::{ReminderId, ReminderRow};

/// One store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRequest {
    Ping,
    LatestDate,
    FetchOpenBatch { date: NaiveDate },
    FetchWaiting { date: NaiveDate },
    MarkClosed { id: ReminderId },
    MarkCompleted { id: ReminderId },
}

#[derive(Serialize)]
struct Envelope<'a> {
    database: &'a str,
    #[serde(flatten)]
    request: StoreRequest,
}

#[derive(Deserialize)]
struct LatestDateResponse {
    latest_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RowsResponse {
    rows: Vec<WireRow>,
}

#[derive(Deserialize)]
struct WireRow {
    id: ReminderId,
    time: String,
    medication_slot: i32,
}

#[derive(Deserialize)]
struct AffectedResponse {
    affected: u64,
}

pub fn encode_request(database: &str, request: StoreRequest) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(&Envelope { database, request }).map_err(|_| StoreError::QueryFailed)
}

pub fn decode_latest_date(body: &[u8]) -> Result<Option<NaiveDate>, StoreError> {
    let resp: LatestDateResponse =
        serde_json::from_slice(body).map_err(|_| StoreError::QueryFailed)?;
    Ok(resp.latest_date)
}

/// Decode a row set.  Rows with an unparseable `time` are dropped with a
/// warning; a malformed document fails as a whole.
pub fn decode_rows(body: &[u8]) -> Result<Vec<ReminderRow>, StoreError> {
    let resp: RowsResponse = serde_json::from_slice(body).map_err(|_| StoreError::QueryFailed)?;
    let rows = resp
        .rows
        .into_iter()
        .filter_map(|w| match parse_time(&w.time) {
            Some(time) => Some(ReminderRow {
                id: w.id,
                time,
                medication_slot: w.medication_slot,
            }),
            None => {
                warn!("Store codec: reminder {} has bad time {:?}, skipped", w.id, w.time);
                None
            }
        })
        .collect();
    Ok(rows)
}

pub fn decode_affected(body: &[u8]) -> Result<u64, StoreError> {
    let resp: AffectedResponse =
        serde_json::from_slice(body).map_err(|_| StoreError::QueryFailed)?;
    Ok(resp.affected)
}

/// Largest response body accepted from the store.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024;

/// Outcome of reading a response body.
#[derive(Debug, PartialEq, Eq)]
pub enum Body {
    Complete(Vec<u8>),
    /// The body exceeded [`MAX_RESPONSE_BYTES`]; the rest is still unread.
    Overflow,
}

/// Drain a response body through `read` until it reports end of stream.
/// Stops at the first chunk that would go past [`MAX_RESPONSE_BYTES`].
pub fn read_body<E>(mut read: impl FnMut(&mut [u8]) -> Result<usize, E>) -> Result<Body, E> {
    let mut body = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = read(&mut buf)?;
        if n == 0 {
            return Ok(Body::Complete(body));
        }
        if body.len() + n > MAX_RESPONSE_BYTES {
            return Ok(Body::Overflow);
        }
        body.extend_from_slice(&buf[..n]);
    }
}

/// `HH:MM:SS` as stored, or `HH:MM`.
fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
