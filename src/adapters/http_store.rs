//! HTTP schedule store adapter (ESP-IDF only).
//!
//! Implements [`StorePort`] against the store's JSON query endpoint using
//! the ESP-IDF HTTP client.  Request/response bodies are handled by
//! [`store_codec`](super::store_codec).
//!
//! The link is considered up after a successful `ping` and down after any
//! transport error; [`ResilientStore`](crate::app::connection::ResilientStore)
//! does the reconnecting.

use core::time::Duration;

use chrono::NaiveDate;
use esp_idf_svc::http::Method;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::{debug, info, warn};

use crate::app::ports::{StoreError, StorePort};
use crate::app::reminder::{ReminderId, ReminderRow};
use crate::config::StoreCredentials;

use super::store_codec::{self, Body, MAX_RESPONSE_BYTES, StoreRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpStoreAdapter {
    conn: Option<EspHttpConnection>,
    uri: heapless::String<96>,
    credentials: StoreCredentials,
}

impl HttpStoreAdapter {
    pub fn new() -> Self {
        Self {
            conn: None,
            uri: heapless::String::new(),
            credentials: StoreCredentials::default(),
        }
    }

    /// POST one request and return the response body.
    fn call(&mut self, request: StoreRequest) -> Result<Vec<u8>, StoreError> {
        let body = store_codec::encode_request(self.credentials.database.as_str(), request)?;
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Unreachable);
        };

        match exchange(conn, &self.uri, &self.credentials, &body) {
            Ok((_, Body::Overflow)) => {
                warn!(
                    "HttpStore: {:?} response exceeds {} bytes, dropping connection",
                    request, MAX_RESPONSE_BYTES
                );
                // Unread body bytes would corrupt the next exchange.
                self.conn = None;
                Err(StoreError::QueryFailed)
            }
            Ok((200, Body::Complete(resp))) => Ok(resp),
            Ok((status, Body::Complete(_))) => {
                warn!("HttpStore: {:?} answered HTTP {}", request, status);
                Err(StoreError::QueryFailed)
            }
            Err(e) => {
                warn!("HttpStore: transport error on {:?}: {}", request, e);
                self.conn = None;
                Err(StoreError::Unreachable)
            }
        }
    }
}

impl Default for HttpStoreAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn exchange(
    conn: &mut EspHttpConnection,
    uri: &str,
    credentials: &StoreCredentials,
    body: &[u8],
) -> Result<(u16, Body), esp_idf_svc::sys::EspError> {
    let len = body.len().to_string();
    let headers = [
        ("Content-Type", "application/json"),
        ("Content-Length", len.as_str()),
        ("X-Store-User", credentials.user.as_str()),
        ("X-Store-Password", credentials.password.as_str()),
    ];
    conn.initiate_request(Method::Post, uri, &headers)?;

    let mut written = 0;
    while written < body.len() {
        written += conn.write(&body[written..])?;
    }

    conn.initiate_response()?;
    let status = conn.status();

    let resp = store_codec::read_body(|buf| conn.read(buf))?;
    if let Body::Complete(bytes) = &resp {
        debug!("HttpStore: HTTP {} ({} bytes)", status, bytes.len());
    }
    Ok((status, resp))
}

impl StorePort for HttpStoreAdapter {
    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connect(&mut self, credentials: &StoreCredentials) -> Result<(), StoreError> {
        self.credentials = credentials.clone();
        self.uri.clear();
        if core::fmt::Write::write_fmt(
            &mut self.uri,
            format_args!("http://{}:{}/query", credentials.host, credentials.port),
        )
        .is_err()
        {
            return Err(StoreError::Unreachable);
        }

        let conn = EspHttpConnection::new(&Configuration {
            timeout: Some(REQUEST_TIMEOUT),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HttpStore: client init failed: {}", e);
            StoreError::Unreachable
        })?;
        self.conn = Some(conn);

        match self.call(StoreRequest::Ping) {
            Ok(_) => {
                info!("HttpStore: connected to {}", self.uri);
                Ok(())
            }
            Err(_) => {
                self.conn = None;
                Err(StoreError::Unreachable)
            }
        }
    }

    fn latest_date(&mut self) -> Result<Option<NaiveDate>, StoreError> {
        let body = self.call(StoreRequest::LatestDate)?;
        store_codec::decode_latest_date(&body)
    }

    fn fetch_open_batch(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError> {
        let body = self.call(StoreRequest::FetchOpenBatch { date })?;
        store_codec::decode_rows(&body)
    }

    fn fetch_waiting(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError> {
        let body = self.call(StoreRequest::FetchWaiting { date })?;
        store_codec::decode_rows(&body)
    }

    fn mark_closed(&mut self, id: ReminderId) -> Result<(), StoreError> {
        let body = self.call(StoreRequest::MarkClosed { id })?;
        store_codec::decode_affected(&body).map(|_| ())
    }

    fn mark_completed(&mut self, id: ReminderId) -> Result<bool, StoreError> {
        let body = self.call(StoreRequest::MarkCompleted { id })?;
        store_codec::decode_affected(&body).map(|n| n > 0)
    }
}
