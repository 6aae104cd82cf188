//! Tarpit for abusive tenants.
//!
//! Flagged organizations get a success-shaped response whose body is a huge
//! stream of JSON whitespace, so retry storms burn their own bandwidth.

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

pub const DEFAULT_FILLER_BYTES: u64 = 1 << 30;

const CHUNK_SIZE: usize = 64 * 1024;
const SUCCESS_BODY: &[u8] = br#"{"success":true}"#;

pub struct AbuseGuard {
    flagged: HashSet<String>,
    filler_bytes: u64,
}

impl AbuseGuard {
    pub fn new<I, S>(orgs: I, filler_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flagged: orgs.into_iter().map(Into::into).collect(),
            filler_bytes,
        }
    }

    #[must_use]
    pub fn is_flagged(&self, org: &str) -> bool {
        self.flagged.contains(org)
    }

    /// First candidate org that is on the denylist.
    pub fn first_flagged<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find(|org| self.is_flagged(org))
    }

    /// Streams `{"success":true}` padded with whitespace to the filler size.
    /// Memory use is one chunk regardless of size; generation stops as soon
    /// as the client goes away and the body is dropped.
    #[must_use]
    pub fn punitive_response(&self) -> Response {
        let padding = self
            .filler_bytes
            .saturating_sub(SUCCESS_BODY.len() as u64);
        let reader = SUCCESS_BODY.chain(tokio::io::repeat(b' ').take(padding));
        let body = Body::from_stream(ReaderStream::with_capacity(reader, CHUNK_SIZE));

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}
