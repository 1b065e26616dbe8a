//! Buffered response capture and the proxy response sent back to the gateway.

use bytes::{BufMut, BytesMut};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response in the shape the API gateway proxy integration expects.
///
/// `headers` is `None` only for the built-in not-found response; a captured
/// response always carries a map, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: Option<BTreeMap<String, String>>,
}

impl ProxyResponse {
    /// Response used when no HTTP handler is configured.
    pub fn not_found() -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            body: "404 Not Found".to_string(),
            headers: None,
        }
    }
}

/// Response sink handed to HTTP handlers.
///
/// The whole body is buffered in memory. The status stays 200 unless the
/// handler calls [`ResponseWriter::write_status`].
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    /// Create an empty 200 response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    /// Record the response status.
    pub fn write_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append a header occurrence.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Append bytes to the body.
    pub fn write_body(&mut self, data: impl AsRef<[u8]>) {
        self.body.put_slice(data.as_ref());
    }

    /// Write a plain text body.
    pub fn text(&mut self, content: impl AsRef<str>) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        self.write_body(content.as_ref());
    }

    /// Serialize `data` as the JSON body.
    pub fn json<T: Serialize>(&mut self, data: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.write_body(body);
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Flatten the captured response, comma-joining repeated headers.
    pub fn into_proxy_response(self) -> ProxyResponse {
        let mut headers = BTreeMap::new();
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            headers.insert(name.as_str().to_string(), joined);
        }

        ProxyResponse {
            status_code: self.status.as_u16(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
            headers: Some(headers),
        }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.body.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
