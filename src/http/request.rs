//! Proxy event decoding and translation into a canonical HTTP request.

use crate::error::{Error, Result};
use crate::http::path;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::collections::HashMap;

/// HTTP request as delivered by the API gateway proxy integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub http_method: String,
    /// Header values, multiple values comma-joined.
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage_variables: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_base64_encoded: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProxyRequest {
    /// Decode a raw event payload.
    pub fn from_event(event: &RawValue) -> Result<Self> {
        serde_json::from_str(event.get()).map_err(|source| Error::ProxyEvent {
            payload: event.get().to_string(),
            source,
        })
    }

    /// The request body, base64-decoded when the gateway flagged it as such.
    pub fn body_bytes(&self) -> Result<Bytes> {
        if !self.is_base64_encoded {
            return Ok(Bytes::from(self.body.clone()));
        }

        general_purpose::STANDARD
            .decode(&self.body)
            .map(Bytes::from)
            .map_err(|e| Error::Request(format!("invalid base64 body: {}", e)))
    }

    /// Build the canonical request, stripping `strip_base_paths` leading
    /// path segments from the target.
    pub fn to_http(&self, strip_base_paths: usize) -> Result<Request<Bytes>> {
        let method = if self.http_method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(self.http_method.as_bytes())
                .map_err(|e| Error::Request(format!("method '{}': {}", self.http_method, e)))?
        };

        let target = path::resolve_target(
            &self.path,
            strip_base_paths,
            &self.query_string_parameters,
        );

        let mut builder = Request::builder().method(method).uri(target.as_str());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Request(format!("header '{}': {}", name, e)))?;
            for v in value.split(',') {
                let v = HeaderValue::from_str(v.trim())
                    .map_err(|e| Error::Request(format!("header '{}': {}", name, e)))?;
                builder = builder.header(name.clone(), v);
            }
        }

        builder
            .body(self.body_bytes()?)
            .map_err(|e| Error::Request(format!("target '{}': {}", target, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn test_decode_empty_event() {
        let req = ProxyRequest::from_event(&raw("{}")).unwrap();
        assert_eq!(req, ProxyRequest::default());
    }

    #[test]
    fn test_decode_null_fields() {
        let req =
            ProxyRequest::from_event(&raw(r#"{"headers":null,"body":null,"path":"/x"}"#)).unwrap();
        assert!(req.headers.is_empty());
        assert_eq!(req.body, "");
        assert_eq!(req.path, "/x");
    }

    #[test]
    fn test_decode_type_mismatch_embeds_payload() {
        let err = ProxyRequest::from_event(&raw(r#"{"resource": 123}"#)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with(r#"failed to unmarshal '{"resource": 123}' as proxy event: "#));
        assert!(msg.contains("invalid type"));
    }

    #[test]
    fn test_to_http_splits_headers() {
        let req = ProxyRequest {
            http_method: "POST".to_string(),
            path: "/items".to_string(),
            headers: HashMap::from([(
                "Accept".to_string(),
                "text/html, application/json".to_string(),
            )]),
            body: "hello".to_string(),
            ..Default::default()
        };

        let http = req.to_http(0).unwrap();
        assert_eq!(http.method(), Method::POST);
        assert_eq!(http.uri(), "/items");
        let accept: Vec<_> = http.headers().get_all("accept").iter().collect();
        assert_eq!(accept, vec!["text/html", "application/json"]);
        assert_eq!(http.body(), &Bytes::from("hello"));
    }

    #[test]
    fn test_to_http_defaults_to_get_on_root() {
        let http = ProxyRequest::default().to_http(0).unwrap();
        assert_eq!(http.method(), Method::GET);
        assert_eq!(http.uri(), "/");
    }

    #[test]
    fn test_to_http_query_parameters_take_precedence() {
        let req = ProxyRequest {
            path: "/search?x=1".to_string(),
            query_string_parameters: HashMap::from([("x".to_string(), "2".to_string())]),
            ..Default::default()
        };

        let http = req.to_http(0).unwrap();
        assert_eq!(http.uri(), "/search?x=2");
    }

    #[test]
    fn test_base64_body() {
        let req = ProxyRequest {
            body: "aGVsbG8=".to_string(),
            is_base64_encoded: true,
            ..Default::default()
        };
        assert_eq!(req.body_bytes().unwrap(), Bytes::from("hello"));

        let bad = ProxyRequest {
            body: "***".to_string(),
            is_base64_encoded: true,
            ..Default::default()
        };
        assert!(matches!(bad.body_bytes(), Err(Error::Request(_))));
    }

    #[test]
    fn test_invalid_header_name() {
        let req = ProxyRequest {
            headers: HashMap::from([("bad header".to_string(), "v".to_string())]),
            ..Default::default()
        };
        assert!(matches!(req.to_http(0), Err(Error::Request(_))));
    }
}
