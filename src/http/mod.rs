//! HTTP side of the gateway adapter: proxy event decoding, target rewriting
//! and response capture.

pub mod path;
mod request;
mod response;

pub use request::ProxyRequest;
pub use response::{ProxyResponse, ResponseWriter};
