//! Gateway adapter: serves ordinary HTTP handlers from proxy events.

use crate::error::{Error, Result};
use crate::function::handler::{Context, Handler};
use crate::http::{ProxyRequest, ProxyResponse, ResponseWriter};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::Request;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// HTTP request handler served through the gateway adapter.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    /// Handle one request, writing the response into `response`.
    async fn serve_http(&self, ctx: &Context, request: Request<Bytes>, response: &mut ResponseWriter);
}

#[async_trait]
impl<T: HttpHandler + ?Sized> HttpHandler for Arc<T> {
    async fn serve_http(&self, ctx: &Context, request: Request<Bytes>, response: &mut ResponseWriter) {
        (**self).serve_http(ctx, request, response).await
    }
}

/// Adapter turning a synchronous closure into an [`HttpHandler`].
pub struct HttpFn<F> {
    f: F,
}

/// Use a closure as an [`HttpHandler`].
pub fn http_fn<F>(f: F) -> HttpFn<F>
where
    F: Fn(&Context, Request<Bytes>, &mut ResponseWriter) + Send + Sync,
{
    HttpFn { f }
}

#[async_trait]
impl<F> HttpHandler for HttpFn<F>
where
    F: Fn(&Context, Request<Bytes>, &mut ResponseWriter) + Send + Sync,
{
    async fn serve_http(&self, ctx: &Context, request: Request<Bytes>, response: &mut ResponseWriter) {
        (self.f)(ctx, request, response)
    }
}

/// Event handler translating API gateway proxy events into HTTP requests.
///
/// Without an HTTP handler every well-formed event is answered with
/// [`ProxyResponse::not_found`].
#[derive(Clone)]
pub struct GatewayHandler {
    strip_base_paths: usize,
    http: Option<Arc<dyn HttpHandler>>,
}

impl GatewayHandler {
    /// Serve `http`, stripping `strip_base_paths` leading path segments
    /// from each request path.
    pub fn new(strip_base_paths: usize, http: impl HttpHandler + 'static) -> Self {
        Self {
            strip_base_paths,
            http: Some(Arc::new(http)),
        }
    }

    /// Gateway handler that may have no HTTP handler configured.
    pub fn with_handler(strip_base_paths: usize, http: Option<Arc<dyn HttpHandler>>) -> Self {
        Self {
            strip_base_paths,
            http,
        }
    }

    /// Translate one proxy event and capture the HTTP handler's response.
    pub async fn handle(&self, ctx: &Context) -> Result<ProxyResponse> {
        let event = ctx.event()?;
        let proxy = ProxyRequest::from_event(event)?;

        let Some(http) = &self.http else {
            return Ok(ProxyResponse::not_found());
        };

        let request = proxy.to_http(self.strip_base_paths)?;
        debug!("Serving {} {}", request.method(), request.uri());

        let mut response = ResponseWriter::new();
        http.serve_http(ctx, request, &mut response).await;
        Ok(response.into_proxy_response())
    }
}

#[async_trait]
impl Handler for GatewayHandler {
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        let response = self.handle(&ctx).await?;
        serde_json::to_value(response).map(Some).map_err(Error::Encode)
    }
}
