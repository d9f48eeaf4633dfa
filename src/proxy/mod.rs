// Proxy module - Pingora ProxyHttp implementation
//
// Every request is answered inside `request_filter`; nothing is forwarded
// upstream. Originals are read through the coordinator's object store.

pub mod helpers;
pub mod special_endpoints;

use async_trait::async_trait;
use bytes::Bytes;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::{ErrorType, Result};
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::ServerConfig;
use crate::coordinator::{ImageResponse, RequestCoordinator};
use crate::pipeline::RequestContext;
use crate::router::{Route, Router};

use special_endpoints::EndpointResponse;

/// What `request_filter` writes back to the client
#[derive(Debug)]
pub enum Reply {
    Endpoint(EndpointResponse),
    Image(ImageResponse),
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Endpoint(response) => response.status,
            Reply::Image(_) => 200,
        }
    }
}

/// KagamiProxy implements the Pingora ProxyHttp trait
/// Handles routing and serves originals and derivatives
pub struct KagamiProxy {
    coordinator: RequestCoordinator,
    request_semaphore: Arc<Semaphore>,
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl KagamiProxy {
    pub fn new(server: &ServerConfig, coordinator: RequestCoordinator) -> Self {
        Self {
            coordinator,
            request_semaphore: Arc::new(Semaphore::new(server.max_concurrent_requests)),
            start_time: Instant::now(),
        }
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    /// Take a request slot, or get the 503 to answer with when none is free
    ///
    /// The slot is released when the permit drops.
    pub fn try_admit(&self) -> std::result::Result<SemaphorePermit<'_>, EndpointResponse> {
        self.request_semaphore
            .try_acquire()
            .map_err(|_| special_endpoints::handle_overloaded())
    }

    /// Route an admitted request and produce its reply
    pub async fn respond(&self, ctx: &mut RequestContext) -> Reply {
        let route = match Router::route(ctx.method(), ctx.path()) {
            Ok(route) => route,
            Err(e) => return Reply::Endpoint(special_endpoints::handle_error(&e)),
        };

        let object_key = match route {
            Route::Image { object_key } => object_key,
            Route::Health => {
                let stats = self.coordinator.cache().stats();
                return Reply::Endpoint(special_endpoints::handle_health(self.start_time, &stats));
            }
            Route::NotFound => {
                return Reply::Endpoint(special_endpoints::handle_not_found(ctx.path()))
            }
            Route::MethodNotAllowed => {
                return Reply::Endpoint(special_endpoints::handle_method_not_allowed(ctx.method()))
            }
        };

        ctx.set_object_key(object_key.clone());
        match self.coordinator.handle(&object_key, ctx.query_params()).await {
            Ok(response) => {
                ctx.set_cache_status(response.cache_status);
                Reply::Image(response)
            }
            Err(e) => Reply::Endpoint(special_endpoints::handle_error(&e)),
        }
    }

    async fn write_reply(session: &mut Session, ctx: &RequestContext, reply: Reply) -> Result<()> {
        let head_only = ctx.is_head();
        match reply {
            Reply::Endpoint(response) => {
                let header = endpoint_headers(&response, ctx.request_id())?;
                session
                    .write_response_header(Box::new(header), head_only)
                    .await?;
                if !head_only {
                    session
                        .write_response_body(Some(Bytes::from(response.body)), true)
                        .await?;
                }
            }
            Reply::Image(response) => {
                let header = image_headers(&response, ctx.request_id())?;
                session
                    .write_response_header(Box::new(header), head_only)
                    .await?;
                if head_only {
                    return Ok(());
                }

                // Originals arrive chunk by chunk and leave the same way
                let mut body = response.body;
                while let Some(chunk) = body.next_chunk().await {
                    let chunk = chunk.map_err(|e| {
                        pingora_core::Error::explain(
                            ErrorType::ReadError,
                            format!("original stream failed: {}", e),
                        )
                    })?;
                    session.write_response_body(Some(chunk), false).await?;
                }
                session.write_response_body(None, true).await?;
            }
        }
        Ok(())
    }
}

/// Response header for a built-in endpoint or error
pub fn endpoint_headers(response: &EndpointResponse, request_id: &str) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(response.status, Some(4 + response.headers.len()))?;
    header.insert_header("Content-Type", response.content_type)?;
    header.insert_header("Content-Length", response.body.len().to_string())?;
    header.insert_header("X-Request-Id", request_id)?;
    for (name, value) in &response.headers {
        header.insert_header(*name, value.as_str())?;
    }
    Ok(header)
}

/// Response header for an image, identical for GET and HEAD
pub fn image_headers(response: &ImageResponse, request_id: &str) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(200, Some(7))?;
    header.insert_header("Content-Type", response.content_type.as_str())?;
    header.insert_header("Content-Length", response.content_length.to_string())?;
    header.insert_header("Cache-Control", response.cache_control.as_str())?;
    header.insert_header("ETag", response.etag.as_str())?;
    header.insert_header("X-Cache", response.cache_status.as_str())?;
    header.insert_header("X-Request-Id", request_id)?;
    Ok(header)
}

#[async_trait]
impl ProxyHttp for KagamiProxy {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new(String::new(), String::new())
    }

    /// Never reached: `request_filter` always answers the request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "kagami serves all requests locally",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        ctx.set_request(
            req.method.to_string(),
            req.uri.path().to_string(),
            helpers::extract_query_params(req),
        );

        // Permit is held until this function returns, i.e. until the response is written
        let _permit = match self.try_admit() {
            Ok(permit) => permit,
            Err(overloaded) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    "Rejecting request due to max concurrent requests reached"
                );
                Self::write_reply(session, ctx, Reply::Endpoint(overloaded)).await?;
                return Ok(true);
            }
        };

        let reply = self.respond(ctx).await;
        Self::write_reply(session, ctx, reply).await?;
        Ok(true)
    }

    /// Log request completion
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        if let Some(error) = e {
            // Typically the client went away mid-write
            tracing::warn!(
                request_id = %ctx.request_id(),
                error = %error,
                "Response write failed"
            );
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            client_ip = %helpers::get_client_ip(session),
            method = %ctx.method(),
            path = %ctx.path(),
            object_key = ctx.object_key().unwrap_or("-"),
            cache_status = ctx.cache_status().map(|s| s.as_str()).unwrap_or("-"),
            status_code = status_code,
            duration_ms = ctx.elapsed_ms(),
            "Request completed"
        );
    }
}
