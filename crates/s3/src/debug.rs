//! Request/response logging for the S3 HTTP exchange
//!
//! Installed as an SDK interceptor when `debug` is set. It observes traffic
//! only and never alters or retries a request.

use std::fmt::Write;

use aws_smithy_runtime_api::box_error::BoxError;
use aws_smithy_runtime_api::client::interceptors::Intercept;
use aws_smithy_runtime_api::client::interceptors::context::{
    BeforeTransmitInterceptorContextRef, FinalizerInterceptorContextRef,
};
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_types::config_bag::ConfigBag;

const REQUEST_BANNER: &str = ">>> [S3_REQUEST] >>>";
const RESPONSE_BANNER: &str = "<<< [S3_RESPONSE] <<<";

#[derive(Debug, Default, Clone, Copy)]
pub struct DebugInterceptor;

/// Render one side of an exchange: a banner line followed by the headers
fn format_exchange<'a>(
    banner: &str,
    method: &str,
    uri: &str,
    status: Option<u16>,
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut out = format!("{banner} {method} {uri}");
    if let Some(status) = status {
        let _ = write!(out, " {status}");
    }
    for (name, value) in headers {
        let _ = write!(out, "\n{name}: {value}");
    }
    out
}

impl Intercept for DebugInterceptor {
    fn name(&self) -> &'static str {
        "DebugInterceptor"
    }

    fn read_before_transmit(
        &self,
        context: &BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let request = context.request();
        tracing::info!(
            "{}",
            format_exchange(
                REQUEST_BANNER,
                request.method(),
                request.uri(),
                None,
                request.headers().iter(),
            )
        );
        Ok(())
    }

    fn read_after_attempt(
        &self,
        context: &FinalizerInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let (method, uri) = context
            .request()
            .map(|r| (r.method(), r.uri()))
            .unwrap_or(("-", "-"));

        match (context.response(), context.output_or_error()) {
            (Some(response), _) => tracing::info!(
                "{}",
                format_exchange(
                    RESPONSE_BANNER,
                    method,
                    uri,
                    Some(response.status().as_u16()),
                    response.headers().iter(),
                )
            ),
            (None, Some(Err(err))) => tracing::error!("S3_ERROR: {method} {uri}: {err:?}"),
            (None, _) => {}
        }
        Ok(())
    }
}
