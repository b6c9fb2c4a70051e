use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};

/// Attached to failed responses so the logging middleware can report why.
#[derive(Clone, Debug)]
pub enum Failure {
    Client(String),
    Server(String),
}

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<Failure>() {
        None => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
        Some(Failure::Client(reason)) => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            reason = %reason,
            "Rejected request"
        ),
        Some(Failure::Server(reason)) => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            reason = %reason,
            "Failed to process request"
        ),
    }

    response
}

pub fn to_response<T: IntoResponse>(
    response: T,      //The response that we are sending + StatusCode
    failure: Failure, //What went wrong, for the logging middleware
) -> Response {
    let mut response = response.into_response();

    response.extensions_mut().insert(failure);

    response
}
