pub mod best_page;
pub mod items;

use std::collections::BTreeMap;

use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, error};
use trellis_lib::Error;

/// Query parameter naming the container page a request is made under.
const PAGE_PARAM: &str = "page";

fn status(err: Error) -> StatusCode {
    match err {
        Error::NotFound { message } => {
            debug!("Not found: {message}");
            StatusCode::NOT_FOUND
        }
        Error::InvalidCriteria { message } => {
            debug!("Rejected criteria: {message}");
            StatusCode::BAD_REQUEST
        }
        err => {
            error!("Request failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn assign_headers(total: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert("x-total", total.into());

    headers
}

/// Splits the container page slug out of the request parameters.
fn take_page(params: &mut BTreeMap<String, String>) -> Option<String> {
    params.remove(PAGE_PARAM).filter(|p| !p.trim().is_empty())
}
