use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use trellis_lib::{join::StoreJoiner, list, single, Engine};

use super::{assign_headers, status, take_page};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Body {
    filter: Value,
    page: Option<String>,
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    Json(body): Json<Body>,
) -> Result<(HeaderMap, Json<list::Response>), StatusCode> {
    let joiner = StoreJoiner::new(&state.documents);
    let engine = Engine::new(&state.documents, &state.config, &joiner);

    let response = list::query(
        &engine,
        list::Args {
            kind,
            filter: body.filter,
            page: body.page,
            params,
            admin: false,
        },
    )
    .await
    .map_err(status)?;

    Ok((assign_headers(response.total), Json(response)))
}

async fn one(state: AppState, args: single::Args) -> Result<Json<single::Response>, StatusCode> {
    let joiner = StoreJoiner::new(&state.documents);
    let engine = Engine::new(&state.documents, &state.config, &joiner);

    let response = single::one(&engine, args).await.map_err(status)?;

    Ok(Json(response))
}

pub async fn one_get(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<single::Response>, StatusCode> {
    let page = take_page(&mut params);
    one(
        state,
        single::Args {
            kind,
            slug,
            page,
            params,
            ..single::Args::default()
        },
    )
    .await
}

pub async fn one_post(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
    Json(body): Json<Body>,
) -> Result<Json<single::Response>, StatusCode> {
    one(
        state,
        single::Args {
            kind,
            slug,
            filter: body.filter,
            page: body.page,
            params,
            admin: false,
        },
    )
    .await
}
