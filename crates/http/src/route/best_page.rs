use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use trellis_lib::{best_page, join::NoJoins, record::ContainerPage, Engine};

use super::status;
use crate::AppState;

pub async fn get(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Option<ContainerPage>>, StatusCode> {
    let engine = Engine::new(&state.documents, &state.config, &NoJoins);

    let page = best_page::lookup(
        &engine,
        best_page::Args {
            kind,
            slug,
            params,
            admin: false,
        },
    )
    .await
    .map_err(status)?;

    Ok(Json(page))
}
