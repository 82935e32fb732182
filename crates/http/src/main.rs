mod route;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{routing, Router};
use camino::Utf8PathBuf;
use notify::{RecursiveMode, Watcher};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_lib::{
    config::{self, Config},
    frontmatter_file::{keeper::ArcMutex, Keeper},
};

#[derive(Clone)]
pub struct AppState {
    pub documents: ArcMutex,
    pub config: Arc<Config>,
}

async fn run() -> Result<()> {
    let mut args = std::env::args();
    let port = args
        .nth(1)
        .ok_or_else(|| anyhow!("Expected a port number as a first argument"))?;
    if let Some(wd) = args.next() {
        std::env::set_current_dir(wd)?;
    }

    let current_dir = std::env::current_dir()?;
    let current_dir = Utf8PathBuf::try_from(current_dir)?;

    let config = config::load_from_dir(&current_dir)?;

    let keeper = Keeper::new(&current_dir)?;

    let documents = ArcMutex::new(keeper);

    let mut watcher = notify::recommended_watcher(documents.clone())?;

    watcher.watch(current_dir.as_std_path(), RecursiveMode::NonRecursive)?;

    let app = Router::new()
        .route("/items/:type", routing::post(route::items::retrieve))
        .route(
            "/items/:type/:slug",
            routing::post(route::items::one_post).get(route::items::one_get),
        )
        .route("/best_page/:type/:slug", routing::get(route::best_page::get))
        .with_state(AppState {
            documents,
            config: Arc::new(config),
        });

    let socket_addr_string = format!("0.0.0.0:{port}");
    info!("Binding to {socket_addr_string}");
    axum::Server::bind(&socket_addr_string.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
