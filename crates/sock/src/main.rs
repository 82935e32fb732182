use std::sync::Arc;

use anyhow::anyhow;
use camino::Utf8PathBuf;
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixListener,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use trellis_lib::{
    best_page,
    config::{self, Config},
    frontmatter_file::{keeper::ArcMutex, Keeper},
    join::StoreJoiner,
    list,
    record::ContainerPage,
    single, Engine, Error,
};

#[derive(Serialize, Debug)]
#[serde(tag = "tag", content = "value")]
enum Result<T: Serialize> {
    Ok(T),
    NotFound(String),
    InvalidCriteria(String),
    InternalServerError(()),
}

impl<T: Serialize> From<std::result::Result<T, Error>> for Result<T> {
    fn from(result: std::result::Result<T, Error>) -> Self {
        match result {
            Ok(value) => Result::Ok(value),
            Err(Error::NotFound { message }) => Result::NotFound(message),
            Err(Error::InvalidCriteria { message }) => Result::InvalidCriteria(message),
            Err(err) => {
                error!("Request failed: {err}");
                Result::InternalServerError(())
            }
        }
    }
}

fn internal_server_error_bytes() -> Vec<u8> {
    let out_buf = rmp_serde::to_vec(&Result::<()>::InternalServerError(()))
        .expect("Result::InternalServerError does not serialize");

    debug!("Sending error bytes: {out_buf:x?}");

    out_buf
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Response {
    Retrieve(Result<list::Response>),
    One(Result<single::Response>),
    BestPage(Result<Option<ContainerPage>>),
}

#[derive(Deserialize, Debug)]
#[serde(tag = "tag", content = "value")]
enum Request {
    Retrieve(list::Args),
    One(single::Args),
    BestPage(best_page::Args),
}

impl Request {
    async fn process(self, documents: &ArcMutex, config: &Config) -> Response {
        let joiner = StoreJoiner::new(documents);
        let engine = Engine::new(documents, config, &joiner);
        match self {
            Request::Retrieve(args) => Response::Retrieve(list::query(&engine, args).await.into()),
            Request::One(args) => Response::One(single::one(&engine, args).await.into()),
            Request::BestPage(args) => {
                Response::BestPage(best_page::lookup(&engine, args).await.into())
            }
        }
    }
}

async fn in_buf_2_out_buf(documents: &ArcMutex, config: &Config, in_buf: &[u8]) -> Vec<u8> {
    debug!("Received bytes: {in_buf:x?}");
    let req = match rmp_serde::from_slice::<Request>(in_buf) {
        Ok(req) => req,
        Err(err) => {
            error!("stream request decode failed: {err}");
            return internal_server_error_bytes();
        }
    };

    let resp = req.process(documents, config).await;

    match rmp_serde::to_vec(&resp) {
        Ok(out_buf) => {
            debug!("Sending bytes: {:x?}", out_buf);
            out_buf
        }
        Err(err) => {
            error!("Failed to serialize response: {err}");
            internal_server_error_bytes()
        }
    }
}

async fn accept_streams(documents: ArcMutex, config: Arc<Config>, listener: UnixListener) {
    info!("listening for streams...");
    while let Ok((mut stream, _addr)) = listener.accept().await {
        debug!("accepted stream");
        let documents = documents.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let request_length = match stream.read_u32().await {
                Ok(n) => n,
                Err(err) => {
                    error!("Failed to read request length: {err}");
                    return;
                }
            };
            debug!("received request length: {request_length}");

            let mut buf = vec![0; request_length as usize];
            if let Err(err) = stream.read_exact(&mut buf).await {
                error!("stream read failed: {err}");
                return;
            }

            let out_buf = in_buf_2_out_buf(&documents, &config, &buf).await;
            if let Err(err) = stream.write_all(&out_buf).await {
                error!("stream write failed: {err}");
            } else {
                debug!("resolved request/response");
            }
        });
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args();
    let socket_path = args
        .nth(1)
        .ok_or_else(|| anyhow!("Expected a socket path as a first argument"))?;
    if let Some(wd) = args.next() {
        std::env::set_current_dir(wd)?;
    }

    let socket_path = std::path::Path::new(&socket_path);
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    let current_dir: Utf8PathBuf = std::env::current_dir()?.try_into()?;

    let config = config::load_from_dir(&current_dir)?;

    let keeper = Keeper::new(&current_dir)?;

    let documents = ArcMutex::new(keeper);

    let mut watcher = notify::recommended_watcher(documents.clone())?;

    watcher.watch(current_dir.as_std_path(), RecursiveMode::NonRecursive)?;

    let listener = UnixListener::bind(socket_path)?;

    accept_streams(documents, Arc::new(config), listener).await;

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

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use trellis_lib::{
        config::Config,
        frontmatter_file::{keeper::ArcMutex, Keeper},
        record::Document,
        Error,
    };

    use super::{in_buf_2_out_buf, Request, Result};

    macro_rules! doc {
        ($tokens:tt) => {
            serde_json::from_value::<Document>(json!($tokens)).unwrap()
        };
    }

    #[test]
    fn result_internal_server_error_bytes() {
        let bytes = rmp_serde::to_vec(&Result::<()>::InternalServerError(())).unwrap();
        let hex = format!("{bytes:x?}");
        assert_eq!(
            "[92, b3, 49, 6e, 74, 65, 72, 6e, 61, 6c, 53, 65, 72, 76, 65, 72, 45, 72, 72, 6f, 72, c0]",
            hex
        );
    }

    #[test]
    fn result_ok_bytes() {
        let bytes = rmp_serde::to_vec(&Result::<u32>::Ok(1)).unwrap();
        let hex = format!("{bytes:x?}");
        assert_eq!("[92, a2, 4f, 6b, 1]", hex);
    }

    #[test]
    fn errors_map_to_envelopes() {
        let not_found: Result<()> = Err(Error::not_found("No blogPost at x")).into();
        assert!(matches!(not_found, Result::NotFound(message) if message == "No blogPost at x"));

        let invalid: Result<()> = Err(Error::invalid("tags")).into();
        assert!(matches!(invalid, Result::InvalidCriteria(_)));

        let store: Result<()> = Err(Error::store("down")).into();
        assert!(matches!(store, Result::InternalServerError(())));
    }

    #[test]
    fn decodes_named_requests() {
        let bytes = rmp_serde::to_vec(&json!({
            "tag": "Retrieve",
            "value": { "type": "blogPost", "filter": { "tags": ["red"] }, "params": { "tag": "red" } }
        }))
        .unwrap();

        let Request::Retrieve(args) = rmp_serde::from_slice(&bytes).unwrap() else {
            panic!("expected a Retrieve request");
        };
        assert_eq!("blogPost", args.kind);
        assert_eq!(Some(&"red".to_owned()), args.params.get("tag"));
    }

    #[tokio::test]
    async fn missing_item_is_a_not_found_envelope() {
        let documents = ArcMutex::new(Keeper::from_documents([doc!({
            "_id": "1", "type": "blogPost", "slug": "here"
        })]));
        let request = rmp_serde::to_vec(&json!({
            "tag": "One",
            "value": { "type": "blogPost", "slug": "gone" }
        }))
        .unwrap();

        let out_buf = in_buf_2_out_buf(&documents, &Config::default(), &request).await;
        let response: serde_json::Value = rmp_serde::from_slice(&out_buf).unwrap();

        assert_eq!(json!(["NotFound", "No blogPost at gone"]), response);
    }
}
