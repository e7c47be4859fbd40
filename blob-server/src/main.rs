mod auth;
mod errors;
mod metadata;
mod params;
mod services;

use std::io;
use std::sync::Arc;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use crate::metadata::SqliteMetadataStore;
use crate::params::Args;
use crate::services::blob_service::BlobService;
use crate::services::http_service::{configure, request_body_limit, AppState};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = args
        .blob_store()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .into_shared();
    let metadata = SqliteMetadataStore::open(args.database_path())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let blobs = BlobService::new(store, Arc::new(metadata), args.max_upload_bytes);
    let body_limit = request_body_limit(blobs.max_upload_bytes());
    tracing::info!(
        addr = %args.http_addr,
        backend = blobs.backend(),
        max_upload_bytes = blobs.max_upload_bytes(),
        "starting blob server"
    );

    let state = web::Data::new(AppState {
        blobs,
        auth_token: args.auth_token.clone(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(body_limit))
            .configure(configure)
    })
    .bind(args.http_addr.clone())?
    .run()
    .await
}
