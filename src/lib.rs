#![allow(incomplete_features)]
#![feature(proc_macro_hygiene, decl_macro, async_fn_in_trait)]

extern crate tracing_futures;

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use error::BackendError;
use mongodb::options::ClientOptions;
use mongodb::Client;
use rocket::http::Method;
use rocket::Rocket;
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use std::process::exit;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::ConfigurationError;
use crate::route::mount_api;
use crate::security::Security;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

pub async fn create(log_level: Option<Level>) -> Result<Rocket<rocket::Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Loading security information...");
    let security = Security::load();

    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let mut client_options = ClientOptions::parse(c.mongodb_uri.as_str())
        .await
        .expect("Unable to parse MongoDB URI! Is it valid?");
    // Bounded timeouts; an unreachable server surfaces as a transient
    // error within the request lifecycle.
    client_options.connect_timeout = Some(Duration::from_secs(5));
    client_options.server_selection_timeout = Some(Duration::from_secs(5));

    let client = Client::with_options(client_options).expect("Unable to init MongoDB client!");

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if db.list_collections(None, None).await.is_err() {
        tracing::error!("Unable to connect to MongoDB.");
        exit(1)
    }

    tracing::info!("Ensuring MongoDB indexes...");
    if let Err(err) = data::ensure_indexes(&db).await {
        tracing::warn!("Unable to ensure indexes: {}", err);
    }

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::build()
        .manage(c)
        .manage(security)
        .manage(client)
        .manage(db);

    tracing::info!("Setting up CORS...");
    let allowed_origins = AllowedOrigins::All;

    // You can also deserialize this
    let cors = rocket_cors::CorsOptions {
        allowed_origins,
        allowed_methods: vec![
            Method::Get,
            Method::Put,
            Method::Post,
            Method::Patch,
            Method::Delete,
        ]
        .into_iter()
        .map(From::from)
        .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()
    .expect("Unable to configure CORS.");

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}
