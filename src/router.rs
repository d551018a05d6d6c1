//! Router assembly and shared application state.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{QueryExecutor, SessionFactory};
use crate::error::ProbeError;
use crate::handlers;
use crate::identity::CredentialChain;
use crate::outbound::{DnsClient, Fetcher};

/// Shared state, cloneable across handlers via Arc-wrapped fields. Built
/// once at startup from the immutable configuration; nothing in here is
/// mutated by request handling.
#[derive(Clone)]
pub struct ProbeState {
    pub config: Arc<Config>,
    pub executor: Arc<QueryExecutor>,
    pub dns: Arc<DnsClient>,
    pub fetcher: Arc<Fetcher>,
}

impl ProbeState {
    pub fn new(config: Config) -> Result<Self, ProbeError> {
        let chain = CredentialChain::new(&config)?;
        let factory = SessionFactory::new(&config, chain);
        let executor = QueryExecutor::new(
            factory,
            Duration::from_secs(config.db_query_timeout_secs),
        );
        let dns = DnsClient::new(Duration::from_secs(config.dns_timeout_secs));
        let fetcher = Fetcher::new(Duration::from_secs(config.outbound_timeout_secs))?;
        Ok(Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            dns: Arc::new(dns),
            fetcher: Arc::new(fetcher),
        })
    }
}

/// Build the axum router with all diagnostic routes.
pub fn probe_router(state: ProbeState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::meta::root))
        .route("/api/healthcheck", get(handlers::meta::healthcheck))
        .route("/api/ip", get(handlers::meta::ip_info))
        .route("/api/sqlversion", get(handlers::sql::sql_version))
        .route("/api/sqlsrcip", get(handlers::sql::sql_source_ip))
        .route("/api/dns/{hostname}", get(handlers::net::dns_lookup))
        .route("/api/reversedns/{ip}", get(handlers::net::reverse_dns))
        .route("/api/curl", get(handlers::net::curl))
        .route("/api/pi", get(handlers::pi::compute_pi))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
