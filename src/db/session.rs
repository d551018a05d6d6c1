use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tiberius::{AuthMethod, Client, Config as TdsConfig, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::Config;
use crate::error::ProbeError;
use crate::identity::CredentialChain;

/// OAuth scope covering the backing SQL endpoint.
pub const SQL_SCOPE: &str = "https://database.windows.net/.default";

const DEFAULT_SQL_PORT: u16 = 1433;

/// Opens one authenticated connection per call.
///
/// Each invocation fetches a fresh token from the credential chain and hands
/// it to the driver's federated-authentication attribute; the token never
/// appears in a connection string. Transport encryption is required and
/// certificate validation stays on — neither is configurable.
pub struct SessionFactory {
    server: Option<String>,
    database: Option<String>,
    entra_auth: bool,
    chain: CredentialChain,
    connect_timeout: Duration,
    gauge: SessionGauge,
}

/// An open, authenticated connection. Dropping it closes the socket and
/// releases its slot in the gauge, so release happens on every exit path.
pub struct DbSession {
    pub(crate) client: Client<Compat<TcpStream>>,
    _lease: SessionLease,
}

impl SessionFactory {
    pub fn new(cfg: &Config, chain: CredentialChain) -> Self {
        Self {
            server: cfg.sql_server.clone(),
            database: cfg.sql_database.clone(),
            entra_auth: cfg.entra_auth(),
            chain,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            gauge: SessionGauge::default(),
        }
    }

    pub async fn open_session(&self) -> Result<DbSession, ProbeError> {
        let server = self
            .server
            .as_deref()
            .ok_or(ProbeError::Configuration("SQL_SERVER is not set"))?;
        let database = self
            .database
            .as_deref()
            .ok_or(ProbeError::Configuration("SQL_DATABASE is not set"))?;
        if !self.entra_auth {
            return Err(ProbeError::Configuration(
                "only Entra ID authentication is supported",
            ));
        }

        let token = self.chain.acquire_token(SQL_SCOPE).await?;

        let (host, port) = parse_server_addr(server);
        let mut tds = TdsConfig::new();
        tds.host(host);
        tds.port(port);
        tds.database(database);
        tds.authentication(AuthMethod::aad_token(token.into_secret()));
        // Certificate validation stays on: no trust_cert() here, ever.
        tds.encryption(EncryptionLevel::Required);
        let addr = tds.get_addr();

        let client = tokio::time::timeout(self.connect_timeout, async move {
            let tcp = TcpStream::connect(addr)
                .await
                .map_err(|e| ProbeError::Connection(format!("tcp connect: {e}")))?;
            tcp.set_nodelay(true)
                .map_err(|e| ProbeError::Connection(format!("tcp options: {e}")))?;
            Client::connect(tds, tcp.compat_write())
                .await
                .map_err(|e| ProbeError::Connection(format!("tds handshake: {e}")))
        })
        .await
        .map_err(|_| {
            ProbeError::Connection(format!(
                "connect timed out after {}s",
                self.connect_timeout.as_secs()
            ))
        })??;

        let lease = self.gauge.lease();
        debug!(open_sessions = self.gauge.open_count(), "database session opened");
        Ok(DbSession {
            client,
            _lease: lease,
        })
    }
}

/// `host`, `host,port`, or `tcp:host,port`.
fn parse_server_addr(server: &str) -> (String, u16) {
    let stripped = server
        .strip_prefix("tcp:")
        .or_else(|| server.strip_prefix("TCP:"))
        .unwrap_or(server);
    match stripped.split_once(',') {
        Some((host, port)) => (
            host.to_string(),
            port.trim().parse().unwrap_or(DEFAULT_SQL_PORT),
        ),
        None => (stripped.to_string(), DEFAULT_SQL_PORT),
    }
}

/// Count of currently open sessions. Incremented when a session finishes its
/// handshake and decremented from the lease's `Drop`, so the count survives
/// early returns and panics alike.
#[derive(Clone, Default)]
pub struct SessionGauge(Arc<AtomicUsize>);

impl SessionGauge {
    pub fn open_count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn lease(&self) -> SessionLease {
        self.0.fetch_add(1, Ordering::SeqCst);
        SessionLease(Arc::clone(&self.0))
    }
}

struct SessionLease(Arc<AtomicUsize>);

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
