use std::sync::RwLock;
use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Nullable, Text};
use tracing::{debug, info};

use super::{normalize_identifier, IdentityResolver, ResolveError, ResolvedIdentity};
use crate::config::IdentityConfig;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, QueryableByName)]
struct DisplayNameRow {
    #[diesel(sql_type = Nullable<Text>)]
    display_name: Option<String>,
}

/// Applies a server-side deadline to every statement on a pooled connection.
#[derive(Debug)]
struct StatementTimeout(u64);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// PostgreSQL-backed resolver owning a bounded r2d2 connection pool.
///
/// Checkouts wait at most `connection_timeout`; a full pool surfaces as
/// [`ResolveError::PoolExhausted`] rather than blocking the batch.
pub struct PgIdentityResolver {
    pool: RwLock<PgPool>,
    database_url: String,
    query: String,
    max_size: u32,
    connection_timeout: Duration,
    statement_timeout: Duration,
}

impl PgIdentityResolver {
    pub fn new(config: &IdentityConfig, database_url: &str) -> Result<Self, ResolveError> {
        let query = lookup_query(config)?;
        let max_size = config.pool_max_size.max(1);
        let connection_timeout = Duration::from_secs(config.connection_timeout_secs.max(1));
        let statement_timeout = Duration::from_millis(config.statement_timeout_ms);

        let pool = build_pool(database_url, max_size, connection_timeout, statement_timeout);
        debug!(max_size, query = query.as_str(), "Identity connection pool configured");

        Ok(Self {
            pool: RwLock::new(pool),
            database_url: database_url.to_string(),
            query,
            max_size,
            connection_timeout,
            statement_timeout,
        })
    }

    /// Grows the pool so every worker can hold a connection at once.
    pub fn ensure_capacity(mut self, workers: usize) -> Self {
        let needed = u32::try_from(workers).unwrap_or(u32::MAX);
        if needed > self.max_size {
            info!(
                from = self.max_size,
                to = needed,
                "Raising identity pool size to match worker count"
            );
            self.max_size = needed;
            self.pool = RwLock::new(self.fresh_pool());
        }
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn fresh_pool(&self) -> PgPool {
        build_pool(
            &self.database_url,
            self.max_size,
            self.connection_timeout,
            self.statement_timeout,
        )
    }

    fn current_pool(&self) -> Result<PgPool, ResolveError> {
        self.pool
            .read()
            .map(|pool| pool.clone())
            .map_err(|e| ResolveError::Unreachable(format!("pool lock poisoned: {}", e)))
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> Result<T, DieselError>,
    ) -> Result<T, ResolveError> {
        let pool = self.current_pool()?;
        let mut conn = pool.get().map_err(|e| self.classify_pool_error(&pool, e))?;
        f(&mut conn).map_err(|e| self.classify_query_error(e))
    }

    fn classify_pool_error(&self, pool: &PgPool, err: PoolError) -> ResolveError {
        let state = pool.state();
        if state.connections >= self.max_size && state.idle_connections == 0 {
            ResolveError::PoolExhausted {
                max_size: self.max_size,
            }
        } else {
            ResolveError::Unreachable(err.to_string())
        }
    }

    fn classify_query_error(&self, err: DieselError) -> ResolveError {
        match err {
            DieselError::DatabaseError(_, ref info) if info.message().contains("statement timeout") => {
                ResolveError::Timeout(self.statement_timeout)
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, ref info)
            | DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, ref info) => {
                ResolveError::Unreachable(info.message().to_string())
            }
            other => ResolveError::Query(other.to_string()),
        }
    }
}

impl IdentityResolver for PgIdentityResolver {
    fn resolve(&self, identifier: &str) -> Result<ResolvedIdentity, ResolveError> {
        let normalized = normalize_identifier(identifier);
        let row = self.with_connection(move |conn| {
            diesel::sql_query(self.query.as_str())
                .bind::<Text, _>(normalized)
                .get_result::<DisplayNameRow>(conn)
                .optional()
        })?;

        Ok(ResolvedIdentity {
            display_name: row
                .and_then(|row| row.display_name)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
    }

    fn health_check(&self) -> Result<(), ResolveError> {
        self.with_connection(|conn| diesel::sql_query("SELECT 1").execute(conn).map(|_| ()))
    }

    fn reclaim(&self) {
        let fresh = self.fresh_pool();
        match self.pool.write() {
            Ok(mut pool) => {
                let state = pool.state();
                debug!(
                    connections = state.connections,
                    idle = state.idle_connections,
                    "Recycling identity connection pool"
                );
                // The old pool closes once checked-out connections are returned.
                *pool = fresh;
            }
            Err(e) => tracing::error!("Identity pool lock poisoned: {}", e),
        }
    }
}

fn build_pool(
    database_url: &str,
    max_size: u32,
    connection_timeout: Duration,
    statement_timeout: Duration,
) -> PgPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connection_timeout(connection_timeout)
        .connection_customizer(Box::new(StatementTimeout(
            statement_timeout.as_millis() as u64,
        )))
        .build_unchecked(manager)
}

fn lookup_query(config: &IdentityConfig) -> Result<String, ResolveError> {
    for ident in [&config.table, &config.id_column, &config.name_column] {
        if !is_sql_identifier(ident) {
            return Err(ResolveError::InvalidQuery(format!(
                "'{}' is not a plain SQL identifier",
                ident
            )));
        }
    }
    Ok(format!(
        "SELECT {name}::text AS display_name FROM {table} WHERE UPPER({id}::text) = $1 LIMIT 1",
        name = config.name_column,
        table = config.table,
        id = config.id_column,
    ))
}

/// `name` or `schema.name`, ASCII letters, digits and underscores only.
fn is_sql_identifier(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
