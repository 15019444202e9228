//! Database connection management

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

pub type DbPool = Pool;

/// Create a PostgreSQL connection pool
pub fn create_pool(
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
    max_connections: u32,
) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(host.to_string());
    cfg.port = Some(port);
    cfg.dbname = Some(database.to_string());
    cfg.user = Some(user.to_string());
    cfg.password = Some(password.to_string());

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections.max(1) as usize));

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

    log::debug!(
        "Created PostgreSQL pool for {}@{}:{}/{} (max {} connections)",
        user,
        host,
        port,
        database,
        max_connections
    );

    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1 as test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        Ok(())
    } else {
        anyhow::bail!("Database connection test failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_is_lazy() {
        // No connection is attempted until a client is requested
        let pool = create_pool("localhost", 5432, "tunetrace", "user", "pass", 4).unwrap();
        assert_eq!(pool.status().max_size, 4);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL to be running
    async fn test_create_pool() {
        let pool = create_pool(
            "localhost",
            5432,
            "tunetrace",
            "tunetrace_user",
            "tunetrace_pass",
            10,
        )
        .unwrap();
        assert!(test_connection(&pool).await.is_ok());
    }
}
