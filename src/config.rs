//! Runtime configuration, read from flags or the environment.

use clap::Parser;
use std::net::SocketAddr;

#[derive(Debug, Clone, Parser)]
#[command(name = "tienda-api", version, about = "Storefront backend with manual payment verification")]
pub struct Config {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Secret used to sign bearer tokens.
    #[arg(long, env = "JWT_SECRET", default_value = "fallback-secret-key", hide_env_values = true)]
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    #[arg(long, env = "JWT_EXPIRES_IN", default_value_t = 86_400)]
    pub jwt_expires_in: i64,

    /// Address the HTTP server listens on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: SocketAddr,

    /// Maximum connections in the Postgres pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Flat shipping cost in centavos applied to every order.
    #[arg(long, env = "ENVIO", default_value_t = 0)]
    pub envio: i64,
}
