use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Default profile image ceiling (5 MiB).
const DEFAULT_PROFILE_IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
/// Default course image ceiling (10 MiB).
const DEFAULT_COURSE_IMAGE_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The secret used to sign session tokens.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// The address the HTTP server binds to.
    pub bind_address: IpAddr,
    /// The port the HTTP server listens on.
    pub port: u16,
    /// Directory where uploaded images are staged and served from.
    pub upload_dir: PathBuf,
    /// Token lifetime in hours. `None` issues tokens without an `exp` claim.
    pub token_ttl_hours: Option<i64>,
    /// Size ceiling for profile images.
    pub profile_image_max_bytes: u64,
    /// Size ceiling for course images.
    pub course_image_max_bytes: u64,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a `Config` from an arbitrary key lookup.
    ///
    /// `DATABASE_URL` and `JWT_SECRET` are mandatory; everything else falls
    /// back to a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set")?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .context("JWT_SECRET must be set")?;

        let bind_address = lookup("BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse()
            .context("Invalid BIND_ADDRESS")?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("Invalid PORT")?;

        let token_ttl_hours = match lookup("TOKEN_TTL_HOURS") {
            Some(raw) => {
                let hours: i64 = raw.parse().context("Invalid TOKEN_TTL_HOURS")?;
                if hours <= 0 {
                    anyhow::bail!("TOKEN_TTL_HOURS must be positive");
                }
                Some(hours)
            }
            None => None,
        };

        Ok(Self {
            database_url,
            jwt_secret: Zeroizing::new(jwt_secret.into_bytes()),
            bind_address,
            port,
            upload_dir: PathBuf::from(
                lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            ),
            token_ttl_hours,
            profile_image_max_bytes: parse_bytes(
                &lookup,
                "PROFILE_IMAGE_MAX_BYTES",
                DEFAULT_PROFILE_IMAGE_MAX_BYTES,
            )?,
            course_image_max_bytes: parse_bytes(
                &lookup,
                "COURSE_IMAGE_MAX_BYTES",
                DEFAULT_COURSE_IMAGE_MAX_BYTES,
            )?,
        })
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

fn parse_bytes<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}
