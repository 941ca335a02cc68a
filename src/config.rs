use std::{env, fmt::{Debug, Display}, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-only-chat-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub client_url: Option<String>,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
}

impl Config {
    pub fn load() -> Self {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, signing tokens with the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Self {
            port: try_load("PORT", "4040"),
            database_url: try_load("DATABASE_URL", "sqlite:chat.db"),
            jwt_secret,
            token_ttl: Duration::from_secs(try_load("TOKEN_TTL_SECS", "3600")),
            client_url: var("CLIENT_URL").ok().and_then(|raw| client_origin(&raw)),
            uploads_dir: PathBuf::from(try_load::<String>("UPLOADS_DIR", "uploads")),
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "10485760"),
            heartbeat_interval: Duration::from_millis(try_load("HEARTBEAT_INTERVAL_MS", "3000")),
            heartbeat_timeout: Duration::from_millis(try_load("HEARTBEAT_TIMEOUT_MS", "1000")),
            bcrypt_cost: try_load("BCRYPT_COST", "10"),
            cookie_secure: try_load("COOKIE_SECURE", "true"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4040,
            database_url: "sqlite:chat.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(3600),
            client_url: None,
            uploads_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            heartbeat_interval: Duration::from_millis(3000),
            heartbeat_timeout: Duration::from_millis(1000),
            bcrypt_cost: 10,
            cookie_secure: true,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Debug + Display,
{
    let raw = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        parse_default(default)
    })
}

fn parse_default<T: FromStr>(default: &str) -> T
where
    T::Err: Debug,
{
    default.parse().expect("Built-in config default misconfigured!")
}

/// Accepts `scheme://host[:port]`, dropping a trailing slash. CORS needs a
/// bare origin, so anything else is logged and ignored.
fn client_origin(raw: &str) -> Option<String> {
    let origin = raw.trim().trim_end_matches('/');
    let valid = match origin.split_once("://") {
        Some((scheme, authority)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !authority.is_empty()
                && !authority
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        }
        None => false,
    };

    if valid {
        Some(origin.to_string())
    } else {
        warn!("Invalid CLIENT_URL {raw:?}: expected scheme://host, allowing any origin");
        None
    }
}
