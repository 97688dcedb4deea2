/// Configuration management for the API server
///
/// Loaded from environment variables; a `.env` file is read first when
/// present (development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: host to bind to (default: 0.0.0.0)
/// - `API_PORT`: port to bind to (default: 8080, `PORT` as fallback)
/// - `CORS_ORIGINS`: comma separated allowed origins (default: `*`)
/// - `PAGE_SIZE`: items per listing page (default: 20)
/// - `MAILJET_API_KEY`, `MAILJET_API_SECRET`, `MAILJET_SENDER_EMAIL`,
///   `MAILJET_SENDER`: Mailjet delivery, all or none
/// - `MAIL_TIMEOUT_SECONDS`: bound on one send (default: 10)
/// - `VERIFICATION_CODE_TTL_SECONDS`: login code lifetime (default: 900)
///
/// # Example
///
/// ```no_run
/// use vuedoo_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use vuedoo_shared::login::LoginSettings;
use vuedoo_shared::mail::MailjetConfig;

/// Signature used when `MAILJET_SENDER` is unset
pub const DEFAULT_SENDER_NAME: &str = "The Vuedoo Team";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub login: LoginConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Items per page of workspace and thread listings
    pub page_size: i64,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Outbound mail configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Mailjet credentials; `None` logs mail instead of sending it
    pub mailjet: Option<MailjetCredentials>,

    /// Name shown as sender and in email signatures
    pub sender_name: String,

    pub timeout_seconds: u64,
}

/// Mailjet API credentials
#[derive(Clone)]
pub struct MailjetCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub sender_email: String,
}

impl std::fmt::Debug for MailjetCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailjetCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("sender_email", &self.sender_email)
            .finish()
    }
}

/// Login flow configuration
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub code_ttl_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, a numeric variable does
    /// not parse, or Mailjet is only partially configured.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url =
            get("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let port = match get("API_PORT").or_else(|| get("PORT")) {
            Some(raw) => parse_var::<u16>("API_PORT", &raw)?,
            None => 8080,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let page_size = parse_or("PAGE_SIZE", get("PAGE_SIZE"), 20i64)?;
        if page_size < 1 {
            anyhow::bail!("PAGE_SIZE must be at least 1");
        }

        let mailjet_parts = [
            get("MAILJET_API_KEY"),
            get("MAILJET_API_SECRET"),
            get("MAILJET_SENDER_EMAIL"),
        ];
        let mailjet = match mailjet_parts {
            [Some(api_key), Some(api_secret), Some(sender_email)] => Some(MailjetCredentials {
                api_key,
                api_secret,
                sender_email,
            }),
            [None, None, None] => None,
            _ => anyhow::bail!(
                "MAILJET_API_KEY, MAILJET_API_SECRET and MAILJET_SENDER_EMAIL must be set together"
            ),
        };

        Ok(Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
                cors_origins,
                page_size,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10u32)?,
            },
            mail: MailConfig {
                mailjet,
                sender_name: get("MAILJET_SENDER").unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
                timeout_seconds: parse_or("MAIL_TIMEOUT_SECONDS", get("MAIL_TIMEOUT_SECONDS"), 10u64)?,
            },
            login: LoginConfig {
                code_ttl_seconds: parse_or(
                    "VERIFICATION_CODE_TTL_SECONDS",
                    get("VERIFICATION_CODE_TTL_SECONDS"),
                    900u64,
                )?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when any origin is allowed
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }

    pub fn login_settings(&self) -> LoginSettings {
        LoginSettings {
            code_ttl: Duration::from_secs(self.login.code_ttl_seconds),
            sender_name: self.mail.sender_name.clone(),
        }
    }

    /// Mailjet settings, if delivery is configured
    pub fn mailjet(&self) -> Option<MailjetConfig> {
        self.mail.mailjet.as_ref().map(|creds| {
            MailjetConfig::new(
                creds.api_key.clone(),
                creds.api_secret.clone(),
                creds.sender_email.clone(),
                self.mail.sender_name.clone(),
            )
            .with_timeout(Duration::from_secs(self.mail.timeout_seconds))
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_var(key, &raw),
        None => Ok(default),
    }
}
