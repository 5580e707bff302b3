use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Cookies checked for a host token after the `Authorization` header, in order.
    #[serde(default = "default_cookie_names")]
    pub cookie_names: Vec<String>,
}

fn default_cookie_names() -> Vec<String> {
    vec![
        "partner_token".to_string(),
        "hostAccessToken".to_string(),
        "accessToken".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CronConfig {
    /// When set, the sweep endpoint requires `Authorization: Bearer <secret>`.
    pub secret: Option<String>,
}

impl CronConfig {
    /// Empty strings count as unset.
    pub fn configured_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SweeperConfig {
    #[serde(default)]
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: default_event_capacity() }
    }
}

fn default_event_capacity() -> usize { 256 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `FLEETSHARE__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("FLEETSHARE").separator("__"))
            // Conventional names used by the hosting platform win over everything
            .set_override_option("cron.secret", env::var("CRON_SECRET").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document without touching files or the environment.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        port = 9000

        [database]
        url = "postgres://localhost/fleetshare_test"

        [auth]
        jwt_secret = "secret"
        jwt_expiration_seconds = 60
    "#;

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.auth.cookie_names, default_cookie_names());
        assert!(config.cron.configured_secret().is_none());
        assert_eq!(config.sweeper.interval_seconds, 0);
        assert_eq!(config.events.capacity, 256);
    }

    #[test]
    fn test_blank_cron_secret_is_unset() {
        let source = format!("{}\n[cron]\nsecret = \"\"\n", MINIMAL);
        let config = Config::from_toml(&source).unwrap();
        assert!(config.cron.configured_secret().is_none());

        let source = format!("{}\n[cron]\nsecret = \"tick\"\n", MINIMAL);
        let config = Config::from_toml(&source).unwrap();
        assert_eq!(config.cron.configured_secret(), Some("tick"));
    }
}
