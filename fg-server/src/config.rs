use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load the configuration from a YAML file.
    pub fn load(yml_path: &str) -> anyhow::Result<Self> {
        let yml = std::fs::read_to_string(yml_path)?;
        let config = serde_yaml::from_str(&yml)?;
        Ok(config)
    }

    /// Build the configuration from `FG_*` environment variables (and `.env`), with defaults.
    pub fn from_env() -> Self {
        let var = |key: &str, default: &str| dotenvy::var(key).unwrap_or(default.into());
        Self {
            server: ServerConfig {
                address: var("FG_ADDRESS", "0.0.0.0:8000"),
                base_url: var("FG_BASE_URL", "http://localhost:8000"),
                tls: match (dotenvy::var("FG_TLS_CERT"), dotenvy::var("FG_TLS_KEY")) {
                    (Ok(cert_path), Ok(key_path)) => Some(TLSConfig {
                        cert_path,
                        key_path,
                    }),
                    _ => None,
                },
            },
            database: DatabaseConfig {
                path: var("FG_DATABASE_PATH", "data/foodgram.db"),
            },
            logging: LoggingConfig {
                directory: dotenvy::var("FG_LOG_DIR").ok(),
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Public origin used to build absolute links, such as short links
    pub base_url: String,
    pub tls: Option<TLSConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TLSConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LoggingConfig {
    /// Write daily-rotated JSON logs here instead of stdout
    pub directory: Option<String>,
}
