use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

/// Env var holding the course-system service token. Preferred over putting
/// the token in the config file.
pub const CANVAS_TOKEN_ENV: &str = "COURSELISTS_CANVAS_TOKEN";

#[derive(Debug, Parser)]
#[command(
    name = "courselists",
    version,
    about = "Course mailing-list service for an educational administration portal"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Base URL of the external course system, e.g. https://canvas.example.edu
    #[arg(long, value_name = "URL")]
    pub canvas_base_url: Option<String>,

    /// Domain new mailing lists are created under.
    #[arg(long, value_name = "DOMAIN")]
    pub list_domain: Option<String>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub canvas_base_url: String,
    pub canvas_token: String,
    pub list_domain: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("no course system base URL configured; pass --canvas-base-url or set canvas_base_url in the config file")]
    MissingBaseUrl,
    #[error("no course system token configured; set {CANVAS_TOKEN_ENV} or canvas_token in the config file")]
    MissingToken,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    canvas_base_url: Option<String>,
    canvas_token: Option<String>,
    list_domain: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8288)));
        let canvas_base_url = cli
            .canvas_base_url
            .or(from_file.canvas_base_url)
            .ok_or(ConfigError::MissingBaseUrl)?;
        let canvas_token = read_env_string(CANVAS_TOKEN_ENV)
            .or(from_file.canvas_token)
            .ok_or(ConfigError::MissingToken)?;
        let list_domain = cli
            .list_domain
            .or(from_file.list_domain)
            .unwrap_or_else(|| String::from("lists.example.edu"));

        Ok(Self {
            bind,
            canvas_base_url,
            canvas_token,
            list_domain,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::tempdir;

    use super::{AppConfig, Cli, ConfigError};

    fn cli_with_config(path: Option<std::path::PathBuf>) -> Cli {
        Cli {
            bind: None,
            canvas_base_url: None,
            list_domain: None,
            config: path,
        }
    }

    #[test]
    fn file_config_fills_in_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courselists.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:9000\"\ncanvas_base_url = \"https://lms.test\"\ncanvas_token = \"tok\"\nlist_domain = \"lists.test\"\n",
        )
        .unwrap();

        let config = AppConfig::from_cli(cli_with_config(Some(path))).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.canvas_base_url, "https://lms.test");
        assert_eq!(config.canvas_token, "tok");
        assert_eq!(config.list_domain, "lists.test");
    }

    #[test]
    fn cli_overrides_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courselists.toml");
        std::fs::write(
            &path,
            "canvas_base_url = \"https://lms.test\"\ncanvas_token = \"tok\"\nlist_domain = \"lists.test\"\n",
        )
        .unwrap();

        let mut cli = cli_with_config(Some(path));
        cli.canvas_base_url = Some(String::from("https://other.test"));
        cli.list_domain = Some(String::from("other.test"));

        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.canvas_base_url, "https://other.test");
        assert_eq!(config.list_domain, "other.test");
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let result = AppConfig::from_cli(cli_with_config(None));
        assert!(matches!(result, Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn missing_token_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courselists.toml");
        std::fs::write(&path, "canvas_base_url = \"https://lms.test\"\n").unwrap();

        let result = AppConfig::from_cli(cli_with_config(Some(path)));
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }
}
