use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use config::{Config, File, FileFormat};
use log::debug;
use serde::Deserialize;

use crate::cli::Args;

/// Values that may be persisted in the configuration file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub mm_url: Option<String>,
    pub mm_token: Option<String>,
    pub team: Option<String>,
}

/// Fully resolved connection parameters for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub url: String,
    pub token: String,
    pub team: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("team", &self.team)
            .finish()
    }
}

const CONFIG_FILE_NAME: &str = env!("CARGO_PKG_NAME");

// Function to get the XDG_CONFIG_HOME path
fn get_xdg_config_path() -> Option<PathBuf> {
    // First check XDG_CONFIG_HOME environment variable
    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config));
    }

    // If XDG_CONFIG_HOME is not set, fall back to $HOME/.config
    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home).join(".config"));
    }

    None
}

pub fn default_config_path() -> Option<PathBuf> {
    get_xdg_config_path().map(|dir| dir.join(CONFIG_FILE_NAME).join("config.toml"))
}

pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    Config::builder()
        .add_source(File::from(config_path).format(FileFormat::Toml))
        .build()
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config file {}", config_path.display()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolves the connection parameters, command line and environment first,
/// then the configuration file.
pub fn resolve_server_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let (config_path, settings) = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            (Some(path.clone()), load_settings(path)?)
        }
        None => match default_config_path() {
            Some(path) if path.exists() => {
                let settings = load_settings(&path)?;
                (Some(path), settings)
            }
            path => (path, Settings::default()),
        },
    };

    let file_hint = config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| format!("{CONFIG_FILE_NAME}/config.toml"));

    macro_rules! required {
        ($arg:expr, $setting:expr, $flag:literal, $env:literal, $key:literal) => {
            match non_empty($arg.clone()).or_else(|| non_empty($setting.clone())) {
                Some(value) => value,
                None => bail!(
                    "missing {}: pass {}, set {} or add `{}` to {}",
                    $key,
                    $flag,
                    $env,
                    $key,
                    file_hint
                ),
            }
        };
    }

    let url = required!(args.mm_url, settings.mm_url, "--mm-url", "MATTERMOST_URL", "mm_url");
    let token = required!(
        args.mm_token,
        settings.mm_token,
        "--mm-token",
        "MATTERMOST_TOKEN",
        "mm_token"
    );
    let team = required!(args.team, settings.team, "--team", "MATTERMOST_TEAM", "team");

    let server = ServerConfig {
        url: url.trim().trim_end_matches('/').to_string(),
        token: token.trim().to_string(),
        team: team.trim().to_string(),
    };

    debug!("resolved server config: {:?}", server);

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["mmlog", "general"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_file_values_fill_missing_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "mm_url = \"https://chat.example.com/\"\nmm_token = \"secret\"\nteam = \"eng\"\n",
        );

        let server = resolve_server_config(&args(&[
            "--config",
            &path,
            "--mm-url",
            "",
            "--mm-token",
            "",
            "--team",
            "",
        ]))
        .unwrap();

        assert_eq!(server.url, "https://chat.example.com");
        assert_eq!(server.token, "secret");
        assert_eq!(server.team, "eng");
    }

    #[test]
    fn test_args_take_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "mm_url = \"https://file.example.com\"\nmm_token = \"file\"\nteam = \"file-team\"\n",
        );

        let server = resolve_server_config(&args(&[
            "--config",
            &path,
            "--mm-url",
            "https://cli.example.com",
            "--mm-token",
            "cli",
            "--team",
            "cli-team",
        ]))
        .unwrap();

        assert_eq!(
            server,
            ServerConfig {
                url: "https://cli.example.com".to_string(),
                token: "cli".to_string(),
                team: "cli-team".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_team_names_its_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "mm_url = \"https://chat.example.com\"\n");

        let err = resolve_server_config(&args(&[
            "--config",
            &path,
            "--mm-token",
            "secret",
            "--team",
            "",
        ]))
        .unwrap_err()
        .to_string();

        assert!(err.contains("missing team"), "{err}");
        assert!(err.contains("--team"), "{err}");
        assert!(err.contains("MATTERMOST_TEAM"), "{err}");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = resolve_server_config(&args(&["--config", &missing.to_string_lossy()]))
            .unwrap_err()
            .to_string();

        assert!(err.contains("does not exist"), "{err}");
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "mm_url = [1, 2\n");

        let err = resolve_server_config(&args(&["--config", &path])).unwrap_err();

        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn test_debug_output_hides_token() {
        let server = ServerConfig {
            url: "https://chat.example.com".to_string(),
            token: "hunter2".to_string(),
            team: "eng".to_string(),
        };

        let rendered = format!("{server:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
