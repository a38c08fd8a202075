//! Connection settings for the MySQL collector.
//!
//! The agent hands the collector an untyped section with string fields
//! (`mysql_server`, `mysql_port`, `mysql_user`, `mysql_pass`, `mysql_slave`).
//! [`RawConfig::preliminaries`] turns it into a [`MySqlConfig`] or reports
//! which field is missing. A missing field means "not configured", never a
//! collection failure.

use std::path::Path;

use serde::Deserialize;

/// Port used when `mysql_port` is absent or empty.
pub const DEFAULT_PORT: u16 = 3306;

/// Error returned when the raw section cannot be used to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required field is absent or empty.
    Missing(&'static str),
    /// `mysql_port` is set but is not a valid TCP port.
    InvalidPort(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(field) => write!(f, "mysql: {} not set", field),
            ConfigError::InvalidPort(port) => write!(f, "mysql: invalid port '{}'", port),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error loading a raw section from a JSON file.
#[derive(Debug)]
pub enum ConfigFileError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFileError::Io(e) => write!(f, "cannot read config file: {}", e),
            ConfigFileError::Parse(e) => write!(f, "cannot parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigFileError {}

/// Untyped configuration section, as delivered by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub mysql_server: Option<String>,
    #[serde(default)]
    pub mysql_port: Option<String>,
    #[serde(default)]
    pub mysql_user: Option<String>,
    #[serde(default)]
    pub mysql_pass: Option<String>,
    #[serde(default)]
    pub mysql_slave: Option<String>,
}

/// Agent configuration file layout, with the section under `MySQLServer`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Wrapped {
        #[serde(rename = "MySQLServer")]
        section: RawConfig,
    },
    Bare(RawConfig),
}

/// Validated connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Collect replication lag from `SHOW SLAVE STATUS`.
    pub slave_mode: bool,
}

impl std::fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("slave_mode", &self.slave_mode)
            .finish()
    }
}

impl RawConfig {
    /// Loads the section from a JSON file.
    ///
    /// Accepts both the bare section and the agent layout where the section
    /// is nested under a `MySQLServer` key.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(ConfigFileError::Io)?;
        Self::from_json_str(&content)
    }

    /// Parses the section from JSON text. See [`RawConfig::from_json_file`].
    pub fn from_json_str(content: &str) -> Result<Self, ConfigFileError> {
        let file: ConfigFile = serde_json::from_str(content).map_err(ConfigFileError::Parse)?;
        Ok(match file {
            ConfigFile::Wrapped { section } => section,
            ConfigFile::Bare(section) => section,
        })
    }

    /// Fills fields that are unset here from `fallback`.
    pub fn or(self, fallback: RawConfig) -> RawConfig {
        RawConfig {
            mysql_server: self.mysql_server.or(fallback.mysql_server),
            mysql_port: self.mysql_port.or(fallback.mysql_port),
            mysql_user: self.mysql_user.or(fallback.mysql_user),
            mysql_pass: self.mysql_pass.or(fallback.mysql_pass),
            mysql_slave: self.mysql_slave.or(fallback.mysql_slave),
        }
    }

    /// Checks required fields and applies defaults.
    ///
    /// Host, user and password must be present and non-empty. An absent or
    /// empty port becomes [`DEFAULT_PORT`]. Slave mode is enabled only by the
    /// exact string `"true"`. Never touches the network.
    pub fn preliminaries(&self) -> Result<MySqlConfig, ConfigError> {
        let host = required(&self.mysql_server, "mysql_server")?;
        let user = required(&self.mysql_user, "mysql_user")?;
        let password = required(&self.mysql_pass, "mysql_pass")?;

        let port = match self.mysql_port.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PORT,
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(p.to_string()))?,
        };

        Ok(MySqlConfig {
            host,
            port,
            user,
            password,
            slave_mode: self.mysql_slave.as_deref() == Some("true"),
        })
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn full() -> RawConfig {
        RawConfig {
            mysql_server: Some("db.local".to_string()),
            mysql_port: Some("3307".to_string()),
            mysql_user: Some("monitor".to_string()),
            mysql_pass: Some("secret".to_string()),
            mysql_slave: None,
        }
    }

    #[test]
    fn preliminaries_accepts_complete_section() {
        let cfg = full().preliminaries().unwrap();
        assert_eq!(cfg.host, "db.local");
        assert_eq!(cfg.port, 3307);
        assert_eq!(cfg.user, "monitor");
        assert_eq!(cfg.password, "secret");
        assert!(!cfg.slave_mode);
    }

    #[test]
    fn preliminaries_defaults_port() {
        let mut raw = full();
        raw.mysql_port = None;
        assert_eq!(raw.preliminaries().unwrap().port, DEFAULT_PORT);

        raw.mysql_port = Some(String::new());
        assert_eq!(raw.preliminaries().unwrap().port, DEFAULT_PORT);
    }

    #[test]
    fn preliminaries_reports_missing_fields() {
        let mut raw = full();
        raw.mysql_user = None;
        assert_eq!(
            raw.preliminaries(),
            Err(ConfigError::Missing("mysql_user"))
        );

        let mut raw = full();
        raw.mysql_pass = Some(String::new());
        assert_eq!(
            raw.preliminaries(),
            Err(ConfigError::Missing("mysql_pass"))
        );

        let mut raw = full();
        raw.mysql_server = Some(String::new());
        assert_eq!(
            raw.preliminaries(),
            Err(ConfigError::Missing("mysql_server"))
        );
    }

    #[test]
    fn preliminaries_rejects_bad_port() {
        let mut raw = full();
        raw.mysql_port = Some("abc".to_string());
        assert_eq!(
            raw.preliminaries(),
            Err(ConfigError::InvalidPort("abc".to_string()))
        );
    }

    #[test]
    fn slave_mode_requires_literal_true() {
        let mut raw = full();
        raw.mysql_slave = Some("true".to_string());
        assert!(raw.preliminaries().unwrap().slave_mode);

        raw.mysql_slave = Some("yes".to_string());
        assert!(!raw.preliminaries().unwrap().slave_mode);
    }

    #[test]
    fn debug_hides_password() {
        let cfg = full().preliminaries().unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn json_wrapped_and_bare_sections_match() {
        let wrapped = r#"{"MySQLServer": {"mysql_server": "h", "mysql_user": "u", "mysql_pass": "p"}}"#;
        let bare = r#"{"mysql_server": "h", "mysql_user": "u", "mysql_pass": "p"}"#;
        let a = RawConfig::from_json_str(wrapped).unwrap();
        let b = RawConfig::from_json_str(bare).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mysql_server.as_deref(), Some("h"));
    }

    #[test]
    fn json_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"MySQLServer": {{"mysql_server": "db", "mysql_port": "3310", "mysql_user": "u", "mysql_pass": "p", "mysql_slave": "true"}}}}"#
        )
        .unwrap();

        let raw = RawConfig::from_json_file(file.path()).unwrap();
        let cfg = raw.preliminaries().unwrap();
        assert_eq!(cfg.port, 3310);
        assert!(cfg.slave_mode);
    }

    #[test]
    fn json_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RawConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigFileError::Io(_)));
    }

    #[test]
    fn or_prefers_explicit_values() {
        let explicit = RawConfig {
            mysql_user: Some("admin".to_string()),
            ..RawConfig::default()
        };
        let merged = explicit.or(full());
        assert_eq!(merged.mysql_user.as_deref(), Some("admin"));
        assert_eq!(merged.mysql_server.as_deref(), Some("db.local"));
    }
}
