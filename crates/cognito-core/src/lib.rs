use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cognito_api::AuthError;
use cognito_auth::{KeyStore, SessionResolver, TokenVerifier};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "auth.toml";
pub const CLIENT_ID_ENV: &str = "COGNITO_CLIENT_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_wait_ms: 10_000,
        }
    }
}

impl ExchangeSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    pub client_id: String,
    pub key_file: PathBuf,
    pub token_exchange_route: String,
    pub leeway_seconds: u64,
    pub exchange: ExchangeSettings,
}

impl AuthSettings {
    pub fn new(client_id: impl Into<String>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            client_id: client_id.into(),
            key_file: key_file.into(),
            token_exchange_route: "/token".to_string(),
            leeway_seconds: 0,
            exchange: ExchangeSettings::default(),
        }
    }

    /// Exact match against `token_exchange_route`.
    pub fn is_exchange_route(&self, path: &str) -> bool {
        path == self.token_exchange_route
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    client_id: String,
    #[serde(default = "default_key_file")]
    key_file: PathBuf,
    #[serde(default = "default_route")]
    token_exchange_route: String,
    #[serde(default)]
    leeway_seconds: u64,
    #[serde(default)]
    exchange: ExchangeSettings,
}

fn default_key_file() -> PathBuf {
    PathBuf::from("keys.json")
}

fn default_route() -> String {
    "/token".to_string()
}

pub fn validate_settings(settings: &AuthSettings) -> Result<(), AuthError> {
    if settings.client_id.trim().is_empty() {
        return Err(AuthError::Config(format!(
            "client_id is not set (set it in {SETTINGS_FILE} or {CLIENT_ID_ENV})"
        )));
    }
    if !settings.token_exchange_route.starts_with('/') {
        return Err(AuthError::Config(format!(
            "token_exchange_route must start with '/', got {}",
            settings.token_exchange_route
        )));
    }
    if settings.exchange.poll_interval_ms == 0 {
        return Err(AuthError::Config(
            "exchange.poll_interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("cognito")
    } else {
        PathBuf::from(".cognito")
    }
}

pub fn load_settings_from_dir(dir: &Path) -> Result<AuthSettings, AuthError> {
    load_settings_from_file(&dir.join(SETTINGS_FILE))
}

/// Load settings without validating them, so env overrides can still fill in
/// missing values. Relative key file paths resolve against the file's directory.
pub fn load_settings_from_file(path: &Path) -> Result<AuthSettings, AuthError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AuthError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    let raw: RawSettings = toml::from_str(&content)
        .map_err(|e| AuthError::Config(format!("invalid TOML in {}: {e}", path.display())))?;

    let key_file = if raw.key_file.is_relative() {
        path.parent()
            .map_or_else(|| raw.key_file.clone(), |dir| dir.join(&raw.key_file))
    } else {
        raw.key_file
    };

    Ok(AuthSettings {
        client_id: raw.client_id,
        key_file,
        token_exchange_route: raw.token_exchange_route,
        leeway_seconds: raw.leeway_seconds,
        exchange: raw.exchange,
    })
}

/// Apply overrides from a variable lookup (normally the process environment).
pub fn apply_overrides(
    mut settings: AuthSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> AuthSettings {
    if let Some(client_id) = lookup(CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("client id taken from {CLIENT_ID_ENV}");
        settings.client_id = client_id;
    }
    settings
}

pub fn apply_env_overrides(settings: AuthSettings) -> AuthSettings {
    apply_overrides(settings, |name| std::env::var(name).ok())
}

pub fn load_key_store(settings: &AuthSettings) -> Result<KeyStore, AuthError> {
    let store = KeyStore::from_file(&settings.key_file)
        .map_err(|e| AuthError::Config(format!("{}: {e}", settings.key_file.display())))?;
    if store.is_empty() {
        tracing::warn!(
            key_file = %settings.key_file.display(),
            "key store is empty, every session will resolve to signed out"
        );
    }
    Ok(store)
}

/// Validate settings, load the key store once and build the resolver shared
/// by every request.
pub fn build_resolver(settings: &AuthSettings) -> Result<SessionResolver, AuthError> {
    validate_settings(settings)?;
    let keys = Arc::new(load_key_store(settings)?);
    tracing::info!(
        keys = keys.len(),
        client_id = %settings.client_id,
        "session resolver ready"
    );
    let resolver = SessionResolver::new(keys, settings.client_id.clone())
        .map_err(|e| AuthError::Config(e.to_string()))?;
    Ok(resolver.with_verifier(TokenVerifier::default().with_leeway(settings.leeway_seconds)))
}

pub fn write_default_config_files(dir: &Path) -> Result<(), AuthError> {
    fs::create_dir_all(dir)
        .map_err(|e| AuthError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let files: [(&str, &str); 2] = [
        (
            SETTINGS_FILE,
            include_str!("../../../docs/cognito/examples/auth.toml.example"),
        ),
        (
            "keys.json",
            include_str!("../../../docs/cognito/examples/keys.json.example"),
        ),
    ];

    for (name, body) in files {
        let path = dir.join(name);
        if !path.exists() {
            fs::write(&path, body).map_err(|e| {
                AuthError::Internal(format!("failed to write {}: {e}", path.display()))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SETTINGS_FILE, "client_id = \"abc\"\n");

        let settings = load_settings_from_dir(dir.path()).unwrap();
        assert_eq!(settings.client_id, "abc");
        assert_eq!(settings.key_file, dir.path().join("keys.json"));
        assert_eq!(settings.token_exchange_route, "/token");
        assert!(settings.is_exchange_route("/token"));
        assert!(!settings.is_exchange_route("/token/"));
        assert!(!settings.is_exchange_route("/orders"));
        assert_eq!(settings.exchange, ExchangeSettings::default());
        assert_eq!(settings.exchange.poll_interval(), Duration::from_millis(100));
        validate_settings(&settings).unwrap();
    }

    #[test]
    fn missing_client_id_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SETTINGS_FILE, "key_file = \"/etc/keys.json\"\n");

        let settings = load_settings_from_dir(dir.path()).unwrap();
        assert_eq!(settings.key_file, PathBuf::from("/etc/keys.json"));
        assert!(matches!(validate_settings(&settings), Err(AuthError::Config(_))));
        assert!(matches!(build_resolver(&settings), Err(AuthError::Config(_))));
    }

    #[test]
    fn override_supplies_client_id() {
        let settings = AuthSettings::new("", "keys.json");
        let settings = apply_overrides(settings, |name| {
            (name == CLIENT_ID_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(settings.client_id, "from-env");

        let kept = apply_overrides(AuthSettings::new("file", "keys.json"), |_| Some("  ".into()));
        assert_eq!(kept.client_id, "file");
    }

    #[test]
    fn bad_route_and_interval_are_rejected() {
        let mut settings = AuthSettings::new("abc", "keys.json");
        settings.token_exchange_route = "token".to_string();
        assert!(validate_settings(&settings).is_err());

        let mut settings = AuthSettings::new("abc", "keys.json");
        settings.exchange.poll_interval_ms = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SETTINGS_FILE, "client_id = [");
        assert!(matches!(
            load_settings_from_dir(dir.path()),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            load_settings_from_dir(&dir.path().join("missing")),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn init_writes_files_once() {
        let dir = tempfile::tempdir().unwrap();
        write_default_config_files(dir.path()).unwrap();
        assert!(dir.path().join(SETTINGS_FILE).exists());

        write(dir.path(), SETTINGS_FILE, "client_id = \"kept\"\n");
        write_default_config_files(dir.path()).unwrap();
        let settings = load_settings_from_dir(dir.path()).unwrap();
        assert_eq!(settings.client_id, "kept");
        assert!(load_key_store(&settings).unwrap().is_empty());
    }

    #[test]
    fn resolver_uses_key_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.json", "{}");
        write(dir.path(), SETTINGS_FILE, "client_id = \"abc\"\nleeway_seconds = 5\n");

        let settings = load_settings_from_dir(dir.path()).unwrap();
        let resolver = build_resolver(&settings).unwrap();
        assert_eq!(resolver.client_id(), "abc");
        assert!(resolver.keys().is_empty());
        assert!(resolver.resolve(None).is_none());
    }
}
