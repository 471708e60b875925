//! Загрузка конфигурации подключения.
//!
//! Источники: переменные окружения и явные значения. Явные значения
//! перекрывают окружение. Всё обязательное проверяется здесь, до любого
//! сетевого вызова.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use quote_core::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};

use crate::error::ConfigError;

/// Адрес провайдера: `host`, `host:port`, `tcp://host:port`, `[::1]:port`
pub const ENV_ENDPOINT: &str = "ENDPOINT";
pub const ENV_APP_KEY: &str = "APP_KEY";
pub const ENV_APP_SECRET: &str = "APP_SECRET";
/// Необязательный токен доступа
pub const ENV_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
/// Таймауты в миллисекундах, необязательные
pub const ENV_CONNECT_TIMEOUT_MS: &str = "CONNECT_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";

/// Верхняя граница для обоих таймаутов
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Хост и порт провайдера
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Разбирает адрес; без порта берётся [`DEFAULT_PORT`]
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let s = raw.trim();
        let s = s.strip_prefix("tcp://").unwrap_or(s);
        if s.is_empty() {
            return Err(ConfigError::MissingField(ENV_ENDPOINT));
        }

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Self {
                host: addr.ip().to_string(),
                port: addr.port(),
            });
        }

        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: ENV_ENDPOINT,
            reason: format!("{reason}: {raw:?}"),
        };

        if s.contains(char::is_whitespace) || s.contains('/') {
            return Err(invalid("malformed endpoint"));
        }

        match s.rsplit_once(':') {
            // голый IPv6 без порта ("::1")
            Some((host, _)) if host.contains(':') => Ok(Self {
                host: s.trim_matches(&['[', ']'][..]).to_string(),
                port: DEFAULT_PORT,
            }),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(invalid("empty host"));
                }
                let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;
                if port == 0 {
                    return Err(invalid("port must be non-zero"));
                }
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Учётные данные приложения. В `Debug` секреты скрыты.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    app_key: String,
    app_secret: String,
    access_token: Option<String>,
}

impl Credentials {
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Готовая к использованию конфигурация (неизменяемая)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    endpoint: Endpoint,
    credentials: Credentials,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Configuration {
    /// Конфигурация только из переменных окружения процесса
    pub fn from_env() -> Result<Self, ConfigError> {
        load(ConfigSource::Environment)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Проверка формы полей: непустой хост, непустые учётные данные
    /// без пробелов (они идут в строку `AUTH`), ненулевые таймауты
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ConfigError::MissingField(ENV_ENDPOINT));
        }
        check_token(ENV_APP_KEY, &self.credentials.app_key)?;
        check_token(ENV_APP_SECRET, &self.credentials.app_secret)?;
        if let Some(token) = &self.credentials.access_token {
            check_token(ENV_ACCESS_TOKEN, token)?;
        }
        check_timeout(ENV_CONNECT_TIMEOUT_MS, self.connect_timeout)?;
        check_timeout(ENV_REQUEST_TIMEOUT_MS, self.request_timeout)?;
        Ok(())
    }
}

/// Явно заданные значения. Незаданные поля (`None`) берутся из
/// окружения, если источник это допускает.
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    pub endpoint: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_token: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

impl ConfigValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = Some(app_key.into());
        self
    }

    pub fn app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Откуда брать конфигурацию
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Только переменные окружения
    Environment,
    /// Только явные значения, окружение не читается
    Explicit(ConfigValues),
    /// Явные значения поверх окружения
    Layered(ConfigValues),
}

/// Загружает конфигурацию из окружения процесса и/или явных значений
pub fn load(source: ConfigSource) -> Result<Configuration, ConfigError> {
    load_with(source, |name| std::env::var(name).ok())
}

/// Как [`load`], но переменные окружения читаются через `lookup`
pub fn load_with<F>(source: ConfigSource, lookup: F) -> Result<Configuration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (explicit, use_env) = match source {
        ConfigSource::Environment => (ConfigValues::default(), true),
        ConfigSource::Explicit(values) => (values, false),
        ConfigSource::Layered(values) => (values, true),
    };

    let env = |name: &str| -> Option<String> {
        if !use_env {
            return None;
        }
        lookup(name).filter(|v| !v.trim().is_empty())
    };

    let resolve = |value: Option<String>, name: &'static str| -> Result<String, ConfigError> {
        value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env(name))
            .map(|v| v.trim().to_string())
            .ok_or(ConfigError::MissingField(name))
    };

    let resolve_timeout = |value: Option<Duration>,
                           name: &'static str,
                           default: Duration|
     -> Result<Duration, ConfigError> {
        match value {
            Some(d) => Ok(d),
            None => match env(name) {
                Some(raw) => parse_millis(name, &raw),
                None => Ok(default),
            },
        }
    };

    let endpoint = Endpoint::parse(&resolve(explicit.endpoint, ENV_ENDPOINT)?)?;
    let app_key = resolve(explicit.app_key, ENV_APP_KEY)?;
    let app_secret = resolve(explicit.app_secret, ENV_APP_SECRET)?;
    let access_token = resolve(explicit.access_token, ENV_ACCESS_TOKEN).ok();

    let connect_timeout = resolve_timeout(
        explicit.connect_timeout,
        ENV_CONNECT_TIMEOUT_MS,
        DEFAULT_CONNECT_TIMEOUT,
    )?;
    let request_timeout = resolve_timeout(
        explicit.request_timeout,
        ENV_REQUEST_TIMEOUT_MS,
        DEFAULT_REQUEST_TIMEOUT,
    )?;

    let config = Configuration {
        endpoint,
        credentials: Credentials {
            app_key,
            app_secret,
            access_token,
        },
        connect_timeout,
        request_timeout,
    };
    config.validate()?;
    Ok(config)
}

fn parse_millis(field: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue {
            field,
            reason: format!("expected milliseconds, got {raw:?}"),
        })
}

fn check_token(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if value.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not contain whitespace".to_string(),
        });
    }
    Ok(())
}

fn check_timeout(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "timeout must be non-zero".to_string(),
        });
    }
    if value > MAX_TIMEOUT {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("timeout {value:?} exceeds {MAX_TIMEOUT:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_ENDPOINT, "quotes.example.com"),
            (ENV_APP_KEY, "abc"),
            (ENV_APP_SECRET, "xyz"),
        ]
    }

    #[test]
    fn environment_source_resolves_required_fields_and_defaults() {
        let cfg = load_with(ConfigSource::Environment, env_of(&full_env())).unwrap();

        assert_eq!(cfg.endpoint().host(), "quotes.example.com");
        assert_eq!(cfg.endpoint().port(), DEFAULT_PORT);
        assert_eq!(cfg.credentials().app_key(), "abc");
        assert_eq!(cfg.credentials().app_secret(), "xyz");
        assert_eq!(cfg.credentials().access_token(), None);
        assert_eq!(cfg.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(cfg.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn missing_secret_is_reported_by_env_name() {
        let env = env_of(&[(ENV_ENDPOINT, "quotes.example.com"), (ENV_APP_KEY, "abc")]);
        let err = load_with(ConfigSource::Environment, env).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("APP_SECRET"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = full_env();
        pairs.push((ENV_APP_KEY, "   "));
        let env = env_of(&pairs);
        let err = load_with(ConfigSource::Environment, env).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("APP_KEY"));
    }

    #[test]
    fn layered_explicit_values_override_environment() {
        let values = ConfigValues::new()
            .endpoint("127.0.0.1:7000")
            .app_secret("override")
            .request_timeout(Duration::from_millis(250));
        let cfg = load_with(ConfigSource::Layered(values), env_of(&full_env())).unwrap();

        assert_eq!(cfg.endpoint().to_string(), "127.0.0.1:7000");
        assert_eq!(cfg.credentials().app_key(), "abc");
        assert_eq!(cfg.credentials().app_secret(), "override");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn explicit_source_ignores_environment() {
        let values = ConfigValues::new().endpoint("localhost").app_key("k");
        let err = load_with(ConfigSource::Explicit(values), env_of(&full_env())).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("APP_SECRET"));
    }

    #[test]
    fn timeouts_from_environment() {
        let mut pairs = full_env();
        pairs.push((ENV_CONNECT_TIMEOUT_MS, "1500"));
        pairs.push((ENV_REQUEST_TIMEOUT_MS, "200"));
        let cfg = load_with(ConfigSource::Environment, env_of(&pairs)).unwrap();
        assert_eq!(cfg.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.request_timeout(), Duration::from_millis(200));

        let mut pairs = full_env();
        pairs.push((ENV_REQUEST_TIMEOUT_MS, "soon"));
        let err = load_with(ConfigSource::Environment, env_of(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: ENV_REQUEST_TIMEOUT_MS,
                ..
            }
        ));

        let mut pairs = full_env();
        pairs.push((ENV_CONNECT_TIMEOUT_MS, "0"));
        let err = load_with(ConfigSource::Environment, env_of(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn oversized_timeouts_are_rejected() {
        let values = ConfigValues::new().request_timeout(Duration::MAX);
        let err = load_with(ConfigSource::Layered(values), env_of(&full_env())).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { field: ENV_REQUEST_TIMEOUT_MS, .. }),
            "{err:?}"
        );

        let values = ConfigValues::new().connect_timeout(MAX_TIMEOUT + Duration::from_millis(1));
        let err = load_with(ConfigSource::Layered(values), env_of(&full_env())).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { field: ENV_CONNECT_TIMEOUT_MS, .. }),
            "{err:?}"
        );

        let mut pairs = full_env();
        pairs.push((ENV_REQUEST_TIMEOUT_MS, "18446744073709551615"));
        let err = load_with(ConfigSource::Environment, env_of(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err:?}");

        let values = ConfigValues::new().request_timeout(MAX_TIMEOUT);
        let cfg = load_with(ConfigSource::Layered(values), env_of(&full_env())).unwrap();
        assert_eq!(cfg.request_timeout(), MAX_TIMEOUT);
    }

    #[test]
    fn credentials_with_whitespace_are_rejected() {
        let values = ConfigValues::new()
            .endpoint("localhost")
            .app_key("a b")
            .app_secret("s");
        let err = load_with(ConfigSource::Explicit(values), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: ENV_APP_KEY, .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut pairs = full_env();
        pairs.push((ENV_ACCESS_TOKEN, "tok-123"));
        let cfg = load_with(ConfigSource::Environment, env_of(&pairs)).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("xyz"), "{dbg}");
        assert!(!dbg.contains("tok-123"), "{dbg}");
        assert!(dbg.contains("REDACTED"), "{dbg}");
    }

    #[test]
    fn endpoint_forms() {
        let e = Endpoint::parse("tcp://quotes.example.com:6000").unwrap();
        assert_eq!((e.host(), e.port()), ("quotes.example.com", 6000));

        let e = Endpoint::parse("[::1]:7000").unwrap();
        assert_eq!((e.host(), e.port()), ("::1", 7000));
        assert_eq!(e.to_string(), "[::1]:7000");

        let e = Endpoint::parse("::1").unwrap();
        assert_eq!((e.host(), e.port()), ("::1", DEFAULT_PORT));

        assert!(matches!(
            Endpoint::parse("host:notaport"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Endpoint::parse(":5555"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Endpoint::parse("http://x/y"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            Endpoint::parse("  "),
            Err(ConfigError::MissingField(ENV_ENDPOINT))
        );
    }
}
