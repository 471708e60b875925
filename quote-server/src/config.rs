use std::io;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use quote_core::Symbol;

use crate::generator::GeneratorConfig;

const DEFAULT_SYMBOLS: &str = include_str!("../assets/symbols.txt");

pub const TCP_BIND_ADDR: &str = "0.0.0.0:5555";

/// Шаг цен по умолчанию
pub const QUOTE_INTERVAL: Duration = Duration::from_millis(500);

/// Сколько ждём строку AUTH от нового соединения
pub(crate) const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const TCP_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) type ClientId = u64;

/// Вселенная символов: файл или встроенный список
pub fn load_server_symbols(path: Option<&Path>) -> io::Result<Vec<Symbol>> {
    match path {
        Some(p) => quote_core::symbols::read_symbols_from_path(p),
        None => quote_core::symbols::read_symbols(Cursor::new(DEFAULT_SYMBOLS)),
    }
}

/// Учётные данные, которые провайдер ожидает в `AUTH`
#[derive(Debug, Clone)]
pub struct ServerCredentials {
    pub app_key: String,
    pub app_secret: String,
    /// Если задан, клиент обязан прислать тот же токен
    pub access_token: Option<String>,
}

impl ServerCredentials {
    pub(crate) fn check(
        &self,
        app_key: &str,
        app_secret: &str,
        access_token: Option<&str>,
    ) -> Result<(), &'static str> {
        if app_key != self.app_key || app_secret != self.app_secret {
            return Err("invalid app key or secret");
        }
        match &self.access_token {
            Some(expected) if access_token != Some(expected.as_str()) => {
                Err("invalid access token")
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub symbols: Vec<Symbol>,
    pub credentials: ServerCredentials,
    /// `None` - цены заморожены
    pub tick_interval: Option<Duration>,
    /// Искусственная задержка перед каждым ответом (имитация медленного провайдера)
    pub response_delay: Duration,
    pub generator: GeneratorConfig,
}

impl ServerConfig {
    /// Локальный провайдер на случайном порту, цены заморожены
    pub fn local(app_key: &str, app_secret: &str) -> io::Result<Self> {
        Ok(Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            symbols: load_server_symbols(None)?,
            credentials: ServerCredentials {
                app_key: app_key.to_string(),
                app_secret: app_secret.to_string(),
                access_token: None,
            },
            tick_interval: None,
            response_delay: Duration::ZERO,
            generator: GeneratorConfig::default(),
        })
    }
}
