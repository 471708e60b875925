use log::debug;

use crate::config::Configuration;
use crate::error::{ConfigError, ConnectionError};
use crate::session::Session;

/// Фабрика сессий поверх проверенной конфигурации.
///
/// Повторов нет: если `connect` упал, решение о повторе принимает вызывающий.
#[derive(Debug, Clone)]
pub struct QuoteClient {
    config: Configuration,
}

impl QuoteClient {
    /// Проверяет конфигурацию; сеть не трогает
    pub fn new(config: Configuration) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// `new` + `connect` одним вызовом
    pub fn connect_with(config: Configuration) -> Result<Session, ConnectionError> {
        Self::new(config)?.connect()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Устанавливает новую сессию (TCP + AUTH).
    ///
    /// Возвращает сессию в состоянии `Connected` или одну из ошибок
    /// [`ConnectionError`]; промежуточных состояний наружу не бывает.
    pub fn connect(&self) -> Result<Session, ConnectionError> {
        debug!("connecting to {}", self.config.endpoint());
        Session::establish(&self.config)
    }
}
