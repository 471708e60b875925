use std::io;
use std::time::Duration;

use quote_core::{QuoteCoreError, WireError};
use thiserror::Error;

use crate::cancel::CancelReason;

/// Ошибки конфигурации: локальные, без исправления входа не повторяются
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Обязательное поле отсутствует (имя переменной окружения)
    #[error("missing required configuration field: {0}")]
    MissingField(&'static str),

    /// Поле есть, но значение негодное
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// имя поля
        field: &'static str,
        /// причина
        reason: String,
    },
}

/// Ошибки установки сессии
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Конфигурация не прошла проверку, сеть не трогали
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Провайдер недоступен (DNS, отказ в соединении, обрыв во время handshake)
    #[error("provider {endpoint} unreachable")]
    Unreachable {
        /// адрес провайдера
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Провайдер отклонил учётные данные
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Не уложились в connect timeout
    #[error("connecting to {endpoint} timed out after {after:?}")]
    Timeout {
        /// адрес провайдера
        endpoint: String,
        /// сколько ждали
        after: Duration,
    },

    /// Провайдер ответил на handshake чем-то непонятным
    #[error("handshake protocol error: {0}")]
    Protocol(#[from] QuoteCoreError),
}

/// Сбой обмена с провайдером внутри запроса
#[derive(Debug, Error)]
pub enum TransportError {
    /// Ошибка сокета
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Поток байт не разбирается
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Провайдер отклонил запрос целиком
    #[error("provider rejected request: {0}")]
    Server(String),

    /// Ответ не совпадает с запросом позиционно (или не того типа)
    #[error("response does not match request: {0}")]
    Mismatch(String),

    /// Соединение уже потеряно предыдущей ошибкой
    #[error("session transport is disconnected")]
    Disconnected,
}

impl TransportError {
    /// После такой ошибки соединение непригодно
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::Wire(_) | TransportError::Disconnected
        )
    }
}

/// Ошибки запроса котировок
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Пустой список символов
    #[error("quote request has no symbols")]
    EmptyRequest,

    /// Превышен лимит символов в одном запросе
    #[error("too many symbols in one request: {count} (max {max})")]
    TooManySymbols {
        /// сколько запросили
        count: usize,
        /// лимит
        max: usize,
    },

    /// Сетевой сбой, частичных результатов нет
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Сессия закрыта
    #[error("session is closed")]
    SessionClosed,

    /// Вызов отменён (таймаут или сигнал), сессия остаётся рабочей
    #[error("request cancelled: {0}")]
    Cancelled(CancelReason),
}
