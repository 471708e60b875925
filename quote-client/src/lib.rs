//! # quote-client
//!
//! Клиент котировок: конфигурация, сессия с провайдером и batch-запрос.
//!
//! - [`config`] - загрузка [`Configuration`] из окружения и/или явных значений
//! - [`QuoteClient`] - проверка конфигурации и установка [`Session`]
//! - [`Session`] - запросы `quote` / `static_info`, закрытие
//! - [`error`] - [`ConfigError`], [`ConnectionError`], [`QuoteError`]
//!
//! ## Пример
//!
//! ```no_run
//! use quote_client::{Configuration, QuoteClient};
//! use quote_core::symbols::parse_symbol_list;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ENDPOINT, APP_KEY, APP_SECRET
//!     let config = Configuration::from_env()?;
//!     let session = QuoteClient::connect_with(config)?;
//!
//!     let symbols = parse_symbol_list("700.HK,AAPL.US,TSLA.US,NFLX.US")?;
//!     for quote in session.quote(&symbols)? {
//!         println!("{quote}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Вызовы блокирующие. Ожидание ответа ограничено request timeout и может
//! быть прервано через [`CancelToken`]; прерванный вызов не портит сессию.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;

mod cancel;
mod client;
mod session;
mod transport;

pub use crate::cancel::{CancelReason, CancelToken};
pub use crate::client::QuoteClient;
pub use crate::config::{ConfigSource, ConfigValues, Configuration, Credentials, Endpoint};
pub use crate::error::{ConfigError, ConnectionError, QuoteError, TransportError};
pub use crate::session::{Session, SessionState};

pub use quote_core::{PriceSnapshot, Quote, QuoteStatus, StaticDetails, StaticInfo, Symbol};
