//! # quote-core
//!
//! Базовые типы и протокол для Quote Client / провайдера котировок.
//!
//! Этот крейт содержит:
//!
//! - [`protocol`] - парсинг и форматирование текстовых команд (`AUTH`, `QUOTE`, `STATIC`, `CLOSE`)
//! - [`symbols`] - чтение и нормализация списков символов из текста/файла
//! - [`wire`] - бинарные кадры ответов (версия + длина + postcard payload)
//! - [`types`] - доменные типы: символ, котировка, справочник
//! - [`error`] - типы ошибок, которые возвращают компоненты `quote-core`
//!
//! ## Быстрый пример: парсинг команды `QUOTE`
//!
//! ```rust
//! use quote_core::protocol::{parse_command, Command};
//!
//! let cmd = parse_command("QUOTE 1 700.HK,AAPL.US").unwrap();
//! match cmd {
//!     Command::Quote { request_id, symbols } => {
//!         assert_eq!(request_id, 1);
//!         assert_eq!(symbols[0].as_str(), "700.HK");
//!         assert_eq!(symbols[1].as_str(), "AAPL.US");
//!     }
//!     other => panic!("unexpected command: {other:?}"),
//! }
//! ```
//!
//! ## Пример: кадр ответа
//!
//! ```rust
//! use quote_core::wire::{encode_frame, FrameDecoder, Response};
//! use quote_core::{Quote, Symbol};
//!
//! let resp = Response::Quotes {
//!     request_id: 1,
//!     quotes: vec![Quote::not_found(Symbol::new("NFLX.US").unwrap())],
//! };
//!
//! let mut dec = FrameDecoder::new();
//! dec.push(&encode_frame(&resp).unwrap());
//! assert_eq!(dec.next_frame().unwrap(), Some(resp));
//! ```
//!
//! ## Дизайн
//!
//! `quote-core` задуман как “нулевая” зависимость для клиента и провайдера:
//! здесь только чистые типы, парсинг/сериализация и константы,
//! без сетевого I/O и без потоков.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Текстовый протокол команд (например `QUOTE 1 700.HK,AAPL.US`).
pub mod protocol;

/// Чтение/нормализация списков символов из текста и файлов.
pub mod symbols;

/// Доменные типы (символ, котировка, справочная информация).
pub mod types;

/// Wire-уровень: бинарные кадры ответов.
pub mod wire;

/// Ошибки `quote-core`.
pub mod error;

/// Общие константы
mod constants;
pub use constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT, IO_TICK, MAX_FRAME_LEN,
    MAX_SYMBOLS_PER_REQUEST,
};

// --- Re-exports (публичный фасад API) ---

pub use crate::error::{ProtocolError, QuoteCoreError, SymbolError, WireError};
pub use crate::protocol::{Command, Reply};
pub use crate::types::{PriceSnapshot, Quote, QuoteStatus, StaticDetails, StaticInfo, Symbol};
pub use crate::wire::{FrameDecoder, Response};
