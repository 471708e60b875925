use thiserror::Error;

/// Верхнеуровневый тип ошибок крейта
#[derive(Debug, Error)]
pub enum QuoteCoreError {
    /// Ошибки протокола
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Ошибки сериализации
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Некорректный символ
    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Ошибки валидации символа
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// Пустой символ (или только пробелы)
    #[error("symbol is empty")]
    Empty,

    /// Символ содержит разделитель протокола
    #[error("symbol {symbol:?} contains forbidden character {ch:?}")]
    ForbiddenChar {
        /// исходный символ
        symbol: String,
        /// первый запрещённый символ
        ch: char,
    },
}

/// Ошибки протокола
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// пустая команда
    #[error("empty command")]
    EmptyCommand,

    /// Неизвестная команда
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Не переданы учётные данные
    #[error("missing credentials")]
    MissingCredentials,

    /// Не передан id запроса
    #[error("missing request id")]
    MissingRequestId,

    /// id запроса не число
    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    /// Не передан список символов
    #[error("missing symbols list")]
    MissingSymbols,

    /// Некорректный символ в списке
    #[error("invalid symbol: {0}")]
    InvalidSymbol(#[from] SymbolError),

    /// Лишние аргументы
    #[error("unexpected extra arguments")]
    ExtraArgs,

    /// Ответ на AUTH не OK/ERR
    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(String),
}

/// Ошибки сериализации
#[derive(Debug, Error)]
pub enum WireError {
    /// Неверная версия протокола
    #[error("unsupported wire version: {0}")]
    UnsupportedWireVersion(u8),

    /// Заявленная длина кадра больше лимита
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge {
        /// заявленная длина
        len: usize,
        /// лимит
        max: usize,
    },

    /// Строка ответа не UTF-8
    #[error("reply line is not valid utf-8")]
    BadUtf8,

    /// Ошибка сериализации/десериализации
    #[error("postcard encode/decode error: {0}")]
    Postcard(#[from] postcard::Error),
}
