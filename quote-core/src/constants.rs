use std::time::Duration;

/// Порт провайдера по умолчанию (если в endpoint порт не указан)
pub const DEFAULT_PORT: u16 = 5555;

/// Таймаут установки сессии (TCP connect + AUTH)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Таймаут одного запроса котировок
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Шаг опроса сокета: между тиками проверяем отмену и дедлайн
pub const IO_TICK: Duration = Duration::from_millis(50);

/// Максимум символов в одном batch-запросе
pub const MAX_SYMBOLS_PER_REQUEST: usize = 500;

/// Максимальный размер одного бинарного кадра
pub const MAX_FRAME_LEN: usize = 1024 * 1024;
