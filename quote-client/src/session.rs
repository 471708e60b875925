use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use quote_core::protocol::Command;
use quote_core::wire::Response;
use quote_core::{MAX_SYMBOLS_PER_REQUEST, Quote, StaticInfo, Symbol};

use crate::cancel::CancelToken;
use crate::config::{Configuration, Endpoint};
use crate::error::{ConnectionError, QuoteError, TransportError};
use crate::transport::Connection;

/// Состояние сессии.
///
/// `Disconnected -> Connecting -> Connected -> Closed`;
/// `Connecting -> Disconnected` при ошибке установки,
/// `Connected -> Disconnected` при сетевом сбое внутри запроса.
/// `Closed` терминальное.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

struct Inner {
    state: SessionState,
    conn: Option<Connection>,
    next_request_id: u64,
}

/// Установленная сессия с провайдером.
///
/// Владеет TCP-соединением единолично. Может обслуживать сколько угодно
/// последовательных запросов; конкурентные вызовы из разных потоков
/// сериализуются (один запрос в полёте).
pub struct Session {
    endpoint: Endpoint,
    request_timeout: Duration,
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    Quote,
    StaticInfo,
}

impl RequestKind {
    fn command(self, request_id: u64, symbols: Vec<Symbol>) -> Command {
        match self {
            RequestKind::Quote => Command::Quote {
                request_id,
                symbols,
            },
            RequestKind::StaticInfo => Command::StaticInfo {
                request_id,
                symbols,
            },
        }
    }
}

impl Session {
    pub(crate) fn establish(config: &Configuration) -> Result<Self, ConnectionError> {
        let endpoint = config.endpoint().clone();
        debug!(
            "session {endpoint}: {:?} -> {:?}",
            SessionState::Disconnected,
            SessionState::Connecting
        );

        match Connection::open(config) {
            Ok(conn) => {
                info!("session {endpoint}: connected");
                Ok(Self {
                    endpoint,
                    request_timeout: config.request_timeout(),
                    inner: Mutex::new(Inner {
                        state: SessionState::Connected,
                        conn: Some(conn),
                        next_request_id: 1,
                    }),
                })
            }
            Err(e) => {
                warn!(
                    "session {endpoint}: {:?} -> {:?}: {e}",
                    SessionState::Connecting,
                    SessionState::Disconnected
                );
                Err(e)
            }
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Котировки по списку символов, ответ позиционный: `quotes[i]` для `symbols[i]`.
    /// Дубликаты не схлопываются. Ждёт не дольше request timeout.
    pub fn quote(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, QuoteError> {
        self.quote_inner(symbols, None)
    }

    /// Как [`Session::quote`], но вызов можно прервать через `cancel`
    pub fn quote_cancellable(
        &self,
        symbols: &[Symbol],
        cancel: &CancelToken,
    ) -> Result<Vec<Quote>, QuoteError> {
        self.quote_inner(symbols, Some(cancel))
    }

    /// Справочная информация по символам, семантика как у [`Session::quote`]
    pub fn static_info(&self, symbols: &[Symbol]) -> Result<Vec<StaticInfo>, QuoteError> {
        self.static_info_inner(symbols, None)
    }

    pub fn static_info_cancellable(
        &self,
        symbols: &[Symbol],
        cancel: &CancelToken,
    ) -> Result<Vec<StaticInfo>, QuoteError> {
        self.static_info_inner(symbols, Some(cancel))
    }

    /// Закрывает сессию. Повторный вызов ничего не делает.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Closed {
            return;
        }
        inner.state = SessionState::Closed;
        if let Some(conn) = inner.conn.take() {
            conn.shutdown();
        }
        info!("session {}: closed", self.endpoint);
    }

    fn quote_inner(
        &self,
        symbols: &[Symbol],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Quote>, QuoteError> {
        match self.exchange(RequestKind::Quote, symbols, cancel)? {
            Response::Quotes { quotes, .. } => {
                check_positions(symbols, &quotes, |q| &q.symbol)?;
                Ok(quotes)
            }
            Response::Error { message, .. } => Err(TransportError::Server(message).into()),
            Response::StaticInfo { .. } => Err(TransportError::Mismatch(
                "got static info for a quote request".to_string(),
            )
            .into()),
        }
    }

    fn static_info_inner(
        &self,
        symbols: &[Symbol],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<StaticInfo>, QuoteError> {
        match self.exchange(RequestKind::StaticInfo, symbols, cancel)? {
            Response::StaticInfo { infos, .. } => {
                check_positions(symbols, &infos, |i| &i.symbol)?;
                Ok(infos)
            }
            Response::Error { message, .. } => Err(TransportError::Server(message).into()),
            Response::Quotes { .. } => Err(TransportError::Mismatch(
                "got quotes for a static info request".to_string(),
            )
            .into()),
        }
    }

    /// Один обмен запрос/ответ под локом сессии
    fn exchange(
        &self,
        kind: RequestKind,
        symbols: &[Symbol],
        cancel: Option<&CancelToken>,
    ) -> Result<Response, QuoteError> {
        if symbols.is_empty() {
            return Err(QuoteError::EmptyRequest);
        }
        if symbols.len() > MAX_SYMBOLS_PER_REQUEST {
            return Err(QuoteError::TooManySymbols {
                count: symbols.len(),
                max: MAX_SYMBOLS_PER_REQUEST,
            });
        }

        let mut inner = self.lock();
        match inner.state {
            SessionState::Closed => return Err(QuoteError::SessionClosed),
            SessionState::Connected => {}
            SessionState::Disconnected | SessionState::Connecting => {
                return Err(TransportError::Disconnected.into());
            }
        }

        let request_id = inner.next_request_id;
        inner.next_request_id += 1;
        let deadline = Instant::now() + self.request_timeout;

        let result = match inner.conn.as_mut() {
            Some(conn) => {
                debug!(
                    "session {}: {kind:?} #{request_id} x{}",
                    self.endpoint,
                    symbols.len()
                );
                let cmd = kind.command(request_id, symbols.to_vec());
                match conn.send(&cmd) {
                    Ok(()) => conn.recv_response(request_id, deadline, cancel),
                    Err(e) => Err(TransportError::from(e).into()),
                }
            }
            None => Err(TransportError::Disconnected.into()),
        };

        match &result {
            Err(QuoteError::Transport(e)) if e.is_fatal() => {
                warn!(
                    "session {}: {:?} -> {:?}: {e}",
                    self.endpoint,
                    SessionState::Connected,
                    SessionState::Disconnected
                );
                inner.state = SessionState::Disconnected;
                inner.conn = None;
            }
            Err(QuoteError::Cancelled(reason)) => {
                debug!(
                    "session {}: request #{request_id} abandoned: {reason}",
                    self.endpoint
                );
            }
            _ => {}
        }

        result
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(), // продолжаем, несмотря на poison
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Проверка, что ответ выровнен с запросом по позициям
fn check_positions<T>(
    requested: &[Symbol],
    got: &[T],
    symbol_of: impl Fn(&T) -> &Symbol,
) -> Result<(), TransportError> {
    if requested.len() != got.len() {
        return Err(TransportError::Mismatch(format!(
            "requested {} symbols, got {} entries",
            requested.len(),
            got.len()
        )));
    }

    for (pos, (want, item)) in requested.iter().zip(got).enumerate() {
        let have = symbol_of(item);
        if want != have {
            return Err(TransportError::Mismatch(format!(
                "position {pos}: requested {want}, got {have}"
            )));
        }
    }

    Ok(())
}
