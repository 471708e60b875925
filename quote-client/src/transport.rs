use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::{debug, warn};
use quote_core::protocol::{Command, Reply, format_command_line, parse_reply};
use quote_core::wire::{FrameDecoder, Response};
use quote_core::{IO_TICK, QuoteCoreError};

use crate::cancel::{CancelReason, CancelToken};
use crate::config::Configuration;
use crate::error::{ConnectionError, QuoteError, TransportError};

const READ_CHUNK: usize = 4096;

/// TCP-соединение с провайдером после успешного `AUTH`
pub(crate) struct Connection {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl Connection {
    /// TCP connect + `AUTH`, всё в пределах connect timeout
    pub(crate) fn open(config: &Configuration) -> Result<Self, ConnectionError> {
        let endpoint = config.endpoint();
        let timeout = config.connect_timeout();
        let deadline = Instant::now() + timeout;

        let timed_out = || ConnectionError::Timeout {
            endpoint: endpoint.to_string(),
            after: timeout,
        };
        let unreachable = |source: io::Error| ConnectionError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        };

        let addrs: Vec<SocketAddr> = (endpoint.host(), endpoint.port())
            .to_socket_addrs()
            .map_err(unreachable)?
            .collect();
        if addrs.is_empty() {
            return Err(unreachable(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses resolved",
            )));
        }

        // пробуем адреса по очереди, запоминаем последнюю ошибку
        let mut last_err = None;
        let mut connected = None;
        for addr in addrs {
            let Some(left) = remaining(deadline) else {
                return Err(timed_out());
            };
            match TcpStream::connect_timeout(&addr, left) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!("connect to {addr} timed out");
                    last_err = Some(timed_out());
                }
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(unreachable(e));
                }
            }
        }
        let stream = match connected {
            Some(s) => s,
            None => return Err(last_err.unwrap_or_else(timed_out)),
        };

        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(IO_TICK)).map_err(unreachable)?;
        stream
            .set_write_timeout(Some(config.request_timeout()))
            .map_err(unreachable)?;

        let mut conn = Connection {
            stream,
            decoder: FrameDecoder::new(),
        };

        let creds = config.credentials();
        let auth = Command::Auth {
            app_key: creds.app_key().to_string(),
            app_secret: creds.app_secret().to_string(),
            access_token: creds.access_token().map(str::to_string),
        };
        conn.send(&auth).map_err(unreachable)?;

        // ждём строку OK/ERR
        let line = loop {
            match conn.decoder.next_line() {
                Ok(Some(line)) => break line,
                Ok(None) => {}
                Err(e) => return Err(QuoteCoreError::from(e).into()),
            }
            if remaining(deadline).is_none() {
                return Err(timed_out());
            }
            conn.fill().map_err(unreachable)?;
        };

        match parse_reply(&line).map_err(QuoteCoreError::from)? {
            Reply::Ok => {
                debug!("authenticated at {endpoint}");
                Ok(conn)
            }
            Reply::Err(reason) => Err(ConnectionError::AuthRejected(reason)),
        }
    }

    pub(crate) fn send(&mut self, cmd: &Command) -> io::Result<()> {
        let line = format_command_line(cmd);
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()
    }

    /// Ждёт кадр с нужным `request_id`.
    ///
    /// Кадры с другим id - запоздавшие ответы на отменённые вызовы, их выбрасываем.
    pub(crate) fn recv_response(
        &mut self,
        request_id: u64,
        deadline: Instant,
        cancel: Option<&CancelToken>,
    ) -> Result<Response, QuoteError> {
        loop {
            while let Some(resp) = self.decoder.next_frame().map_err(TransportError::from)? {
                if resp.request_id() == request_id {
                    return Ok(resp);
                }
                warn!(
                    "dropping stale response for request {} (waiting for {request_id})",
                    resp.request_id()
                );
            }

            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(QuoteError::Cancelled(CancelReason::Signal));
            }
            if remaining(deadline).is_none() {
                return Err(QuoteError::Cancelled(CancelReason::Timeout));
            }

            self.fill().map_err(TransportError::from)?;
        }
    }

    /// Best-effort `CLOSE` и закрытие сокета
    pub(crate) fn shutdown(mut self) {
        if let Err(e) = self.send(&Command::Close) {
            debug!("CLOSE not delivered: {e}");
        }
        self.stream.shutdown(Shutdown::Both).ok();
    }

    /// Одно чтение из сокета; read timeout - просто "тик" цикла
    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "provider closed connection",
            )),
            Ok(n) => {
                self.decoder.push(&buf[..n]);
                Ok(())
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Сколько осталось до дедлайна; `None` если уже истёк
fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
}
