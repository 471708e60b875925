use crate::config::ClientId;
use crate::market::Market;
use log::{debug, info, warn};
use quote_core::IO_TICK;
use quote_core::protocol::{Command, parse_command, peek_request_id};
use quote_core::wire::{FrameDecoder, Response, encode_frame};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};
use std::time::Duration;

/// Что делать с соединением после строки запроса
#[derive(Debug)]
enum Action {
    Reply(Response),
    Close,
    /// строку нельзя адресовать никакому запросу - рвём соединение
    Drop(String),
}

/// Цикл запросов одного клиента после успешного AUTH.
/// Заканчивается по CLOSE, EOF, shutdown или мусорной строке без id.
pub(crate) fn run_session(
    cid: ClientId,
    mut stream: TcpStream,
    mut decoder: FrameDecoder,
    market: Arc<Market>,
    response_delay: Duration,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutting down session {cid}");
            break;
        }

        // разгребаем всё, что уже пришло
        while let Some(line) = decoder.next_line()? {
            match handle_line(&line, &market) {
                Action::Reply(resp) => {
                    if !pause(response_delay, &shutdown) {
                        return Ok(());
                    }
                    send_response(&mut stream, &resp)?;
                    debug!("session {cid}: answered request {}", resp.request_id());
                }
                Action::Close => {
                    info!("session {cid}: client closed");
                    return Ok(());
                }
                Action::Drop(reason) => {
                    warn!("session {cid}: dropping connection: {reason}");
                    return Ok(());
                }
            }
        }

        if !fill(&mut stream, &mut decoder)? {
            info!("session {cid}: connection closed by client");
            break;
        }
    }

    Ok(())
}

fn handle_line(line: &str, market: &Market) -> Action {
    match parse_command(line) {
        Ok(Command::Quote {
            request_id,
            symbols,
        }) => Action::Reply(Response::Quotes {
            request_id,
            quotes: market.quotes(&symbols),
        }),
        Ok(Command::StaticInfo {
            request_id,
            symbols,
        }) => Action::Reply(Response::StaticInfo {
            request_id,
            infos: market.static_info(&symbols),
        }),
        Ok(Command::Close) => Action::Close,
        Ok(Command::Auth { .. }) => Action::Drop("AUTH after handshake".to_string()),
        Err(e) => match peek_request_id(line) {
            Some(request_id) => Action::Reply(Response::Error {
                request_id,
                message: e.to_string(),
            }),
            None => Action::Drop(format!("bad command {line:?}: {e}")),
        },
    }
}

fn send_response(stream: &mut TcpStream, resp: &Response) -> anyhow::Result<()> {
    let bytes = encode_frame(resp)?;
    stream.write_all(&bytes)?;
    stream.flush()?;
    Ok(())
}

/// Одно чтение в декодер. `Ok(false)` - клиент закрыл соединение,
/// read timeout считается просто "тиком".
pub(crate) fn fill(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> io::Result<bool> {
    let mut buf = [0u8; 4096];
    match stream.read(&mut buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            decoder.push(&buf[..n]);
            Ok(true)
        }
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut
                || e.kind() == io::ErrorKind::Interrupted =>
        {
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Сон кусками по IO_TICK с проверкой shutdown. `false` - прервали.
fn pause(total: Duration, shutdown: &AtomicBool) -> bool {
    let mut slept = Duration::ZERO;
    while slept < total {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let step = (total - slept).min(IO_TICK);
        std::thread::sleep(step);
        slept += step;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, QuoteGenerator};
    use quote_core::{QuoteStatus, Symbol};
    use std::net::TcpListener;

    fn market() -> Arc<Market> {
        let symbols = vec![Symbol::new("700.HK").unwrap(), Symbol::new("AAPL.US").unwrap()];
        Arc::new(Market::new(QuoteGenerator::new(
            symbols,
            GeneratorConfig::default(),
        )))
    }

    fn connect_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();

        (client, server)
    }

    fn read_frame(client: &mut TcpStream) -> Response {
        client
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut dec = FrameDecoder::new();
        for _ in 0..20 {
            if let Some(resp) = dec.next_frame().unwrap() {
                return resp;
            }
            assert!(fill(client, &mut dec).unwrap(), "server closed connection");
        }
        panic!("no response frame");
    }

    #[test]
    fn handle_line_answers_quote_positionally() {
        let m = market();
        match handle_line("QUOTE 4 AAPL.US,NFLX.US,AAPL.US", &m) {
            Action::Reply(Response::Quotes { request_id, quotes }) => {
                assert_eq!(request_id, 4);
                let st: Vec<_> = quotes.iter().map(|q| q.status()).collect();
                assert_eq!(
                    st,
                    vec![QuoteStatus::Ok, QuoteStatus::NotFound, QuoteStatus::Ok]
                );
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn handle_line_errors() {
        let m = market();
        assert!(matches!(
            handle_line("QUOTE 5 BAD SYMBOL", &m),
            Action::Reply(Response::Error { request_id: 5, .. })
        ));
        assert!(matches!(handle_line("HELLO", &m), Action::Drop(_)));
        assert!(matches!(handle_line("AUTH a b", &m), Action::Drop(_)));
        assert!(matches!(handle_line("CLOSE", &m), Action::Close));
    }

    #[test]
    fn run_session_serves_requests_until_close() {
        let (mut client, server) = connect_pair();
        server.set_read_timeout(Some(IO_TICK)).unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let m = market();
        let h = std::thread::spawn(move || {
            run_session(1, server, FrameDecoder::new(), m, Duration::ZERO, shutdown)
        });

        client.write_all(b"STATIC 1 700.HK\n").unwrap();
        match read_frame(&mut client) {
            Response::StaticInfo { request_id, infos } => {
                assert_eq!(request_id, 1);
                assert_eq!(infos[0].status(), QuoteStatus::Ok);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        client.write_all(b"QUOTE 2 ,\n").unwrap();
        assert!(matches!(
            read_frame(&mut client),
            Response::Error { request_id: 2, .. }
        ));

        client.write_all(b"CLOSE\n").unwrap();
        h.join().unwrap().unwrap();
    }

    #[test]
    fn run_session_exits_on_shutdown() {
        let (_client, server) = connect_pair();
        server.set_read_timeout(Some(IO_TICK)).unwrap();

        let shutdown = Arc::new(AtomicBool::new(true));
        run_session(1, server, FrameDecoder::new(), market(), Duration::ZERO, shutdown).unwrap();
    }

    #[test]
    fn pause_is_interrupted_by_shutdown() {
        let flag = AtomicBool::new(true);
        assert!(!pause(Duration::from_secs(10), &flag));
        assert!(pause(Duration::ZERO, &flag));
    }
}
