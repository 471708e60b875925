use crate::config::{AUTH_TIMEOUT, ClientId, ServerCredentials, TCP_WRITE_TIMEOUT};
use crate::market::Market;
use crate::session::{fill, run_session};
use anyhow::Context;
use log::{debug, info, warn};
use quote_core::IO_TICK;
use quote_core::protocol::{Command, Reply, format_reply_line, parse_command};
use quote_core::wire::FrameDecoder;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Всё, что нужно потоку соединения
#[derive(Clone)]
pub(crate) struct ConnContext {
    pub(crate) market: Arc<Market>,
    pub(crate) credentials: Arc<ServerCredentials>,
    pub(crate) response_delay: Duration,
    pub(crate) shutdown: Arc<AtomicBool>,
}

// accept loop + поток на соединение
pub(crate) fn run_tcp_listener(
    listener: TcpListener,
    ctx: ConnContext,
    curr_client_id: Arc<AtomicU64>,
) -> anyhow::Result<()> {
    listener
        .set_nonblocking(true)
        .context("listener.set_nonblocking(true)")?;
    let mut session_handles = Vec::new();

    loop {
        reap_finished_sessions(&mut session_handles);

        if ctx.shutdown.load(Ordering::Relaxed) {
            info!("shutting down tcp listener");
            break;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(false)
                    .context("stream.set_nonblocking(false)")?;

                stream.set_nodelay(true).ok();
                stream.set_read_timeout(Some(IO_TICK)).ok();
                stream.set_write_timeout(Some(TCP_WRITE_TIMEOUT)).ok();

                let cid = curr_client_id.fetch_add(1, Ordering::Relaxed);
                debug!("accepted {cid} from {addr}");
                let ctx = ctx.clone();

                let h = thread::spawn(move || {
                    if let Err(e) = handle_conn(cid, stream, ctx) {
                        warn!("handle_conn {cid} error: {e}");
                    }
                });
                session_handles.push(h);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // нет новых соединений прямо сейчас
                thread::sleep(IO_TICK);
            }
            Err(e) => {
                warn!("accept error: {e}");
                thread::sleep(IO_TICK);
            }
        }
    }

    for h in session_handles {
        if let Err(panic) = h.join() {
            warn!("session thread panicked: {:?}", panic);
        }
    }

    Ok(())
}

fn reap_finished_sessions(handles: &mut Vec<thread::JoinHandle<()>>) {
    let mut i = 0;
    while i < handles.len() {
        if handles[i].is_finished() {
            let h = handles.swap_remove(i);
            if let Err(panic) = h.join() {
                warn!("session thread panicked: {:?}", panic);
            }
        } else {
            i += 1;
        }
    }
}

/// Ждём первую строку (AUTH) не дольше AUTH_TIMEOUT
fn read_first_line(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
    shutdown: &AtomicBool,
) -> anyhow::Result<Option<String>> {
    let deadline = Instant::now() + AUTH_TIMEOUT;
    loop {
        if let Some(line) = decoder.next_line()? {
            return Ok(Some(line));
        }
        if shutdown.load(Ordering::Relaxed) || Instant::now() >= deadline {
            return Ok(None);
        }
        if !fill(stream, decoder)? {
            anyhow::bail!("client closed connection");
        }
    }
}

fn handle_conn(cid: ClientId, mut stream: TcpStream, ctx: ConnContext) -> anyhow::Result<()> {
    let mut decoder = FrameDecoder::new();

    let Some(line) = read_first_line(&mut stream, &mut decoder, &ctx.shutdown)? else {
        debug!("client {cid}: no AUTH in time");
        return Ok(());
    };

    // парсинг и проверка AUTH
    let verdict = match parse_command(&line) {
        Ok(Command::Auth {
            app_key,
            app_secret,
            access_token,
        }) => ctx
            .credentials
            .check(&app_key, &app_secret, access_token.as_deref())
            .map_err(str::to_string),
        Ok(_) => Err("expected AUTH".to_string()),
        Err(e) => Err(e.to_string()),
    };

    if let Err(reason) = verdict {
        info!("client {cid}: auth rejected: {reason}");
        if let Err(e) = stream.write_all(format_reply_line(&Reply::Err(reason)).as_bytes()) {
            debug!("client {cid}: ERR reply not delivered: {e}");
        }
        return Ok(());
    }

    stream.write_all(format_reply_line(&Reply::Ok).as_bytes())?;
    stream.flush()?;
    info!("client {cid}: authenticated");

    run_session(
        cid,
        stream,
        decoder,
        ctx.market,
        ctx.response_delay,
        ctx.shutdown,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, QuoteGenerator};
    use quote_core::Symbol;
    use std::io::Read;

    fn ctx(shutdown: bool) -> ConnContext {
        let symbols = vec![Symbol::new("AAPL.US").unwrap()];
        ConnContext {
            market: Arc::new(Market::new(QuoteGenerator::new(
                symbols,
                GeneratorConfig::default(),
            ))),
            credentials: Arc::new(ServerCredentials {
                app_key: "abc".into(),
                app_secret: "xyz".into(),
                access_token: None,
            }),
            response_delay: Duration::ZERO,
            shutdown: Arc::new(AtomicBool::new(shutdown)),
        }
    }

    fn connect_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_read_timeout(Some(IO_TICK)).unwrap();

        (client, server)
    }

    fn read_reply(mut client: TcpStream) -> String {
        client
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buf = [0u8; 256];
        let n = client.read(&mut buf).unwrap_or(0);
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    #[test]
    fn handle_conn_writes_err_on_wrong_secret() {
        let (mut client, server) = connect_pair();
        client.write_all(b"AUTH abc nope\n").unwrap();

        handle_conn(1, server, ctx(false)).unwrap();

        let reply = read_reply(client);
        assert!(reply.starts_with("ERR "), "expected ERR reply, got: {reply:?}");
        assert!(reply.ends_with('\n'), "reply must end with newline: {reply:?}");
    }

    #[test]
    fn handle_conn_writes_err_on_garbage_first_line() {
        let (mut client, server) = connect_pair();
        client.write_all(b"QUOTE 1 AAPL.US\n").unwrap();

        handle_conn(1, server, ctx(false)).unwrap();

        let reply = read_reply(client);
        assert_eq!(reply, "ERR expected AUTH\n");
    }

    #[test]
    fn handle_conn_writes_ok_and_serves_until_close() {
        let (mut client, server) = connect_pair();
        client.write_all(b"AUTH abc xyz\nCLOSE\n").unwrap();

        handle_conn(1, server, ctx(false)).unwrap();

        let reply = read_reply(client);
        assert_eq!(reply, "OK\n");
    }

    #[test]
    fn handle_conn_gives_up_without_auth_on_shutdown() {
        let (_client, server) = connect_pair();

        // shutdown=true => не ждём AUTH_TIMEOUT
        let started = Instant::now();
        handle_conn(1, server, ctx(true)).unwrap();
        assert!(started.elapsed() < AUTH_TIMEOUT);
    }

    #[test]
    fn handle_conn_fails_on_eof_before_auth() {
        let (client, server) = connect_pair();
        drop(client); // клиент сразу закрыл соединение => EOF

        assert!(handle_conn(1, server, ctx(false)).is_err());
    }
}
