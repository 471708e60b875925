//! # quote-server
//!
//! Эталонный провайдер котировок для `quote-client`: проверяет `AUTH`,
//! держит случайно блуждающие цены и отвечает на `QUOTE` / `STATIC`
//! бинарными кадрами.
//!
//! Потоки:
//! - accept loop (`tcp`), по потоку на соединение (`session`)
//! - тикер цен на `crossbeam_channel::tick`, если цены не заморожены
//!
//! Останов - через общий `AtomicBool` (Ctrl+C в бинарнике или [`ServerHandle`]).

#![forbid(unsafe_code)]

pub mod config;
pub mod generator;

mod market;
mod session;
mod tcp;

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use quote_core::IO_TICK;

pub use crate::config::{ServerConfig, ServerCredentials};

use crate::generator::QuoteGenerator;
use crate::market::Market;
use crate::tcp::{ConnContext, run_tcp_listener};

/// Запущенный провайдер. При drop останавливается и дожидается потоков.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Фактический адрес (полезно при bind на порт 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Флаг останова, общий со всеми потоками
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Блокируется, пока все потоки не завершатся
    pub fn wait(mut self) {
        self.join_all();
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.join_all();
    }

    fn join_all(&mut self) {
        for h in self.threads.drain(..) {
            if let Err(panic) = h.join() {
                warn!("server thread panicked: {:?}", panic);
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Биндит TCP и запускает потоки провайдера
pub fn spawn(config: ServerConfig) -> anyhow::Result<ServerHandle> {
    spawn_with_shutdown(config, Arc::new(AtomicBool::new(false)))
}

/// Как [`spawn`], но с внешним флагом останова (например от Ctrl+C)
pub fn spawn_with_shutdown(
    config: ServerConfig,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<ServerHandle> {
    let listener = TcpListener::bind(config.bind)
        .with_context(|| format!("bind TCP listener {}", config.bind))?;
    let local_addr = listener.local_addr()?;

    let market = Arc::new(Market::new(QuoteGenerator::new(
        config.symbols,
        config.generator,
    )));

    let ctx = ConnContext {
        market: market.clone(),
        credentials: Arc::new(config.credentials),
        response_delay: config.response_delay,
        shutdown: shutdown.clone(),
    };

    let mut threads = Vec::new();

    threads.push(thread::spawn(move || {
        if let Err(e) = run_tcp_listener(listener, ctx, Arc::new(AtomicU64::new(1))) {
            warn!("tcp listener error: {e:#}");
        }
    }));

    if let Some(interval) = config.tick_interval {
        let shutdown = shutdown.clone();
        threads.push(thread::spawn(move || run_ticker(&market, interval, &shutdown)));
    }

    info!("quote-server listening on {local_addr}");

    Ok(ServerHandle {
        local_addr,
        shutdown,
        threads,
    })
}

fn run_ticker(market: &Market, interval: Duration, shutdown: &AtomicBool) {
    let ticker = crossbeam_channel::tick(interval);

    while !shutdown.load(Ordering::Relaxed) {
        match ticker.recv_timeout(IO_TICK) {
            Ok(_) => market.tick(),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::time::Instant;

    #[test]
    fn spawn_binds_ephemeral_port_and_shuts_down() {
        let handle = spawn(ServerConfig::local("abc", "xyz").unwrap()).unwrap();
        let addr = handle.local_addr();
        assert_ne!(addr.port(), 0);

        TcpStream::connect(addr).expect("listener must accept");

        let started = Instant::now();
        handle.shutdown();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn ticker_stops_on_shutdown() {
        let market = Market::new(QuoteGenerator::new(
            vec![quote_core::Symbol::new("AAPL.US").unwrap()],
            Default::default(),
        ));
        let shutdown = AtomicBool::new(true);
        run_ticker(&market, Duration::from_millis(1), &shutdown);
    }
}
