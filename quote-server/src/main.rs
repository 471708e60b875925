//! Точка входа `quote-server`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка вселенной символов
//! - bind TCP, запуск accept loop и тикера цен
//! - корректная остановка по `Ctrl+C`

mod cli;

use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};

use clap::Parser;
use log::info;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug
    env_logger::init();

    let args = cli::Args::parse();
    let config = args.into_config()?;

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    info!(
        "Starting quote-server: tcp={}, symbols={}, tick={:?}",
        config.bind,
        config.symbols.len(),
        config.tick_interval
    );

    let handle = quote_server::spawn_with_shutdown(config, shutdown)?;
    handle.wait();

    Ok(())
}
