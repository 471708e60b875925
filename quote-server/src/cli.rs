use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use quote_server::config::{self, ServerConfig, ServerCredentials};
use quote_server::generator::GeneratorConfig;

/// Quote Server - эталонный провайдер котировок: AUTH, затем QUOTE/STATIC по TCP.
#[derive(Parser, Debug, Clone)]
#[command(name = "quote-server", version, about)]
#[command(
    group(
        ArgGroup::new("symbols_source")
            .required(false)
            .multiple(false)
            .args(["symbols_file", "symbols"])
    )
)]
pub(crate) struct Args {
    /// TCP bind address, например 0.0.0.0:5555
    #[arg(long, default_value = config::TCP_BIND_ADDR)]
    pub(crate) tcp_bind: SocketAddr,

    /// Источник символов: файл (по одному на строку, поддержка # комментариев)
    #[arg(long, conflicts_with = "symbols")]
    pub(crate) symbols_file: Option<PathBuf>,

    /// Источник символов: CSV, например "700.HK, AAPL.US"
    #[arg(long, conflicts_with = "symbols_file")]
    pub(crate) symbols: Option<String>,

    /// Ожидаемый app key клиента
    #[arg(long, env = "APP_KEY")]
    pub(crate) app_key: String,

    /// Ожидаемый app secret клиента
    #[arg(long, env = "APP_SECRET", hide_env_values = true)]
    pub(crate) app_secret: String,

    /// Если задан, клиент обязан прислать этот токен
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) access_token: Option<String>,

    /// Шаг цен в миллисекундах; 0 - цены заморожены
    #[arg(long, default_value_t = config::QUOTE_INTERVAL.as_millis() as u64)]
    pub(crate) tick_ms: u64,

    /// Задержка перед каждым ответом в миллисекундах
    #[arg(long, default_value_t = 0)]
    pub(crate) delay_ms: u64,
}

impl Args {
    /// Собирает конфигурацию сервера (чтение файла символов и валидация)
    pub(crate) fn into_config(self) -> Result<ServerConfig> {
        let symbols = match (&self.symbols_file, &self.symbols) {
            (_, Some(raw)) => quote_core::symbols::parse_symbols_csv(raw)
                .with_context(|| format!("invalid --symbols value: {raw:?}"))?,
            (path, None) => config::load_server_symbols(path.as_deref()).with_context(|| {
                format!("failed to read symbols (file: {:?})", self.symbols_file)
            })?,
        };
        if symbols.is_empty() {
            anyhow::bail!("symbols list is empty");
        }

        for (name, value) in [("--app-key", &self.app_key), ("--app-secret", &self.app_secret)] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                anyhow::bail!("{name} must be a non-empty token without whitespace");
            }
        }

        Ok(ServerConfig {
            bind: self.tcp_bind,
            symbols,
            credentials: ServerCredentials {
                app_key: self.app_key,
                app_secret: self.app_secret,
                access_token: self.access_token,
            },
            tick_interval: (self.tick_ms > 0).then(|| Duration::from_millis(self.tick_ms)),
            response_delay: Duration::from_millis(self.delay_ms),
            generator: GeneratorConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["quote-server", "--app-key", "abc", "--app-secret", "xyz"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_use_embedded_symbols_and_ticking_prices() {
        let cfg = parse(&[]).into_config().unwrap();
        assert_eq!(cfg.bind, config::TCP_BIND_ADDR.parse().unwrap());
        assert!(!cfg.symbols.is_empty());
        assert_eq!(cfg.tick_interval, Some(config::QUOTE_INTERVAL));
        assert_eq!(cfg.response_delay, Duration::ZERO);
    }

    #[test]
    fn zero_tick_freezes_prices() {
        let cfg = parse(&["--tick-ms", "0", "--symbols", "aapl.us,700.hk"])
            .into_config()
            .unwrap();
        assert_eq!(cfg.tick_interval, None);
        assert_eq!(cfg.symbols.len(), 2);
    }

    #[test]
    fn symbols_sources_are_mutually_exclusive() {
        let res = Args::try_parse_from([
            "quote-server",
            "--app-key",
            "a",
            "--app-secret",
            "b",
            "--symbols",
            "AAPL.US",
            "--symbols-file",
            "x.txt",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn bad_symbols_are_rejected() {
        assert!(parse(&["--symbols", " , "]).into_config().is_err());
    }
}
