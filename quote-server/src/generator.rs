use quote_core::{PriceSnapshot, StaticDetails, Symbol};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Максимальный относительный шаг цены за тик (пример: 0.002 = 0.2%)
    pub max_rel_step: f64,
    /// Минимальная допустимая цена
    pub min_price: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_rel_step: 0.002,
            min_price: 0.01,
        }
    }
}

/// Внутреннее состояние символа за "торговый день".
#[derive(Debug, Clone)]
struct SymbolState {
    last: f64,
    prev_close: f64,
    open: f64,
    high: f64,
    low: f64,
    volume: u64,
    turnover: f64,
    timestamp_ms: u64,
}

impl SymbolState {
    fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot {
            last_done: self.last,
            prev_close: self.prev_close,
            open: self.open,
            high: self.high,
            low: self.low,
            volume: self.volume,
            turnover: self.turnover,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Случайное блуждание цен по фиксированной вселенной символов
pub struct QuoteGenerator {
    cfg: GeneratorConfig,
    states: HashMap<Symbol, SymbolState>,

    /// Набор "высоколиквидных" символов для более крупного volume.
    high_volume: HashSet<String>,
}

impl QuoteGenerator {
    pub fn new(symbols: Vec<Symbol>, cfg: GeneratorConfig) -> Self {
        let mut rng = rand::rng();
        let now = now_ms();

        let states = symbols
            .into_iter()
            .map(|s| {
                let start_price = (rng.random_range(5000..50000) as f64) / 100.0;

                let state = SymbolState {
                    last: start_price,
                    prev_close: start_price,
                    open: start_price,
                    high: start_price,
                    low: start_price,
                    volume: 0,
                    turnover: 0.0,
                    timestamp_ms: now,
                };
                (s, state)
            })
            .collect::<HashMap<_, _>>();

        let high_volume = ["AAPL.US", "MSFT.US", "TSLA.US", "700.HK"]
            .into_iter()
            .map(|s| s.to_string())
            .collect::<HashSet<_>>();

        Self {
            cfg,
            states,
            high_volume,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// сдвинуть цены всех символов на один тик
    pub fn step(&mut self) {
        let mut rng = rand::rng();
        let now = now_ms();

        for (symbol, st) in self.states.iter_mut() {
            let delta = rng.random_range(-self.cfg.max_rel_step..self.cfg.max_rel_step);
            let price = ((1.0 + delta) * st.last).max(self.cfg.min_price);
            // цены в центах
            st.last = (price * 100.0).round() / 100.0;
            st.high = st.high.max(st.last);
            st.low = st.low.min(st.last);

            // volume: популярные -> больше
            let traded: u64 = if self.high_volume.contains(symbol.as_str()) {
                1000 + rng.random_range(0..5000)
            } else {
                100 + rng.random_range(0..1000)
            };
            st.volume += traded;
            st.turnover += traded as f64 * st.last;
            st.timestamp_ms = now;
        }
    }

    /// Текущий ценовой срез символа (None - символ неизвестен)
    pub fn snapshot(&self, symbol: &Symbol) -> Option<PriceSnapshot> {
        self.states.get(symbol).map(SymbolState::snapshot)
    }

    /// Справочник выводится из биржевого суффикса
    pub fn static_details(&self, symbol: &Symbol) -> Option<StaticDetails> {
        if !self.states.contains_key(symbol) {
            return None;
        }

        let (exchange, currency, lot_size) = match symbol.market() {
            Some("HK") => ("SEHK", "HKD", 100),
            Some("US") => ("US", "USD", 1),
            _ => ("UNKNOWN", "USD", 1),
        };
        let name = symbol
            .as_str()
            .rsplit_once('.')
            .map(|(code, _)| code)
            .unwrap_or(symbol.as_str());

        Some(StaticDetails {
            name_en: name.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            lot_size,
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
