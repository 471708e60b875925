use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SymbolError;

/// Идентификатор инструмента с биржевым суффиксом, например `AAPL.US` или `700.HK`.
///
/// Внутренняя структура не интерпретируется. Значение нормализуется
/// (trim + ASCII uppercase) и не может содержать пробелов и запятых,
/// т.к. это разделители текстового протокола.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Создаёт символ с нормализацией и валидацией
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SymbolError> {
        let raw = raw.as_ref();
        let s = raw.trim();
        if s.is_empty() {
            return Err(SymbolError::Empty);
        }
        if let Some(ch) = s.chars().find(|c| c.is_whitespace() || *c == ',') {
            return Err(SymbolError::ForbiddenChar {
                symbol: raw.to_string(),
                ch,
            });
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Строковое представление
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Биржевой суффикс после последней точки (`HK` для `700.HK`)
    pub fn market(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, m)| m).filter(|m| !m.is_empty())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Статус котировки конкретного символа в batch-ответе
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStatus {
    /// Котировка получена
    Ok,
    /// Провайдер не знает символ (или он делистингован)
    NotFound,
}

/// Ценовой срез по символу
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub last_done: f64,
    pub prev_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub turnover: f64,
    pub timestamp_ms: u64,
}

/// Котировка одного запрошенного символа.
///
/// `price == None` означает, что провайдер не нашёл символ:
/// это обычный элемент ответа, а не ошибка всего запроса.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: Option<PriceSnapshot>,
}

impl Quote {
    /// Найденная котировка
    pub fn found(symbol: Symbol, price: PriceSnapshot) -> Self {
        Self {
            symbol,
            price: Some(price),
        }
    }

    /// Символ не найден
    pub fn not_found(symbol: Symbol) -> Self {
        Self {
            symbol,
            price: None,
        }
    }

    pub fn status(&self) -> QuoteStatus {
        match self.price {
            Some(_) => QuoteStatus::Ok,
            None => QuoteStatus::NotFound,
        }
    }

    /// Последняя цена сделки, если символ найден
    pub fn last_done(&self) -> Option<f64> {
        self.price.as_ref().map(|p| p.last_done)
    }

    pub fn timestamp_ms(&self) -> Option<u64> {
        self.price.as_ref().map(|p| p.timestamp_ms)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.price {
            Some(p) => write!(
                f,
                "{} last={:.3} prev_close={:.3} open={:.3} high={:.3} low={:.3} volume={} turnover={:.2} ts={}",
                self.symbol,
                p.last_done,
                p.prev_close,
                p.open,
                p.high,
                p.low,
                p.volume,
                p.turnover,
                p.timestamp_ms
            ),
            None => write!(f, "{} not found", self.symbol),
        }
    }
}

/// Справочные данные по инструменту
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDetails {
    pub name_en: String,
    pub exchange: String,
    pub currency: String,
    pub lot_size: u32,
}

/// Справочная информация по одному запрошенному символу (семантика как у [`Quote`])
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticInfo {
    pub symbol: Symbol,
    pub details: Option<StaticDetails>,
}

impl StaticInfo {
    pub fn status(&self) -> QuoteStatus {
        match self.details {
            Some(_) => QuoteStatus::Ok,
            None => QuoteStatus::NotFound,
        }
    }
}

impl fmt::Display for StaticInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(d) => write!(
                f,
                "{} name={:?} exchange={} currency={} lot_size={}",
                self.symbol, d.name_en, d.exchange, d.currency, d.lot_size
            ),
            None => write!(f, "{} not found", self.symbol),
        }
    }
}
