use std::sync::{Mutex, MutexGuard};

use quote_core::{Quote, StaticInfo, Symbol};

use crate::generator::QuoteGenerator;

/// Общий для всех соединений рынок: генератор под мьютексом.
/// Ответы позиционные: по одной записи на каждый запрошенный символ.
pub(crate) struct Market {
    generator: Mutex<QuoteGenerator>,
}

impl Market {
    pub(crate) fn new(generator: QuoteGenerator) -> Self {
        Self {
            generator: Mutex::new(generator),
        }
    }

    pub(crate) fn quotes(&self, symbols: &[Symbol]) -> Vec<Quote> {
        let generator = self.lock();
        symbols
            .iter()
            .map(|s| match generator.snapshot(s) {
                Some(price) => Quote::found(s.clone(), price),
                None => Quote::not_found(s.clone()),
            })
            .collect()
    }

    pub(crate) fn static_info(&self, symbols: &[Symbol]) -> Vec<StaticInfo> {
        let generator = self.lock();
        symbols
            .iter()
            .map(|s| StaticInfo {
                symbol: s.clone(),
                details: generator.static_details(s),
            })
            .collect()
    }

    pub(crate) fn tick(&self) {
        self.lock().step();
    }

    fn lock(&self) -> MutexGuard<'_, QuoteGenerator> {
        match self.generator.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(), // продолжаем, несмотря на poison
        }
    }
}
