use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::SymbolError;
use crate::types::Symbol;

/// Чтение вселенной символов: по одному на строку, `#` - комментарий.
/// Результат отсортирован и уникален.
pub fn read_symbols<R: io::Read>(reader: R) -> io::Result<Vec<Symbol>> {
    let mut set = BTreeSet::new();
    let buf = BufReader::new(reader);

    for line in buf.lines() {
        let line = line?;
        if let Some(raw) = strip_comment(&line) {
            let symbol =
                Symbol::new(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            set.insert(symbol);
        }
    }

    Ok(set.into_iter().collect())
}

/// Чтение символов из файла
pub fn read_symbols_from_path(path: impl AsRef<Path>) -> io::Result<Vec<Symbol>> {
    let f = File::open(path)?;
    read_symbols(f)
}

fn strip_comment(line: &str) -> Option<&str> {
    let s = line.trim();
    if s.is_empty() || s.starts_with('#') {
        return None;
    }

    // Поддержка inline-комментариев: "AAPL.US # comment"
    let s = s.split('#').next().unwrap_or("").trim();
    if s.is_empty() {
        return None;
    }

    Some(s)
}

/// Парсит список символов запроса вида "700.hk, AAPL.US,,AAPL.US".
/// Правила:
/// - разделитель: запятая, пустые элементы игнорируются
/// - порядок и дубликаты сохраняются (ответ позиционный)
pub fn parse_symbol_list(raw: &str) -> Result<Vec<Symbol>, SymbolError> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Symbol::new)
        .collect()
}

/// Как [`parse_symbol_list`], но результат отсортирован и уникален (BTreeSet).
/// Для списков-вселенных, где позиция не важна.
pub fn parse_symbols_csv(raw: &str) -> Result<Vec<Symbol>, SymbolError> {
    let set: BTreeSet<Symbol> = parse_symbol_list(raw)?.into_iter().collect();
    Ok(set.into_iter().collect())
}

/// Склеивает символы в строку для протокола: "700.HK,AAPL.US"
pub fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
