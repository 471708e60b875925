use crate::error::ProtocolError;
use crate::symbols::{join_symbols, parse_symbol_list};
use crate::types::Symbol;

/// Команды клиента провайдеру (по одной на строку)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AUTH <app_key> <app_secret> [access_token]` - первая строка сессии
    Auth {
        app_key: String,
        app_secret: String,
        access_token: Option<String>,
    },
    /// `QUOTE <id> <SYM,SYM,...>`
    Quote {
        request_id: u64,
        symbols: Vec<Symbol>,
    },
    /// `STATIC <id> <SYM,SYM,...>`
    StaticInfo {
        request_id: u64,
        symbols: Vec<Symbol>,
    },
    /// `CLOSE` - клиент завершает сессию
    Close,
}

/// Ответ на `AUTH`: `OK` или `ERR <reason>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Err(String),
}

/// Парсит строку вида:
/// "QUOTE 7 700.HK,AAPL.US"
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }

    let mut parts = line.split_whitespace();
    let cmd = parts.next().ok_or(ProtocolError::EmptyCommand)?;

    let parsed = match cmd {
        "AUTH" => {
            let app_key = parts.next().ok_or(ProtocolError::MissingCredentials)?;
            let app_secret = parts.next().ok_or(ProtocolError::MissingCredentials)?;
            Command::Auth {
                app_key: app_key.to_string(),
                app_secret: app_secret.to_string(),
                access_token: parts.next().map(str::to_string),
            }
        }
        "QUOTE" | "STATIC" => {
            let id_raw = parts.next().ok_or(ProtocolError::MissingRequestId)?;
            let request_id: u64 = id_raw
                .parse()
                .map_err(|_| ProtocolError::InvalidRequestId(id_raw.to_string()))?;

            let symbols_raw = parts.next().ok_or(ProtocolError::MissingSymbols)?;
            let symbols = parse_symbol_list(symbols_raw)?;
            if symbols.is_empty() {
                return Err(ProtocolError::MissingSymbols);
            }

            if cmd == "QUOTE" {
                Command::Quote {
                    request_id,
                    symbols,
                }
            } else {
                Command::StaticInfo {
                    request_id,
                    symbols,
                }
            }
        }
        "CLOSE" => Command::Close,
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };

    if parts.next().is_some() {
        return Err(ProtocolError::ExtraArgs);
    }

    Ok(parsed)
}

/// id запроса из строки, даже если остальная часть не распарсилась.
/// Нужен серверу, чтобы адресовать кадр с ошибкой.
pub fn peek_request_id(line: &str) -> Option<u64> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "QUOTE" | "STATIC" => parts.next()?.parse().ok(),
        _ => None,
    }
}

/// Форматирует команду в строку протокола (с `\n`)
pub fn format_command_line(cmd: &Command) -> String {
    match cmd {
        Command::Auth {
            app_key,
            app_secret,
            access_token,
        } => match access_token {
            Some(token) => format!("AUTH {app_key} {app_secret} {token}\n"),
            None => format!("AUTH {app_key} {app_secret}\n"),
        },
        Command::Quote {
            request_id,
            symbols,
        } => format!("QUOTE {} {}\n", request_id, join_symbols(symbols)),
        Command::StaticInfo {
            request_id,
            symbols,
        } => format!("STATIC {} {}\n", request_id, join_symbols(symbols)),
        Command::Close => "CLOSE\n".to_string(),
    }
}

pub fn parse_reply(line: &str) -> Result<Reply, ProtocolError> {
    let resp = line.trim_end_matches(&['\r', '\n'][..]);

    if resp == "OK" {
        return Ok(Reply::Ok);
    }

    if let Some(rest) = resp.strip_prefix("ERR") {
        return Ok(Reply::Err(rest.trim().to_string()));
    }

    Err(ProtocolError::UnexpectedReply(resp.to_string()))
}

pub fn format_reply_line(reply: &Reply) -> String {
    match reply {
        Reply::Ok => "OK\n".to_string(),
        Reply::Err(reason) => format!("ERR {reason}\n"),
    }
}
