use serde::{Deserialize, Serialize};

use crate::constants::MAX_FRAME_LEN;
use crate::error::WireError;
use crate::types::{Quote, StaticInfo};

pub const WIRE_VERSION: u8 = 1;

/// версия (1 байт) + длина payload (u32 BE)
const HEADER_LEN: usize = 5;

/// Ответы провайдера после успешного `AUTH`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// По одной котировке на каждую позицию запроса
    Quotes {
        request_id: u64,
        quotes: Vec<Quote>,
    },
    /// По одной записи справочника на каждую позицию запроса
    StaticInfo {
        request_id: u64,
        infos: Vec<StaticInfo>,
    },
    /// Провайдер отклонил запрос целиком
    Error { request_id: u64, message: String },
}

impl Response {
    pub fn request_id(&self) -> u64 {
        match self {
            Response::Quotes { request_id, .. }
            | Response::StaticInfo { request_id, .. }
            | Response::Error { request_id, .. } => *request_id,
        }
    }
}

/// Кадр: `[WIRE_VERSION][len u32 BE][postcard payload]`
pub fn encode_frame(resp: &Response) -> Result<Vec<u8>, WireError> {
    let payload = postcard::to_allocvec(resp)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(WIRE_VERSION);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Накопительный декодер входящего TCP-потока.
///
/// Байты копятся между чтениями, поэтому прерванное на середине кадра
/// ожидание не ломает поток: следующий вызов продолжит с того же места.
/// Умеет выдавать как текстовые строки (handshake), так и бинарные кадры.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Сколько байт ждёт разбора
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Следующая строка до `\n` (без `\r\n`), если она пришла целиком
    pub fn next_line(&mut self) -> Result<Option<String>, WireError> {
        let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.buf.len() > MAX_FRAME_LEN {
                return Err(WireError::FrameTooLarge {
                    len: self.buf.len(),
                    max: MAX_FRAME_LEN,
                });
            }
            return Ok(None);
        };

        let raw: Vec<u8> = self.buf.drain(..=pos).collect();
        let line = String::from_utf8(raw).map_err(|_| WireError::BadUtf8)?;
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    /// Следующий бинарный кадр, если он пришёл целиком
    pub fn next_frame(&mut self) -> Result<Option<Response>, WireError> {
        let Some(&ver) = self.buf.first() else {
            return Ok(None);
        };
        if ver != WIRE_VERSION {
            return Err(WireError::UnsupportedWireVersion(ver));
        }
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.buf[1..HEADER_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        // кадр снимаем с буфера даже если payload битый
        let frame: Vec<u8> = self.buf.drain(..HEADER_LEN + len).collect();
        let resp = postcard::from_bytes(&frame[HEADER_LEN..])?;
        Ok(Some(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceSnapshot, Symbol};

    fn quotes_response(request_id: u64) -> Response {
        Response::Quotes {
            request_id,
            quotes: vec![
                Quote::found(
                    Symbol::new("700.HK").unwrap(),
                    PriceSnapshot {
                        last_done: 365.2,
                        prev_close: 360.0,
                        open: 361.0,
                        high: 366.0,
                        low: 359.8,
                        volume: 12_000,
                        turnover: 4_382_400.0,
                        timestamp_ms: 1_700_000_000_000,
                    },
                ),
                Quote::not_found(Symbol::new("XXX.US").unwrap()),
            ],
        }
    }

    #[test]
    fn frame_split_across_pushes_is_decoded_once_complete() {
        let resp = quotes_response(3);
        let bytes = encode_frame(&resp).unwrap();
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        let mut dec = FrameDecoder::new();
        dec.push(&head[..2]);
        assert!(dec.next_frame().unwrap().is_none());
        dec.push(&head[2..]);
        assert!(dec.next_frame().unwrap().is_none());
        dec.push(tail);

        assert_eq!(dec.next_frame().unwrap(), Some(resp));
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn two_frames_in_one_push() {
        let mut bytes = encode_frame(&quotes_response(1)).unwrap();
        bytes.extend(
            encode_frame(&Response::Error {
                request_id: 2,
                message: "nope".into(),
            })
            .unwrap(),
        );

        let mut dec = FrameDecoder::new();
        dec.push(&bytes);
        assert_eq!(dec.next_frame().unwrap().map(|r| r.request_id()), Some(1));
        assert_eq!(dec.next_frame().unwrap().map(|r| r.request_id()), Some(2));
        assert!(dec.next_frame().unwrap().is_none());
    }

    #[test]
    fn handshake_line_then_frame() {
        let mut bytes = b"OK\r\n".to_vec();
        bytes.extend(encode_frame(&quotes_response(5)).unwrap());

        let mut dec = FrameDecoder::new();
        dec.push(&bytes);
        assert_eq!(dec.next_line().unwrap().as_deref(), Some("OK"));
        assert_eq!(dec.next_frame().unwrap().map(|r| r.request_id()), Some(5));
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut dec = FrameDecoder::new();
        dec.push(b"ER");
        assert_eq!(dec.next_line().unwrap(), None);
        dec.push(b"R denied\n");
        assert_eq!(dec.next_line().unwrap().as_deref(), Some("ERR denied"));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut dec = FrameDecoder::new();
        dec.push(&[9, 0, 0, 0, 0]);
        assert!(matches!(
            dec.next_frame(),
            Err(WireError::UnsupportedWireVersion(9))
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_buffering() {
        let mut dec = FrameDecoder::new();
        let mut header = vec![WIRE_VERSION];
        header.extend_from_slice(&u32::MAX.to_be_bytes());
        dec.push(&header);
        assert!(matches!(
            dec.next_frame(),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn garbage_payload_is_dropped_with_error() {
        let mut dec = FrameDecoder::new();
        dec.push(&[WIRE_VERSION, 0, 0, 0, 2, 0xff, 0xff]);
        assert!(matches!(dec.next_frame(), Err(WireError::Postcard(_))));
        assert_eq!(dec.buffered(), 0);
    }
}
