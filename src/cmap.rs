//! ToUnicode CMaps: the code → text table a PDF font carries for extraction.

use std::collections::HashMap;

/// Ranges wider than this are treated as corrupt and skipped.
const MAX_RANGE: u32 = 0xFFFF;

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(Vec<u8>),
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b"<>[]{}()/%".contains(&b)
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b if b.is_ascii_whitespace() => i += 1,
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let digits: Vec<u8> = data[i + 1..]
                    .iter()
                    .copied()
                    .take_while(|&b| b != b'>')
                    .collect();
                i += digits.len() + 2;
                tokens.push(Token::Hex(hex_bytes(&digits)));
            }
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in the CMap header; skip them.
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => {
                let start = i;
                i += 1;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(data[start..i].to_vec()));
            }
        }
    }
    tokens
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&d| (d as char).to_digit(16).map(|n| n as u8))
        .collect();
    // An odd final digit is padded with 0.
    nibbles
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> Option<u32> {
    (1..=4)
        .contains(&bytes.len())
        .then(|| bytes.iter().fold(0, |acc, &b| acc << 8 | u32::from(b)))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[derive(Debug, Default)]
pub(crate) struct ToUnicode {
    /// (code length in bytes, low, high)
    codespace: Vec<(usize, u32, u32)>,
    map: HashMap<(usize, u32), String>,
}

impl ToUnicode {
    pub(crate) fn parse(data: &[u8]) -> ToUnicode {
        let mut cmap = ToUnicode::default();
        let mut tokens = tokenize(data).into_iter().peekable();
        while let Some(token) = tokens.next() {
            let Token::Word(word) = token else {
                continue;
            };
            match word.as_slice() {
                b"begincodespacerange" => {
                    while let Some(Token::Hex(lo)) = tokens.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(hi)) = tokens.next() else {
                            break;
                        };
                        if let (Some(l), Some(h)) = (code_value(&lo), code_value(&hi)) {
                            cmap.codespace.push((lo.len(), l, h));
                        }
                    }
                }
                b"beginbfchar" => {
                    while let Some(Token::Hex(src)) = tokens.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(dst)) = tokens.next() else {
                            continue;
                        };
                        if let Some(code) = code_value(&src) {
                            cmap.map
                                .insert((src.len(), code), String::from_utf16_lossy(&utf16_units(&dst)));
                        }
                    }
                }
                b"beginbfrange" => {
                    while let Some(Token::Hex(lo)) = tokens.next_if(|t| matches!(t, Token::Hex(_))) {
                        let Some(Token::Hex(hi)) = tokens.next() else {
                            break;
                        };
                        let dst = match tokens.next() {
                            Some(Token::Hex(base)) => Destination::Increment(utf16_units(&base)),
                            Some(Token::Open) => {
                                let mut items = Vec::new();
                                while let Some(Token::Hex(item)) = tokens.next_if(|t| matches!(t, Token::Hex(_))) {
                                    items.push(String::from_utf16_lossy(&utf16_units(&item)));
                                }
                                tokens.next_if_eq(&Token::Close);
                                Destination::List(items)
                            }
                            _ => break,
                        };
                        cmap.add_range(&lo, &hi, dst);
                    }
                }
                _ => {}
            }
        }
        cmap.codespace.sort_by_key(|&(len, _, _)| len);
        cmap
    }

    fn add_range(&mut self, lo: &[u8], hi: &[u8], dst: Destination) {
        let (Some(lo_code), Some(hi_code)) = (code_value(lo), code_value(hi)) else {
            return;
        };
        if hi_code < lo_code || hi_code - lo_code > MAX_RANGE {
            log::debug!("skipping bfrange {lo_code:#x}..{hi_code:#x}");
            return;
        }
        let len = lo.len();
        match dst {
            Destination::Increment(base) => {
                let Some((&last, prefix)) = base.split_last() else {
                    return;
                };
                for offset in 0..=hi_code - lo_code {
                    let mut units = prefix.to_vec();
                    units.push(last.wrapping_add(offset as u16));
                    self.map
                        .insert((len, lo_code + offset), String::from_utf16_lossy(&units));
                }
            }
            Destination::List(items) => {
                for (offset, text) in (0..=hi_code - lo_code).zip(items) {
                    self.map.insert((len, lo_code + offset), text);
                }
            }
        }
    }

    /// Split a shown string into codes. The codespace ranges decide each
    /// code's length; `default_len` applies when none matches.
    pub(crate) fn codes(&self, bytes: &[u8], default_len: usize) -> Vec<(usize, u32)> {
        let mut codes = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let len = self
                .codespace
                .iter()
                .find(|&&(len, lo, hi)| {
                    rest.get(..len)
                        .and_then(code_value)
                        .is_some_and(|code| (lo..=hi).contains(&code))
                })
                .map_or(default_len, |&(len, _, _)| len)
                .clamp(1, rest.len());
            let (code, tail) = rest.split_at(len);
            if let Some(value) = code_value(code) {
                codes.push((len, value));
            }
            rest = tail;
        }
        codes
    }

    pub(crate) fn get(&self, len: usize, code: u32) -> Option<&str> {
        self.map.get(&(len, code)).map(String::as_str)
    }
}

enum Destination {
    /// The last UTF-16 unit counts up across the range.
    Increment(Vec<u16>),
    List(Vec<String>),
}
