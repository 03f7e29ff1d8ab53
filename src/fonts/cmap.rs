/*!
 * ToUnicode CMaps: parsing `bfchar`/`bfrange` sections of existing fonts and
 * writing the map for fonts we embed.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)begin(bfchar|bfrange)(.*?)end(?:bfchar|bfrange)").expect("static regex")
});

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f\s]*)>|\[|\]").expect("static regex"));

/// Code to Unicode mapping read from a ToUnicode stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    entries: HashMap<u32, String>,
    /// Byte length of source codes, taken from the first entry
    code_len: Option<usize>,
}

#[derive(Debug)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter(|b| b.is_ascii_hexdigit())
        .map(|b| (b as char).to_digit(16).unwrap_or(0) as u8)
        .collect();
    digits
        .chunks(2)
        .map(|pair| if pair.len() == 2 { (pair[0] << 4) | pair[1] } else { pair[0] << 4 })
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| if pair.len() == 2 { u16::from_be_bytes([pair[0], pair[1]]) } else { pair[0] as u16 })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Destination string shifted by `offset` in its last UTF-16 unit
fn offset_destination(bytes: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| if pair.len() == 2 { u16::from_be_bytes([pair[0], pair[1]]) } else { pair[0] as u16 })
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut map = Self::default();

        for section in SECTION.captures_iter(&text) {
            let kind = &section[1];
            let tokens: Vec<Token> = TOKEN
                .captures_iter(&section[2])
                .map(|cap| match cap.get(1) {
                    Some(hex) => Token::Hex(hex_bytes(hex.as_str())),
                    None if &cap[0] == "[" => Token::Open,
                    None => Token::Close,
                })
                .collect();

            if kind == "bfchar" {
                let mut iter = tokens.into_iter();
                while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) = (iter.next(), iter.next()) {
                    map.insert(&src, utf16_be(&dst));
                }
            } else {
                map.parse_ranges(tokens);
            }
        }
        map
    }

    fn parse_ranges(&mut self, tokens: Vec<Token>) {
        let mut iter = tokens.into_iter();
        while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (iter.next(), iter.next()) {
            let (start, end) = (code_value(&lo), code_value(&hi));
            if end < start || end - start > 0xFFFF {
                continue;
            }
            match iter.next() {
                Some(Token::Hex(dst)) => {
                    for (offset, code) in (start..=end).enumerate() {
                        self.insert_code(code, lo.len(), offset_destination(&dst, offset as u32));
                    }
                }
                Some(Token::Open) => {
                    let mut code = start;
                    for token in iter.by_ref() {
                        match token {
                            Token::Hex(dst) if code <= end => {
                                self.insert_code(code, lo.len(), utf16_be(&dst));
                                code += 1;
                            }
                            Token::Close => break,
                            _ => {}
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn insert(&mut self, src: &[u8], value: String) {
        self.insert_code(code_value(src), src.len(), value);
    }

    fn insert_code(&mut self, code: u32, len: usize, value: String) {
        self.code_len.get_or_insert(len.max(1));
        self.entries.insert(code, value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn code_len(&self) -> Option<usize> {
        self.code_len
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }
}

/// ToUnicode stream for a font whose codes are UTF-16 code units
pub fn identity_utf16_cmap() -> Vec<u8> {
    let body = "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<0000> <FFFF>\n\
endcodespacerange\n\
1 beginbfrange\n\
<0000> <FFFF> <0000>\n\
endbfrange\n\
endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end\n";
    body.as_bytes().to_vec()
}
