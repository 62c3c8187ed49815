//! Case metadata from `header` (ASCII) and `header2` (UTF-16LE) sections.
//!
//! Both are zlib streams holding a small tab-separated table: a row of field
//! identifiers followed by a row of values.
//!
//! ```text
//! 1
//! main
//! c   n   a   e   t   av  ov  m   u   p   r
//! 42  7   ... ... ... ... ... ... ... ... ...
//! ```

use std::collections::HashMap;
use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::codec::HeaderField;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CaseInfo {
    fields: HashMap<String, String>,
}

impl CaseInfo {
    /// Decode a header section body
    pub fn decode(data: &[u8], utf16: bool) -> Self {
        let raw = inflate(data).unwrap_or_else(|| data.to_vec());
        let text = if utf16 {
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            String::from_utf8_lossy(&raw).into_owned()
        };
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    /// Pair the identifier row with the value row that follows it
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        let mut fields = HashMap::new();

        for pair in lines.windows(2) {
            let keys: Vec<&str> = pair[0].split('\t').collect();
            if !keys.contains(&"c") || !keys.contains(&"n") {
                continue;
            }
            for (key, value) in keys.iter().zip(pair[1].split('\t')) {
                let value = value.trim();
                if !value.is_empty() {
                    fields.insert(key.trim().to_string(), value.to_string());
                }
            }
            break;
        }

        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: HeaderField) -> Option<&str> {
        let key = match field {
            HeaderField::Notes => "t",
            HeaderField::CaseNumber => "c",
            HeaderField::EvidenceNumber => "n",
            HeaderField::ExaminerName => "e",
        };
        self.fields.get(key).map(String::as_str)
    }
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;
    Some(out)
}
