//! Packet announcement parser
//!
//! Bots advertise their packs with periodic channel broadcasts such as
//!
//! ```text
//! #12   41x [1.4G] Show.S01E02.1080p.mkv
//! ```
//!
//! Each channel carries a regular expression and the list of field names its
//! capture groups map to, positionally. Recognized field names are `pack`,
//! `name`, `size`, `unit` and `gets`; any other name is kept verbatim in
//! [`PackInfo::extra`].

use regex::Regex;

use crate::error::Result;
use crate::types::PackInfo;

/// Pattern matching the announcement format of iroffer-style bots
pub const DEFAULT_PATTERN: &str = r"#(\d+)\s+(\d+)x\s+\[\s*([\d.]+)\s*([A-Za-z]*)\s*\]\s+(.+)";

/// Field names for the capture groups of [`DEFAULT_PATTERN`]
pub const DEFAULT_FIELDS: [&str; 5] = ["pack", "gets", "size", "unit", "name"];

/// Compiled announcement pattern for one channel
#[derive(Clone, Debug)]
pub struct AnnouncementParser {
    pattern: Regex,
    fields: Vec<String>,
}

impl AnnouncementParser {
    /// Compile `pattern`; capture group `i + 1` is mapped to `fields[i]`
    pub fn new(pattern: &str, fields: &[String]) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            fields: fields.to_vec(),
        })
    }

    /// Parse one broadcast line
    ///
    /// Returns `None` when the pattern does not match or no valid pack number
    /// was captured.
    pub fn parse(&self, line: &str) -> Option<PackInfo> {
        let line = strip_formatting(line);
        let captures = self.pattern.captures(&line)?;

        let mut pack = None;
        let mut info = PackInfo::default();
        let mut raw_size = None;

        for (index, field) in self.fields.iter().enumerate() {
            let Some(value) = captures.get(index + 1) else {
                continue;
            };
            let value = value.as_str().trim();

            match field.as_str() {
                "pack" => pack = value.trim_start_matches('#').parse::<u32>().ok(),
                "name" => info.name = Some(value.to_string()),
                "size" => raw_size = Some(value.to_string()),
                "unit" if !value.is_empty() => info.unit = Some(value.to_string()),
                "unit" => {}
                "gets" => info.gets = value.trim_end_matches(['x', 'X']).parse().ok(),
                other => {
                    info.extra.insert(other.to_string(), value.to_string());
                }
            }
        }

        info.pack = pack?;

        if let Some(raw) = raw_size {
            match raw.parse::<f64>() {
                Ok(size) => info.size = Some(size),
                Err(_) => {
                    info.extra.insert("size".to_string(), raw);
                }
            }
        }

        if let (Some(size), Some(unit)) = (info.size, info.unit.as_deref())
            && let Some(scaled) = scale_size(size, unit)
        {
            info.size = Some(scaled);
            info.unit = None;
        }

        Some(info)
    }
}

/// Scale `size` to bytes according to `unit`
///
/// Each tier above kilobytes multiplies once more by 1024, falling through
/// down to the kilobyte step: `T` = 4 multiplications, `G` = 3, `M` = 2, `K` = 1.
/// Only the first letter counts, case-insensitively. Unknown units return `None`.
pub fn scale_size(size: f64, unit: &str) -> Option<f64> {
    let tiers = match unit.trim().chars().next()?.to_ascii_lowercase() {
        't' => 4,
        'g' => 3,
        'm' => 2,
        'k' => 1,
        _ => return None,
    };

    let mut scaled = size;
    for _ in 0..tiers {
        scaled *= 1024.0;
    }
    Some(scaled)
}

/// Remove mIRC formatting codes (bold, color, reverse, italics, underline, reset)
pub fn strip_formatting(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x02' | '\x0f' | '\x16' | '\x1d' | '\x1e' | '\x1f' => {}
            '\x03' => {
                // \x03[fg[,bg]] with up to two digits each
                for _ in 0..2 {
                    if chars.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                    }
                }
                if chars.peek() == Some(&',') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                        for _ in 0..2 {
                            if chars.peek().is_some_and(char::is_ascii_digit) {
                                chars.next();
                            }
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
