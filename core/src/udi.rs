//! GS1 UDI barcode parsing.
//!
//! Scanners hand over the whole UDI element string (GTIN plus production
//! data), while the registry is keyed on the GTIN alone. Both the bare form
//! (`0108801234567890172612311012345`) and the human-readable form
//! (`(01)08801234567890(17)261231(10)12345`) are understood.

use chrono::{Datelike, NaiveDate, Utc};

const AI_GTIN: &str = "01";
const AI_EXPIRATION: &str = "17";
const AI_LOT: &str = "10";
const AI_SERIAL: &str = "21";

/// FNC1 group separator, terminates variable-length fields.
const GROUP_SEPARATOR: char = '\u{1D}';

const GTIN_LEN: usize = 14;
const DATE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UdiBarcode {
    pub gtin: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub lot_number: Option<String>,
    pub serial_number: Option<String>,
    pub raw: String,
    cleaned: String,
}

impl UdiBarcode {
    pub fn parse(raw: &str) -> Self {
        Self::parse_in_year(raw, Utc::now().year())
    }

    /// Parses with expiration years resolved relative to `current_year`.
    pub fn parse_in_year(raw: &str, current_year: i32) -> Self {
        let with_separators: String = raw
            .chars()
            .filter(|c| !matches!(c, '\u{1E}' | '\u{1F}' | '\u{04}'))
            .collect();
        let with_separators = with_separators.trim().trim_matches(GROUP_SEPARATOR);
        let cleaned: String = with_separators.chars().filter(|c| *c != GROUP_SEPARATOR).collect();

        let mut barcode = UdiBarcode {
            raw: raw.to_string(),
            cleaned: cleaned.clone(),
            ..Default::default()
        };

        if cleaned.starts_with(AI_GTIN) && cleaned.len() >= AI_GTIN.len() + GTIN_LEN {
            barcode.read_element_string(with_separators, current_year);
        } else if cleaned.contains("(01)") {
            barcode.read_bracketed(&cleaned, current_year);
        } else if matches!(cleaned.len(), 13 | 14) && is_digits(&cleaned) {
            barcode.gtin = Some(format!("{cleaned:0>14}"));
        } else {
            barcode.gtin = find_embedded_gtin(&cleaned);
        }

        barcode
    }

    /// What to send to the registry: the GTIN when one was found, otherwise
    /// the input without control characters.
    pub fn identifier(&self) -> &str {
        self.gtin.as_deref().unwrap_or(&self.cleaned)
    }

    fn read_element_string(&mut self, input: &str, current_year: i32) {
        let mut rest = input;
        while rest.len() >= 2 {
            let Some((ai, tail)) = rest.split_at_checked(2) else {
                return;
            };
            match ai {
                AI_GTIN => {
                    let Some((gtin, tail)) = tail.split_at_checked(GTIN_LEN) else {
                        return;
                    };
                    if !is_digits(gtin) {
                        self.gtin = None;
                        return;
                    }
                    self.gtin = Some(gtin.to_string());
                    rest = tail;
                }
                AI_EXPIRATION => {
                    let Some((date, tail)) = tail.split_at_checked(DATE_LEN) else {
                        return;
                    };
                    self.expiration_date = parse_gs1_date(date, current_year);
                    rest = tail;
                }
                AI_LOT | AI_SERIAL => {
                    let (value, tail) = match tail.find(GROUP_SEPARATOR) {
                        Some(end) => (&tail[..end], &tail[end + GROUP_SEPARATOR.len_utf8()..]),
                        None => (tail, ""),
                    };
                    let value = Some(value.to_string()).filter(|v| !v.is_empty());
                    if ai == AI_LOT {
                        self.lot_number = value;
                    } else {
                        self.serial_number = value;
                    }
                    rest = tail;
                }
                _ => return,
            }
        }
    }

    fn read_bracketed(&mut self, input: &str, current_year: i32) {
        for segment in input.split('(').skip(1) {
            let Some((ai, value)) = segment.split_once(')') else {
                continue;
            };
            let value = value.trim();
            match ai {
                AI_GTIN if value.len() == GTIN_LEN && is_digits(value) => {
                    self.gtin = Some(value.to_string());
                }
                AI_EXPIRATION => self.expiration_date = parse_gs1_date(value, current_year),
                AI_LOT if !value.is_empty() => self.lot_number = Some(value.to_string()),
                AI_SERIAL if !value.is_empty() => self.serial_number = Some(value.to_string()),
                _ => {}
            }
        }
    }
}

/// Parses a GS1 `YYMMDD` date. Day `00` means the last day of the month.
/// The century is the current one unless that puts the date more than 20
/// years out.
pub fn parse_gs1_date(value: &str, current_year: i32) -> Option<NaiveDate> {
    if value.len() != DATE_LEN || !is_digits(value) {
        return None;
    }
    let yy: i32 = value[0..2].parse().ok()?;
    let month: u32 = value[2..4].parse().ok()?;
    let day: u32 = value[4..6].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    let century = current_year.div_euclid(100) * 100;
    let mut year = century + yy;
    if year > current_year + 20 {
        year -= 100;
    }

    if day == 0 {
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        return NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt();
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn find_embedded_gtin(input: &str) -> Option<String> {
    input.match_indices(AI_GTIN).find_map(|(start, _)| {
        let candidate = input.get(start + 2..start + 2 + GTIN_LEN)?;
        is_digits(candidate).then(|| candidate.to_string())
    })
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
