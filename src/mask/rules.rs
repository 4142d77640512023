//! Built-in masking rule catalog
//!
//! Every rule masks a contiguous character window with `*`. Windows are
//! code-point indexed, never byte indexed, so multi-byte names mask
//! correctly. The window size clamps at the end of the value; a start
//! position beyond the value fails.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::MaskError;

const MASK_CHAR: char = '*';

/// A contiguous mask window in character positions.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: usize,
    size: usize,
}

/// Mainland fuel-vehicle plates: province glyph, issuing letter, four
/// body characters, and a final character that may be a special suffix.
const PLATE_PATTERN: &str = "[京津沪渝冀豫云辽黑湘皖鲁新苏浙赣鄂桂甘晋蒙陕吉闽贵粤青藏川宁琼使领A-Z][A-Z][A-HJ-NP-Z0-9]{4}[A-HJ-NP-Z0-9挂学警港澳]";

fn plate_regex() -> &'static Regex {
    static PLATE: OnceLock<Regex> = OnceLock::new();
    PLATE.get_or_init(|| Regex::new(PLATE_PATTERN).expect("plate pattern is valid"))
}

/// Phone numbers, dispatched on length:
/// 11 digits mask `[3, 7)`, 12 mask `[4, 8)`, 6–7 mask `[1, 5)`,
/// anything of 5 or fewer characters is left as is.
pub(crate) fn phone(map: &mut Map<String, Value>, key: &str) -> Result<(), MaskError> {
    let len = char_len(map, key)?;
    let window = match len {
        11 => Window { start: 3, size: 4 },
        12 => Window { start: 4, size: 4 },
        6 | 7 => Window { start: 1, size: 4 },
        0..=5 => return Ok(()),
        _ => return Err(MaskError::BadPhone(len)),
    };
    apply_window(map, key, window)
}

/// Identity cards: 18-digit mainland cards mask the birth-date block,
/// every other format (including 7/8/10-character HK, Macau, and Taiwan
/// cards) masks four characters after the first.
pub(crate) fn id_card(map: &mut Map<String, Value>, key: &str) -> Result<(), MaskError> {
    let len = char_len(map, key)?;
    let window = if len == 18 {
        Window { start: 6, size: 8 }
    } else {
        Window { start: 1, size: 4 }
    };
    apply_window(map, key, window)
}

/// Personal names: two-character names keep the surname, longer names
/// keep the first and last character.
pub(crate) fn name(map: &mut Map<String, Value>, key: &str) -> Result<(), MaskError> {
    let len = char_len(map, key)?;
    let window = if len == 2 {
        Window { start: 1, size: 1 }
    } else {
        Window {
            start: 1,
            size: len.saturating_sub(2),
        }
    };
    apply_window(map, key, window)
}

/// Car plates: the value must contain a recognizable plate; the three
/// characters after the province glyph are masked.
pub(crate) fn car_number(map: &mut Map<String, Value>, key: &str) -> Result<(), MaskError> {
    let value = string_at(map, key)?;
    if !plate_regex().is_match(&value) {
        return Err(MaskError::BadPlate);
    }
    apply_window(map, key, Window { start: 1, size: 3 })
}

fn string_at(map: &Map<String, Value>, key: &str) -> Result<String, MaskError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(MaskError::NotAString(key.to_string())),
    }
}

fn char_len(map: &Map<String, Value>, key: &str) -> Result<usize, MaskError> {
    Ok(string_at(map, key)?.chars().count())
}

fn apply_window(map: &mut Map<String, Value>, key: &str, window: Window) -> Result<(), MaskError> {
    let value = string_at(map, key)?;
    let mut chars: Vec<char> = value.chars().collect();
    if window.start > chars.len() {
        return Err(MaskError::OutOfRange {
            start: window.start,
            len: chars.len(),
        });
    }
    let end = (window.start + window.size).min(chars.len());
    for ch in &mut chars[window.start..end] {
        *ch = MASK_CHAR;
    }
    map.insert(key.to_string(), Value::String(chars.into_iter().collect()));
    Ok(())
}
