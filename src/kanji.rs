//! 漢数字の検出とアラビア数字への変換

use once_cell::sync::Lazy;
use regex::Regex;

/// 漢数字を構成する文字
const KANJI_NUMERAL_CHARS: &str = "〇一二三四五六七八九十百千万億兆壱弐参拾";

static KANJI_NUMERAL_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("[{}]+", KANJI_NUMERAL_CHARS)).expect("valid kanji numeral regex")
});

/// 大字（壱・弐・参・拾）を通常の漢数字に揃える
fn normalize_legal_forms(c: char) -> char {
    match c {
        '壱' => '一',
        '弐' => '二',
        '参' => '三',
        '拾' => '十',
        other => other,
    }
}

fn digit_value(c: char) -> Option<u64> {
    let v = match c {
        '〇' => 0,
        '一' => 1,
        '二' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        _ => return None,
    };
    Some(v)
}

fn small_unit(c: char) -> Option<u64> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1_000),
        _ => None,
    }
}

fn large_unit(c: char) -> Option<u64> {
    match c {
        '万' => Some(10_000),
        '億' => Some(100_000_000),
        '兆' => Some(1_000_000_000_000),
        _ => None,
    }
}

/// 千の位までの区間を数値にする（"三千二百十五" -> 3215）
fn parse_section(chars: &[char]) -> Option<u64> {
    let mut total = 0u64;
    let mut pending: Option<u64> = None;
    for &c in chars {
        if let Some(d) = digit_value(c) {
            pending = Some(pending.unwrap_or(0).checked_mul(10)?.checked_add(d)?);
        } else if let Some(unit) = small_unit(c) {
            total = total.checked_add(pending.take().unwrap_or(1).checked_mul(unit)?)?;
        } else {
            return None;
        }
    }
    total.checked_add(pending.unwrap_or(0))
}

/// 漢数字列を数値に変換する
///
/// 数字だけの並び（〇を含む場合も）は位取り表記として読む。
pub fn kanji_to_number(text: &str) -> Option<u64> {
    let chars: Vec<char> = text.chars().map(normalize_legal_forms).collect();
    if chars.is_empty() {
        return None;
    }

    if chars.contains(&'〇') || chars.iter().all(|&c| digit_value(c).is_some()) {
        return chars.iter().try_fold(0u64, |acc, &c| {
            let d = digit_value(c)?;
            acc.checked_mul(10)?.checked_add(d)
        });
    }

    let mut total = 0u64;
    let mut start = 0;
    for (i, &c) in chars.iter().enumerate() {
        if let Some(unit) = large_unit(c) {
            let section = if start == i { 1 } else { parse_section(&chars[start..i])? };
            total = total.checked_add(section.checked_mul(unit)?)?;
            start = i + 1;
        }
    }
    total.checked_add(parse_section(&chars[start..])?)
}

/// 漢数字列をアラビア数字の文字列に変換する（"二十三" -> "23"）
///
/// 数値として読めない入力はそのまま返す。
pub fn to_arabic(text: &str) -> String {
    kanji_to_number(text)
        .map(|n| n.to_string())
        .unwrap_or_else(|| text.to_string())
}

/// 文中の漢数字列をすべて取り出す
pub fn find_kanji_numerals(text: &str) -> Vec<&str> {
    KANJI_NUMERAL_RUN.find_iter(text).map(|m| m.as_str()).collect()
}

/// 漢数字を構成する文字か
pub(crate) fn is_kanji_numeral(c: char) -> bool {
    KANJI_NUMERAL_CHARS.contains(c)
}
