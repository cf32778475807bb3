//! 地名から照合パターンを生成する
//!
//! 生成されるパターンはすべて文字列の先頭に固定される。京都市の町丁目だけは通り名が
//! 前に付くため、先頭から任意の文字列を読み飛ばしてから照合する。

use crate::kanji::{is_kanji_numeral, to_arabic};
use crate::region::{prefecture_stem, Town};
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashSet;

/// ハイフンとして扱う文字
const DASHES: &[char] = &[
    '-', '－', '﹣', '−', '‐', '⁃', '‑', '‒', '–', '—', '﹘', '―', '⎯', '⏤', 'ー', 'ｰ', '─', '━',
];

/// 町丁目名中の漢数字の後に続く助数詞
const COUNTERS: &[&str] = &[
    "丁目", "丁", "番町", "番丁", "条", "軒", "線", "の町", "ノ町", "地割", "号",
];

const BIG_LETTER_OPTIONAL: &str = "(?:大?字)?";

/// 漢数字の町名に使われる文字（助数詞の前に置かれるもの）
const TOWN_NUMERALS: &[char] = &['壱', '一', '二', '三', '四', '五', '六', '七', '八', '九', '十'];

/// 表記ゆれを許容する複数文字の語
const WORD_VARIANTS: &[&[&str]] = &[
    &["通り", "とおり"],
    &["埠頭", "ふ頭"],
    &["番町", "番丁"],
];

/// 表記ゆれを許容する文字の組
const CHAR_VARIANTS: &[&str] = &[
    "之ノの",
    "ヶケが",
    "ヵカか力",
    "ッツっつ",
    "ニ二",
    "ハ八",
    "塚\u{FA10}",
    "釜竈",
    "條条",
    "狛拍",
    "藪薮",
    "渕淵",
    "エヱえ",
    "曾曽",
    "舟船",
    "莵菟",
    "市巿",
];

/// コンパイル済みの照合パターン
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    fn compile(source: &str) -> Option<Self> {
        match Regex::new(source) {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                tracing::warn!(pattern = source, error = %e, "skipping uncompilable pattern");
                None
            }
        }
    }

    /// 先頭からマッチした部分を返す
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.split(text).map(|(matched, _)| matched)
    }

    /// マッチした部分と残りに分割する
    pub fn split<'t>(&self, text: &'t str) -> Option<(&'t str, &'t str)> {
        self.regex
            .find(text)
            .map(|m| (&text[..m.end()], &text[m.end()..]))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// 正規表現としての表現（デバッグ用）
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// 都道府県・市区町村のパターン
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// マッチしたときに報告する正式名称
    pub key: String,
    pub pattern: Pattern,
}

/// 町丁目のパターン
#[derive(Debug, Clone)]
pub struct TownPattern {
    /// マッチしたときに報告する正式名称
    pub key: String,
    /// パターンの元になった名称（別名の場合は省略形）
    pub name: String,
    /// 別名の場合の元の町丁目名
    pub original_town: Option<String>,
    pub koaza: String,
    pub lat: f64,
    pub lng: f64,
    pub pattern: Pattern,
}

impl TownPattern {
    pub fn is_alias(&self) -> bool {
        self.original_town.is_some()
    }
}

/// 都道府県のパターン（"東京" のように末尾の都道府県が抜けていても可）
pub fn compile_prefecture_pattern(name: &str) -> Option<CompiledPattern> {
    let stem = prefecture_stem(name);
    let pattern = Pattern::compile(&format!("^{}(?:都|道|府|県)?", regex::escape(stem)))?;
    Some(CompiledPattern {
        key: name.to_string(),
        pattern,
    })
}

/// 都道府県名と同じ語で始まる市のパターン（例: 千葉県千葉市）
///
/// マッチした部分を `key`（都道府県名＋市名）に置き換えてから都道府県を判定する。
pub fn compile_collision_pattern(prefecture: &str, city: &str) -> Option<CompiledPattern> {
    let pattern = Pattern::compile(&format!("^{}", regex::escape(city)))?;
    Some(CompiledPattern {
        key: format!("{}{}", prefecture, city),
        pattern,
    })
}

/// 市区町村のパターン
///
/// 町・村は郡名が省略されやすいため、郡までを省略可能にする。
pub fn compile_city_pattern(city: &str) -> Option<CompiledPattern> {
    let source = match county_split(city) {
        Some((county, rest)) => format!("^(?:{})?{}", fold_literal(county), fold_literal(rest)),
        None => format!("^{}", fold_literal(city)),
    };
    let pattern = Pattern::compile(&source)?;
    Some(CompiledPattern {
        key: city.to_string(),
        pattern,
    })
}

/// "西多摩郡奥多摩町" -> ("西多摩郡", "奥多摩町")
fn county_split(city: &str) -> Option<(&str, &str)> {
    if !(city.ends_with('町') || city.ends_with('村')) {
        return None;
    }
    let (idx, _) = city.char_indices().skip(1).find(|&(_, c)| c == '郡')?;
    let end = idx + '郡'.len_utf8();
    Some((&city[..end], &city[end..]))
}

/// 都道府県のパターン一覧（カタログ順）
pub fn compile_prefecture_patterns<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<CompiledPattern> {
    names
        .into_iter()
        .filter_map(compile_prefecture_pattern)
        .collect()
}

/// 市区町村のパターン一覧（名称の長い順）
pub fn compile_city_patterns(cities: &[String]) -> Vec<CompiledPattern> {
    let mut sorted: Vec<&String> = cities.iter().collect();
    sorted.sort_by_key(|c| Reverse(c.chars().count()));
    sorted
        .into_iter()
        .filter_map(|c| compile_city_pattern(c))
        .collect()
}

struct TownEntry<'a> {
    name: String,
    original_town: Option<String>,
    town: &'a Town,
}

/// 町丁目のパターン一覧を優先順に生成する
pub fn compile_town_patterns(prefecture: &str, city: &str, towns: &[Town]) -> Vec<TownPattern> {
    let mut entries = with_aliases(towns);

    // 短い名前が長い名前の一部に先にマッチしないよう、長い順に並べる
    entries.sort_by_key(|e| Reverse(priority_len(&e.name)));

    let unanchored = city.starts_with("京都市");
    let patterns: Vec<TownPattern> = entries
        .into_iter()
        .filter_map(|entry| {
            let body = town_pattern_source(&entry.name);
            let source = if unanchored {
                format!("^.*{}", body)
            } else {
                format!("^{}", body)
            };
            let pattern = Pattern::compile(&source)?;
            Some(TownPattern {
                key: entry
                    .original_town
                    .clone()
                    .unwrap_or_else(|| entry.name.clone()),
                name: entry.name,
                original_town: entry.original_town,
                koaza: entry.town.koaza.clone(),
                lat: entry.town.lat,
                lng: entry.town.lng,
                pattern,
            })
        })
        .collect();

    tracing::debug!(
        prefecture,
        city,
        towns = towns.len(),
        patterns = patterns.len(),
        "compiled town patterns"
    );
    patterns
}

/// 元の町丁目に「町」を省略した別名を加える
///
/// 同じ自治体に「〇〇町」と「〇〇」（または「大字〇〇」）が共存する場合や、
/// 「十六町」のように漢数字の直後に町が続く場合は別名を作らない。
fn with_aliases(towns: &[Town]) -> Vec<TownEntry<'_>> {
    let names: HashSet<&str> = towns.iter().map(|t| t.name.as_str()).collect();
    let mut entries = Vec::with_capacity(towns.len() * 2);

    for town in towns {
        entries.push(TownEntry {
            name: town.name.clone(),
            original_town: None,
            town,
        });

        let abbr = strip_cho(&town.name);
        if abbr.is_empty()
            || abbr == town.name
            || names.contains(abbr.as_str())
            || names.contains(format!("大字{}", abbr).as_str())
            || numeral_before_cho(&town.name)
        {
            continue;
        }
        entries.push(TownEntry {
            name: abbr,
            original_town: Some(town.name.clone()),
            town,
        });
    }
    entries
}

/// 先頭以外の「町」をすべて取り除く
fn strip_cho(name: &str) -> String {
    name.chars()
        .enumerate()
        .filter(|&(i, c)| i == 0 || c != '町')
        .map(|(_, c)| c)
        .collect()
}

fn numeral_before_cho(name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();
    chars
        .windows(2)
        .any(|w| w[1] == '町' && is_kanji_numeral(w[0]))
}

/// 並べ替え用の長さ（「大字」で始まる名前は 2 文字短く数える）
fn priority_len(name: &str) -> usize {
    let len = name.chars().count();
    if name.starts_with("大字") {
        len.saturating_sub(2)
    } else {
        len
    }
}

fn dash_class() -> String {
    let mut class = String::from("[");
    for &d in DASHES {
        class.push_str(&regex::escape(d.encode_utf8(&mut [0u8; 4])));
    }
    class.push(']');
    class
}

/// 町丁目名の照合パターン（先頭固定の指定は含まない）
fn town_pattern_source(name: &str) -> String {
    let mut out = String::new();
    let rest = if let Some(rest) = name.strip_prefix("大字") {
        out.push_str(BIG_LETTER_OPTIONAL);
        rest
    } else if let Some(rest) = name.strip_prefix('字') {
        out.push_str(BIG_LETTER_OPTIONAL);
        rest
    } else {
        name
    };

    let chars: Vec<char> = rest.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if DASHES.contains(&chars[i]) {
            out.push_str(&dash_class());
            i += 1;
        } else if let Some((consumed, source)) = numbered_block(&chars[i..]) {
            out.push_str(&source);
            i += consumed;
        } else {
            let (consumed, source) = fold_step(&chars[i..]);
            out.push_str(&source);
            i += consumed;
        }
    }
    out
}

/// 「五丁目」「三条」などを「5丁目」「5-」にもマッチさせる
fn numbered_block(chars: &[char]) -> Option<(usize, String)> {
    let run_len = chars
        .iter()
        .take_while(|&&c| TOWN_NUMERALS.contains(&c))
        .count();
    if run_len == 0 {
        return None;
    }
    let tail: String = chars[run_len..].iter().take(2).collect();
    let counter = COUNTERS.iter().find(|c| tail.starts_with(*c))?;

    let run: String = chars[..run_len].iter().collect();
    let mut alternatives = vec![fold_literal(&run)];
    if run.starts_with('壱') {
        alternatives.extend(["一", "1", "１"].map(String::from));
    } else {
        alternatives.push(to_arabic(&run));
    }

    let source = format!(
        "(?:{})(?:(?:丁|町)目?|番(?:町|丁)|[條条]|軒|線|[之ノの]町?|地割|号|{})",
        alternatives.join("|"),
        dash_class()
    );
    Some((run_len + counter.chars().count(), source))
}

/// 表記ゆれを考慮して 1 語（または 1 文字）をパターンにする
fn fold_step(chars: &[char]) -> (usize, String) {
    for group in WORD_VARIANTS {
        for word in group.iter() {
            let len = word.chars().count();
            if chars.len() >= len && chars[..len].iter().copied().eq(word.chars()) {
                let alternation: Vec<String> = group.iter().map(|w| regex::escape(w)).collect();
                return (len, format!("(?:{})", alternation.join("|")));
            }
        }
    }

    let c = chars[0];
    let source = match CHAR_VARIANTS.iter().find(|group| group.contains(c)) {
        Some(group) => format!("[{}]", group),
        None => regex::escape(c.encode_utf8(&mut [0u8; 4])),
    };
    (1, source)
}

/// 表記ゆれを考慮した文字列パターン
fn fold_literal(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let (consumed, source) = fold_step(&chars[i..]);
        out.push_str(&source);
        i += consumed;
    }
    out
}
