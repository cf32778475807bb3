//! 行政区画データ構造

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 都道府県
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prefecture {
    /// 正式名称（都・道・府・県を含む）
    pub name: String,
    /// 市区町村名（カタログ掲載順）
    pub cities: Vec<String>,
}

impl Prefecture {
    pub fn new(name: impl Into<String>, cities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cities,
        }
    }

    /// 末尾の「都道府県」を除いた語幹（例: "東京都" -> "東京"）
    pub fn stem(&self) -> &str {
        prefecture_stem(&self.name)
    }

    /// 市区町村を持つか
    pub fn has_city(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }
}

/// 都道府県名から末尾の 都/道/府/県 を 1 文字取り除く
pub(crate) fn prefecture_stem(name: &str) -> &str {
    name.strip_suffix(['都', '道', '府', '県']).unwrap_or(name)
}

/// 町丁目
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Town {
    /// 町丁目名（「大字」などの接頭辞を含む場合がある）
    #[cfg_attr(feature = "serde", serde(rename = "town"))]
    pub name: String,
    /// 小字
    #[cfg_attr(feature = "serde", serde(default))]
    pub koaza: String,
    pub lat: f64,
    pub lng: f64,
}

impl Town {
    pub fn new(name: impl Into<String>, koaza: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            koaza: koaza.into(),
            lat,
            lng,
        }
    }
}

/// 都道府県の検出結果
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrefectureMatch {
    pub prefecture: String,
    /// 都道府県名以降の住所
    pub remainder: String,
}

/// 市区町村の検出結果
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CityMatch {
    pub city: String,
    /// 市区町村名以降の住所
    pub remainder: String,
}

/// 町丁目の検出結果
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TownMatch {
    /// 正式な町丁目名（別名でマッチした場合も元の名称）
    pub town: String,
    /// 町丁目名以降の住所
    pub remainder: String,
    pub lat: f64,
    pub lng: f64,
}

/// 住所全体の解析結果
///
/// 途中の階層までしか分からなかった場合も正常な結果として扱う。
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParsedAddress {
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// 未解析の残り
    pub remainder: String,
}

impl ParsedAddress {
    /// 入力をそのまま残りとして持つ空の結果
    pub fn unmatched(address: impl Into<String>) -> Self {
        Self {
            remainder: address.into(),
            ..Self::default()
        }
    }

    pub fn has_prefecture(&self) -> bool {
        self.prefecture.is_some()
    }

    pub fn has_city(&self) -> bool {
        self.city.is_some()
    }

    pub fn has_town(&self) -> bool {
        self.town.is_some()
    }

    /// 都道府県・市区町村・町丁目がすべて揃っているか
    pub fn is_complete(&self) -> bool {
        self.prefecture.is_some() && self.city.is_some() && self.town.is_some()
    }

    /// 正規化済みの住所文字列
    pub fn full_address(&self) -> String {
        let mut result = String::new();
        for part in [&self.prefecture, &self.city, &self.town].into_iter().flatten() {
            result.push_str(part);
        }
        result.push_str(&self.remainder);
        result
    }
}
