//! 住所解析の本体
//!
//! 都道府県 → 市区町村 → 町丁目 の順に、それぞれのパターンを優先順に試して
//! 最初にマッチしたものを採用する。

use crate::cache::CatalogCache;
use crate::config::Config;
use crate::data::DataSource;
use crate::error::Result;
use crate::region::{CityMatch, ParsedAddress, Prefecture, PrefectureMatch, Town, TownMatch};
use std::sync::Arc;

/// 住所解析器
///
/// 全段階で同じ `CatalogCache` を共有する。
#[derive(Debug, Clone)]
pub struct AddressParser {
    cache: Arc<CatalogCache>,
}

impl AddressParser {
    /// データソースと設定から解析器を作成する
    pub fn new(source: impl DataSource + 'static, config: Config) -> Self {
        Self::with_cache(Arc::new(CatalogCache::new(source, &config)))
    }

    /// 既存のキャッシュを共有する解析器を作成する
    pub fn with_cache(cache: Arc<CatalogCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    /// 都道府県を特定する
    ///
    /// 都道府県名が省略されている場合は市区町村名から推定する。同名の市区町村が複数の
    /// 都道府県にあるときは町丁目まで照合し、カタログ順で最後に町丁目が見つかった
    /// 都道府県を採用する。
    ///
    /// # 例
    /// ```rust
    /// use jpaddr::{AddressParser, Config, Prefecture, StaticSource};
    ///
    /// let source = StaticSource::new(vec![
    ///     Prefecture::new("東京都", vec!["千代田区".to_string()]),
    /// ]);
    /// let parser = AddressParser::new(source, Config::default());
    ///
    /// let m = parser.detect_prefecture("東京千代田区").unwrap().unwrap();
    /// assert_eq!(m.prefecture, "東京都");
    /// assert_eq!(m.remainder, "千代田区");
    ///
    /// let m = parser.detect_prefecture("千代田区").unwrap().unwrap();
    /// assert_eq!(m.prefecture, "東京都");
    /// assert_eq!(m.remainder, "千代田区");
    /// ```
    pub fn detect_prefecture(&self, address: &str) -> Result<Option<PrefectureMatch>> {
        let mut address = address.trim().to_string();

        // 「千葉市」のように都道府県名で始まる市は、先に都道府県名を補っておく
        for collision in self.cache.collision_patterns()? {
            if let Some((_, rest)) = collision.pattern.split(&address) {
                tracing::trace!(key = %collision.key, "rewrote same-named city");
                address = format!("{}{}", collision.key, rest);
                break;
            }
        }

        for candidate in self.cache.prefecture_patterns()? {
            if let Some((_, rest)) = candidate.pattern.split(&address) {
                return Ok(Some(PrefectureMatch {
                    prefecture: candidate.key.clone(),
                    remainder: rest.to_string(),
                }));
            }
        }

        Ok(self
            .infer_prefecture(&address)?
            .map(|prefecture| PrefectureMatch {
                prefecture,
                remainder: address,
            }))
    }

    /// 都道府県名が省略された住所から、市区町村名を手がかりに都道府県を推定する
    fn infer_prefecture(&self, address: &str) -> Result<Option<String>> {
        let mut candidates: Vec<(&Prefecture, CityMatch)> = Vec::new();
        for prefecture in self.cache.prefectures()? {
            if let Some(city) = self.match_city(address, prefecture)? {
                candidates.push((prefecture, city));
            }
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [(prefecture, _)] => Ok(Some(prefecture.name.clone())),
            _ => {
                tracing::trace!(
                    candidates = candidates.len(),
                    "ambiguous city name, matching towns"
                );
                // 町丁目が見つかった候補のうちカタログ順で最後のもの
                let mut selected = None;
                for (prefecture, city) in &candidates {
                    if self
                        .detect_town(&city.remainder, &prefecture.name, &city.city)?
                        .is_some()
                    {
                        selected = Some(prefecture.name.clone());
                    }
                }
                Ok(selected)
            }
        }
    }

    /// 市区町村を特定する
    ///
    /// 未知の都道府県名の場合は `None`。
    pub fn detect_city(&self, address: &str, prefecture: &str) -> Result<Option<CityMatch>> {
        match self.cache.prefecture(prefecture)? {
            Some(prefecture) => self.match_city(address.trim(), prefecture),
            None => Ok(None),
        }
    }

    fn match_city(&self, address: &str, prefecture: &Prefecture) -> Result<Option<CityMatch>> {
        let patterns = self.cache.city_patterns(prefecture)?;
        Ok(patterns.iter().find_map(|candidate| {
            candidate.pattern.split(address).map(|(_, rest)| CityMatch {
                city: candidate.key.clone(),
                remainder: rest.to_string(),
            })
        }))
    }

    /// 町丁目を特定する
    ///
    /// 先頭の「大字」は取り除いてから照合する。カタログにない都道府県・市区町村の
    /// 組み合わせは `None`。
    pub fn detect_town(
        &self,
        address: &str,
        prefecture: &str,
        city: &str,
    ) -> Result<Option<TownMatch>> {
        let known = self
            .cache
            .prefecture(prefecture)?
            .is_some_and(|p| p.has_city(city));
        if !known {
            return Ok(None);
        }

        let address = address.trim();
        let address = address.strip_prefix("大字").unwrap_or(address);
        let patterns = self.cache.town_patterns(prefecture, city)?;

        Ok(patterns.iter().find_map(|candidate| {
            candidate.pattern.split(address).map(|(_, rest)| TownMatch {
                town: candidate.key.clone(),
                remainder: rest.to_string(),
                lat: candidate.lat,
                lng: candidate.lng,
            })
        }))
    }

    /// 住所を都道府県・市区町村・町丁目に分解する
    ///
    /// 途中までしか特定できなかった場合も、その段階までの結果を返す。
    pub fn parse(&self, address: &str) -> Result<ParsedAddress> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(ParsedAddress::default());
        }

        let Some(prefecture) = self.detect_prefecture(address)? else {
            return Ok(ParsedAddress::unmatched(address));
        };

        let mut result = ParsedAddress {
            prefecture: Some(prefecture.prefecture.clone()),
            ..ParsedAddress::unmatched(prefecture.remainder.clone())
        };

        let Some(city) = self.detect_city(&prefecture.remainder, &prefecture.prefecture)? else {
            return Ok(result);
        };
        result.city = Some(city.city.clone());
        result.remainder = city.remainder.clone();

        if let Some(town) = self.detect_town(&city.remainder, &prefecture.prefecture, &city.city)? {
            result.town = Some(town.town);
            result.lat = Some(town.lat);
            result.lng = Some(town.lng);
            result.remainder = town.remainder;
        }

        Ok(result)
    }

    /// 複数の住所をまとめて解析する
    pub fn parse_batch(&self, addresses: &[&str]) -> Result<Vec<ParsedAddress>> {
        addresses.iter().map(|a| self.parse(a)).collect()
    }

    /// 都道府県名の一覧（カタログ順）
    pub fn prefectures(&self) -> Result<Vec<&str>> {
        Ok(self
            .cache
            .prefectures()?
            .iter()
            .map(|p| p.name.as_str())
            .collect())
    }

    /// 都道府県に属する市区町村の一覧
    pub fn cities_of_prefecture(&self, prefecture: &str) -> Result<Vec<&str>> {
        Ok(self
            .cache
            .prefecture(prefecture)?
            .map(|p| p.cities.iter().map(String::as_str).collect())
            .unwrap_or_default())
    }

    /// 市区町村に属する町丁目の一覧
    pub fn towns_of_city(&self, prefecture: &str, city: &str) -> Result<Arc<Vec<Town>>> {
        self.cache.towns(prefecture, city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{catalog, CountingSource, FailingSource};
    use crate::error::Error;

    fn parser() -> AddressParser {
        AddressParser::new(catalog(), Config::default())
    }

    fn prefecture_of(p: &AddressParser, address: &str) -> Option<(String, String)> {
        p.detect_prefecture(address)
            .unwrap()
            .map(|m| (m.prefecture, m.remainder))
    }

    fn pair(a: &str, b: &str) -> Option<(String, String)> {
        Some((a.to_string(), b.to_string()))
    }

    // ==================== 都道府県 ====================

    #[test]
    fn test_every_prefecture_with_suffix() {
        let p = parser();
        for name in p.prefectures().unwrap() {
            let address = format!("{}1-1", name);
            assert_eq!(prefecture_of(&p, &address), pair(name, "1-1"), "{}", name);
        }
    }

    #[test]
    fn test_prefecture_without_suffix() {
        let p = parser();
        assert_eq!(prefecture_of(&p, "東京1-1"), pair("東京都", "1-1"));
        assert_eq!(prefecture_of(&p, "北海道札幌市中央区"), pair("北海道", "札幌市中央区"));
        assert_eq!(prefecture_of(&p, "  京都府宇治市 "), pair("京都府", "宇治市"));
    }

    #[test]
    fn test_same_named_city_rewrite() {
        let p = parser();
        assert_eq!(
            prefecture_of(&p, "千葉市中央区1-1"),
            pair("千葉県", "千葉市中央区1-1")
        );
        assert_eq!(
            prefecture_of(&p, "京都市中京区寺町通"),
            pair("京都府", "京都市中京区寺町通")
        );
        assert_eq!(prefecture_of(&p, "広島市中区基町"), pair("広島県", "広島市中区基町"));
    }

    #[test]
    fn test_prefecture_inferred_from_city() {
        let p = parser();
        assert_eq!(prefecture_of(&p, "千代田区丸の内"), pair("東京都", "千代田区丸の内"));
        assert_eq!(prefecture_of(&p, "奥多摩町氷川"), pair("東京都", "奥多摩町氷川"));
        assert_eq!(prefecture_of(&p, "豊橋市岩田町"), pair("愛知県", "豊橋市岩田町"));
    }

    #[test]
    fn test_ambiguous_city_resolved_by_town() {
        let p = parser();
        // 府中市は東京都と広島県にある
        assert_eq!(
            prefecture_of(&p, "府中市宮町一丁目1"),
            pair("東京都", "府中市宮町一丁目1")
        );
        assert_eq!(prefecture_of(&p, "府中市府川町1"), pair("広島県", "府中市府川町1"));
        // どちらの町丁目にもない
        assert_eq!(prefecture_of(&p, "府中市どこか"), None);
    }

    #[test]
    fn test_no_prefecture() {
        let source = CountingSource::new(catalog());
        let p = AddressParser::new(source.clone(), Config::default());

        assert_eq!(prefecture_of(&p, "どこでもない場所"), None);
        assert_eq!(source.catalog_calls(), 1);
        assert_eq!(source.town_calls(), 0);
        let stats = p.cache().stats();
        assert_eq!(stats.town_compilations, 0);
        assert_eq!(stats.resident_town_patterns, 0);
    }

    // ==================== 市区町村 ====================

    #[test]
    fn test_detect_city() {
        let p = parser();
        let m = p.detect_city("千代田区丸の内一丁目", "東京都").unwrap().unwrap();
        assert_eq!(m.city, "千代田区");
        assert_eq!(m.remainder, "丸の内一丁目");

        let m = p.detect_city("奥多摩町氷川1", "東京都").unwrap().unwrap();
        assert_eq!(m.city, "西多摩郡奥多摩町");
        assert_eq!(m.remainder, "氷川1");

        assert_eq!(p.detect_city("宇治市", "東京都").unwrap(), None);
        assert_eq!(p.detect_city("千代田区", "存在しない県").unwrap(), None);
    }

    // ==================== 町丁目 ====================

    #[test]
    fn test_detect_town() {
        let p = parser();
        let m = p
            .detect_town("丸の内一丁目9-1", "東京都", "千代田区")
            .unwrap()
            .unwrap();
        assert_eq!(m.town, "丸の内一丁目");
        assert_eq!(m.remainder, "9-1");
        assert_eq!((m.lat, m.lng), (35.681, 139.764));
    }

    #[test]
    fn test_numeral_equivalence() {
        let p = parser();
        for input in ["銀座五丁目3-1", "銀座5丁目3-1", "銀座5-3-1"] {
            let m = p.detect_town(input, "東京都", "中央区").unwrap().unwrap();
            assert_eq!(m.town, "銀座五丁目", "{}", input);
            assert_eq!(m.remainder, "3-1", "{}", input);
        }
        let m = p.detect_town("銀座15-1", "東京都", "中央区").unwrap().unwrap();
        assert_eq!(m.town, "銀座十五丁目");
        assert_eq!(m.remainder, "1");
    }

    #[test]
    fn test_alias_reports_canonical_town() {
        let p = parser();
        let full = p
            .detect_town("大手町一丁目1-1", "東京都", "千代田区")
            .unwrap()
            .unwrap();
        let alias = p
            .detect_town("大手一丁目1-1", "東京都", "千代田区")
            .unwrap()
            .unwrap();
        assert_eq!(full, alias);
        assert_eq!(alias.town, "大手町一丁目");

        let m = p
            .detect_town("日本橋室1丁目2", "東京都", "中央区")
            .unwrap()
            .unwrap();
        assert_eq!(m.town, "日本橋室町一丁目");
        assert_eq!(m.remainder, "2");
    }

    #[test]
    fn test_big_letter_town() {
        let p = parser();
        for input in ["大字岩田1", "岩田1", "字岩田1"] {
            let m = p.detect_town(input, "愛知県", "豊橋市").unwrap().unwrap();
            assert_eq!(m.town, "大字岩田", "{}", input);
            assert_eq!(m.remainder, "1");
        }
        let m = p.detect_town("岩田町1", "愛知県", "豊橋市").unwrap().unwrap();
        assert_eq!(m.town, "岩田町");
    }

    #[test]
    fn test_kyoto_street_prefix() {
        let p = parser();
        let m = p
            .detect_town("寺町通御池上る上本能寺前町488", "京都府", "京都市中京区")
            .unwrap()
            .unwrap();
        assert_eq!(m.town, "上本能寺前町");
        assert_eq!(m.remainder, "488");
    }

    #[test]
    fn test_town_not_found() {
        let p = parser();
        assert_eq!(p.detect_town("霞が関1", "東京都", "中央区").unwrap(), None);
        // カタログにない組み合わせ
        assert_eq!(p.detect_town("銀座1", "東京都", "宇治市").unwrap(), None);
    }

    // ==================== 全体 ====================

    #[test]
    fn test_parse_full_address() {
        let p = parser();
        let r = p.parse("東京都千代田区丸の内一丁目9-1").unwrap();
        assert_eq!(r.prefecture.as_deref(), Some("東京都"));
        assert_eq!(r.city.as_deref(), Some("千代田区"));
        assert_eq!(r.town.as_deref(), Some("丸の内一丁目"));
        assert_eq!(r.remainder, "9-1");
        assert!(r.is_complete());
    }

    #[test]
    fn test_parse_kyoto() {
        let p = parser();
        let r = p.parse("京都市中京区寺町通御池上る上本能寺前町488").unwrap();
        assert_eq!(r.prefecture.as_deref(), Some("京都府"));
        assert_eq!(r.city.as_deref(), Some("京都市中京区"));
        assert_eq!(r.town.as_deref(), Some("上本能寺前町"));
        assert_eq!(r.remainder, "488");
    }

    #[test]
    fn test_parse_partial() {
        let p = parser();
        let r = p.parse("東京都どこか").unwrap();
        assert_eq!(r.prefecture.as_deref(), Some("東京都"));
        assert!(!r.has_city());
        assert_eq!(r.remainder, "どこか");

        let r = p.parse("千葉県市川市八幡1").unwrap();
        assert_eq!(r.city.as_deref(), Some("市川市"));
        assert!(!r.has_town());
        assert_eq!(r.remainder, "八幡1");

        let r = p.parse("どこでもない").unwrap();
        assert_eq!(r, ParsedAddress::unmatched("どこでもない"));
        assert_eq!(p.parse("  ").unwrap(), ParsedAddress::default());
    }

    #[test]
    fn test_parse_batch() {
        let p = parser();
        let results = p
            .parse_batch(&["東京都中央区銀座5-1", "府中市府川町1", "広島県広島市中区基町"])
            .unwrap();
        assert_eq!(results[0].town.as_deref(), Some("銀座五丁目"));
        assert_eq!(results[1].prefecture.as_deref(), Some("広島県"));
        assert_eq!(results[2].town.as_deref(), Some("基町"));
    }

    #[test]
    fn test_catalog_queries() {
        let p = parser();
        assert_eq!(p.prefectures().unwrap()[1], "東京都");
        assert!(p.cities_of_prefecture("千葉県").unwrap().contains(&"市川市"));
        assert!(p.cities_of_prefecture("存在しない県").unwrap().is_empty());
        assert_eq!(p.towns_of_city("広島県", "府中市").unwrap().len(), 2);
    }

    #[test]
    fn test_data_source_failure_propagates() {
        let p = AddressParser::new(FailingSource, Config::default());
        assert!(matches!(
            p.detect_prefecture("東京都"),
            Err(Error::DataLoad(_))
        ));
        assert!(matches!(p.parse("東京都"), Err(Error::DataLoad(_))));
    }

    #[test]
    fn test_shared_cache() {
        let p = parser();
        let q = AddressParser::with_cache(Arc::clone(p.cache()));
        p.parse("東京都中央区銀座5-1").unwrap();
        q.parse("東京都中央区銀座1-1").unwrap();
        assert_eq!(q.cache().stats().town_compilations, 1);
    }
}
