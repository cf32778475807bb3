//! 住所カタログのデータソース

use crate::error::{Error, Result};
use crate::region::{Prefecture, Town};
use std::collections::HashMap;

/// 都道府県・市区町村・町丁目カタログの取得元
///
/// キャッシュは都道府県一覧を一度だけ、町丁目一覧を (都道府県, 市区町村) ごとに一度だけ取得する。
/// リトライはデータソース側の責務。
pub trait DataSource: Send + Sync {
    /// 都道府県一覧（カタログ掲載順、市区町村もその順序を保つ）
    fn fetch_prefecture_catalog(&self) -> Result<Vec<Prefecture>>;

    /// 指定した市区町村の町丁目一覧（公開順）
    fn fetch_town_list(&self, prefecture: &str, city: &str) -> Result<Vec<Town>>;
}

/// メモリ上に保持したカタログ
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    prefectures: Vec<Prefecture>,
    towns: HashMap<(String, String), Vec<Town>>,
}

impl StaticSource {
    pub fn new(prefectures: Vec<Prefecture>) -> Self {
        Self {
            prefectures,
            towns: HashMap::new(),
        }
    }

    /// 町丁目一覧を登録する
    pub fn with_towns(
        mut self,
        prefecture: impl Into<String>,
        city: impl Into<String>,
        towns: Vec<Town>,
    ) -> Self {
        self.towns.insert((prefecture.into(), city.into()), towns);
        self
    }

    fn contains_city(&self, prefecture: &str, city: &str) -> bool {
        self.prefectures
            .iter()
            .any(|p| p.name == prefecture && p.has_city(city))
    }
}

impl DataSource for StaticSource {
    fn fetch_prefecture_catalog(&self) -> Result<Vec<Prefecture>> {
        Ok(self.prefectures.clone())
    }

    fn fetch_town_list(&self, prefecture: &str, city: &str) -> Result<Vec<Town>> {
        if !self.contains_city(prefecture, city) {
            return Err(Error::DataLoad(format!(
                "no town list for {}{}",
                prefecture, city
            )));
        }
        Ok(self
            .towns
            .get(&(prefecture.to_string(), city.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(feature = "serde")]
pub use json::JsonDirSource;

#[cfg(feature = "serde")]
mod json {
    use super::DataSource;
    use crate::error::{Error, Result};
    use crate::region::{Prefecture, Town};
    use std::path::{Path, PathBuf};

    /// 公開カタログと同じ構成のローカルディレクトリ
    ///
    /// ```text
    /// <root>/ja.json              {"北海道": ["札幌市中央区", ...], ...}
    /// <root>/<都道府県>/<市区町村>.json  [{"town": ..., "koaza": ..., "lat": ..., "lng": ...}, ...]
    /// ```
    #[derive(Debug, Clone)]
    pub struct JsonDirSource {
        root: PathBuf,
    }

    impl JsonDirSource {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        fn read(&self, path: &Path) -> Result<String> {
            std::fs::read_to_string(path)
                .map_err(|e| Error::DataLoad(format!("{}: {}", path.display(), e)))
        }
    }

    impl DataSource for JsonDirSource {
        fn fetch_prefecture_catalog(&self) -> Result<Vec<Prefecture>> {
            let path = self.root.join("ja.json");
            let raw = self.read(&path)?;
            let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
                .map_err(|e| Error::MalformedData(format!("{}: {}", path.display(), e)))?;

            object
                .into_iter()
                .map(|(name, cities)| {
                    let cities: Vec<String> = serde_json::from_value(cities).map_err(|e| {
                        Error::MalformedData(format!("{}: {}: {}", path.display(), name, e))
                    })?;
                    Ok(Prefecture::new(name, cities))
                })
                .collect()
        }

        fn fetch_town_list(&self, prefecture: &str, city: &str) -> Result<Vec<Town>> {
            let path = self.root.join(prefecture).join(format!("{}.json", city));
            let raw = self.read(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::MalformedData(format!("{}: {}", path.display(), e)))
        }
    }

}
