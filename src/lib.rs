//! # jpaddr - Japanese Prefecture, City and Town Parser
//!
//! 日本の住所文字列を 都道府県・市区町村・町丁目 に分解し、正式名称と町丁目の緯度経度を返す。
//!
//! ## 機能
//!
//! - 都道府県名の「都道府県」省略に対応（"東京" -> "東京都"）
//! - 都道府県名の省略に対応（市区町村名から推定、同名の市は町丁目まで照合して判別）
//! - 郡名の省略に対応（"奥多摩町" -> "西多摩郡奥多摩町"）
//! - 漢数字とアラビア数字の同一視（"五丁目" / "5丁目" / "5-"）
//! - 「町」の省略、「大字」「字」の省略、ハイフンや異体字の表記ゆれ
//! - カタログは `DataSource` から必要になった時点で取得し、`CatalogCache` に保持する
//!
//! ## 使い方
//!
//! ```rust
//! use jpaddr::{AddressParser, Config, Prefecture, StaticSource, Town};
//!
//! let source = StaticSource::new(vec![Prefecture::new(
//!     "東京都",
//!     vec!["千代田区".to_string(), "中央区".to_string()],
//! )])
//! .with_towns(
//!     "東京都",
//!     "中央区",
//!     vec![Town::new("銀座五丁目", "", 35.671, 139.763)],
//! );
//! let parser = AddressParser::new(source, Config::default());
//!
//! let result = parser.parse("東京中央区銀座5-6-1").unwrap();
//! assert_eq!(result.prefecture.as_deref(), Some("東京都"));
//! assert_eq!(result.city.as_deref(), Some("中央区"));
//! assert_eq!(result.town.as_deref(), Some("銀座五丁目"));
//! assert_eq!(result.remainder, "6-1");
//! assert_eq!(result.lat, Some(35.671));
//! ```

mod cache;
mod config;
mod data;
mod error;
pub mod kanji;
pub mod pattern;
mod parser;
mod region;

pub use cache::{CacheStats, CatalogCache, TOWN_PATTERN_TTL};
pub use config::{Config, DEFAULT_TOWN_CACHE_SIZE, TOWN_CACHE_SIZE_ENV};
#[cfg(feature = "serde")]
pub use data::JsonDirSource;
pub use data::{DataSource, StaticSource};
pub use error::{Error, Result};
pub use parser::AddressParser;
pub use region::{CityMatch, ParsedAddress, Prefecture, PrefectureMatch, Town, TownMatch};
