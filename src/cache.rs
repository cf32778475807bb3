//! 住所カタログとコンパイル済みパターンのキャッシュ
//!
//! 各テーブルは初回アクセス時に一度だけ構築される。同じキーへの同時アクセスでは
//! データソースへの取得は 1 回だけ行われ、他の呼び出しはその結果を待つ。
//! 町丁目パターンだけは件数が多いため LRU で上限を設け、さらに 7 日で失効させる。

use crate::config::Config;
use crate::data::DataSource;
use crate::error::{Error, Result};
use crate::pattern::{
    compile_city_patterns, compile_collision_pattern, compile_prefecture_patterns,
    compile_town_patterns, CompiledPattern, TownPattern,
};
use crate::region::{Prefecture, Town};
use lru::LruCache;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// 町丁目パターンの有効期間
pub const TOWN_PATTERN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

type CityKey = (String, String);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// キーごとに一度だけ初期化される値の表
struct KeyedOnce<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedOnce<K, V> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 失敗した初期化は記録されず、次の呼び出しで再試行される
    fn get_or_try_init<F>(&self, key: &K, init: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.get_or_try_init(init).cloned()
    }

    fn contains(&self, key: &K) -> bool {
        lock(&self.slots)
            .get(key)
            .is_some_and(|slot| slot.get().is_some())
    }
}

struct TownPatternEntry {
    patterns: Arc<Vec<TownPattern>>,
    inserted_at: Instant,
}

/// 容量制限と有効期限付きの町丁目パターン表
struct TownPatternCache {
    entries: LruCache<CityKey, TownPatternEntry>,
    ttl: Duration,
}

impl TownPatternCache {
    fn get(&mut self, key: &CityKey) -> Option<Arc<Vec<TownPattern>>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.patterns))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            tracing::debug!(prefecture = %key.0, city = %key.1, "town patterns expired");
            self.entries.pop(key);
        }
        None
    }

    /// 追い出されたキーを返す
    fn insert(&mut self, key: CityKey, patterns: Arc<Vec<TownPattern>>) -> Option<CityKey> {
        let entry = TownPatternEntry {
            patterns,
            inserted_at: Instant::now(),
        };
        match self.entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }
}

/// キャッシュの統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 都道府県一覧の取得回数
    pub catalog_fetches: usize,
    /// 町丁目一覧の取得回数
    pub town_fetches: usize,
    /// 町丁目パターンのコンパイル回数
    pub town_compilations: usize,
    /// 容量超過で追い出された町丁目パターン数
    pub town_evictions: usize,
    /// 現在保持している町丁目パターン数
    pub resident_town_patterns: usize,
}

#[derive(Default)]
struct Counters {
    catalog_fetches: AtomicUsize,
    town_fetches: AtomicUsize,
    town_compilations: AtomicUsize,
    town_evictions: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 住所カタログのキャッシュ
///
/// プロセス開始時に一度作り、`AddressParser` 間で共有する。
pub struct CatalogCache {
    source: Box<dyn DataSource>,
    prefectures: OnceCell<Vec<Prefecture>>,
    prefecture_patterns: OnceCell<Vec<CompiledPattern>>,
    collision_patterns: OnceCell<Vec<CompiledPattern>>,
    city_patterns: KeyedOnce<String, Arc<Vec<CompiledPattern>>>,
    towns: KeyedOnce<CityKey, Arc<Vec<Town>>>,
    town_patterns: Mutex<TownPatternCache>,
    counters: Counters,
}

impl CatalogCache {
    pub fn new(source: impl DataSource + 'static, config: &Config) -> Self {
        Self::with_ttl(Box::new(source), config, TOWN_PATTERN_TTL)
    }

    pub(crate) fn with_ttl(source: Box<dyn DataSource>, config: &Config, ttl: Duration) -> Self {
        Self {
            source,
            prefectures: OnceCell::new(),
            prefecture_patterns: OnceCell::new(),
            collision_patterns: OnceCell::new(),
            city_patterns: KeyedOnce::new(),
            towns: KeyedOnce::new(),
            town_patterns: Mutex::new(TownPatternCache {
                entries: LruCache::new(config.town_cache_size()),
                ttl,
            }),
            counters: Counters::default(),
        }
    }

    /// 都道府県一覧（カタログ順）
    pub fn prefectures(&self) -> Result<&[Prefecture]> {
        self.prefectures
            .get_or_try_init(|| {
                bump(&self.counters.catalog_fetches);
                let prefectures = self.source.fetch_prefecture_catalog()?;
                if prefectures.is_empty() {
                    return Err(Error::MalformedData(
                        "prefecture catalog is empty".to_string(),
                    ));
                }
                tracing::debug!(prefectures = prefectures.len(), "loaded prefecture catalog");
                Ok(prefectures)
            })
            .map(Vec::as_slice)
    }

    /// 名前から都道府県を引く
    pub fn prefecture(&self, name: &str) -> Result<Option<&Prefecture>> {
        Ok(self.prefectures()?.iter().find(|p| p.name == name))
    }

    /// 都道府県のパターン（カタログ順）
    pub fn prefecture_patterns(&self) -> Result<&[CompiledPattern]> {
        self.prefecture_patterns
            .get_or_try_init(|| {
                let prefectures = self.prefectures()?;
                Ok(compile_prefecture_patterns(
                    prefectures.iter().map(|p| p.name.as_str()),
                ))
            })
            .map(Vec::as_slice)
    }

    /// 都道府県名と同じ語で始まる市のパターン（カタログ順）
    pub fn collision_patterns(&self) -> Result<&[CompiledPattern]> {
        self.collision_patterns
            .get_or_try_init(|| {
                let patterns: Vec<CompiledPattern> = self
                    .prefectures()?
                    .iter()
                    .flat_map(|prefecture| {
                        let stem = prefecture.stem();
                        prefecture
                            .cities
                            .iter()
                            .filter(move |city| city.starts_with(stem))
                            .filter_map(move |city| {
                                compile_collision_pattern(&prefecture.name, city)
                            })
                    })
                    .collect();
                tracing::debug!(patterns = patterns.len(), "compiled collision patterns");
                Ok(patterns)
            })
            .map(Vec::as_slice)
    }

    /// 市区町村のパターン（名称の長い順）
    pub fn city_patterns(&self, prefecture: &Prefecture) -> Result<Arc<Vec<CompiledPattern>>> {
        self.city_patterns.get_or_try_init(&prefecture.name, || {
            let patterns = compile_city_patterns(&prefecture.cities);
            tracing::debug!(
                prefecture = %prefecture.name,
                patterns = patterns.len(),
                "compiled city patterns"
            );
            Ok(Arc::new(patterns))
        })
    }

    /// 町丁目一覧（プロセス終了まで保持）
    pub fn towns(&self, prefecture: &str, city: &str) -> Result<Arc<Vec<Town>>> {
        let key = (prefecture.to_string(), city.to_string());
        self.towns.get_or_try_init(&key, || {
            bump(&self.counters.town_fetches);
            let towns = self.source.fetch_town_list(prefecture, city)?;
            tracing::debug!(prefecture, city, towns = towns.len(), "fetched town list");
            Ok(Arc::new(towns))
        })
    }

    /// 町丁目のパターン（優先順）
    pub fn town_patterns(&self, prefecture: &str, city: &str) -> Result<Arc<Vec<TownPattern>>> {
        let key = (prefecture.to_string(), city.to_string());
        if let Some(patterns) = lock(&self.town_patterns).get(&key) {
            return Ok(patterns);
        }

        let towns = self.towns(prefecture, city)?;
        let compiled = Arc::new(compile_town_patterns(prefecture, city, &towns));
        bump(&self.counters.town_compilations);

        let mut cache = lock(&self.town_patterns);
        // 他のスレッドが先に登録していればそちらを使う
        if let Some(patterns) = cache.get(&key) {
            return Ok(patterns);
        }
        if let Some((evicted_pref, evicted_city)) = cache.insert(key, Arc::clone(&compiled)) {
            bump(&self.counters.town_evictions);
            tracing::debug!(
                prefecture = %evicted_pref,
                city = %evicted_city,
                "evicted town patterns"
            );
        }
        Ok(compiled)
    }

    /// 町丁目一覧を取得済みか
    pub fn has_towns(&self, prefecture: &str, city: &str) -> bool {
        self.towns
            .contains(&(prefecture.to_string(), city.to_string()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            catalog_fetches: self.counters.catalog_fetches.load(Ordering::Relaxed),
            town_fetches: self.counters.town_fetches.load(Ordering::Relaxed),
            town_compilations: self.counters.town_compilations.load(Ordering::Relaxed),
            town_evictions: self.counters.town_evictions.load(Ordering::Relaxed),
            resident_town_patterns: lock(&self.town_patterns).entries.len(),
        }
    }
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{catalog, CountingSource, FailingSource};
    use std::thread;

    fn cache_with(source: CountingSource, capacity: usize) -> CatalogCache {
        CatalogCache::new(source, &Config::new(capacity).unwrap())
    }

    #[test]
    fn test_catalog_loaded_once() {
        let source = CountingSource::new(catalog());
        let cache = cache_with(source.clone(), 10);

        assert_eq!(cache.prefectures().unwrap().len(), 6);
        cache.prefecture_patterns().unwrap();
        cache.collision_patterns().unwrap();
        cache.prefectures().unwrap();
        assert_eq!(source.catalog_calls(), 1);
        assert_eq!(cache.stats().catalog_fetches, 1);
    }

    #[test]
    fn test_collision_patterns() {
        let cache = cache_with(CountingSource::new(catalog()), 10);
        let keys: Vec<&str> = cache
            .collision_patterns()
            .unwrap()
            .iter()
            .map(|p| p.key.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["千葉県千葉市中央区", "京都府京都市中京区", "広島県広島市中区"]
        );
    }

    #[test]
    fn test_city_patterns_memoized() {
        let cache = cache_with(CountingSource::new(catalog()), 10);
        let tokyo = cache.prefecture("東京都").unwrap().unwrap().clone();
        let a = cache.city_patterns(&tokyo).unwrap();
        let b = cache.city_patterns(&tokyo).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a[0].key, "西多摩郡奥多摩町");
    }

    #[test]
    fn test_town_patterns_memoized() {
        let source = CountingSource::new(catalog());
        let cache = cache_with(source.clone(), 10);

        let a = cache.town_patterns("東京都", "千代田区").unwrap();
        let b = cache.town_patterns("東京都", "千代田区").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.town_calls(), 1);
        assert_eq!(cache.stats().town_compilations, 1);
        assert!(cache.has_towns("東京都", "千代田区"));
        assert!(!cache.has_towns("東京都", "中央区"));
    }

    #[test]
    fn test_lru_eviction_recompiles_without_refetch() {
        let source = CountingSource::new(catalog());
        let cache = cache_with(source.clone(), 2);

        cache.town_patterns("東京都", "千代田区").unwrap();
        cache.town_patterns("東京都", "中央区").unwrap();
        // 千代田区を最近使ったことにする
        cache.town_patterns("東京都", "千代田区").unwrap();
        cache.town_patterns("東京都", "府中市").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.town_evictions, 1);
        assert_eq!(stats.resident_town_patterns, 2);
        assert_eq!(stats.town_compilations, 3);

        // 千代田区は残っている
        cache.town_patterns("東京都", "千代田区").unwrap();
        assert_eq!(cache.stats().town_compilations, 3);

        // 中央区は追い出されたので再コンパイルされるが、再取得はされない
        cache.town_patterns("東京都", "中央区").unwrap();
        assert_eq!(cache.stats().town_compilations, 4);
        assert_eq!(source.town_calls(), 3);
        assert_eq!(cache.stats().town_fetches, 3);
    }

    #[test]
    fn test_expired_entries_are_recompiled() {
        let source = CountingSource::new(catalog());
        let cache = CatalogCache::with_ttl(
            Box::new(source.clone()),
            &Config::default(),
            Duration::ZERO,
        );

        cache.town_patterns("東京都", "千代田区").unwrap();
        cache.town_patterns("東京都", "千代田区").unwrap();
        assert_eq!(cache.stats().town_compilations, 2);
        assert_eq!(cache.stats().town_evictions, 0);
        assert_eq!(source.town_calls(), 1);
    }

    #[test]
    fn test_source_failure_is_not_memoized() {
        let cache = CatalogCache::new(FailingSource, &Config::default());
        assert!(matches!(cache.prefectures(), Err(Error::DataLoad(_))));
        assert!(matches!(cache.prefectures(), Err(Error::DataLoad(_))));
        assert_eq!(cache.stats().catalog_fetches, 2);
        assert!(matches!(
            cache.town_patterns("東京都", "千代田区"),
            Err(Error::DataLoad(_))
        ));
        assert_eq!(cache.stats().resident_town_patterns, 0);
    }

    #[test]
    fn test_empty_catalog_is_malformed() {
        let cache = CatalogCache::new(crate::data::StaticSource::default(), &Config::default());
        assert!(matches!(cache.prefectures(), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_concurrent_first_access_fetches_once() {
        let source = CountingSource::new(catalog());
        let cache = Arc::new(cache_with(source.clone(), 10));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.prefectures().unwrap();
                    cache.towns("東京都", "中央区").unwrap().len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 4);
        }
        assert_eq!(source.catalog_calls(), 1);
        assert_eq!(source.town_calls(), 1);
    }
}
