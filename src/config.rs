//! 実行時設定

use crate::error::{Error, Result};
use std::num::NonZeroUsize;

/// 町丁目パターンキャッシュの既定の最大件数
pub const DEFAULT_TOWN_CACHE_SIZE: usize = 1_000;

/// `Config::from_env` が参照する環境変数
pub const TOWN_CACHE_SIZE_ENV: &str = "JPADDR_TOWN_CACHE_SIZE";

/// カタログキャッシュの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    town_cache_size: NonZeroUsize,
}

impl Config {
    /// 町丁目パターンキャッシュの容量を指定して作成する
    ///
    /// 容量 0 は `Error::InvalidConfig`。
    pub fn new(town_cache_size: usize) -> Result<Self> {
        let town_cache_size = NonZeroUsize::new(town_cache_size).ok_or_else(|| {
            Error::InvalidConfig("town cache size must be greater than zero".to_string())
        })?;
        Ok(Self { town_cache_size })
    }

    /// 環境変数 `JPADDR_TOWN_CACHE_SIZE` から読み込む（未設定なら既定値）
    pub fn from_env() -> Result<Self> {
        match std::env::var(TOWN_CACHE_SIZE_ENV) {
            Ok(raw) => Self::parse_size(&raw),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::InvalidConfig(format!("{}: {}", TOWN_CACHE_SIZE_ENV, e))),
        }
    }

    fn parse_size(raw: &str) -> Result<Self> {
        let size = raw.trim().parse::<usize>().map_err(|e| {
            Error::InvalidConfig(format!("{}={:?}: {}", TOWN_CACHE_SIZE_ENV, raw, e))
        })?;
        Self::new(size)
    }

    /// 町丁目パターンキャッシュの最大件数
    pub fn town_cache_size(&self) -> NonZeroUsize {
        self.town_cache_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            town_cache_size: NonZeroUsize::new(DEFAULT_TOWN_CACHE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}
