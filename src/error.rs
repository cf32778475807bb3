//! エラー型定義

use thiserror::Error;

/// 住所解析エラー
///
/// マッチしないこと自体はエラーではなく、各検出関数は `Ok(None)` を返す。
#[derive(Debug, Error)]
pub enum Error {
    /// データソースからの取得に失敗
    #[error("Failed to load catalog data: {0}")]
    DataLoad(String),

    /// データソースが不正なデータを返した
    #[error("Malformed catalog data: {0}")]
    MalformedData(String),

    /// 設定値が不正
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
