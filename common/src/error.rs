//! エラー型定義
//!
//! 前提条件の不一致（PreconditionUnmet）はすべて回復可能で、
//! 描画・ヒットテストをスキップして次のトリガーを待つ。

use crate::types::ImageId;
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("画像がまだデコードされていません: {id}")]
    ImageNotReady { id: ImageId },

    #[error("画像IDが一致しません: expected={expected}, actual={actual}")]
    IdentityMismatch { expected: ImageId, actual: ImageId },

    #[error(
        "検出結果の画像サイズが一致しません: expected={expected_width}x{expected_height}, actual={actual_width}x{actual_height}"
    )]
    DimensionMismatch {
        expected_width: f64,
        expected_height: f64,
        actual_width: f64,
        actual_height: f64,
    },

    #[error(
        "同じ画像IDで異なるサイズを検出: {id} cached={cached_width}x{cached_height}, decoded={decoded_width}x{decoded_height}"
    )]
    IdentityDimensionConflict {
        id: ImageId,
        cached_width: u32,
        cached_height: u32,
        decoded_width: u32,
        decoded_height: u32,
    },

    #[error("スケール計算が不正です: natural={natural_width}x{natural_height}, max={max_width}x{max_height}")]
    InvalidGeometry {
        natural_width: f64,
        natural_height: f64,
        max_width: f64,
        max_height: f64,
    },

    #[error("コンテナサイズが0です: {width}x{height}")]
    EmptyContainer { width: f64, height: f64 },

    #[error("デバイスピクセル比が不正です: {0}")]
    InvalidDpr(f64),

    #[error("キャンバス操作エラー: {0}")]
    Surface(String),

    #[error("人物検出エラー: {0}")]
    Detector(String),

    #[error("画像の準備待ちがキャンセルされました: {id}")]
    ReadyCancelled { id: ImageId },

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl Error {
    /// 描画・ヒットテストを次のトリガーまで見送るだけで済むエラーか
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::ImageNotReady { .. }
                | Error::IdentityMismatch { .. }
                | Error::DimensionMismatch { .. }
                | Error::IdentityDimensionConflict { .. }
                | Error::InvalidGeometry { .. }
                | Error::EmptyContainer { .. }
                | Error::InvalidDpr(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
