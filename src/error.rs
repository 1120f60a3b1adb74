use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("画像読み込みエラー: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("オーバーレイエラー: {0}")]
    Overlay(#[from] tryon_overlay_common::Error),

    #[error("スナップショットがありません（まだ描画されていません）")]
    EmptySnapshot,
}

pub type Result<T> = std::result::Result<T, RasterError>;
