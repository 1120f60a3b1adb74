//! Try-on Overlay（ネイティブ）
//!
//! 共通ライブラリのオーバーレイをラスタ画像上で動かす。
//! 描画結果の確認（PNG/Data URL）と結合テストに使う。

pub mod config;
pub mod error;
pub mod logging;
pub mod raster;

pub use raster::{RasterImage, RasterSurface};
pub use tryon_overlay_common as common;

use tryon_overlay_common::{ManualFrames, OverlayConfig, PersonOverlay};

/// ラスタ描画のオーバーレイ。フレームは呼び出し側が `on_frame` で進める
pub type RasterOverlay = PersonOverlay<RasterSurface, ManualFrames>;

pub fn raster_overlay(config: OverlayConfig) -> error::Result<RasterOverlay> {
    Ok(PersonOverlay::new(RasterSurface::new(), ManualFrames::default(), config)?)
}
