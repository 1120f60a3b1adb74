//! 描画先キャンバスの抽象化
//!
//! ブラウザの `<canvas>` 2Dコンテキストとネイティブのラスタ画像の両方が実装する。
//! 変換は `reset_transform` → `scale` の順でのみ設定される。

use crate::config::Color;
use crate::error::Result;
use crate::identity::ImageSource;
use crate::types::Rect;

pub trait CanvasSurface {
    type Image: ImageSource;

    /// バッキングストアのピクセル数を設定
    fn set_backing_size(&mut self, width: u32, height: u32);
    /// 実際に確保されたバッキングストアのピクセル数
    fn backing_size(&self) -> (u32, u32);
    /// レイアウト（CSS）上の表示サイズを設定
    fn set_layout_size(&mut self, width: f64, height: f64);

    fn reset_transform(&mut self) -> Result<()>;
    fn scale(&mut self, sx: f64, sy: f64) -> Result<()>;

    fn clear_rect(&mut self, rect: Rect);
    fn draw_image(&mut self, image: &Self::Image, dest: Rect) -> Result<()>;
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);
    fn fill_rect(&mut self, rect: Rect, color: Color);
}
