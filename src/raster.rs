//! ラスタ画像への描画
//!
//! `<canvas>` と同じ意味論で `CanvasSurface` を実装する。
//! - バッキングサイズを設定するとバッファは透明にクリアされる
//! - 変換は `reset_transform` と `scale` のみ
//! - 線は矩形の辺を中心に描く
//! - 塗りと線は `imageproc` の矩形描画に `Blend` を重ねて source-over 合成

use crate::error::{RasterError, Result};
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect as PixelRect;
use std::path::Path;
use std::rc::Rc;
use tryon_overlay_common::{CanvasSurface, Color, Error, ImageSource, Rect};

/// デコード状態を持つ画像（ブラウザの `<img>` 相当）
#[derive(Debug, Clone)]
pub struct RasterImage {
    src: Rc<str>,
    current_src: Rc<str>,
    pixels: Option<RgbaImage>,
}

impl RasterImage {
    /// デコード済みの画像
    pub fn decoded(src: &str, pixels: RgbaImage) -> Self {
        let src: Rc<str> = Rc::from(src);
        Self {
            current_src: Rc::clone(&src),
            src,
            pixels: Some(pixels),
        }
    }

    /// 読み込み中の画像
    pub fn loading(src: &str) -> Self {
        Self {
            src: Rc::from(src),
            current_src: Rc::from(""),
            pixels: None,
        }
    }

    /// ファイルから読み込む。ソースはパス文字列
    pub fn open(path: &Path) -> Result<Self> {
        let pixels = image::open(path)?.to_rgba8();
        Ok(Self::decoded(&path.to_string_lossy(), pixels))
    }

    /// 読み込み完了
    pub fn finish_loading(&mut self, pixels: RgbaImage) {
        self.current_src = Rc::clone(&self.src);
        self.pixels = Some(pixels);
    }

    /// `src` だけを差し替える（デコード済みの内容は前のまま）
    pub fn swap_source(&mut self, src: &str) {
        self.src = Rc::from(src);
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }
}

impl ImageSource for RasterImage {
    fn source(&self) -> Rc<str> {
        Rc::clone(&self.src)
    }

    fn current_source(&self) -> Rc<str> {
        Rc::clone(&self.current_src)
    }

    fn is_complete(&self) -> bool {
        self.pixels.is_some() && *self.src == *self.current_src
    }

    fn natural_size(&self) -> (u32, u32) {
        self.pixels.as_ref().map(|p| p.dimensions()).unwrap_or((0, 0))
    }
}

/// 描画先のラスタバッファ
#[derive(Debug, Clone)]
pub struct RasterSurface {
    buffer: RgbaImage,
    layout: (f64, f64),
    transform: (f64, f64),
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            buffer: RgbaImage::new(0, 0),
            layout: (0.0, 0.0),
            transform: (1.0, 1.0),
        }
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn layout_size(&self) -> (f64, f64) {
        self.layout
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.buffer.width() && y < self.buffer.height() {
            Some(self.buffer.get_pixel(x, y).0)
        } else {
            None
        }
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let (w, h) = self.buffer.dimensions();
        if w == 0 || h == 0 {
            return Err(RasterError::EmptySnapshot);
        }
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(self.buffer.as_raw(), w, h, ExtendedColorType::Rgba8)?;
        Ok(bytes)
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let bytes = self.to_png_bytes()?;
        std::fs::write(path, &bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "スナップショットを保存");
        Ok(())
    }

    /// ブラウザに貼り付けて確認できる `data:image/png;base64,...`
    pub fn to_data_url(&self) -> Result<String> {
        let bytes = self.to_png_bytes()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }

    /// 現在の変換でのピクセル範囲（半開区間）
    fn pixel_span(&self, rect: Rect) -> (i64, i64, i64, i64) {
        let (sx, sy) = self.transform;
        (
            (rect.x * sx).round() as i64,
            (rect.y * sy).round() as i64,
            ((rect.x + rect.width) * sx).round() as i64,
            ((rect.y + rect.height) * sy).round() as i64,
        )
    }

    /// バッファ内にクランプした描画矩形。空なら None
    fn clip(&self, (x0, y0, x1, y1): (i64, i64, i64, i64)) -> Option<PixelRect> {
        let (w, h) = (self.buffer.width() as i64, self.buffer.height() as i64);
        let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
        let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// 複数の範囲を同じ色で合成する
    fn blend_spans(&mut self, spans: &[(i64, i64, i64, i64)], color: Color) {
        let rects: Vec<PixelRect> = spans.iter().filter_map(|&span| self.clip(span)).collect();
        if rects.is_empty() {
            return;
        }
        let mut canvas = Blend(std::mem::take(&mut self.buffer));
        for rect in rects {
            draw_filled_rect_mut(&mut canvas, rect, Rgba(color.0));
        }
        self.buffer = canvas.0;
    }
}

impl CanvasSurface for RasterSurface {
    type Image = RasterImage;

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.buffer = RgbaImage::new(width, height);
        self.transform = (1.0, 1.0);
    }

    fn backing_size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    fn set_layout_size(&mut self, width: f64, height: f64) {
        self.layout = (width, height);
    }

    fn reset_transform(&mut self) -> tryon_overlay_common::Result<()> {
        self.transform = (1.0, 1.0);
        Ok(())
    }

    fn scale(&mut self, sx: f64, sy: f64) -> tryon_overlay_common::Result<()> {
        if !(sx.is_finite() && sy.is_finite()) {
            return Err(Error::Surface(format!("不正なスケール: {sx}, {sy}")));
        }
        self.transform.0 *= sx;
        self.transform.1 *= sy;
        Ok(())
    }

    fn clear_rect(&mut self, rect: Rect) {
        if let Some(rect) = self.clip(self.pixel_span(rect)) {
            draw_filled_rect_mut(&mut self.buffer, rect, Rgba([0, 0, 0, 0]));
        }
    }

    fn draw_image(&mut self, image: &RasterImage, dest: Rect) -> tryon_overlay_common::Result<()> {
        let pixels = image
            .pixels()
            .ok_or_else(|| Error::Surface("画像がデコードされていません".into()))?;
        let (x0, y0, x1, y1) = self.pixel_span(dest);
        let (w, h) = ((x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32);
        if w == 0 || h == 0 {
            return Ok(());
        }
        let resized = imageops::resize(pixels, w, h, FilterType::Triangle);
        imageops::overlay(&mut self.buffer, &resized, x0, y0);
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        let (x0, y0, x1, y1) = self.pixel_span(rect);
        let lw = ((line_width * self.transform.0.max(self.transform.1)).round() as i64).max(1);
        let inner = lw / 2;
        let outer = lw - inner;
        // 上下の辺と、角を除いた左右の辺
        self.blend_spans(
            &[
                (x0 - outer, y0 - outer, x1 + outer, y0 + inner),
                (x0 - outer, y1 - outer, x1 + outer, y1 + inner),
                (x0 - outer, y0 + inner, x0 + inner, y1 - outer),
                (x1 - outer, y0 + inner, x1 + inner, y1 - outer),
            ],
            color,
        );
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let span = self.pixel_span(rect);
        self.blend_spans(&[span], color);
    }
}
