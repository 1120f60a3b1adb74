//! `<canvas>` / `<img>` 上の描画サーフェス

use std::rc::Rc;
use tryon_overlay_common::{CanvasSurface, Color, Error, ImageSource, Rect, Result};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

pub(crate) fn js_error(value: JsValue) -> Error {
    Error::Surface(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

/// 表示中の `<img>` 要素
#[derive(Debug, Clone)]
pub struct WebImage(pub HtmlImageElement);

impl ImageSource for WebImage {
    fn source(&self) -> Rc<str> {
        Rc::from(self.0.src())
    }

    fn current_source(&self) -> Rc<str> {
        Rc::from(self.0.current_src())
    }

    fn is_complete(&self) -> bool {
        self.0.complete()
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.0.natural_width(), self.0.natural_height())
    }
}

pub struct WebCanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl WebCanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        let ctx = canvas
            .get_context("2d")
            .map_err(js_error)?
            .ok_or_else(|| Error::Surface("2Dコンテキストを取得できません".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| Error::Surface("2Dコンテキストの型が不正です".into()))?;
        Ok(Self { canvas, ctx })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl CanvasSurface for WebCanvasSurface {
    type Image = WebImage;

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_layout_size(&mut self, width: f64, height: f64) {
        let style = self.canvas.style();
        if let Err(e) = style
            .set_property("width", &format!("{width}px"))
            .and_then(|_| style.set_property("height", &format!("{height}px")))
        {
            tracing::warn!(error = ?e, "キャンバスの表示サイズを設定できません");
        }
    }

    fn reset_transform(&mut self) -> Result<()> {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0).map_err(js_error)
    }

    fn scale(&mut self, sx: f64, sy: f64) -> Result<()> {
        self.ctx.scale(sx, sy).map_err(js_error)
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.ctx.clear_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn draw_image(&mut self, image: &WebImage, dest: Rect) -> Result<()> {
        self.ctx
            .draw_image_with_html_image_element_and_dw_and_dh(&image.0, dest.x, dest.y, dest.width, dest.height)
            .map_err(js_error)
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        self.ctx.set_stroke_style_str(&color.to_css());
        self.ctx.set_line_width(line_width);
        self.ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ctx.set_fill_style_str(&color.to_css());
        self.ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
    }
}
