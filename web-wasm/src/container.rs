//! コンテナとウィンドウの計測

use tryon_overlay_common::{OverlayConfig, Viewport};
use web_sys::{HtmlElement, Window};

/// 描画直前のビューポート
///
/// 最大幅はコンテナの内容幅（パディングを除く）、最大高さはウィンドウ幅のブレークポイントで決まる。
pub fn measure(container: &HtmlElement, config: &OverlayConfig) -> Viewport {
    let window = web_sys::window();
    let viewport_width = window
        .as_ref()
        .and_then(|w| w.inner_width().ok())
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let dpr = window.as_ref().map(|w| w.device_pixel_ratio()).unwrap_or(1.0);
    let padding = window.as_ref().map(|w| horizontal_padding(w, container)).unwrap_or(0.0);

    Viewport::new(
        (container.client_width() as f64 - padding).max(0.0),
        config.max_height_for(viewport_width),
        dpr,
    )
}

/// 計算済みスタイルの左右パディング（px）
fn horizontal_padding(window: &Window, container: &HtmlElement) -> f64 {
    let Ok(Some(style)) = window.get_computed_style(container) else {
        return 0.0;
    };
    ["padding-left", "padding-right"]
        .iter()
        .filter_map(|name| style.get_property_value(name).ok())
        .filter_map(|value| value.trim().trim_end_matches("px").parse::<f64>().ok())
        .sum()
}
