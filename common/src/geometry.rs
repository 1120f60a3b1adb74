//! スケール計算
//!
//! レンダラーとヒットテスターが共有する唯一の幾何計算。
//! 表示サイズはレターボックス（切り抜き・歪みなし）で求める。

use crate::error::{Error, Result};

/// 1回の描画で使う表示ジオメトリ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub scale: f64,
    pub display_width: f64,
    pub display_height: f64,
}

/// キャンバスのバッキングストア（実ピクセル）と実効DPR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBackingStore {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub effective_dpr_x: f64,
    pub effective_dpr_y: f64,
}

/// コンテナが許す最大表示領域
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerBox {
    pub max_width: f64,
    pub max_height: f64,
}

/// 描画時点で計測したビューポート情報
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub container: ContainerBox,
    pub dpr: f64,
}

impl Viewport {
    pub fn new(max_width: f64, max_height: f64, dpr: f64) -> Self {
        Self {
            container: ContainerBox { max_width, max_height },
            dpr,
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// 元画像を最大領域に収めるスケールと表示サイズを求める
pub fn fit(natural_width: f64, natural_height: f64, max_width: f64, max_height: f64) -> Result<DisplayGeometry> {
    let invalid = || Error::InvalidGeometry {
        natural_width,
        natural_height,
        max_width,
        max_height,
    };
    if !(positive(natural_width) && positive(natural_height) && positive(max_width) && positive(max_height)) {
        return Err(invalid());
    }

    let scale = (max_width / natural_width).min(max_height / natural_height);
    if !positive(scale) {
        return Err(invalid());
    }

    Ok(DisplayGeometry {
        scale,
        display_width: natural_width * scale,
        display_height: natural_height * scale,
    })
}

/// 意図するバッキングピクセル数 `round(display * dpr)`
pub fn intended_backing_size(geometry: &DisplayGeometry, dpr: f64) -> Result<(u32, u32)> {
    if !positive(dpr) {
        return Err(Error::InvalidDpr(dpr));
    }
    let w = (geometry.display_width * dpr).round();
    let h = (geometry.display_height * dpr).round();
    if w < 1.0 || h < 1.0 || w > u32::MAX as f64 || h > u32::MAX as f64 {
        return Err(Error::EmptyContainer {
            width: geometry.display_width,
            height: geometry.display_height,
        });
    }
    Ok((w as u32, h as u32))
}

/// 実際に確保されたピクセル数から実効DPRを再計算
pub fn backing_store_from_actual(geometry: &DisplayGeometry, pixel_width: u32, pixel_height: u32) -> Result<CanvasBackingStore> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(Error::EmptyContainer {
            width: pixel_width as f64,
            height: pixel_height as f64,
        });
    }
    let effective_dpr_x = pixel_width as f64 / geometry.display_width;
    let effective_dpr_y = pixel_height as f64 / geometry.display_height;
    if !(positive(effective_dpr_x) && positive(effective_dpr_y)) {
        return Err(Error::InvalidDpr(effective_dpr_x));
    }
    Ok(CanvasBackingStore {
        pixel_width,
        pixel_height,
        effective_dpr_x,
        effective_dpr_y,
    })
}
