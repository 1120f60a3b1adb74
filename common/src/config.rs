//! オーバーレイ設定
//!
//! JSON（camelCase）で受け取り、未指定のフィールドはデフォルト値を使う。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// ブレークポイント: ビューポート幅が `min_viewport_width` 以上なら `max_height` を使う
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub min_viewport_width: f64,
    pub max_height: f64,
}

/// RGBAカラー（`#RRGGBB` または `#RRGGBBAA`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub fn parse(value: &str) -> Result<Self> {
        let hex_str = value
            .strip_prefix('#')
            .ok_or_else(|| Error::Config(format!("色は#で始めてください: {}", value)))?;
        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::Config(format!("色の形式が不正です: {} ({})", value, e)))?;
        match bytes.as_slice() {
            [r, g, b] => Ok(Color([*r, *g, *b, 255])),
            [r, g, b, a] => Ok(Color([*r, *g, *b, *a])),
            _ => Err(Error::Config(format!("色の桁数が不正です: {}", value))),
        }
    }

    /// Canvas 2D に渡すCSS色文字列
    pub fn to_css(&self) -> String {
        let [r, g, b, a] = self.0;
        format!("rgba({}, {}, {}, {})", r, g, b, a as f64 / 255.0)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let [r, g, b, a] = self.0;
        let s = if a == 255 {
            format!("#{}", hex::encode([r, g, b]))
        } else {
            format!("#{}", hex::encode([r, g, b, a]))
        };
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// 人物矩形の描画スタイル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoxStyle {
    pub stroke: Color,
    pub selected_stroke: Color,
    pub line_width: f64,
    pub selected_line_width: f64,
    pub selected_fill: Option<Color>,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            stroke: Color([255, 255, 255, 230]),
            selected_stroke: Color([0x22, 0xc5, 0x5e, 255]),
            line_width: 2.0,
            selected_line_width: 3.0,
            selected_fill: Some(Color([0x22, 0xc5, 0x5e, 48])),
        }
    }
}

/// オーバーレイ全体の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    pub breakpoints: Vec<Breakpoint>,
    /// 検出結果と元画像のサイズ差の許容値（px）
    pub dimension_tolerance_px: f64,
    pub identity_cache_capacity: usize,
    pub min_score: f64,
    pub style: BoxStyle,
    pub debug: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            breakpoints: vec![
                Breakpoint { min_viewport_width: 0.0, max_height: 180.0 },
                Breakpoint { min_viewport_width: 768.0, max_height: 200.0 },
            ],
            dimension_tolerance_px: 1.0,
            identity_cache_capacity: 4,
            min_score: 0.0,
            style: BoxStyle::default(),
            debug: false,
        }
    }
}

impl OverlayConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: OverlayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.breakpoints.is_empty() {
            return Err(Error::Config("breakpointsが空です".into()));
        }
        for bp in &self.breakpoints {
            if !(bp.max_height.is_finite() && bp.max_height > 0.0) {
                return Err(Error::Config(format!("maxHeightが不正です: {}", bp.max_height)));
            }
        }
        if !(self.dimension_tolerance_px.is_finite() && self.dimension_tolerance_px >= 0.0) {
            return Err(Error::Config(format!(
                "dimensionTolerancePxが不正です: {}",
                self.dimension_tolerance_px
            )));
        }
        if self.identity_cache_capacity == 0 {
            return Err(Error::Config("identityCacheCapacityは1以上にしてください".into()));
        }
        if !(self.style.line_width > 0.0 && self.style.selected_line_width > 0.0) {
            return Err(Error::Config("線幅は正の値にしてください".into()));
        }
        Ok(())
    }

    /// ビューポート幅に対応するコンテナの最大高さ
    pub fn max_height_for(&self, viewport_width: f64) -> f64 {
        self.breakpoints
            .iter()
            .filter(|bp| viewport_width >= bp.min_viewport_width)
            .max_by(|a, b| a.min_viewport_width.total_cmp(&b.min_viewport_width))
            .or_else(|| self.breakpoints.first())
            .map(|bp| bp.max_height)
            .unwrap_or(0.0)
    }
}
