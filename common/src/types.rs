//! オーバーレイで扱う型定義
//!
//! - ImageId: 画像ソースから導出する識別子
//! - PersonBox: 元画像ピクセル座標系の人物矩形
//! - DetectionResult: 外部検出器の出力（ワイヤ形式は `people[].bbox = [x,y,w,h]`）
//! - Selection: 選択中の人物

use serde::{Deserialize, Serialize};
use std::fmt;

/// 画像ソースの識別子（ソース文字列のSHA-256先頭16バイトのhex）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// デコード済み画像（元画像サイズ付き）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalImage {
    pub identity: ImageId,
    pub width: u32,
    pub height: u32,
}

/// 表示座標系などで使う汎用矩形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// 境界を含む内包判定
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// 検出された人物の矩形（元画像ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub score: f64,
}

impl PersonBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self { x, y, width, height, score }
    }

    /// 幅・高さが正で、全値が有限か
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.score]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// `[0,W]×[0,H]` に収まっているか
    pub fn lies_within(&self, natural_width: f64, natural_height: f64) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= natural_width
            && self.y + self.height <= natural_height
    }

    /// 表示座標系へスケール
    pub fn scaled(&self, scale: f64) -> Rect {
        Rect::new(
            self.x * scale,
            self.y * scale,
            self.width * scale,
            self.height * scale,
        )
    }

    /// 画像内にクランプした矩形
    ///
    /// 左上は0未満にならず、サイズが分かっていれば右下も画像内に収める。
    pub fn clamped(&self, natural: Option<(u32, u32)>) -> PersonBox {
        let left = self.x.max(0.0);
        let top = self.y.max(0.0);
        let mut right = self.x + self.width;
        let mut bottom = self.y + self.height;
        if let Some((w, h)) = natural {
            right = right.min(w as f64);
            bottom = bottom.min(h as f64);
        }
        PersonBox {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
            score: self.score,
        }
    }
}

/// 検出器ワイヤ形式の人物
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePerson {
    bbox: [f64; 4],
    #[serde(default)]
    score: f64,
}

/// 検出器ワイヤ形式の結果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDetection {
    image_id: ImageId,
    image_width: f64,
    image_height: f64,
    #[serde(default)]
    people: Vec<WirePerson>,
}

/// 人物検出結果（1枚の写真につき1回生成）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDetection", into = "WireDetection")]
pub struct DetectionResult {
    pub image_id: ImageId,
    pub image_width: f64,
    pub image_height: f64,
    pub people: Vec<PersonBox>,
}

impl From<WireDetection> for DetectionResult {
    fn from(wire: WireDetection) -> Self {
        let mut people = Vec::with_capacity(wire.people.len());
        for (i, p) in wire.people.into_iter().enumerate() {
            let [x, y, width, height] = p.bbox;
            let person = PersonBox::new(x, y, width, height, p.score);
            if person.is_well_formed() {
                people.push(person);
            } else {
                tracing::warn!(index = i, bbox = ?p.bbox, "不正な人物矩形を破棄");
            }
        }
        Self {
            image_id: wire.image_id,
            image_width: wire.image_width,
            image_height: wire.image_height,
            people,
        }
    }
}

impl From<DetectionResult> for WireDetection {
    fn from(result: DetectionResult) -> Self {
        Self {
            image_id: result.image_id,
            image_width: result.image_width,
            image_height: result.image_height,
            people: result
                .people
                .into_iter()
                .map(|p| WirePerson {
                    bbox: [p.x, p.y, p.width, p.height],
                    score: p.score,
                })
                .collect(),
        }
    }
}

impl DetectionResult {
    /// 検出器のJSONから読み込み
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// スコアが閾値未満の人物を除外
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        let before = self.people.len();
        self.people.retain(|p| p.score >= min_score);
        let dropped = before - self.people.len();
        if dropped > 0 {
            tracing::debug!(dropped, min_score, "低スコアの人物を除外");
        }
        self
    }

    /// 元画像サイズが許容誤差内で一致するか
    pub fn matches_dimensions(&self, width: u32, height: u32, tolerance: f64) -> bool {
        (self.image_width - width as f64).abs() <= tolerance
            && (self.image_height - height as f64).abs() <= tolerance
    }
}

/// 選択状態
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selection {
    pub index: Option<usize>,
    pub bbox: Option<PersonBox>,
}

impl Selection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.index.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_deserialize_wire_format() {
        let json = r#"{
            "imageId": "abc",
            "imageWidth": 1200,
            "imageHeight": 1600,
            "people": [
                {"bbox": [100, 200, 300, 500], "score": 0.92},
                {"bbox": [600, 180, 280, 540], "score": 0.81}
            ]
        }"#;

        let result = DetectionResult::from_json_str(json).expect("デシリアライズ失敗");
        assert_eq!(result.image_id, ImageId::new("abc"));
        assert_eq!(result.image_width, 1200.0);
        assert_eq!(result.people.len(), 2);
        assert_eq!(result.people[0], PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.92));
    }

    #[test]
    fn test_detection_drops_degenerate_boxes() {
        let json = r#"{
            "imageId": "abc",
            "imageWidth": 100,
            "imageHeight": 100,
            "people": [
                {"bbox": [10, 10, 0, 20], "score": 0.9},
                {"bbox": [10, 10, 20, -5], "score": 0.9},
                {"bbox": [10, 10, 20, 20], "score": 0.9}
            ]
        }"#;

        let result = DetectionResult::from_json_str(json).expect("デシリアライズ失敗");
        assert_eq!(result.people.len(), 1);
        assert_eq!(result.people[0].width, 20.0);
    }

    #[test]
    fn test_detection_missing_people_is_empty() {
        let json = r#"{"imageId": "abc", "imageWidth": 10, "imageHeight": 10}"#;
        let result = DetectionResult::from_json_str(json).expect("デシリアライズ失敗");
        assert!(result.people.is_empty());
    }

    #[test]
    fn test_detection_serialize_uses_bbox_array() {
        let result = DetectionResult {
            image_id: ImageId::new("abc"),
            image_width: 10.0,
            image_height: 20.0,
            people: vec![PersonBox::new(1.0, 2.0, 3.0, 4.0, 0.5)],
        };
        let json = serde_json::to_string(&result).expect("シリアライズ失敗");
        assert!(json.contains("\"imageId\":\"abc\""));
        assert!(json.contains("\"bbox\":[1.0,2.0,3.0,4.0]"));
    }

    #[test]
    fn test_with_min_score() {
        let result = DetectionResult {
            image_id: ImageId::new("abc"),
            image_width: 10.0,
            image_height: 10.0,
            people: vec![
                PersonBox::new(0.0, 0.0, 1.0, 1.0, 0.2),
                PersonBox::new(0.0, 0.0, 1.0, 1.0, 0.7),
            ],
        }
        .with_min_score(0.5);
        assert_eq!(result.people.len(), 1);
        assert_eq!(result.people[0].score, 0.7);
    }

    #[test]
    fn test_matches_dimensions_tolerance() {
        let result = DetectionResult {
            image_id: ImageId::new("abc"),
            image_width: 1201.0,
            image_height: 1599.0,
            people: vec![],
        };
        assert!(result.matches_dimensions(1200, 1600, 1.0));
        assert!(!result.matches_dimensions(1198, 1600, 1.0));
    }

    #[test]
    fn test_clamped_trims_to_image() {
        let b = PersonBox::new(-10.0, 20.0, 100.0, 500.0, 0.9);
        let clamped = b.clamped(Some((80, 400)));
        assert_eq!(clamped.x, 0.0);
        assert_eq!(clamped.width, 80.0);
        assert_eq!(clamped.y, 20.0);
        assert_eq!(clamped.height, 380.0);
    }

    #[test]
    fn test_clamped_without_dimensions() {
        let b = PersonBox::new(-10.0, -5.0, 100.0, 50.0, 0.9);
        let clamped = b.clamped(None);
        assert_eq!(clamped, PersonBox::new(0.0, 0.0, 90.0, 45.0, 0.9));
    }

    #[test]
    fn test_scaled_box() {
        let b = PersonBox::new(100.0, 200.0, 300.0, 500.0, 1.0);
        assert_eq!(b.scaled(0.125), Rect::new(12.5, 25.0, 37.5, 62.5));
    }
}
