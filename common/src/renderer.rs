//! キャンバス描画
//!
//! 状態遷移: `Idle → AwaitingImage → Ready → Drawn`
//!
//! 前提条件（ID・サイズ一致、スケール、コンテナサイズ、DPR）は
//! `validate_frame` だけで検証する。1つでも満たさなければ何も描かない。

use crate::config::{BoxStyle, OverlayConfig};
use crate::error::{Error, Result};
use crate::geometry::{self, CanvasBackingStore, DisplayGeometry, Viewport};
use crate::identity::{ReadinessValidator, ReadyCheck};
use crate::surface::CanvasSurface;
use crate::types::{DetectionResult, ImageId, NaturalImage, PersonBox, Rect};

/// レンダラーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    AwaitingImage,
    Ready,
    Drawn,
}

/// 最後に成功した描画のジオメトリ（ヒットテストはこれだけを参照する）
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGeometry {
    pub image: NaturalImage,
    /// 描画に使った検出結果のID（検出なしならNone）
    pub detection_id: Option<ImageId>,
    pub geometry: DisplayGeometry,
    pub backing: CanvasBackingStore,
    /// 描画順の人物インデックス（最後が最前面）
    pub draw_order: Vec<usize>,
}

/// 1回の描画要求
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub expected_id: &'a ImageId,
    pub detection: Option<&'a DetectionResult>,
    pub selected: Option<usize>,
    pub viewport: Viewport,
}

/// 検証済みの描画計画
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FramePlan<'a> {
    pub(crate) image: NaturalImage,
    pub(crate) geometry: DisplayGeometry,
    pub(crate) intended_backing: (u32, u32),
    pub(crate) people: &'a [PersonBox],
}

/// 描画・ヒットテスト前の不変条件チェック
pub(crate) fn validate_frame<'a>(
    check: &ReadyCheck,
    expected_id: &ImageId,
    detection: Option<&'a DetectionResult>,
    viewport: &Viewport,
    tolerance: f64,
) -> Result<FramePlan<'a>> {
    if !check.ready {
        return Err(Error::ImageNotReady { id: expected_id.clone() });
    }
    if &check.id != expected_id {
        return Err(Error::IdentityMismatch {
            expected: expected_id.clone(),
            actual: check.id.clone(),
        });
    }

    let mut people: &[PersonBox] = &[];
    if let Some(detection) = detection {
        if detection.image_id != check.id {
            return Err(Error::IdentityMismatch {
                expected: check.id.clone(),
                actual: detection.image_id.clone(),
            });
        }
        if !detection.matches_dimensions(check.width, check.height, tolerance) {
            return Err(Error::DimensionMismatch {
                expected_width: check.width as f64,
                expected_height: check.height as f64,
                actual_width: detection.image_width,
                actual_height: detection.image_height,
            });
        }
        people = &detection.people;
    }

    let container = viewport.container;
    if !(container.max_width.is_finite()
        && container.max_height.is_finite()
        && container.max_width > 0.0
        && container.max_height > 0.0)
    {
        return Err(Error::EmptyContainer {
            width: container.max_width,
            height: container.max_height,
        });
    }

    let geometry = geometry::fit(
        check.width as f64,
        check.height as f64,
        container.max_width,
        container.max_height,
    )?;
    let intended_backing = geometry::intended_backing_size(&geometry, viewport.dpr)?;

    Ok(FramePlan {
        image: NaturalImage {
            identity: check.id.clone(),
            width: check.width,
            height: check.height,
        },
        geometry,
        intended_backing,
        people,
    })
}

/// 描画順: 非選択を先に、選択中を最後に
pub fn draw_order(count: usize, selected: Option<usize>) -> Vec<usize> {
    let selected = selected.filter(|&i| i < count);
    let mut order: Vec<usize> = (0..count).filter(|&i| Some(i) != selected).collect();
    order.extend(selected);
    order
}

pub struct CanvasRenderer<S: CanvasSurface> {
    surface: S,
    state: RenderState,
    style: BoxStyle,
    tolerance: f64,
    last_frame: Option<FrameGeometry>,
}

impl<S: CanvasSurface> CanvasRenderer<S> {
    pub fn new(surface: S, config: &OverlayConfig) -> Self {
        Self {
            surface,
            state: RenderState::Idle,
            style: config.style.clone(),
            tolerance: config.dimension_tolerance_px,
            last_frame: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn last_frame(&self) -> Option<&FrameGeometry> {
        self.last_frame.as_ref()
    }

    /// 新しい画像IDに切り替わった
    pub fn image_changed(&mut self) {
        self.state = RenderState::AwaitingImage;
        self.last_frame = None;
    }

    pub fn image_removed(&mut self) {
        self.state = RenderState::Idle;
        self.last_frame = None;
        let (w, h) = self.surface.backing_size();
        if self.surface.reset_transform().is_ok() {
            self.surface.clear_rect(Rect::new(0.0, 0.0, w as f64, h as f64));
        }
    }

    /// ジオメトリに影響する変更があった（Drawn → Ready）
    pub fn invalidate(&mut self) {
        if self.state == RenderState::Drawn {
            self.state = RenderState::Ready;
        }
    }

    /// 画像と人物矩形を描画する
    ///
    /// 前提条件を満たさない場合は何も描かずにエラーを返す。
    pub fn draw(
        &mut self,
        validator: &mut ReadinessValidator,
        image: &S::Image,
        request: DrawRequest<'_>,
    ) -> Result<&FrameGeometry> {
        let check = validator.validate_ready(image, request.expected_id);
        if !check.ready {
            self.state = RenderState::AwaitingImage;
            return Err(Error::ImageNotReady { id: request.expected_id.clone() });
        }
        self.state = RenderState::Ready;

        let plan = match validate_frame(
            &check,
            request.expected_id,
            request.detection,
            &request.viewport,
            self.tolerance,
        ) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "前提条件を満たさないため描画をスキップ");
                return Err(e);
            }
        };

        let frame = match self.paint(image, &plan, request) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "描画を中断");
                let (w, h) = self.surface.backing_size();
                if self.surface.reset_transform().is_ok() {
                    self.surface.clear_rect(Rect::new(0.0, 0.0, w as f64, h as f64));
                }
                return Err(e);
            }
        };

        self.state = RenderState::Drawn;
        Ok(&*self.last_frame.insert(frame))
    }

    fn paint(&mut self, image: &S::Image, plan: &FramePlan<'_>, request: DrawRequest<'_>) -> Result<FrameGeometry> {
        let geometry = plan.geometry;
        let (intended_w, intended_h) = plan.intended_backing;

        self.surface.set_backing_size(intended_w, intended_h);
        self.surface.set_layout_size(geometry.display_width, geometry.display_height);

        let (actual_w, actual_h) = self.surface.backing_size();
        let backing = geometry::backing_store_from_actual(&geometry, actual_w, actual_h)?;

        self.surface.reset_transform()?;
        self.surface.clear_rect(Rect::new(0.0, 0.0, actual_w as f64, actual_h as f64));
        self.surface.scale(backing.effective_dpr_x, backing.effective_dpr_y)?;

        self.surface.draw_image(
            image,
            Rect::new(0.0, 0.0, geometry.display_width, geometry.display_height),
        )?;

        let natural_w = plan.image.width as f64;
        let natural_h = plan.image.height as f64;
        for (i, person) in plan.people.iter().enumerate() {
            if !person.lies_within(natural_w, natural_h) {
                tracing::warn!(
                    index = i,
                    x = person.x,
                    y = person.y,
                    width = person.width,
                    height = person.height,
                    natural_width = plan.image.width,
                    natural_height = plan.image.height,
                    "人物矩形が画像の範囲外"
                );
            }
        }

        let selected = request.selected.filter(|&i| i < plan.people.len());
        let order = draw_order(plan.people.len(), selected);
        for &i in &order {
            let rect = plan.people[i].scaled(geometry.scale);
            if Some(i) == selected {
                if let Some(fill) = self.style.selected_fill {
                    self.surface.fill_rect(rect, fill);
                }
                self.surface
                    .stroke_rect(rect, self.style.selected_stroke, self.style.selected_line_width);
            } else {
                self.surface.stroke_rect(rect, self.style.stroke, self.style.line_width);
            }
        }

        tracing::debug!(
            scale = geometry.scale,
            display_width = geometry.display_width,
            display_height = geometry.display_height,
            pixel_width = backing.pixel_width,
            pixel_height = backing.pixel_height,
            people = plan.people.len(),
            "描画完了"
        );

        Ok(FrameGeometry {
            image: plan.image.clone(),
            detection_id: request.detection.map(|d| d.image_id.clone()),
            geometry,
            backing,
            draw_order: order,
        })
    }
}
