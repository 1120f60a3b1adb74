//! 人物選択オーバーレイ
//!
//! 画像ID検証・レンダラー・ヒットテスト・選択・再描画スケジューラをまとめ、
//! ホストUIに公開する操作を提供する。
//!
//! どの操作も実行時点でIDとサイズを検証し直す。以前の検証結果は信用しない。

use crate::config::OverlayConfig;
use crate::error::{Error, Result};
use crate::geometry::Viewport;
use crate::hit_test::{self, ClientRect, PointerSample};
use crate::identity::{ImageSource, ReadinessValidator};
use crate::ready::ReadySignal;
use crate::renderer::{CanvasRenderer, DrawRequest, FrameGeometry};
use crate::scheduler::{FrameRequester, RedrawScheduler, RedrawTrigger};
use crate::selection::{SelectionController, SelectionListener};
use crate::surface::CanvasSurface;
use crate::types::{DetectionResult, ImageId, NaturalImage, PersonBox, Selection};
use futures::future::{self, FutureExt, LocalBoxFuture};

/// 現在の画像に対する検出状態
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionState {
    Pending,
    Failed(String),
    Ready(DetectionResult),
}

impl DetectionState {
    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            DetectionState::Ready(result) => Some(result),
            _ => None,
        }
    }
}

pub struct PersonOverlay<S: CanvasSurface, F: FrameRequester> {
    config: OverlayConfig,
    validator: ReadinessValidator,
    renderer: CanvasRenderer<S>,
    selection: SelectionController,
    scheduler: RedrawScheduler<F>,
    ready_signal: ReadySignal,
    image: Option<S::Image>,
    image_id: Option<ImageId>,
    drawn_id: Option<ImageId>,
    detection: DetectionState,
}

impl<S: CanvasSurface, F: FrameRequester> PersonOverlay<S, F> {
    pub fn new(surface: S, requester: F, config: OverlayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            validator: ReadinessValidator::new(config.identity_cache_capacity),
            renderer: CanvasRenderer::new(surface, &config),
            selection: SelectionController::new(),
            scheduler: RedrawScheduler::new(requester),
            ready_signal: ReadySignal::new(),
            image: None,
            image_id: None,
            drawn_id: None,
            detection: DetectionState::Pending,
            config,
        })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        self.renderer.surface()
    }

    pub fn last_frame(&self) -> Option<&FrameGeometry> {
        self.renderer.last_frame()
    }

    pub fn scheduler(&self) -> &RedrawScheduler<F> {
        &self.scheduler
    }

    pub fn image(&self) -> Option<&S::Image> {
        self.image.as_ref()
    }

    /// 画像を直接書き換える場合（デコード完了のシミュレーションなど）
    pub fn image_mut(&mut self) -> Option<&mut S::Image> {
        self.image.as_mut()
    }

    pub fn image_id(&self) -> Option<&ImageId> {
        self.image_id.as_ref()
    }

    pub fn detection(&self) -> &DetectionState {
        &self.detection
    }

    // =============================================
    // ホストからの入力
    // =============================================

    /// 表示する画像を差し替える
    pub fn set_image(&mut self, image: Option<S::Image>) {
        self.image = image;
        self.sync_identity();
        self.scheduler.trigger(RedrawTrigger::ImageChanged);
    }

    /// 画像の load イベント
    pub fn image_loaded(&mut self) {
        self.sync_identity();
        let (Some(image), Some(id)) = (self.image.as_ref(), self.image_id.as_ref()) else {
            return;
        };
        let check = self.validator.validate_ready(image, id);
        if check.ready {
            let natural = NaturalImage {
                identity: check.id,
                width: check.width,
                height: check.height,
            };
            self.selection.set_natural_size(&natural.identity, natural.width, natural.height);
            self.ready_signal.notify(&natural);
            self.reject_mismatched_detection();
        }
        self.scheduler.trigger(RedrawTrigger::ImageChanged);
    }

    /// 検出器の結果（失敗を含む）を受け取る
    ///
    /// 現在の画像と異なるIDの結果と、デコード済みの画像とサイズが合わない結果は
    /// 到着時点で破棄する。戻り値は採用したかどうか。
    pub fn set_detection(&mut self, result: Result<DetectionResult>) -> bool {
        self.sync_identity();
        match result {
            Ok(detection) => {
                let detection = detection.with_min_score(self.config.min_score);
                if self.image_id.as_ref() != Some(&detection.image_id) {
                    tracing::debug!(
                        stale = %detection.image_id,
                        current = ?self.image_id.as_ref().map(ImageId::as_str),
                        "古い検出結果を破棄"
                    );
                    return false;
                }
                if let Some((width, height)) = self.decoded_size() {
                    if !detection.matches_dimensions(width, height, self.config.dimension_tolerance_px) {
                        let error = dimension_mismatch(&detection, width, height);
                        tracing::warn!(error = %error, "画像サイズが合わない検出結果を破棄");
                        return false;
                    }
                }
                self.selection.detection_arrived(&detection);
                if let Some((w, h)) = self.validator.cached_dimensions(&detection.image_id) {
                    self.selection.set_natural_size(&detection.image_id, w, h);
                }
                self.detection = DetectionState::Ready(detection);
            }
            Err(error) => {
                let message = match error {
                    Error::Detector(message) => message,
                    other => other.to_string(),
                };
                tracing::info!(error = %message, "人物検出に失敗。写真のみ表示");
                self.selection.detection_cleared();
                self.detection = DetectionState::Failed(message);
            }
        }
        self.renderer.invalidate();
        self.scheduler.trigger(RedrawTrigger::DetectionArrived);
        true
    }

    /// キャンバス上のポインタ押下。当たった人物のインデックスを返す
    pub fn pointer_down(&mut self, pointer: PointerSample, rect: ClientRect) -> Option<usize> {
        self.sync_identity();
        let hit = self.hit_test(pointer, rect);
        if self.selection.apply_hit(hit) {
            self.renderer.invalidate();
            self.scheduler.trigger(RedrawTrigger::SelectionChanged);
        }
        hit
    }

    /// コンテナのサイズが変わった
    pub fn resized(&mut self) {
        self.renderer.invalidate();
        self.scheduler.trigger(RedrawTrigger::Resize);
    }

    /// ドキュメントの表示状態が変わった
    pub fn set_visible(&mut self, visible: bool) {
        if visible && !self.scheduler.is_visible() {
            self.renderer.invalidate();
        }
        self.scheduler.set_visible(visible);
    }

    pub fn force_redraw(&mut self) {
        self.renderer.invalidate();
        self.scheduler.trigger(RedrawTrigger::Forced);
    }

    /// アニメーションフレーム。保留中のトリガーがあれば描画する
    ///
    /// `viewport` はこのフレームで計測した値を渡すこと。
    pub fn on_frame(&mut self, viewport: Viewport) -> Option<Result<()>> {
        let triggers = self.scheduler.begin_frame();
        if triggers.is_empty() {
            return None;
        }
        Some(self.redraw_now(viewport))
    }

    /// スケジューラを通さずにすぐ描画する
    pub fn redraw_now(&mut self, viewport: Viewport) -> Result<()> {
        self.sync_identity();
        self.reject_mismatched_detection();
        let (Some(image), Some(id)) = (self.image.as_ref(), self.image_id.as_ref()) else {
            return Ok(());
        };
        self.renderer.invalidate();

        let frame = self.renderer.draw(
            &mut self.validator,
            image,
            DrawRequest {
                expected_id: id,
                detection: self.detection.result(),
                selected: self.selection.selected_index(),
                viewport,
            },
        )?;

        let natural = frame.image.clone();
        self.selection.set_natural_size(&natural.identity, natural.width, natural.height);
        self.ready_signal.notify(&natural);
        self.drawn_id = Some(natural.identity);
        Ok(())
    }

    // =============================================
    // ホストへの出力
    // =============================================

    /// 現在の画像で一度でも描画に成功した、または描くものがない
    ///
    /// リサイズや再描画の要求では false に戻らない。画像IDが変わるまで保持する。
    pub fn is_ready(&self) -> bool {
        self.image.is_none() || (self.image_id.is_some() && self.drawn_id == self.image_id)
    }

    pub fn selection(&self) -> Selection {
        self.selection.selection()
    }

    pub fn selected_box(&self) -> Option<PersonBox> {
        self.selection.selected_box()
    }

    pub fn on_selection_change(&mut self, listener: SelectionListener) {
        self.selection.on_change(listener);
    }

    pub fn take_selection_change(&mut self) -> Option<Option<PersonBox>> {
        self.selection.take_change()
    }

    /// 現在の画像がデコードされるまで待つ
    pub fn wait_ready(&mut self) -> LocalBoxFuture<'static, Result<NaturalImage>> {
        self.sync_identity();
        let (Some(image), Some(id)) = (self.image.as_ref(), self.image_id.clone()) else {
            return future::ready(Err(Error::Config("画像が設定されていません".into()))).boxed_local();
        };
        let check = self.validator.validate_ready(image, &id);
        if check.ready {
            let natural = NaturalImage {
                identity: check.id,
                width: check.width,
                height: check.height,
            };
            return future::ready(Ok(natural)).boxed_local();
        }
        self.ready_signal.wait(id).boxed_local()
    }

    // =============================================
    // 内部処理
    // =============================================

    /// 要求中ソースのIDを再計算し、変わっていれば状態を切り替える
    fn sync_identity(&mut self) -> bool {
        let next = match self.image.as_ref() {
            Some(image) => Some(self.validator.expected_identity(image)),
            None => None,
        };
        if next == self.image_id {
            return false;
        }

        tracing::debug!(
            previous = ?self.image_id.as_ref().map(ImageId::as_str),
            next = ?next.as_ref().map(ImageId::as_str),
            "画像IDが変わりました"
        );
        match &next {
            Some(id) => {
                self.validator.evict_except(id);
                self.ready_signal.retain_only(id);
                self.renderer.image_changed();
            }
            None => self.renderer.image_removed(),
        }
        self.selection.image_changed(next.clone());
        self.detection = DetectionState::Pending;
        self.drawn_id = None;
        self.image_id = next;
        self.scheduler.trigger(RedrawTrigger::ImageChanged);
        true
    }

    /// 期待IDのソースがデコード済みならその元画像サイズ
    fn decoded_size(&mut self) -> Option<(u32, u32)> {
        let (Some(image), Some(id)) = (self.image.as_ref(), self.image_id.as_ref()) else {
            return None;
        };
        let check = self.validator.validate_ready(image, id);
        (check.ready && &check.id == id).then_some((check.width, check.height))
    }

    /// デコード前に採用した検出結果がサイズ不一致なら丸ごと捨てる
    fn reject_mismatched_detection(&mut self) {
        let Some((width, height)) = self.decoded_size() else {
            return;
        };
        let Some(detection) = self.detection.result() else {
            return;
        };
        if detection.matches_dimensions(width, height, self.config.dimension_tolerance_px) {
            return;
        }
        let error = dimension_mismatch(detection, width, height);
        tracing::warn!(error = %error, "デコード後のサイズと合わない検出結果を破棄");
        self.selection.detection_cleared();
        self.detection = DetectionState::Pending;
        self.renderer.invalidate();
    }

    fn hit_test(&mut self, pointer: PointerSample, rect: ClientRect) -> Option<usize> {
        let (Some(image), Some(id)) = (self.image.as_ref(), self.image_id.as_ref()) else {
            return None;
        };
        let frame = self.renderer.last_frame()?;
        let detection = self.detection.result()?;

        if &frame.image.identity != id || frame.detection_id.as_ref() != Some(&detection.image_id) {
            tracing::warn!(
                expected = %id,
                frame = %frame.image.identity,
                detection = %detection.image_id,
                "描画時と現在のIDが一致しないためヒットテストを中止"
            );
            return None;
        }
        let check = self.validator.validate_ready(image, id);
        if !check.ready || (check.width, check.height) != (frame.image.width, frame.image.height) {
            tracing::warn!(
                expected_width = frame.image.width,
                expected_height = frame.image.height,
                actual_width = check.width,
                actual_height = check.height,
                ready = check.ready,
                "描画時と現在の画像サイズが一致しないためヒットテストを中止"
            );
            return None;
        }
        if frame.draw_order.len() != detection.people.len() {
            return None;
        }

        hit_test::hit(frame, &detection.people, pointer, rect)
    }
}

fn dimension_mismatch(detection: &DetectionResult, width: u32, height: u32) -> Error {
    Error::DimensionMismatch {
        expected_width: width as f64,
        expected_height: height as f64,
        actual_width: detection.image_width,
        actual_height: detection.image_height,
    }
}
