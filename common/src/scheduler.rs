//! 再描画スケジューラ
//!
//! 外部イベントをまとめ、アニメーションフレームごとに最大1回だけ描画を要求する。
//! 非表示中はフレームを要求せず、表示に戻った時点で1回要求する。

/// 再描画のきっかけ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedrawTrigger {
    Resize,
    VisibilityRegained,
    ImageChanged,
    DetectionArrived,
    SelectionChanged,
    Forced,
}

/// 次のアニメーションフレームを要求する手段
pub trait FrameRequester {
    fn request_frame(&mut self);
}

/// テストやネイティブ側で使う、要求回数だけ数える実装
#[derive(Debug, Default)]
pub struct ManualFrames {
    pub requested: usize,
}

impl FrameRequester for ManualFrames {
    fn request_frame(&mut self) {
        self.requested += 1;
    }
}

pub struct RedrawScheduler<F: FrameRequester> {
    requester: F,
    pending: Vec<RedrawTrigger>,
    frame_requested: bool,
    visible: bool,
}

impl<F: FrameRequester> RedrawScheduler<F> {
    pub fn new(requester: F) -> Self {
        Self {
            requester,
            pending: Vec::new(),
            frame_requested: false,
            visible: true,
        }
    }

    pub fn requester(&self) -> &F {
        &self.requester
    }

    pub fn requester_mut(&mut self) -> &mut F {
        &mut self.requester
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn trigger(&mut self, trigger: RedrawTrigger) {
        if !self.pending.contains(&trigger) {
            self.pending.push(trigger);
        }
        self.request_if_needed();
    }

    /// ドキュメントの表示状態が変わった
    pub fn set_visible(&mut self, visible: bool) {
        let regained = visible && !self.visible;
        self.visible = visible;
        if regained {
            self.trigger(RedrawTrigger::VisibilityRegained);
        }
    }

    /// フレーム開始。保留中のトリガーを取り出す
    pub fn begin_frame(&mut self) -> Vec<RedrawTrigger> {
        self.frame_requested = false;
        if !self.visible {
            return Vec::new();
        }
        let batch = std::mem::take(&mut self.pending);
        if batch.len() > 1 {
            tracing::debug!(triggers = ?batch, "トリガーをまとめて再描画");
        }
        batch
    }

    fn request_if_needed(&mut self) {
        if self.visible && !self.frame_requested && !self.pending.is_empty() {
            self.frame_requested = true;
            self.requester.request_frame();
        }
    }
}
