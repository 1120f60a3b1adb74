//! 選択中の人物の管理
//!
//! - 1人だけ検出されたら自動選択
//! - 画像IDが変わったら必ずリセット
//! - 外部に渡す矩形は常に画像内にクランプしたもの

use crate::types::{DetectionResult, ImageId, PersonBox, Selection};

pub type SelectionListener = Box<dyn FnMut(Option<PersonBox>)>;

pub struct SelectionController {
    selection: Selection,
    image_id: Option<ImageId>,
    natural: Option<(u32, u32)>,
    people: Vec<PersonBox>,
    pending_change: Option<Option<PersonBox>>,
    listener: Option<SelectionListener>,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self {
            selection: Selection::none(),
            image_id: None,
            natural: None,
            people: Vec::new(),
            pending_change: None,
            listener: None,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selection.index
    }

    /// クランプ済みの選択矩形
    pub fn selected_box(&self) -> Option<PersonBox> {
        self.selection.bbox
    }

    /// 変更通知を受け取るリスナーを登録
    pub fn on_change(&mut self, listener: SelectionListener) {
        self.listener = Some(listener);
        self.dispatch();
    }

    /// 未配信の変更を取り出す（リスナー未登録時に使う）
    pub fn take_change(&mut self) -> Option<Option<PersonBox>> {
        self.pending_change.take()
    }

    /// 画像IDが変わった。選択は無条件にリセットする
    pub fn image_changed(&mut self, id: Option<ImageId>) -> bool {
        if self.image_id == id {
            return false;
        }
        self.image_id = id;
        self.natural = None;
        self.people.clear();
        self.set(None);
        true
    }

    /// デコード後に判明した元画像サイズ
    pub fn set_natural_size(&mut self, id: &ImageId, width: u32, height: u32) {
        if self.image_id.as_ref() != Some(id) || self.natural == Some((width, height)) {
            return;
        }
        self.natural = Some((width, height));
        if let Some(index) = self.selection.index {
            self.set(Some(index));
        }
    }

    /// 新しい検出結果を受け取った
    pub fn detection_arrived(&mut self, detection: &DetectionResult) {
        if self.image_id.as_ref() != Some(&detection.image_id) {
            return;
        }
        self.people = detection.people.clone();
        if self.people.len() == 1 {
            self.set(Some(0));
        } else {
            self.set(None);
        }
    }

    /// 検出失敗などで候補がなくなった
    pub fn detection_cleared(&mut self) {
        self.people.clear();
        self.set(None);
    }

    /// ヒットテスト結果を反映。変更があればtrue
    pub fn apply_hit(&mut self, hit: Option<usize>) -> bool {
        match hit {
            Some(index) if index < self.people.len() => self.set(Some(index)),
            Some(index) => {
                tracing::warn!(index, people = self.people.len(), "範囲外のインデックスを無視");
                false
            }
            // 1人だけの自動選択は外れクリックで解除しない
            None if self.people.len() == 1 => false,
            None => self.set(None),
        }
    }

    fn set(&mut self, index: Option<usize>) -> bool {
        let bbox = index
            .and_then(|i| self.people.get(i))
            .map(|b| b.clamped(self.natural));
        let next = Selection { index: bbox.and(index), bbox };
        if next == self.selection {
            return false;
        }
        self.selection = next;
        self.pending_change = Some(bbox);
        self.dispatch();
        true
    }

    fn dispatch(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            if let Some(change) = self.pending_change.take() {
                listener(change);
            }
        }
    }
}
