//! 画像IDの導出とデコード完了の検証
//!
//! ID計算はソース文字列のハッシュなので、同じ `Rc<str>` に対しては
//! ポインタ比較だけで済ませる。内容が同じ別の文字列も再ハッシュしない。

use crate::error::Error;
use crate::types::ImageId;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::rc::Rc;

/// ソース文字列からIDを計算（キャッシュなし）
pub fn identity_of(source: &str) -> ImageId {
    let digest = Sha256::digest(source.as_bytes());
    ImageId::new(hex::encode(&digest[..16]))
}

/// 画像要素の抽象化
pub trait ImageSource {
    /// 要求中のソース（`src` 属性）
    fn source(&self) -> Rc<str>;
    /// 実際にデコードされているソース（`currentSrc`）
    fn current_source(&self) -> Rc<str>;
    /// デコードが完了しているか
    fn is_complete(&self) -> bool;
    /// 元画像サイズ（未デコードなら0）
    fn natural_size(&self) -> (u32, u32);
}

/// ソース文字列→IDの小さなLRU
#[derive(Debug)]
pub struct IdentityCache {
    capacity: usize,
    entries: VecDeque<(Rc<str>, ImageId)>,
}

impl IdentityCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn identity_of(&mut self, source: &Rc<str>) -> ImageId {
        let pos = self
            .entries
            .iter()
            .position(|(s, _)| Rc::ptr_eq(s, source))
            .or_else(|| self.entries.iter().position(|(s, _)| **s == **source));

        if let Some(entry) = pos.and_then(|p| self.entries.remove(p)) {
            let id = entry.1.clone();
            self.entries.push_front((Rc::clone(source), entry.1));
            return id;
        }

        let id = identity_of(source);
        self.entries.push_front((Rc::clone(source), id.clone()));
        self.entries.truncate(self.capacity);
        id
    }
}

/// `validate_ready` の結果
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyCheck {
    pub ready: bool,
    pub width: u32,
    pub height: u32,
    pub id: ImageId,
}

/// デコード済みかどうかを判定し、IDごとの画像サイズを保持する
#[derive(Debug)]
pub struct ReadinessValidator {
    identities: IdentityCache,
    dimensions: Option<(ImageId, u32, u32)>,
}

impl ReadinessValidator {
    pub fn new(identity_cache_capacity: usize) -> Self {
        Self {
            identities: IdentityCache::new(identity_cache_capacity),
            dimensions: None,
        }
    }

    pub fn identity_of(&mut self, source: &Rc<str>) -> ImageId {
        self.identities.identity_of(source)
    }

    /// 要求中ソースのID（期待ID）
    pub fn expected_identity<I: ImageSource + ?Sized>(&mut self, image: &I) -> ImageId {
        self.identities.identity_of(&image.source())
    }

    /// 画像がデコード済みで、かつ期待IDのソースを表示しているか
    pub fn validate_ready<I: ImageSource + ?Sized>(&mut self, image: &I, expected_id: &ImageId) -> ReadyCheck {
        let (width, height) = image.natural_size();
        let current_id = self.identities.identity_of(&image.current_source());

        let not_ready = ReadyCheck {
            ready: false,
            width,
            height,
            id: current_id.clone(),
        };

        if !image.is_complete() || width == 0 || height == 0 {
            return not_ready;
        }
        if &current_id != expected_id {
            tracing::debug!(
                expected = %expected_id,
                actual = %current_id,
                "currentSrcが未更新のため待機"
            );
            return not_ready;
        }

        match &self.dimensions {
            Some((id, w, h)) if id == &current_id && (*w, *h) != (width, height) => {
                let conflict = Error::IdentityDimensionConflict {
                    id: current_id.clone(),
                    cached_width: *w,
                    cached_height: *h,
                    decoded_width: width,
                    decoded_height: height,
                };
                tracing::warn!(error = %conflict, "画像サイズの不整合");
                self.dimensions = Some((current_id, width, height));
                return not_ready;
            }
            Some((id, _, _)) if id == &current_id => {}
            previous => {
                if let Some((old, _, _)) = previous {
                    tracing::debug!(evicted = %old, "前の画像サイズを破棄");
                }
                self.dimensions = Some((current_id.clone(), width, height));
            }
        }

        ReadyCheck {
            ready: true,
            width,
            height,
            id: current_id,
        }
    }

    /// キャッシュ済みの画像サイズ
    pub fn cached_dimensions(&self, id: &ImageId) -> Option<(u32, u32)> {
        match &self.dimensions {
            Some((cached, w, h)) if cached == id => Some((*w, *h)),
            _ => None,
        }
    }

    /// ID変更時に前のサイズを捨てる
    pub fn evict_except(&mut self, id: &ImageId) {
        if let Some((cached, _, _)) = &self.dimensions {
            if cached != id {
                self.dimensions = None;
            }
        }
    }
}
