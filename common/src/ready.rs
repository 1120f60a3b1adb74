//! 画像の準備完了シグナル
//!
//! ImageIdごとに待機者は最大1つ。別IDで待機し直すと前の待機はキャンセルされる。

use crate::error::{Error, Result};
use crate::types::{ImageId, NaturalImage};
use futures::channel::oneshot;
use std::future::Future;

#[derive(Debug, Default)]
pub struct ReadySignal {
    pending: Option<(ImageId, oneshot::Sender<NaturalImage>)>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// `id` の画像が準備できるまで待つFutureを返す
    pub fn wait(&mut self, id: ImageId) -> impl Future<Output = Result<NaturalImage>> {
        let (tx, rx) = oneshot::channel();
        if let Some((previous, _)) = self.pending.replace((id.clone(), tx)) {
            tracing::debug!(previous = %previous, next = %id, "準備待ちを置き換え");
        }
        async move { rx.await.map_err(|_| Error::ReadyCancelled { id }) }
    }

    /// 準備完了を通知。待機者がいて受け取った場合true
    pub fn notify(&mut self, image: &NaturalImage) -> bool {
        match self.pending.take() {
            Some((id, tx)) if id == image.identity => tx.send(image.clone()).is_ok(),
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// 待機中のIDが `id` 以外ならキャンセル
    pub fn retain_only(&mut self, id: &ImageId) {
        if matches!(&self.pending, Some((pending, _)) if pending != id) {
            self.pending = None;
        }
    }
}
