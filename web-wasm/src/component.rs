//! 人物選択コンポーネント

use crate::binding::OverlayBinding;
use leptos::html;
use leptos::prelude::*;
use tryon_overlay_common::{DetectionResult, OverlayConfig, PersonBox};
use web_sys::HtmlElement;

/// 検出器の状態（未到着 / 成功 / 失敗メッセージ）
pub type DetectionSignal = Signal<Option<Result<DetectionResult, String>>>;

#[component]
pub fn PersonSelector(
    /// 写真のURL
    #[prop(into)]
    src: Signal<String>,
    #[prop(into)] detection: DetectionSignal,
    #[prop(into)] on_select: Callback<Option<PersonBox>>,
    #[prop(optional)] config: Option<OverlayConfig>,
) -> impl IntoView {
    let container_ref = NodeRef::<html::Div>::new();
    let canvas_ref = NodeRef::<html::Canvas>::new();
    let image_ref = NodeRef::<html::Img>::new();
    let binding = StoredValue::new_local(None::<OverlayBinding>);
    let config = config.unwrap_or_default();

    // マウント後に1回だけ接続
    Effect::new(move |_| {
        let (Some(container), Some(canvas), Some(image)) =
            (container_ref.get(), canvas_ref.get(), image_ref.get())
        else {
            return;
        };
        if binding.with_value(Option::is_some) {
            return;
        }
        let container: HtmlElement = container.into();
        match OverlayBinding::attach(container, canvas, image, config.clone()) {
            Ok(attached) => {
                attached.set_selection_sink(Box::new(move |change| on_select.run(change)));
                if let Some(result) = detection.get_untracked() {
                    attached.apply_detection(result);
                }
                binding.set_value(Some(attached));
            }
            Err(e) => tracing::error!(error = %e, "オーバーレイを初期化できません"),
        }
    });

    Effect::new(move |previous: Option<()>| {
        src.track();
        if previous.is_some() {
            binding.with_value(|b| {
                if let Some(b) = b {
                    b.source_changed();
                }
            });
        }
    });

    Effect::new(move |_| {
        let Some(result) = detection.get() else {
            return;
        };
        binding.with_value(|b| {
            if let Some(b) = b {
                b.apply_detection(result);
            }
        });
    });

    on_cleanup(move || {
        let _ = binding.try_update_value(|b| b.take());
    });

    view! {
        <div class="person-selector" node_ref=container_ref>
            <img
                node_ref=image_ref
                src=move || src.get()
                alt=""
                crossorigin="anonymous"
                style="display: none"
            />
            <canvas
                node_ref=canvas_ref
                class="person-selector-canvas"
                style="touch-action: none; cursor: pointer"
            ></canvas>
        </div>
    }
}
