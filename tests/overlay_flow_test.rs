//! オーバーレイ結合テスト
//!
//! ラスタ描画で、描画・ヒットテスト・選択・スケジューラの連携を検証

use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::rc::Rc;
use tryon_overlay::common::{
    CanvasRenderer, CanvasSurface, ClientRect, Color, DetectionResult, DetectionState, DrawRequest, Error, ImageId,
    OverlayConfig, PersonBox, PointerSample, ReadinessValidator, RenderState, Viewport,
};
use tryon_overlay::{raster_overlay, RasterImage, RasterOverlay, RasterSurface};

fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
    })
}

fn overlay_with(src: &str, width: u32, height: u32) -> RasterOverlay {
    let mut overlay = raster_overlay(OverlayConfig::default()).expect("初期化失敗");
    overlay.set_image(Some(RasterImage::decoded(src, photo(width, height))));
    overlay
}

fn detection(overlay: &RasterOverlay, width: f64, height: f64, people: Vec<PersonBox>) -> DetectionResult {
    DetectionResult {
        image_id: overlay.image_id().cloned().expect("画像IDなし"),
        image_width: width,
        image_height: height,
        people,
    }
}

/// キャンバスが表示サイズのまま原点に置かれている場合の矩形
fn canvas_rect(overlay: &RasterOverlay) -> ClientRect {
    let (w, h) = overlay.surface().layout_size();
    ClientRect { left: 0.0, top: 0.0, width: w, height: h }
}

fn click(overlay: &mut RasterOverlay, x: f64, y: f64) -> Option<usize> {
    let rect = canvas_rect(overlay);
    overlay.pointer_down(PointerSample { client_x: x, client_y: y }, rect)
}

const SELECTED: [u8; 4] = [0x22, 0xc5, 0x5e, 255];

// =============================================
// ジオメトリ
// =============================================

/// 1200x1600 を 300x200 に収める例
#[test]
fn test_example_scale_and_clicks() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let det = detection(
        &overlay,
        1200.0,
        1600.0,
        vec![
            PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9),
            PersonBox::new(700.0, 900.0, 300.0, 500.0, 0.8),
        ],
    );
    assert!(overlay.set_detection(Ok(det)));
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");

    let frame = overlay.last_frame().expect("フレームなし");
    assert_eq!(frame.geometry.scale, 0.125);
    assert_eq!(frame.geometry.display_width, 150.0);
    assert_eq!(frame.geometry.display_height, 200.0);

    assert_eq!(click(&mut overlay, 30.0, 55.0), Some(0));
    assert_eq!(click(&mut overlay, 200.0, 10.0), None);
}

/// dpr=2 で表示幅150.4 → バッキング301px、実効DPRで補正
#[test]
fn test_effective_dpr_from_rounded_backing() {
    let mut overlay = overlay_with("photo-odd", 1504, 2000);
    overlay.redraw_now(Viewport::new(300.0, 200.0, 2.0)).expect("描画失敗");

    let frame = overlay.last_frame().expect("フレームなし");
    assert_eq!(frame.backing.pixel_width, 301);
    assert_eq!(frame.backing.pixel_height, 400);
    assert!((frame.backing.effective_dpr_x - 2.0013).abs() < 1e-4);
    assert_ne!(frame.backing.effective_dpr_x, 2.0);
    assert_eq!(overlay.surface().backing_size(), (301, 400));
}

/// 重ならない矩形の中心をクリックすると、その矩形が選ばれる
#[test]
fn test_center_click_round_trip() {
    let people = vec![
        PersonBox::new(40.0, 60.0, 300.0, 700.0, 0.9),
        PersonBox::new(420.0, 80.0, 260.0, 650.0, 0.9),
        PersonBox::new(760.0, 120.0, 380.0, 900.0, 0.9),
    ];
    for dpr in [1.0, 1.25, 2.0, 3.0] {
        for max in [(300.0, 180.0), (640.0, 200.0), (97.0, 200.0)] {
            let mut overlay = overlay_with("photo-1", 1203, 1597);
            let det = detection(&overlay, 1203.0, 1597.0, people.clone());
            overlay.set_detection(Ok(det));
            overlay.redraw_now(Viewport::new(max.0, max.1, dpr)).expect("描画失敗");

            let scale = overlay.last_frame().expect("フレームなし").geometry.scale;
            for (i, p) in people.iter().enumerate() {
                let (cx, cy) = p.scaled(scale).center();
                assert_eq!(click(&mut overlay, cx, cy), Some(i), "dpr={dpr} max={max:?}");
                overlay.redraw_now(Viewport::new(max.0, max.1, dpr)).expect("描画失敗");
            }
        }
    }
}

// =============================================
// 描画
// =============================================

/// 状態が変わらなければ同じ出力
#[test]
fn test_draw_is_idempotent() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let det = detection(
        &overlay,
        1200.0,
        1600.0,
        vec![
            PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9),
            PersonBox::new(600.0, 300.0, 300.0, 500.0, 0.9),
        ],
    );
    overlay.set_detection(Ok(det));
    let viewport = Viewport::new(300.0, 200.0, 2.0);

    overlay.redraw_now(viewport).expect("描画失敗");
    let first = overlay.surface().buffer().clone();
    overlay.redraw_now(viewport).expect("描画失敗");
    assert_eq!(overlay.surface().buffer(), &first);
}

/// 検出結果のIDが違えば、サイズが同じでも何も描かない
#[test]
fn test_identity_guard_is_noop() {
    let config = OverlayConfig::default();
    let mut renderer = CanvasRenderer::new(RasterSurface::new(), &config);
    let mut validator = ReadinessValidator::new(4);
    let image = RasterImage::decoded("photo-1", photo(1200, 1600));
    let id = validator.expected_identity(&image);
    let other = DetectionResult {
        image_id: ImageId::new("someone-else"),
        image_width: 1200.0,
        image_height: 1600.0,
        people: vec![PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9)],
    };

    let result = renderer.draw(
        &mut validator,
        &image,
        DrawRequest {
            expected_id: &id,
            detection: Some(&other),
            selected: None,
            viewport: Viewport::new(300.0, 200.0, 1.0),
        },
    );
    assert!(matches!(result, Err(Error::IdentityMismatch { .. })));
    assert_eq!(renderer.surface().backing_size(), (0, 0));
    assert_ne!(renderer.state(), RenderState::Drawn);
}

/// 選択中の枠は他の枠より上に描かれる
#[test]
fn test_selected_outline_on_top() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let det = detection(
        &overlay,
        1200.0,
        1600.0,
        vec![
            PersonBox::new(0.0, 0.0, 800.0, 800.0, 0.9),
            PersonBox::new(400.0, 400.0, 800.0, 800.0, 0.9),
        ],
    );
    overlay.set_detection(Ok(det));
    let viewport = Viewport::new(300.0, 200.0, 1.0);
    overlay.redraw_now(viewport).expect("描画失敗");

    // 1番の左辺と0番の下辺の交点
    assert_ne!(overlay.surface().pixel(50, 100), Some(SELECTED));

    assert_eq!(click(&mut overlay, 20.0, 20.0), Some(0));
    overlay.redraw_now(viewport).expect("描画失敗");
    assert_eq!(overlay.surface().pixel(50, 100), Some(SELECTED));
}

/// 画像外にはみ出た矩形も描画される（ログのみ）
#[test]
fn test_out_of_bounds_box_still_drawn() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let det = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(-80.0, 800.0, 400.0, 1200.0, 0.9)]);
    overlay.set_detection(Ok(det));
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");

    // 自動選択された1人の上辺（y=100）が描かれている
    assert_eq!(overlay.surface().pixel(20, 100), Some(SELECTED));
    // 外部に渡す矩形はクランプ済み
    assert_eq!(overlay.selected_box(), Some(PersonBox::new(0.0, 800.0, 320.0, 800.0, 0.9)));
}

/// 検出失敗時は写真だけを表示
#[test]
fn test_detector_failure_shows_plain_photo() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    overlay.set_detection(Err(Error::Detector("503".into())));
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");

    assert!(overlay.is_ready());
    assert_eq!(overlay.detection(), &DetectionState::Failed("503".into()));
    let buffer = overlay.surface().buffer();
    assert!(buffer.pixels().all(|p| p.0[3] == 255 && p.0[2] == 90));
}

/// コンテナが変わると新しいジオメトリで描き直す
#[test]
fn test_resize_recomputes_geometry() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    assert_eq!(overlay.on_frame(Viewport::new(300.0, 200.0, 1.0)), Some(Ok(())));
    assert_eq!(overlay.surface().backing_size(), (150, 200));

    overlay.resized();
    // 描画済みの判定はリサイズで戻らない
    assert!(overlay.is_ready());
    assert_eq!(overlay.on_frame(Viewport::new(90.0, 180.0, 1.0)), Some(Ok(())));
    assert_eq!(overlay.surface().backing_size(), (90, 120));
}

/// 幅0のコンテナでは描画しない
#[test]
fn test_zero_container_skips_draw() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let result = overlay.redraw_now(Viewport::new(0.0, 200.0, 1.0));
    assert!(matches!(result, Err(Error::EmptyContainer { .. })));
    assert!(!overlay.is_ready());
    assert_eq!(overlay.surface().backing_size(), (0, 0));
}

// =============================================
// 選択
// =============================================

/// 1人だけなら操作なしで選択される
#[test]
fn test_single_person_auto_selected() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let sink = Rc::clone(&received);
    overlay.on_selection_change(Box::new(move |b| sink.borrow_mut().push(b)));

    let det = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9)]);
    overlay.set_detection(Ok(det));

    assert_eq!(overlay.selection().index, Some(0));
    assert_eq!(*received.borrow(), vec![Some(PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9))]);
}

/// 画像が変わったら、人数が同じでも選択をリセット
#[test]
fn test_selection_reset_on_photo_change() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let sink = Rc::clone(&received);
    overlay.on_selection_change(Box::new(move |b| sink.borrow_mut().push(b)));

    let people = vec![
        PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9),
        PersonBox::new(700.0, 200.0, 300.0, 500.0, 0.9),
    ];
    let det = detection(&overlay, 1200.0, 1600.0, people.clone());
    overlay.set_detection(Ok(det));
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");
    assert_eq!(click(&mut overlay, 30.0, 55.0), Some(0));
    assert_eq!(overlay.selection().index, Some(0));

    overlay.set_image(Some(RasterImage::decoded("photo-2", photo(1200, 1600))));
    assert!(overlay.selection().is_none());

    let det = detection(&overlay, 1200.0, 1600.0, people);
    overlay.set_detection(Ok(det));
    assert!(overlay.selection().is_none());
    assert_eq!(received.borrow().last(), Some(&None));
}

/// 前の写真の検出結果は到着時に捨てる
#[test]
fn test_late_detection_for_previous_photo_discarded() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let stale = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(0.0, 0.0, 100.0, 100.0, 0.9)]);

    overlay.set_image(Some(RasterImage::decoded("photo-2", photo(1200, 1600))));
    assert!(!overlay.set_detection(Ok(stale)));
    assert!(overlay.detection().result().is_none());

    let fresh = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(0.0, 0.0, 100.0, 100.0, 0.9)]);
    assert!(overlay.set_detection(Ok(fresh)));
    assert_eq!(overlay.selection().index, Some(0));
}

/// デコード済みの画像とサイズが合わない結果は選択にも使わない
#[test]
fn test_mismatched_detection_never_selects() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let sink = Rc::clone(&received);
    overlay.on_selection_change(Box::new(move |b| sink.borrow_mut().push(b)));

    let det = detection(&overlay, 600.0, 800.0, vec![PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9)]);
    assert!(!overlay.set_detection(Ok(det)));
    assert_eq!(overlay.selected_box(), None);
    assert!(received.borrow().is_empty());

    // 写真だけは描ける
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");
    assert!(overlay.is_ready());
    assert!(overlay.last_frame().is_some_and(|f| f.detection_id.is_none()));
}

/// デコード前に届いた結果は、load 後にサイズが合わなければ選択ごと取り消す
#[test]
fn test_mismatched_detection_cleared_after_decode() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let mut overlay = raster_overlay(OverlayConfig::default()).expect("初期化失敗");
    overlay.set_image(Some(RasterImage::loading("photo-1")));
    let sink = Rc::clone(&received);
    overlay.on_selection_change(Box::new(move |b| sink.borrow_mut().push(b)));

    let det = detection(&overlay, 600.0, 800.0, vec![PersonBox::new(100.0, 200.0, 300.0, 500.0, 0.9)]);
    assert!(overlay.set_detection(Ok(det)));
    assert_eq!(overlay.selection().index, Some(0));

    if let Some(image) = overlay.image_mut() {
        image.finish_loading(photo(1200, 1600));
    }
    overlay.image_loaded();
    assert_eq!(overlay.selected_box(), None);
    assert_eq!(received.borrow().last(), Some(&None));
    assert!(overlay.detection().result().is_none());

    assert_eq!(overlay.on_frame(Viewport::new(300.0, 200.0, 1.0)), Some(Ok(())));
    assert_eq!(click(&mut overlay, 30.0, 55.0), None);
}

// =============================================
// 読み込みと競合
// =============================================

/// デコード前は描かず、load後のフレームで描く
#[test]
fn test_draw_waits_for_decode() {
    let mut overlay = raster_overlay(OverlayConfig::default()).expect("初期化失敗");
    overlay.set_image(Some(RasterImage::loading("photo-1")));
    let viewport = Viewport::new(300.0, 200.0, 1.0);

    assert!(matches!(overlay.on_frame(viewport), Some(Err(Error::ImageNotReady { .. }))));
    assert!(overlay.last_frame().is_none());
    assert_eq!(overlay.surface().backing_size(), (0, 0));

    if let Some(image) = overlay.image_mut() {
        image.finish_loading(photo(1200, 1600));
    }
    overlay.image_loaded();
    assert_eq!(overlay.on_frame(viewport), Some(Ok(())));
    assert!(overlay.is_ready());
}

/// src だけ差し替わりデコードが終わっていない間は、描画もヒットテストもしない
#[test]
fn test_src_swap_before_reload() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    let det = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(0.0, 0.0, 1200.0, 1600.0, 0.9)]);
    overlay.set_detection(Ok(det));
    let viewport = Viewport::new(300.0, 200.0, 1.0);
    overlay.redraw_now(viewport).expect("描画失敗");
    assert_eq!(overlay.selection().index, Some(0));

    if let Some(image) = overlay.image_mut() {
        image.swap_source("photo-2");
    }
    assert_eq!(click(&mut overlay, 10.0, 10.0), None);
    assert!(overlay.selection().is_none());
    assert!(matches!(overlay.redraw_now(viewport), Err(Error::ImageNotReady { .. })));
    assert!(overlay.last_frame().is_none());
}

/// 同じ呼び出しでバーストしたトリガーは1フレームにまとまる
#[test]
fn test_triggers_coalesced() {
    let mut overlay = overlay_with("photo-1", 1200, 1600);
    overlay.resized();
    overlay.force_redraw();
    let det = detection(&overlay, 1200.0, 1600.0, vec![]);
    overlay.set_detection(Ok(det));
    assert_eq!(overlay.scheduler().requester().requested, 1);

    let viewport = Viewport::new(300.0, 200.0, 1.0);
    assert_eq!(overlay.on_frame(viewport), Some(Ok(())));
    assert_eq!(overlay.on_frame(viewport), None);
}

/// 色設定が描画に反映される
#[test]
fn test_custom_style() {
    let config = OverlayConfig::from_json_str(
        r##"{"style": {"selectedStroke": "#ff00ff", "selectedFill": null}}"##,
    )
    .expect("設定読み込み失敗");
    let mut overlay = raster_overlay(config).expect("初期化失敗");
    overlay.set_image(Some(RasterImage::decoded("photo-1", photo(1200, 1600))));
    let det = detection(&overlay, 1200.0, 1600.0, vec![PersonBox::new(0.0, 800.0, 400.0, 400.0, 0.9)]);
    overlay.set_detection(Ok(det));
    overlay.redraw_now(Viewport::new(300.0, 200.0, 1.0)).expect("描画失敗");

    assert_eq!(overlay.surface().pixel(20, 100), Some(Color([255, 0, 255, 255]).0));
    // 塗りなし: 枠の内側は写真のまま
    assert_eq!(overlay.surface().pixel(25, 125).map(|p| p[2]), Some(90));
}
