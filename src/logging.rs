use tracing_subscriber::EnvFilter;

/// ログ初期化
///
/// `debug` が false なら `RUST_LOG` に関係なく `info` に固定する。
/// true の場合は `RUST_LOG` で上書きできる。
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// テスト用: 二重初期化しても失敗しない
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
