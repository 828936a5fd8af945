//! Logging
//!
//! `tracing-subscriber`によるログ出力の初期化。
//! 出力先は標準エラーで、標準出力は抽出結果のために空けておきます。

use tracing_subscriber::{fmt, EnvFilter};

/// ログの既定レベル
pub const DEFAULT_LEVEL: &str = "info";

/// ログ出力を初期化する
///
/// `RUST_LOG`が設定されていればそれを優先し、なければ`default_level`を使います。
/// すでに初期化済みの場合は何もしません。
///
/// # 引数
///
/// * `default_level` - `RUST_LOG`未設定時のフィルター（例: `"info"`, `"qipextract=debug"`）
///
/// # 使用例
///
/// ```no_run
/// qipextract::logging::init(qipextract::logging::DEFAULT_LEVEL);
/// ```
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// テスト用の初期化（debugレベル、テストハーネスの出力に書き込む）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
