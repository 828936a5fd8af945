//! Page Layout Schema
//!
//! データページの想定レイアウト（見出し・除外シート名・規格行の列位置）を表す定数と判定関数。

use crate::types::Page;

/// データページのA1セルに必要な見出し
pub const BATCH_NUMBER_HEADER: &str = "生產批號";

/// 抽出対象から除外する予約シート名
///
/// エラー記録・パラメータ設定・設定履歴・グラフ生成エラー記録のシートです。
pub const EXCLUDED_PAGES: [&str; 4] = ["處理異常紀錄", "參數配置", "配置歷史", "圖表生成異常紀錄"];

/// 規格ページのシート名キーワード（大文字・小文字を区別しない）
pub const SPEC_PAGE_NAME_KEYWORDS: [&str; 5] = ["規格", "spec", "specification", "檢驗標準", "檢驗規格"];

/// 規格ページの内容キーワード
pub const SPEC_PAGE_CONTENT_KEYWORDS: [&str; 4] = ["檢驗項目", "inspection", "規格", "spec"];

/// 規格ページで走査する最大行数
pub const SPEC_SCAN_ROWS: u32 = 100;

/// 規格ページ1行分の列位置（0始まり）
///
/// 公差の符号・大きさは、上限が同じ行、下限が次の行の同じ列にあります。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecColumns {
    /// 工具コード（C列）
    pub tool: u32,
    /// 記号（D列）
    pub symbol: u32,
    /// 基準値の第1候補（E列）
    pub nominal_primary: u32,
    /// 基準値の第2候補（F列）
    pub nominal_secondary: u32,
    /// 公差の符号（G列）
    pub tolerance_sign: u32,
    /// 公差の大きさ（H列）
    pub tolerance_value: u32,
}

/// 規格ページの列位置
pub const SPEC_COLUMNS: SpecColumns = SpecColumns {
    tool: 2,
    symbol: 3,
    nominal_primary: 4,
    nominal_secondary: 5,
    tolerance_sign: 6,
    tolerance_value: 7,
};

/// シート名が予約シートかどうか
pub fn is_excluded_page(name: &str) -> bool {
    EXCLUDED_PAGES.contains(&name)
}

/// ページがデータページとして抽出対象になるかを判定する
///
/// 次のすべてを満たす場合に対象となります。
///
/// 1. シート名が予約シートではない
/// 2. A1の表示文字列が [`BATCH_NUMBER_HEADER`] と一致する
/// 3. A2が空ではない
/// 4. B1またはB2の少なくとも一方が空ではない
pub fn is_eligible_page(name: &str, page: &Page) -> bool {
    if is_excluded_page(name) {
        return false;
    }

    let text = |row: u32, col: u32| {
        page.cell_at(row, col)
            .map(|c| c.rendered_text())
            .unwrap_or_default()
    };

    text(0, 0) == BATCH_NUMBER_HEADER
        && !text(1, 0).is_empty()
        && (!text(0, 1).is_empty() || !text(1, 1).is_empty())
}
