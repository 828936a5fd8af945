//! Specification Resolution
//!
//! 規格ページを特定し、検査項目名ごとに基準値・公差・USL/LSLを解決するモジュール。

use crate::extractor::{parse_leading_number, read_raw_text, read_text};
use crate::result::SpecificationData;
use crate::schema::{
    SPEC_COLUMNS, SPEC_PAGE_CONTENT_KEYWORDS, SPEC_PAGE_NAME_KEYWORDS, SPEC_SCAN_ROWS,
};
use crate::types::{CellCoord, Page, WorkbookData};

/// 公差の符号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Plus,
    Minus,
    Symmetric,
    Other,
}

impl Sign {
    fn parse(text: &str) -> Self {
        match text.trim() {
            "+" | "＋" => Sign::Plus,
            "-" | "−" | "－" => Sign::Minus,
            "±" => Sign::Symmetric,
            _ => Sign::Other,
        }
    }
}

/// ワークブックから規格ページを選ぶ
///
/// 1. シート名に規格キーワードを含むページ
/// 2. A列の先頭100行に検査項目・規格キーワードを含むページ
/// 3. 先頭ページ
///
/// 読み込めなかったページは候補になりません。
pub fn find_specification_page(workbook: &WorkbookData) -> Option<&Page> {
    let pages = || workbook.pages.iter().filter_map(|slot| slot.loaded());

    pages()
        .find(|page| {
            let name = page.name.to_lowercase();
            SPEC_PAGE_NAME_KEYWORDS.iter().any(|k| name.contains(k))
        })
        .or_else(|| pages().find(|page| has_specification_content(page)))
        .or_else(|| workbook.pages.first().and_then(|slot| slot.loaded()))
}

/// 走査する最終行（0始まり、両端を含む）
fn scan_end(page: &Page) -> Option<u32> {
    page.last_row().map(|last| last.min(SPEC_SCAN_ROWS - 1))
}

fn has_specification_content(page: &Page) -> bool {
    let Some(end) = scan_end(page) else {
        return false;
    };
    (0..=end).any(|row| {
        let text = read_raw_text(page, CellCoord::new(row, 0)).to_lowercase();
        SPEC_PAGE_CONTENT_KEYWORDS.iter().any(|k| text.contains(k))
    })
}

fn strip_parens(text: &str) -> String {
    text.replace(['(', ')'], "").trim().to_string()
}

/// セルの文字列が検査項目名に該当するか
///
/// 完全一致・括弧除去後の一致・双方向の部分一致のいずれかで該当します。
/// 空のセルは該当しません。
pub fn matches_item_name(cell_text: &str, item_name: &str) -> bool {
    let cell_text = cell_text.trim();
    if cell_text.is_empty() {
        return false;
    }
    let cell_clean = strip_parens(cell_text);
    let item_clean = strip_parens(item_name);

    cell_text == item_name
        || (!cell_clean.is_empty() && cell_clean == item_clean)
        || cell_text.contains(item_name)
        || item_name.contains(cell_text)
}

/// 規格ページで検査項目の規格を解決する
///
/// A列の先頭100行を上から走査し、項目名に該当する行のうち
/// 規格行として有効な最初の行を採用します。見つからない場合は無効な規格を返します。
pub fn resolve_on_page(page: &Page, item_name: &str) -> SpecificationData {
    if item_name.trim().is_empty() {
        return SpecificationData::invalid();
    }
    let Some(end) = scan_end(page) else {
        return SpecificationData::invalid();
    };

    (0..=end)
        .filter(|row| matches_item_name(&read_text(page, CellCoord::new(*row, 0)), item_name))
        .find_map(|row| read_specification_row(page, row))
        .unwrap_or_else(SpecificationData::invalid)
}

/// ワークブックから検査項目の規格を解決する
pub fn resolve(workbook: &WorkbookData, item_name: &str) -> SpecificationData {
    let spec = match find_specification_page(workbook) {
        Some(page) => resolve_on_page(page, item_name),
        None => SpecificationData::invalid(),
    };

    if spec.is_valid {
        tracing::debug!(item = item_name, usl = spec.usl, lsl = spec.lsl, "specification resolved");
    } else {
        tracing::debug!(item = item_name, "specification not found");
    }
    spec
}

/// 基準値候補のセルを数値として読む
///
/// 型付きの数値を優先し、なければ表示文字列の先頭から数値を読み取ります。
fn nominal_candidate(page: &Page, coord: CellCoord) -> Option<f64> {
    let record = page.cell(coord)?;
    record
        .value
        .as_number()
        .or_else(|| parse_leading_number(&record.rendered_text()))
}

/// 公差の大きさ（絶対値、読めなければ0）
fn tolerance_magnitude(page: &Page, coord: CellCoord) -> f64 {
    page.cell(coord)
        .and_then(|record| {
            record
                .value
                .as_number()
                .or_else(|| parse_leading_number(&record.raw_text()))
        })
        .map(f64::abs)
        .unwrap_or(0.0)
}

/// 指定行（0始まり）を規格行として読む
///
/// 工具コードがない、または基準値が見つからない場合は`None`です。
pub fn read_specification_row(page: &Page, row: u32) -> Option<SpecificationData> {
    let cols = SPEC_COLUMNS;
    let at = |r: u32, c: u32| CellCoord::new(r, c);

    if read_raw_text(page, at(row, cols.tool)).is_empty() {
        return None;
    }
    let symbol = read_raw_text(page, at(row, cols.symbol));

    let nominal = [
        at(row, cols.nominal_primary),
        at(row, cols.nominal_secondary),
        at(row + 1, cols.nominal_primary),
        at(row + 1, cols.nominal_secondary),
    ]
    .into_iter()
    .find_map(|coord| nominal_candidate(page, coord))?;

    let upper_sign = page
        .cell(at(row, cols.tolerance_sign))
        .map_or(Sign::Plus, |c| Sign::parse(&c.raw_text()));
    let lower_sign = page
        .cell(at(row + 1, cols.tolerance_sign))
        .map_or(Sign::Minus, |c| Sign::parse(&c.raw_text()));
    let upper = tolerance_magnitude(page, at(row, cols.tolerance_value));
    let lower = tolerance_magnitude(page, at(row + 1, cols.tolerance_value));

    let (upper_offset, lower_offset) = tolerance_offsets(upper_sign, upper, lower_sign, lower);
    Some(build_specification(symbol, nominal, upper_offset, lower_offset))
}

/// 符号と大きさから上下の偏差を求める
///
/// 上限側が`±`なら上限の大きさで対称に、それ以外は各行の符号をそのまま適用します。
fn tolerance_offsets(upper_sign: Sign, upper: f64, lower_sign: Sign, lower: f64) -> (f64, f64) {
    if upper_sign == Sign::Symmetric {
        return (upper, -upper);
    }
    let upper_offset = if upper_sign == Sign::Minus { -upper } else { upper };
    let lower_offset = if lower_sign == Sign::Plus { lower } else { -lower };
    (upper_offset, lower_offset)
}

fn build_specification(
    symbol: String,
    nominal: f64,
    upper_offset: f64,
    lower_offset: f64,
) -> SpecificationData {
    let mut usl = nominal + upper_offset;
    let mut lsl = nominal + lower_offset;
    if usl < lsl {
        std::mem::swap(&mut usl, &mut lsl);
    }

    SpecificationData {
        symbol,
        nominal_value: nominal,
        upper_tolerance: upper_offset.abs(),
        lower_tolerance: lower_offset.abs(),
        usl,
        lsl,
        target: nominal,
        is_valid: true,
    }
}
