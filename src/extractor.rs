//! Cell Content Extraction
//!
//! ページからセル値（数値・文字列・表示文字列）を取り出すモジュール。
//! 穴組1つ分の検査項目抽出と、製品情報の抽出もここで行います。

use crate::config::ResolvedGroup;
use crate::result::{CavityValues, ProductInfo};
use crate::types::{CellCoord, CellValue, Page, WorkbookData};

/// 製品名の固定セル（P2）
const PRODUCT_NAME_CELL: CellCoord = CellCoord { row: 1, col: 15 };

/// 製品名の予備セル（P3）
const PRODUCT_NAME_FALLBACK_CELL: CellCoord = CellCoord { row: 2, col: 15 };

/// 製品名を走査する矩形（P2:V3）
const PRODUCT_NAME_SCAN_ROWS: std::ops::RangeInclusive<u32> = 1..=2;
const PRODUCT_NAME_SCAN_COLS: std::ops::RangeInclusive<u32> = 15..=21;

/// 測定単位のセル（W23）
const MEASUREMENT_UNIT_CELL: CellCoord = CellCoord { row: 22, col: 22 };

/// 測定単位の接頭辞
const UNIT_PREFIXES: [&str; 2] = ["單位:", "單位："];

/// 数字・小数点・先頭の負号以外の文字を取り除く
///
/// 数字の後に現れた負号で読み取りを終えます（"10-12" → "10"）。
///
/// ```rust
/// use qipextract::extractor::strip_non_numeric;
///
/// assert_eq!(strip_non_numeric(" 12.5 mm"), "12.5");
/// assert_eq!(strip_non_numeric("-0.03"), "-0.03");
/// assert_eq!(strip_non_numeric("No.3"), ".3");
/// assert_eq!(strip_non_numeric("5.0-5.2"), "5.0");
/// ```
pub fn strip_non_numeric(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '0'..='9' | '.' => out.push(c),
            '-' if out.is_empty() => out.push(c),
            '-' => break,
            _ => {}
        }
    }
    out
}

/// 文字列全体が有限の数値として解釈できる場合に数値を返す
///
/// 括弧などの記号を含む文字列（例: "(1)"）は数値とみなしません。
pub fn try_parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 検査項目名として扱える文字列か
///
/// 空ではなく、"0"でもなく、数値として解釈できない文字列が該当します。
pub fn looks_like_label(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text != "0" && try_parse_number(text).is_none()
}

/// 先頭から読み取れる最長の数値を返す（"10mm" → 10）
pub(crate) fn parse_leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    let mut best = None;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
                best = Some(end);
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }

    // 指数部（"1.5e3"）
    if let Some(b'e') | Some(b'E') = bytes.get(end) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while matches!(bytes.get(exp_end), Some(b'0'..=b'9')) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            best = Some(exp_end);
        }
    }

    best.and_then(|end| text[..end].parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// 数値としてセルを読む
///
/// 型付きの数値を優先し、そうでなければ表示文字列から数値以外の文字を取り除いて解釈します。
/// 空・エラー値・解釈不能の場合は`None`を返します（エラーにはなりません）。
pub fn read_numeric(page: &Page, coord: CellCoord) -> Option<f64> {
    let record = page.cell(coord)?;
    if let CellValue::Error(_) = record.value {
        return None;
    }
    if let Some(n) = record.value.as_number() {
        return Some(n);
    }
    parse_leading_number(&strip_non_numeric(&record.rendered_text()))
}

/// 文字列としてセルを読む（表示文字列を優先）
pub fn read_text(page: &Page, coord: CellCoord) -> String {
    page.cell(coord)
        .map(|record| record.rendered_text())
        .unwrap_or_default()
}

/// 生の値を文字列としてセルを読む
pub fn read_raw_text(page: &Page, coord: CellCoord) -> String {
    page.cell(coord)
        .map(|record| record.raw_text())
        .unwrap_or_default()
}

/// 穴番号ラベルから穴番号を取り出す
///
/// 最初に現れる数字の並びを穴番号とし、数字がなければラベル全体を使います。
/// 空のラベルは`None`です。
pub fn cavity_id_from_label(label: &str) -> Option<String> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some(if digits.is_empty() {
        label.to_string()
    } else {
        digits
    })
}

/// 行の左側から検査項目名を探す
fn find_item_name(page: &Page, row: u32, before_col: u32) -> Option<String> {
    (0..before_col)
        .map(|col| read_text(page, CellCoord::new(row, col)))
        .find(|text| looks_like_label(text))
}

/// 穴組1つ分の検査項目を対象ページから抽出する
///
/// データ範囲の各行を1つの検査項目候補とし、項目名と1つ以上の有効な測定値を
/// 持つ行だけを、行順の (項目名, 測定値) の組として返します。
pub fn extract_group_items(page: &Page, group: &ResolvedGroup) -> Vec<(String, CavityValues)> {
    let id_row = group.cavity_ids.start_row - 1;
    let cavities: Vec<(u32, String)> = (group.cavity_ids.start_col - 1..group.cavity_ids.end_col)
        .filter_map(|col| {
            cavity_id_from_label(&read_raw_text(page, CellCoord::new(id_row, col)))
                .map(|id| (col, id))
        })
        .collect();

    let mut items = Vec::new();
    for row in group.data.start_row - 1..group.data.end_row {
        let Some(name) = find_item_name(page, row, group.data.start_col - 1) else {
            continue;
        };

        let mut values = CavityValues::new();
        for (col, cavity_id) in &cavities {
            if let Some(value) = read_numeric(page, CellCoord::new(row, *col)) {
                values.insert(cavity_id.clone(), value);
            }
        }

        if !values.is_empty() {
            items.push((name, values));
        }
    }
    items
}

/// Excelで偽とみなされない値の文字列
fn truthy_text(page: &Page, coord: CellCoord) -> Option<String> {
    let record = page.cell(coord)?;
    match record.value {
        CellValue::Empty | CellValue::Bool(false) => None,
        CellValue::Number(n) if n == 0.0 => None,
        _ => Some(record.raw_text()).filter(|text| !text.is_empty()),
    }
}

fn product_name_on(page: &Page) -> Option<String> {
    truthy_text(page, PRODUCT_NAME_CELL)
        .or_else(|| truthy_text(page, PRODUCT_NAME_FALLBACK_CELL))
        .or_else(|| {
            PRODUCT_NAME_SCAN_ROWS
                .flat_map(|row| PRODUCT_NAME_SCAN_COLS.map(move |col| CellCoord::new(row, col)))
                .filter_map(|coord| truthy_text(page, coord))
                .find(|text| text != "0" && text != "False")
        })
}

fn measurement_unit_on(page: &Page) -> Option<String> {
    let mut unit = truthy_text(page, MEASUREMENT_UNIT_CELL)?;
    for prefix in UNIT_PREFIXES {
        unit = unit.replace(prefix, "");
    }
    Some(unit.trim().to_string())
}

/// ワークブックから製品情報を抽出する
///
/// ページ順に走査し、製品名と測定単位の両方が見つかった時点で終了します。
/// 読み込めなかったページは飛ばします。
pub fn extract_product_info(workbook: &WorkbookData) -> ProductInfo {
    let mut info = ProductInfo::default();

    for page in workbook.pages.iter().filter_map(|slot| slot.loaded()) {
        if info.product_name.is_empty() {
            info.product_name = product_name_on(page).unwrap_or_default();
        }
        if info.measurement_unit.is_empty() {
            info.measurement_unit = measurement_unit_on(page).unwrap_or_default();
        }
        if !info.product_name.is_empty() && !info.measurement_unit.is_empty() {
            break;
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;
    use crate::types::{CellRecord, PageSlot};

    fn group(id_range: &str, data_range: &str) -> ResolvedGroup {
        GroupConfig::new(id_range, data_range).resolve(1).unwrap()
    }

    fn page_with(cells: &[(&str, CellRecord)]) -> Page {
        let mut page = Page::new("Batch1");
        for (address, record) in cells {
            page.set(address, record.clone()).unwrap();
        }
        page
    }

    #[test]
    fn test_strip_non_numeric_keeps_leading_minus_only() {
        assert_eq!(strip_non_numeric("1-2"), "1");
        assert_eq!(strip_non_numeric("10-12"), "10");
        assert_eq!(strip_non_numeric("-5-3"), "-5");
        assert_eq!(strip_non_numeric("abc"), "");
        assert_eq!(strip_non_numeric("−5"), "5");
        assert_eq!(strip_non_numeric("x-5"), "-5");
    }

    #[test]
    fn test_try_parse_number() {
        assert_eq!(try_parse_number(" 1.5 "), Some(1.5));
        assert_eq!(try_parse_number("1e3"), Some(1000.0));
        assert_eq!(try_parse_number("(1)"), None);
        assert_eq!(try_parse_number("inf"), None);
        assert_eq!(try_parse_number("NaN"), None);
        assert_eq!(try_parse_number(""), None);
    }

    #[test]
    fn test_looks_like_label() {
        assert!(looks_like_label("(1)"));
        assert!(looks_like_label("外徑 Φ10"));
        assert!(!looks_like_label("0"));
        assert!(!looks_like_label("12.5"));
        assert!(!looks_like_label("   "));
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("10mm"), Some(10.0));
        assert_eq!(parse_leading_number("1.2.3"), Some(1.2));
        assert_eq!(parse_leading_number("-.5"), Some(-0.5));
        assert_eq!(parse_leading_number("2e"), Some(2.0));
        assert_eq!(parse_leading_number("2e-1x"), Some(0.2));
        assert_eq!(parse_leading_number("-"), None);
        assert_eq!(parse_leading_number("."), None);
        assert_eq!(parse_leading_number("J"), None);
    }

    #[test]
    fn test_read_numeric() {
        let page = page_with(&[
            ("A1", CellRecord::number(3.25).with_text("3.3")),
            ("A2", CellRecord::string("12.5mm")),
            ("A3", CellRecord::string("n/a")),
            ("A4", CellRecord::string("-0.02")),
        ]);
        assert_eq!(read_numeric(&page, CellCoord::new(0, 0)), Some(3.25));
        assert_eq!(read_numeric(&page, CellCoord::new(1, 0)), Some(12.5));
        assert_eq!(read_numeric(&page, CellCoord::new(2, 0)), None);
        assert_eq!(read_numeric(&page, CellCoord::new(3, 0)), Some(-0.02));
        assert_eq!(read_numeric(&page, CellCoord::new(9, 9)), None);
    }

    #[test]
    fn test_read_text_prefers_rendered() {
        let page = page_with(&[("A1", CellRecord::number(1.0).with_text("(1)"))]);
        assert_eq!(read_text(&page, CellCoord::new(0, 0)), "(1)");
        assert_eq!(read_raw_text(&page, CellCoord::new(0, 0)), "1");
        assert_eq!(read_text(&page, CellCoord::new(5, 5)), "");
    }

    #[test]
    fn test_cavity_id_from_label() {
        assert_eq!(cavity_id_from_label("1號穴"), Some("1".to_string()));
        assert_eq!(cavity_id_from_label("cavity no. 3"), Some("3".to_string()));
        assert_eq!(cavity_id_from_label("#12-A"), Some("12".to_string()));
        assert_eq!(cavity_id_from_label("A"), Some("A".to_string()));
        assert_eq!(cavity_id_from_label("  "), None);
    }

    #[test]
    fn test_extract_group_scenario_a() {
        let page = page_with(&[
            ("A2", CellRecord::string("外徑")),
            ("B1", CellRecord::string("1號穴")),
            ("C1", CellRecord::string("2號穴")),
            ("D1", CellRecord::string("3號穴")),
            ("B2", CellRecord::string("1.0")),
            ("C2", CellRecord::string("2.0")),
            ("D2", CellRecord::string("x")),
        ]);
        let items = extract_group_items(&page, &group("B1:D1", "B2:D2"));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "外徑");
        let expected: CavityValues = [("1".to_string(), 1.0), ("2".to_string(), 2.0)]
            .into_iter()
            .collect();
        assert_eq!(items[0].1, expected);
    }

    #[test]
    fn test_extract_group_ranged_text_and_error_cells() {
        let page = page_with(&[
            ("A2", CellRecord::string("外徑")),
            ("B1", CellRecord::string("1")),
            ("C1", CellRecord::string("2")),
            ("D1", CellRecord::string("3")),
            ("B2", CellRecord::string("10-12")),
            ("C2", CellRecord::string("5.0-5.2")),
            ("D2", CellRecord::new(CellValue::Error("#DIV/0!".to_string()))),
        ]);
        let items = extract_group_items(&page, &group("B1:D1", "B2:D2"));

        let expected: CavityValues = [("1".to_string(), 10.0), ("2".to_string(), 5.0)]
            .into_iter()
            .collect();
        assert_eq!(items, vec![("外徑".to_string(), expected)]);
    }

    #[test]
    fn test_item_name_skips_numeric_leftovers() {
        // B列の数値 5 は項目名にならず、C列の "(2)" が項目名になる
        let page = page_with(&[
            ("A3", CellRecord::string("0")),
            ("B3", CellRecord::number(5.0)),
            ("C3", CellRecord::number(2.0).with_text("(2)")),
            ("D1", CellRecord::number(1.0)),
            ("D3", CellRecord::number(9.5)),
        ]);
        let items = extract_group_items(&page, &group("D1", "D3"));
        assert_eq!(items, vec![("(2)".to_string(), [("1".to_string(), 9.5)].into_iter().collect())]);
    }

    #[test]
    fn test_rows_without_name_or_values_are_dropped() {
        let page = page_with(&[
            ("B1", CellRecord::string("1")),
            // 2行目: 項目名なし
            ("B2", CellRecord::number(1.0)),
            // 3行目: 値なし
            ("A3", CellRecord::string("長度")),
            ("B3", CellRecord::string("-")),
        ]);
        let items = extract_group_items(&page, &group("B1", "B2:B3"));
        assert!(items.is_empty());
    }

    #[test]
    fn test_product_info() {
        let first = page_with(&[
            ("P2", CellRecord::new(CellValue::Bool(false))),
            ("Q3", CellRecord::string("False")),
            ("R3", CellRecord::string("QX-100 外殼")),
        ]);
        let mut second = Page::new("Batch2");
        second.set("W23", CellRecord::string("單位：mm")).unwrap();

        let workbook = WorkbookData::new("a.xlsx")
            .with_page(PageSlot::Unavailable {
                name: "broken".to_string(),
                message: "x".to_string(),
            })
            .with_page(first)
            .with_page(second);

        let info = extract_product_info(&workbook);
        assert_eq!(info.product_name, "QX-100 外殼");
        assert_eq!(info.measurement_unit, "mm");
    }

    #[test]
    fn test_product_name_fallback_cell() {
        let page = page_with(&[
            ("P2", CellRecord::number(0.0)),
            ("P3", CellRecord::string("Housing")),
            ("W23", CellRecord::string("單位:μm")),
        ]);
        let info = extract_product_info(&WorkbookData::new("a.xlsx").with_page(page));
        assert_eq!(info.product_name, "Housing");
        assert_eq!(info.measurement_unit, "μm");
    }

    #[test]
    fn test_product_name_scan_rejects_only_exact_false() {
        let page = page_with(&[
            ("Q2", CellRecord::string("False")),
            ("R2", CellRecord::string("false")),
        ]);
        let info = extract_product_info(&WorkbookData::new("a.xlsx").with_page(page));
        assert_eq!(info.product_name, "false");
    }
}
