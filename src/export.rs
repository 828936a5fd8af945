//! Export View
//!
//! 実行結果を検査項目ごとのシート表現（ヘッダー行・規格行・バッチ行）に変換し、
//! Markdownテーブルとして出力します。ファイルの書き出しは行いません。

use std::cmp::Ordering;
use std::io::Write;

use serde::ser::SerializeSeq;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::error::QipExtractError;
use crate::format::{render_general, render_number};
use crate::result::{InspectionItemAggregate, ProductInfo, RunResult};

/// シート名の最大文字数
pub const MAX_SHEET_NAME_CHARS: usize = 31;

/// 名前が空になった場合のシート名
pub const UNNAMED_SHEET: &str = "未命名項目";

/// 規格が未検出の場合に規格行へ入る表示
pub const UNSET_MARKER: &str = "未設定";

/// 先頭4列のヘッダー
const FIXED_HEADER: [&str; 4] = ["生產批號", "Target", "USL", "LSL"];

/// 規格値の表示形式
const LIMIT_FORMAT: &str = "0.0000";

/// 製品情報を書き込む行（0始まり）
const PRODUCT_INFO_ROW: usize = 4;

/// 規格行（Target, USL, LSL）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecRow {
    Limits { target: f64, usl: f64, lsl: f64 },
    Unset,
}

impl SpecRow {
    fn from_item(item: &InspectionItemAggregate) -> Self {
        match &item.specification {
            Some(spec) if spec.is_valid => SpecRow::Limits {
                target: spec.target,
                usl: spec.usl,
                lsl: spec.lsl,
            },
            _ => SpecRow::Unset,
        }
    }

    /// 表示用の3セル
    pub fn display_cells(&self) -> [String; 3] {
        match self {
            SpecRow::Limits { target, usl, lsl } => [
                render_number(*target, LIMIT_FORMAT, false),
                render_number(*usl, LIMIT_FORMAT, false),
                render_number(*lsl, LIMIT_FORMAT, false),
            ],
            SpecRow::Unset => std::array::from_fn(|_| UNSET_MARKER.to_string()),
        }
    }
}

impl Serialize for SpecRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        match self {
            SpecRow::Limits { target, usl, lsl } => {
                seq.serialize_element(target)?;
                seq.serialize_element(usl)?;
                seq.serialize_element(lsl)?;
            }
            SpecRow::Unset => {
                for _ in 0..3 {
                    seq.serialize_element(UNSET_MARKER)?;
                }
            }
        }
        seq.end()
    }
}

/// 1バッチ分の行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRow {
    pub batch_name: String,

    /// ヘッダーの穴番号順の測定値（未測定は`None`）
    pub values: Vec<Option<f64>>,
}

/// 1検査項目分のシート表現
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSheet {
    pub sheet_name: String,
    pub header: Vec<String>,
    pub spec_row: SpecRow,
    pub rows: Vec<BatchRow>,
    pub product_info: ProductInfo,
}

impl ExportSheet {
    /// 検査項目の集計からシート表現を構築する
    pub fn from_item(item_name: &str, item: &InspectionItemAggregate, product_info: &ProductInfo) -> Self {
        let cavities = sorted_cavities(item);

        let mut header: Vec<String> = FIXED_HEADER.iter().map(|h| h.to_string()).collect();
        header.extend(cavities.iter().map(|id| format!("{}號穴", id)));

        let rows = item
            .batches
            .iter()
            .map(|(batch_name, values)| BatchRow {
                batch_name: batch_name.clone(),
                values: cavities.iter().map(|id| values.get(*id).copied()).collect(),
            })
            .collect();

        Self {
            sheet_name: sanitize_sheet_name(item_name),
            header,
            spec_row: SpecRow::from_item(item),
            rows,
            product_info: product_info.clone(),
        }
    }

    /// 穴番号の列数
    pub fn cavity_count(&self) -> usize {
        self.header.len() - FIXED_HEADER.len()
    }

    /// 表示文字列の2次元配列
    ///
    /// 1行目がヘッダー、2行目が規格行、3行目以降がバッチ行です。
    /// 製品情報は5行目・6行目のB列とC列に重ねて配置されます。
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        let width = self.header.len();
        let mut rows = Vec::with_capacity(self.rows.len() + 2);
        rows.push(self.header.clone());

        let mut spec = vec![String::new(); width];
        for (cell, text) in spec[1..4].iter_mut().zip(self.spec_row.display_cells()) {
            *cell = text;
        }
        rows.push(spec);

        for batch in &self.rows {
            let mut row = vec![String::new(); width];
            row[0] = batch.batch_name.clone();
            for (cell, value) in row[FIXED_HEADER.len()..].iter_mut().zip(&batch.values) {
                if let Some(v) = value {
                    *cell = render_general(*v);
                }
            }
            rows.push(row);
        }

        while rows.len() < PRODUCT_INFO_ROW + 2 {
            rows.push(vec![String::new(); width]);
        }
        rows[PRODUCT_INFO_ROW][1] = "ProductName".to_string();
        rows[PRODUCT_INFO_ROW][2] = "MeasurementUnit".to_string();
        rows[PRODUCT_INFO_ROW + 1][1] = self.product_info.product_name.clone();
        rows[PRODUCT_INFO_ROW + 1][2] = self.product_info.measurement_unit.clone();

        rows
    }

    /// Markdownテーブルとして出力
    ///
    /// 列幅は表示幅（全角文字は2）で揃え、最小幅は3です。
    ///
    /// # 引数
    ///
    /// * `writer` - 出力先のライター
    pub fn render_markdown<W: Write>(&self, writer: &mut W) -> Result<(), QipExtractError> {
        let rows = self.display_rows();
        let widths = column_widths(&rows);

        for (index, row) in rows.iter().enumerate() {
            write!(writer, "|")?;
            for (cell, width) in row.iter().zip(&widths) {
                let padding = width.saturating_sub(cell.width());
                write!(writer, " {}{} |", cell, " ".repeat(padding))?;
            }
            writeln!(writer)?;

            if index == 0 {
                let separator: String = widths.iter().map(|w| format!("{}|", "-".repeat(w + 2))).collect();
                writeln!(writer, "|{}", separator)?;
            }
        }

        Ok(())
    }
}

impl RunResult {
    /// 検査項目ごとのシート表現（発見順）
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use qipextract::{CavityValues, RunResult};
    ///
    /// let mut result = RunResult::default();
    /// let values: CavityValues = [("2".to_string(), 5.01), ("1".to_string(), 5.02)].into_iter().collect();
    /// result.add_values("外徑", "Lot1", &values);
    ///
    /// let sheets = result.export_sheets();
    /// assert_eq!(sheets[0].header, vec!["生產批號", "Target", "USL", "LSL", "1號穴", "2號穴"]);
    /// assert_eq!(sheets[0].rows[0].values, vec![Some(5.02), Some(5.01)]);
    /// ```
    pub fn export_sheets(&self) -> Vec<ExportSheet> {
        self.inspection_items
            .iter()
            .map(|(name, item)| ExportSheet::from_item(name, item, &self.product_info))
            .collect()
    }

    /// すべてのシート表現をMarkdownとして出力
    ///
    /// 各シートは`# <シート名>`の見出しに続けて出力されます。
    pub fn render_export_markdown<W: Write>(&self, writer: &mut W) -> Result<(), QipExtractError> {
        for sheet in self.export_sheets() {
            writeln!(writer, "# {}\n", sheet.sheet_name)?;
            sheet.render_markdown(writer)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// シート名に使えない文字を置換し、長さを制限する
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();

    match replaced.trim() {
        "" => UNNAMED_SHEET.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// 穴番号を数値の昇順に並べる（数値でないものは後ろに文字列順）
fn sorted_cavities(item: &InspectionItemAggregate) -> Vec<&str> {
    let mut cavities: Vec<&str> = item.all_cavities.iter().map(String::as_str).collect();
    cavities.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    cavities
}

fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = vec![3; rows.first().map_or(0, Vec::len)];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }
    widths
}
