//! Workbook Decoder
//!
//! calamineでセル値を読み込み、XMLメタデータの表示形式を適用して
//! ページモデル（`WorkbookData`）を構築します。

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::{debug, warn};

use crate::error::QipExtractError;
use crate::format::{render_general, NumberFormat};
use crate::parser::XlsxMetadata;
use crate::security::SecurityLimits;
use crate::types::{CellCoord, CellRecord, CellValue, Page, PageSlot, WorkbookData};

/// ZIPアーカイブの先頭シグネチャ
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// ワークブックデコーダー
///
/// XLSXでは表示形式を適用した表示文字列も生成します。
/// calamineが読めるその他の形式（xls, ods など）は値のみを読み込みます。
pub struct WorkbookParser;

impl WorkbookParser {
    /// ワークブックをデコードする
    ///
    /// # 引数
    ///
    /// * `reader` - ワークブックのバイト列を読み込むリーダー
    /// * `file_name` - ワークブックの表示名
    /// * `limits` - 入力サイズ・展開サイズの制限
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookData)` - 全ページ（読めなかったページは`PageSlot::Unavailable`）
    /// * `Err(QipExtractError)` - ワークブック自体を開けない、または制限を超えた場合
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::fs::File;
    /// use qipextract::{SecurityLimits, WorkbookParser};
    ///
    /// # fn main() -> Result<(), qipextract::QipExtractError> {
    /// let file = File::open("lot-0815.xlsx")?;
    /// let workbook = WorkbookParser::open(file, "lot-0815.xlsx", &SecurityLimits::default())?;
    /// println!("{:?}", workbook.page_names());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<R: Read>(
        reader: R,
        file_name: &str,
        limits: &SecurityLimits,
    ) -> Result<WorkbookData, QipExtractError> {
        let mut buffer = Vec::new();
        let bytes_read = reader
            .take(limits.max_input_size.saturating_add(1))
            .read_to_end(&mut buffer)?;
        limits.check_input_size(bytes_read as u64)?;

        Self::decode(buffer, file_name, limits)
    }

    /// メモリ上のバイト列をデコードする
    pub fn decode(
        buffer: Vec<u8>,
        file_name: &str,
        limits: &SecurityLimits,
    ) -> Result<WorkbookData, QipExtractError> {
        limits.check_input_size(buffer.len() as u64)?;

        // 展開前にアーカイブを検査する
        let metadata = if buffer.starts_with(ZIP_SIGNATURE) {
            Some(XlsxMetadata::read(Cursor::new(buffer.as_slice()), limits)?)
        } else {
            None
        };

        let mut sheets = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        let names: Vec<String> = sheets.sheet_names().to_vec();

        let mut workbook = WorkbookData::new(file_name);
        for name in names {
            let slot = match sheets.worksheet_range(&name) {
                Ok(range) => PageSlot::Loaded(build_page(&name, &range, metadata.as_ref())),
                Err(e) => {
                    warn!(file = file_name, sheet = %name, error = %e, "worksheet could not be read");
                    PageSlot::Unavailable {
                        name,
                        message: e.to_string(),
                    }
                }
            };
            workbook = workbook.with_page(slot);
        }

        debug!(
            file = file_name,
            pages = workbook.page_count(),
            rendered = metadata.is_some(),
            "decoded workbook"
        );
        Ok(workbook)
    }
}

/// calamineのセル範囲をページに変換する
fn build_page(name: &str, range: &Range<Data>, metadata: Option<&XlsxMetadata>) -> Page {
    let mut page = Page::new(name);
    let Some((start_row, start_col)) = range.start() else {
        return page;
    };

    let is_1904 = metadata.is_some_and(XlsxMetadata::is_1904);
    let mut formats: HashMap<&str, NumberFormat> = HashMap::new();

    for (row, col, data) in range.used_cells() {
        let row = start_row + row as u32;
        let col = start_col + col as u32;

        let value = cell_value(data);
        let text = match &value {
            CellValue::Number(n) => Some(match metadata.and_then(|m| m.cell_format(name, row, col)) {
                Some(code) => formats
                    .entry(code)
                    .or_insert_with(|| NumberFormat::parse(code))
                    .render(*n, is_1904)
                    .unwrap_or_else(|| render_general(*n)),
                None => render_general(*n),
            }),
            CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            _ => None,
        };

        if value.is_empty() {
            continue;
        }
        let mut record = CellRecord::new(value);
        record.text = text;
        page.set_cell(CellCoord::new(row, col), record);
    }

    page
}

/// calamineの値をセル値に変換する
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Error(e.to_string()),
        #[allow(unreachable_patterns)]
        _ => CellValue::Empty,
    }
}

/// 入力ワークブックの中身
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceData {
    /// ファイルパス（デコード時に読み込みます）
    Path(PathBuf),
    /// メモリ上のバイト列
    Bytes(Vec<u8>),
}

/// 名前付きの入力ワークブック
///
/// 実行エンジンは入力を1つずつ遅延デコードします。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSource {
    /// 表示名（エラーログの接頭辞に使われます）
    pub name: String,
    pub data: SourceData,
}

impl WorkbookSource {
    /// ファイルパスから生成（表示名はファイル名）
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            data: SourceData::Path(path),
        }
    }

    /// バイト列から生成
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: SourceData::Bytes(bytes),
        }
    }

    /// デコードする
    pub fn decode(&self, limits: &SecurityLimits) -> Result<WorkbookData, QipExtractError> {
        match &self.data {
            SourceData::Path(path) => decode_path(path, &self.name, limits),
            SourceData::Bytes(bytes) => WorkbookParser::decode(bytes.clone(), &self.name, limits),
        }
    }
}

fn decode_path(path: &Path, name: &str, limits: &SecurityLimits) -> Result<WorkbookData, QipExtractError> {
    let file = File::open(path)?;
    limits.check_input_size(file.metadata()?.len())?;
    WorkbookParser::open(file, name, limits)
}
