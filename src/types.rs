//! Types Module
//!
//! ワークブックモデル（ページ・セル）と座標型を定義するモジュール。
//! デコード層（`parser`）がこのモデルを構築し、抽出層はこのモデルだけを参照します。

use std::collections::HashMap;

use crate::error::QipExtractError;

/// セルの型付き値
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（日付シリアル値を含む）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を文字列として取得（書式適用前）
    ///
    /// 整数値の数値は小数部なしで出力されます（`3.0` → `"3"`）。
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }

    /// 型付きの数値であれば返す
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

/// 1セル分のレコード
///
/// 型付き値と、書式適用後の表示文字列（存在する場合）を保持します。
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    /// 型付き値
    pub value: CellValue,

    /// 書式適用後の表示文字列
    pub text: Option<String>,
}

impl CellRecord {
    /// 値のみを持つセルを生成
    pub fn new(value: CellValue) -> Self {
        Self { value, text: None }
    }

    /// 数値セルを生成
    pub fn number(value: f64) -> Self {
        Self::new(CellValue::Number(value))
    }

    /// 文字列セルを生成
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(CellValue::String(value.into()))
    }

    /// 表示文字列を設定
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// 生の値を文字列化したもの（前後の空白を除去）
    pub fn raw_text(&self) -> String {
        self.value.as_raw_string().trim().to_string()
    }

    /// 表示文字列を優先した文字列（前後の空白を除去）
    ///
    /// 表示文字列が空の場合は生の値にフォールバックします。
    pub fn rendered_text(&self) -> String {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self.raw_text(),
        }
    }

    /// 値も表示文字列も空かどうか
    pub fn is_blank(&self) -> bool {
        self.rendered_text().is_empty()
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", col_index_to_letter(self.col), self.row + 1)
    }
}

/// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
pub(crate) fn col_index_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// ワークブックの1ページ（ワークシート）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// ページ名（シート名）
    pub name: String,

    /// 座標 -> セルレコード
    cells: HashMap<CellCoord, CellRecord>,

    /// 使用されている最終行（0始まり）
    last_row: Option<u32>,
}

impl Page {
    /// 空のページを生成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
            last_row: None,
        }
    }

    /// セルを設定
    pub fn set_cell(&mut self, coord: CellCoord, record: CellRecord) {
        self.last_row = Some(self.last_row.map_or(coord.row, |r| r.max(coord.row)));
        self.cells.insert(coord, record);
    }

    /// A1形式のアドレスでセルを設定する（テスト・フィクスチャ構築用）
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::InvalidRange)` - アドレスが解析できない場合
    pub fn set(&mut self, address: &str, record: CellRecord) -> Result<(), QipExtractError> {
        let coord = crate::range::parse_cell_address(address)?;
        self.set_cell(coord, record);
        Ok(())
    }

    /// 座標からセルを取得
    pub fn cell(&self, coord: CellCoord) -> Option<&CellRecord> {
        self.cells.get(&coord)
    }

    /// 行・列（0始まり）からセルを取得
    pub fn cell_at(&self, row: u32, col: u32) -> Option<&CellRecord> {
        self.cell(CellCoord::new(row, col))
    }

    /// 使用されている最終行（0始まり）。空ページの場合は`None`
    pub fn last_row(&self) -> Option<u32> {
        self.last_row
    }

    /// セル数
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// ワークブック内の1ページ分のスロット
///
/// 読み込みに失敗したシートも名前と理由を保持したまま並びに残るため、
/// ページインデックスとオフセット計算は常にワークブックのシート順と一致します。
#[derive(Debug, Clone, PartialEq)]
pub enum PageSlot {
    /// 読み込み済みページ
    Loaded(Page),

    /// 読み込みに失敗したページ
    Unavailable {
        /// シート名
        name: String,
        /// 失敗の理由
        message: String,
    },
}

impl PageSlot {
    /// シート名
    pub fn name(&self) -> &str {
        match self {
            PageSlot::Loaded(page) => &page.name,
            PageSlot::Unavailable { name, .. } => name,
        }
    }

    /// 読み込み済みページを取得
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::PageUnavailable)` - 読み込みに失敗したページの場合
    pub fn page(&self) -> Result<&Page, QipExtractError> {
        match self {
            PageSlot::Loaded(page) => Ok(page),
            PageSlot::Unavailable { name, message } => Err(QipExtractError::PageUnavailable {
                sheet: name.clone(),
                message: message.clone(),
            }),
        }
    }

    /// 読み込み済みの場合のみページを返す
    pub fn loaded(&self) -> Option<&Page> {
        match self {
            PageSlot::Loaded(page) => Some(page),
            PageSlot::Unavailable { .. } => None,
        }
    }
}

impl From<Page> for PageSlot {
    fn from(page: Page) -> Self {
        PageSlot::Loaded(page)
    }
}

/// デコード済みワークブック
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookData {
    /// 元ファイル名（エラーログの帰属に使用）
    pub file_name: String,

    /// シート順のページスロット
    pub pages: Vec<PageSlot>,
}

impl WorkbookData {
    /// 空のワークブックを生成
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            pages: Vec::new(),
        }
    }

    /// ページを追加（ビルダー形式）
    pub fn with_page(mut self, page: impl Into<PageSlot>) -> Self {
        self.pages.push(page.into());
        self
    }

    /// ページ数
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// シート名の一覧（シート順）
    pub fn page_names(&self) -> Vec<&str> {
        self.pages.iter().map(PageSlot::name).collect()
    }

    /// インデックスからページスロットを取得
    pub fn slot(&self, index: usize) -> Option<&PageSlot> {
        self.pages.get(index)
    }
}
