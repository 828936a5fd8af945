//! XML Metadata Parser Module
//!
//! XLSX内部のXMLから、calamineでは取得できない表示形式の情報を読み取ります。
//! セルごとのスタイルID、スタイルID → 表示形式、1904年エポック判定です。

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::QipExtractError;
use crate::range::parse_cell_address;
use crate::security::SecurityLimits;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PATH: &str = "xl/styles.xml";

/// カスタム表示形式IDの開始値
const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

/// (行, 列) → スタイルID（0始まり）
type StyleMap = HashMap<(u32, u32), u32>;

/// XLSXメタデータ
#[derive(Debug, Clone, Default)]
pub(crate) struct XlsxMetadata {
    /// numFmtId -> formatCode（カスタム書式のみ）
    num_formats: HashMap<u32, String>,
    /// styleId -> numFmtId
    cell_xfs: Vec<u32>,
    /// シート名 -> セルのスタイルID
    sheet_styles: HashMap<String, StyleMap>,
    is_1904: bool,
}

impl XlsxMetadata {
    /// XLSXファイル（ZIPアーカイブ）からメタデータを解析する
    ///
    /// 展開前にアーカイブの全エントリを`limits`で検査します。
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::SecurityViolation)` - 制限を超えるエントリがある場合
    /// * `Err(QipExtractError::Zip)` / `Err(QipExtractError::Xml)` - 解析エラー
    pub fn read<R: Read + Seek>(
        xlsx_reader: R,
        limits: &SecurityLimits,
    ) -> Result<Self, QipExtractError> {
        let mut archive =
            ZipArchive::new(xlsx_reader).map_err(|e| QipExtractError::Zip(e.to_string()))?;

        limits.check_entry_count(archive.len())?;
        let mut total = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| QipExtractError::Zip(e.to_string()))?;
            limits.check_entry(file.name(), file.size(), &mut total)?;
        }

        let mut metadata = Self::default();

        if let Some(xml) = read_entry(&mut archive, STYLES_PATH)? {
            let (num_formats, cell_xfs) = parse_styles(&xml)?;
            metadata.num_formats = num_formats;
            metadata.cell_xfs = cell_xfs;
        }

        let Some(workbook_xml) = read_entry(&mut archive, WORKBOOK_PATH)? else {
            return Ok(metadata);
        };
        let workbook = parse_workbook(&workbook_xml)?;
        metadata.is_1904 = workbook.is_1904;

        let relationships = match read_entry(&mut archive, WORKBOOK_RELS_PATH)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        for (sheet_name, relationship_id) in workbook.sheets {
            let Some(target) = relationships.get(&relationship_id) else {
                continue;
            };
            let path = resolve_target(target);
            if let Some(xml) = read_entry(&mut archive, &path)? {
                metadata
                    .sheet_styles
                    .insert(sheet_name, parse_worksheet_styles(&xml)?);
            }
        }

        Ok(metadata)
    }

    /// 1904年エポックを使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// スタイルIDから表示形式文字列を取得
    ///
    /// # 戻り値
    ///
    /// * `None` - スタイルIDが範囲外、または書式が見つからない場合
    pub fn format_code(&self, style_id: u32) -> Option<&str> {
        let num_fmt_id = *self.cell_xfs.get(style_id as usize)?;
        if num_fmt_id < FIRST_CUSTOM_FORMAT_ID {
            get_builtin_format(num_fmt_id)
        } else {
            self.num_formats.get(&num_fmt_id).map(String::as_str)
        }
    }

    /// セルに適用されている表示形式文字列を取得（座標は0始まり）
    pub fn cell_format(&self, sheet_name: &str, row: u32, col: u32) -> Option<&str> {
        let style_id = *self.sheet_styles.get(sheet_name)?.get(&(row, col))?;
        self.format_code(style_id)
    }
}

/// アーカイブからエントリを読み込む（存在しない場合は`None`）
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<Vec<u8>>, QipExtractError> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(QipExtractError::Zip(e.to_string())),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// リレーションシップのターゲットをアーカイブ内のパスに変換する
///
/// "worksheets/sheet1.xml" -> "xl/worksheets/sheet1.xml"
/// "/xl/worksheets/sheet1.xml" -> "xl/worksheets/sheet1.xml"
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn xml_error(e: impl std::fmt::Display) -> QipExtractError {
    QipExtractError::Xml(e.to_string())
}

fn attribute_value(attr: &Attribute<'_>) -> Result<String, QipExtractError> {
    let raw = std::str::from_utf8(&attr.value)?;
    Ok(quick_xml::escape::unescape(raw).map_err(xml_error)?.into_owned())
}

/// 指定した属性の値を取得する
fn find_attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, QipExtractError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attribute_value(&attr)?));
        }
    }
    Ok(None)
}

/// xl/styles.xml の解析
///
/// `<numFmts>` と `<cellXfs>` を読み取ります。`<cellStyleXfs>` 内の `<xf>` は対象外です。
fn parse_styles(xml: &[u8]) -> Result<(HashMap<u32, String>, Vec<u32>), QipExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut num_formats = HashMap::new();
    let mut cell_xfs = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"numFmt" => {
                    let id = find_attribute(&e, b"numFmtId")?;
                    let code = find_attribute(&e, b"formatCode")?;
                    if let (Some(id), Some(code)) = (id, code) {
                        let id: u32 = id.trim().parse()?;
                        if id >= FIRST_CUSTOM_FORMAT_ID {
                            num_formats.insert(id, code);
                        }
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let num_fmt_id = match find_attribute(&e, b"numFmtId")? {
                        Some(id) => id.trim().parse()?,
                        None => 0,
                    };
                    cell_xfs.push(num_fmt_id);
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"cellXfs" {
                    in_cell_xfs = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok((num_formats, cell_xfs))
}

/// xl/workbook.xml の内容
#[derive(Debug, Default)]
struct WorkbookEntries {
    /// (シート名, r:id) を定義順に
    sheets: Vec<(String, String)>,
    is_1904: bool,
}

/// xl/workbook.xml の解析
fn parse_workbook(xml: &[u8]) -> Result<WorkbookEntries, QipExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries = WorkbookEntries::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"workbookPr" => {
                    if let Some(value) = find_attribute(&e, b"date1904")? {
                        entries.is_1904 = value == "1" || value.eq_ignore_ascii_case("true");
                    }
                }
                b"sheet" => {
                    let name = find_attribute(&e, b"name")?;
                    let id = find_attribute(&e, b"r:id")?;
                    if let (Some(name), Some(id)) = (name, id) {
                        entries.sheets.push((name, id));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// リレーションシップファイルの解析（Id -> Target）
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, QipExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"Relationship" {
                    let id = find_attribute(&e, b"Id")?;
                    let target = find_attribute(&e, b"Target")?;
                    if let (Some(id), Some(target)) = (id, target) {
                        relationships.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// ワークシートXMLから各セルのスタイルIDを収集する
///
/// `r` 属性のないセルは、同じ行の直前のセルの右隣として扱います。
/// スタイルID 0（既定のスタイル）は記録しません。
fn parse_worksheet_styles(xml: &[u8]) -> Result<StyleMap, QipExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut styles = StyleMap::new();
    let mut row: Option<u32> = None;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"row" => {
                    row = Some(match find_attribute(&e, b"r")? {
                        Some(r) => r.trim().parse::<u32>()?.saturating_sub(1),
                        None => row.map_or(0, |r| r + 1),
                    });
                    next_col = 0;
                }
                b"c" => {
                    let (cell_row, cell_col) = match find_attribute(&e, b"r")? {
                        Some(address) => {
                            let coord = parse_cell_address(&address)?;
                            (coord.row, coord.col)
                        }
                        None => (row.unwrap_or(0), next_col),
                    };
                    next_col = cell_col + 1;

                    if let Some(style) = find_attribute(&e, b"s")? {
                        let style_id: u32 = style.trim().parse()?;
                        if style_id != 0 {
                            styles.insert((cell_row, cell_col), style_id);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(styles)
}

/// ビルトイン書式ID（0-163）の表示形式
fn get_builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}
