//! Builder Module
//!
//! Fluent Builder APIを提供し、`Extractor`インスタンスを段階的に構築する。

use std::io::Read;
use std::path::Path;
use std::sync::mpsc::Sender;

use crate::api::ProgressEvent;
use crate::config::{ExtractionSchema, GroupConfig};
use crate::engine::ExtractionRun;
use crate::error::QipExtractError;
use crate::parser::{WorkbookParser, WorkbookSource};
use crate::result::RunResult;
use crate::security::SecurityLimits;
use crate::types::WorkbookData;

/// Fluent Builder APIを提供する構造体
///
/// 穴組の設定、進捗通知先、入力の制限を指定して`Extractor`を構築します。
///
/// # 使用例
///
/// ```rust,no_run
/// use qipextract::{ExtractorBuilder, GroupConfig};
///
/// # fn main() -> Result<(), qipextract::QipExtractError> {
/// let extractor = ExtractorBuilder::new()
///     .with_group(1, GroupConfig::new("K3:R3", "K5:R20"))
///     .with_group(2, GroupConfig::new("K3:R3", "K5:R20").with_page_offset(1))
///     .build()?;
/// let result = extractor.run_paths(&["lot-0815.xlsx", "lot-0816.xlsx"])?;
/// println!("{}", result.to_json_pretty()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ExtractorBuilder {
    schema: ExtractionSchema,
    limits: SecurityLimits,
    progress: Option<Sender<ProgressEvent>>,

    /// `with_group`で発生した最初のエラー（`build()`で返す）
    deferred_error: Option<QipExtractError>,
}

impl ExtractorBuilder {
    /// 空の設定を持つビルダーを生成する
    ///
    /// 少なくとも1つの穴組を設定しないと`build()`は失敗します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 穴組を設定する
    ///
    /// # 引数
    ///
    /// * `index` - 穴組番号（1〜6）
    /// * `group` - 抽出ルール。範囲が空の場合、その穴組は無効になります
    ///
    /// 番号が範囲外の場合のエラーは`build()`で返されます。
    pub fn with_group(mut self, index: usize, group: GroupConfig) -> Self {
        if let Err(e) = self.schema.set_group(index, Some(group)) {
            self.deferred_error.get_or_insert(e);
        }
        self
    }

    /// スキーマ全体を置き換える
    pub fn with_schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// 進捗イベントの送信先を設定する
    ///
    /// 受信側が破棄された場合、以降の通知は黙って捨てられます。
    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// 入力ワークブックの制限を設定する
    pub fn with_security_limits(mut self, limits: SecurityLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 設定を検証し、`Extractor`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::Config)` - 穴組番号が1〜6の範囲外、または有効な穴組が1つもない場合
    pub fn build(self) -> Result<Extractor, QipExtractError> {
        if let Some(e) = self.deferred_error {
            return Err(e);
        }
        self.schema.validate()?;

        Ok(Extractor {
            schema: self.schema,
            limits: self.limits,
            progress: self.progress,
        })
    }
}

/// 抽出処理のファサード
///
/// 1つの`Extractor`で何度でも実行できます。各実行は独立した`RunResult`を返します。
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: ExtractionSchema,
    limits: SecurityLimits,
    progress: Option<Sender<ProgressEvent>>,
}

impl Extractor {
    /// 検証済みのスキーマ
    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    pub fn security_limits(&self) -> &SecurityLimits {
        &self.limits
    }

    /// 入力ワークブックを順にデコードして抽出する
    ///
    /// ワークブックは1つずつデコードされ、処理後に破棄されます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(RunResult)` - ページ単位の失敗は`RunResult::errors`に記録されます
    /// * `Err(QipExtractError)` - いずれかのワークブックをデコードできなかった場合
    pub fn run_sources(&self, sources: &[WorkbookSource]) -> Result<RunResult, QipExtractError> {
        self.new_run()
            .run(sources.iter().map(|source| source.decode(&self.limits)))
    }

    /// ファイルパスの一覧から抽出する
    pub fn run_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RunResult, QipExtractError> {
        let sources: Vec<WorkbookSource> = paths
            .iter()
            .map(|path| WorkbookSource::from_path(path.as_ref()))
            .collect();
        self.run_sources(&sources)
    }

    /// 1つのリーダーから抽出する
    pub fn run_reader<R: Read>(&self, reader: R, name: &str) -> Result<RunResult, QipExtractError> {
        let workbook = WorkbookParser::open(reader, name, &self.limits);
        self.new_run().run(std::iter::once(workbook))
    }

    /// デコード済みのワークブックから抽出する
    pub fn run_workbooks(&self, workbooks: Vec<WorkbookData>) -> Result<RunResult, QipExtractError> {
        self.new_run().run(workbooks.into_iter().map(Ok))
    }

    fn new_run(&self) -> ExtractionRun<'_> {
        ExtractionRun::new(&self.schema, self.progress.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RunPhase;
    use crate::schema::BATCH_NUMBER_HEADER;
    use crate::types::{CellRecord, Page};
    use std::sync::mpsc;

    fn batch_page(name: &str, value: f64) -> Page {
        let mut page = Page::new(name);
        page.set("A1", CellRecord::string(BATCH_NUMBER_HEADER)).unwrap();
        page.set("A2", CellRecord::string("外徑")).unwrap();
        page.set("B1", CellRecord::string("x")).unwrap();
        page.set("B3", CellRecord::string("1號穴")).unwrap();
        page.set("A4", CellRecord::string("外徑")).unwrap();
        page.set("B4", CellRecord::number(value)).unwrap();
        page
    }

    #[test]
    fn test_build_requires_active_group() {
        assert!(matches!(
            ExtractorBuilder::new().build(),
            Err(QipExtractError::Config(_))
        ));
        assert!(ExtractorBuilder::new()
            .with_group(1, GroupConfig::new("", "B4"))
            .build()
            .is_err());
    }

    #[test]
    fn test_build_rejects_bad_group_index() {
        let result = ExtractorBuilder::new()
            .with_group(1, GroupConfig::new("B3", "B4"))
            .with_group(9, GroupConfig::new("B3", "B4"))
            .build();
        assert!(matches!(result, Err(QipExtractError::Config(_))));
    }

    #[test]
    fn test_with_schema() {
        let schema = ExtractionSchema::from_json_str(
            r#"{"cavityGroups": {"3": {"cavityIdRange": "B3", "dataRange": "B4"}}}"#,
        )
        .unwrap();
        let extractor = ExtractorBuilder::new().with_schema(schema).build().unwrap();
        assert!(extractor.schema().group(3).is_some());
        assert_eq!(*extractor.security_limits(), SecurityLimits::default());
    }

    #[test]
    fn test_run_workbooks_twice_is_independent() {
        let extractor = ExtractorBuilder::new()
            .with_group(1, GroupConfig::new("B3", "B4"))
            .build()
            .unwrap();
        let workbook = WorkbookData::new("a.xlsx")
            .with_page(batch_page("Lot1", 1.5))
            .with_page(batch_page("Lot2", 1.6));

        let first = extractor.run_workbooks(vec![workbook.clone()]).unwrap();
        let second = extractor.run_workbooks(vec![workbook]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.processed_sheets, 2);
        assert_eq!(first.inspection_items["外徑"].batches["Lot2"]["1"], 1.6);
    }

    #[test]
    fn test_progress_events_reach_receiver() {
        let (tx, rx) = mpsc::channel();
        let extractor = ExtractorBuilder::new()
            .with_group(1, GroupConfig::new("B3", "B4"))
            .with_progress(tx)
            .build()
            .unwrap();
        extractor
            .run_workbooks(vec![WorkbookData::new("a.xlsx").with_page(batch_page("Lot1", 1.0))])
            .unwrap();
        drop(extractor);

        let events: Vec<ProgressEvent> = rx.iter().collect();
        let last = events.last().unwrap();
        assert_eq!(last.phase, RunPhase::Done);
        assert_eq!(last.percent, 100);
    }

    #[test]
    fn test_run_reader_with_garbage_fails() {
        let extractor = ExtractorBuilder::new()
            .with_group(1, GroupConfig::new("B3", "B4"))
            .build()
            .unwrap();
        assert!(extractor.run_reader(&b"garbage"[..], "bad.xlsx").is_err());
    }
}
