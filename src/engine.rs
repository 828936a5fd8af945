//! Extraction Engine
//!
//! 複数ワークブックを順に処理し、ページ単位の抽出結果を集計に畳み込む実行エンジン。
//!
//! 1回の実行は [`ExtractionRun`] が所有し、`run()` で消費されます。
//! 実行はシングルスレッドで、アンカーページごと・ワークブックのデコードごとに
//! `std::thread::yield_now()` で制御を譲ります。

use std::sync::mpsc::Sender;

use crate::api::{ProgressEvent, RunPhase};
use crate::config::{ExtractionSchema, ResolvedGroup};
use crate::error::QipExtractError;
use crate::extractor::{extract_group_items, extract_product_info};
use crate::result::{PageExtraction, RunResult};
use crate::schema::is_eligible_page;
use crate::specification;
use crate::types::WorkbookData;

/// 1つのアンカーページを抽出する（集計前の純粋なステップ）
///
/// アンカーページが抽出対象でない場合は`Ok(None)`を返します。
/// 対象ページのインデックスがワークブックの範囲外になる穴組はスキップされます。
///
/// # 引数
///
/// * `workbook` - デコード済みワークブック
/// * `anchor_index` - アンカーページのインデックス（0始まり）
/// * `groups` - 範囲を解析済みの穴組
///
/// # 戻り値
///
/// * `Ok(Some(PageExtraction))` - バッチ名と発見順の検査項目
/// * `Ok(None)` - 抽出対象外のページ
/// * `Err(QipExtractError::PageUnavailable)` - アンカーまたは対象ページを読み込めなかった場合
pub fn extract_page(
    workbook: &WorkbookData,
    anchor_index: usize,
    groups: &[ResolvedGroup],
) -> Result<Option<PageExtraction>, QipExtractError> {
    let anchor = workbook
        .slot(anchor_index)
        .ok_or_else(|| QipExtractError::PageUnavailable {
            sheet: format!("#{}", anchor_index + 1),
            message: "page index is out of range".to_string(),
        })?
        .page()?;

    if !is_eligible_page(&anchor.name, anchor) {
        tracing::debug!(sheet = %anchor.name, "page skipped: not a data page");
        return Ok(None);
    }

    let mut extraction = PageExtraction {
        batch_name: anchor.name.clone(),
        items: Vec::new(),
    };

    for group in groups {
        let target_index = anchor_index + group.page_offset;
        let Some(slot) = workbook.slot(target_index) else {
            tracing::debug!(
                group = group.index,
                target_index,
                "group skipped: target page is out of range"
            );
            continue;
        };
        extraction
            .items
            .extend(extract_group_items(slot.page()?, group));
    }

    Ok(Some(extraction))
}

/// 進捗通知の送信と単調性の管理
#[derive(Debug)]
struct ProgressReporter {
    sender: Option<Sender<ProgressEvent>>,
    last_percent: u8,
}

impl ProgressReporter {
    fn emit(
        &mut self,
        phase: RunPhase,
        current_file: usize,
        total_files: usize,
        percent: u8,
        message: String,
    ) {
        self.last_percent = self.last_percent.max(percent.min(100));
        let event = ProgressEvent {
            phase,
            current_file,
            total_files,
            percent: self.last_percent,
            message,
        };
        tracing::debug!(percent = event.percent, "{}", event.message);

        if let Some(sender) = &self.sender {
            // 受信側が閉じていても抽出は続行する
            if sender.send(event).is_err() {
                self.sender = None;
            }
        }
    }
}

/// 規格解決フェーズの進捗率
const SPEC_RESOLUTION_PERCENT: u8 = 95;

/// ページ処理の進捗率
///
/// 規格解決の通知より前に収まるよう、`0..SPEC_RESOLUTION_PERCENT`に縮尺します。
fn page_percent(file_index: usize, total_files: usize, page_index: usize, page_count: usize) -> u8 {
    let done = (file_index * page_count + page_index + 1) as f64;
    let total = (total_files * page_count) as f64;
    if total <= 0.0 {
        return 0;
    }
    let ceiling = f64::from(SPEC_RESOLUTION_PERCENT - 1);
    (done / total * ceiling).round().clamp(0.0, ceiling) as u8
}

/// 1回分の抽出実行
///
/// フェーズは `Idle → ReadingFiles → ExtractingPages → ResolvingSpecifications → Done`
/// の順にのみ進みます。2つ目以降のワークブックのデコードは`ExtractingPages`の中で行われます。
#[derive(Debug)]
pub struct ExtractionRun<'a> {
    schema: &'a ExtractionSchema,
    groups: Vec<ResolvedGroup>,
    phase: RunPhase,
    progress: ProgressReporter,
    result: RunResult,

    /// 製品情報と規格の解決に使う先頭のワークブック
    first_workbook: Option<WorkbookData>,
}

impl<'a> ExtractionRun<'a> {
    /// 新しい実行を生成する
    ///
    /// 範囲文字列を解析できない穴組はここで警告を出し、実行から除外します。
    pub fn new(schema: &'a ExtractionSchema, progress: Option<Sender<ProgressEvent>>) -> Self {
        let groups = schema
            .active_groups()
            .filter_map(|(index, group)| match group.resolve(index) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    tracing::warn!(group = index, "cavity group skipped: {}", e);
                    None
                }
            })
            .collect();

        Self {
            schema,
            groups,
            phase: RunPhase::Idle,
            progress: ProgressReporter {
                sender: progress,
                last_percent: 0,
            },
            result: RunResult::default(),
            first_workbook: None,
        }
    }

    /// 現在のフェーズ
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, phase: RunPhase) {
        if phase > self.phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "phase changed");
            self.phase = phase;
        }
    }

    /// ワークブックを順に処理して結果を返す
    ///
    /// ワークブックはイテレータから1つずつ取り出され、処理後に破棄されます
    /// （先頭のワークブックのみ規格解決のために保持）。
    ///
    /// # 戻り値
    ///
    /// * `Ok(RunResult)` - ページ単位の失敗はエラーログに記録された上で返されます
    /// * `Err(QipExtractError)` - ワークブックのデコード自体に失敗した場合
    pub fn run<I>(mut self, workbooks: I) -> Result<RunResult, QipExtractError>
    where
        I: IntoIterator<Item = Result<WorkbookData, QipExtractError>>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut workbooks = workbooks.into_iter();
        let total_files = workbooks.len();
        tracing::info!(files = total_files, groups = self.groups.len(), "extraction started");

        for file_index in 0..total_files {
            self.advance(RunPhase::ReadingFiles);
            let percent = self.progress.last_percent;
            self.progress.emit(
                self.phase,
                file_index + 1,
                total_files,
                percent,
                format!("[{}/{}] 讀取檔案...", file_index + 1, total_files),
            );

            // デコードは読み込み通知の後
            let Some(decoded) = workbooks.next() else {
                break;
            };
            let mut workbook = decoded?;
            std::thread::yield_now();
            if workbook.file_name.trim().is_empty() {
                workbook.file_name = format!("File {}", file_index + 1);
            }

            self.advance(RunPhase::ExtractingPages);
            self.extract_workbook(&workbook, file_index, total_files);

            if file_index == 0 {
                self.result.product_info = extract_product_info(&workbook);
                self.first_workbook = Some(workbook);
            }
        }

        self.resolve_specifications(total_files);

        self.result.has_errors = self.result.errors.has_errors();
        self.advance(RunPhase::Done);
        self.progress
            .emit(self.phase, total_files, total_files, 100, "處理完成".to_string());
        tracing::info!(
            items = self.result.item_count(),
            processed_sheets = self.result.processed_sheets,
            errors = self.result.errors.error_count(),
            "extraction finished"
        );

        Ok(self.result)
    }

    /// 1つのワークブックのアンカーページを順に処理する
    fn extract_workbook(&mut self, workbook: &WorkbookData, file_index: usize, total_files: usize) {
        let step = self.schema.step();
        let page_count = workbook.page_count();

        for anchor_index in (0..page_count).step_by(step) {
            let sheet_name = workbook.pages[anchor_index].name().to_string();
            self.progress.emit(
                self.phase,
                file_index + 1,
                total_files,
                page_percent(file_index, total_files, anchor_index, page_count),
                format!("[{}/{}] 處理: {}", file_index + 1, total_files, sheet_name),
            );

            match extract_page(workbook, anchor_index, &self.groups) {
                Ok(Some(page)) => {
                    self.result.absorb(page);
                    self.result.processed_sheets += 1;
                }
                Ok(None) => {}
                Err(e) => self
                    .result
                    .errors
                    .log_error(format!("{}: {}", workbook.file_name, sheet_name), e.to_string()),
            }

            std::thread::yield_now();
        }
    }

    /// 発見したすべての検査項目の規格を先頭のワークブックから解決する
    fn resolve_specifications(&mut self, total_files: usize) {
        self.advance(RunPhase::ResolvingSpecifications);
        self.progress.emit(
            self.phase,
            total_files,
            total_files,
            SPEC_RESOLUTION_PERCENT,
            "提取規格數據...".to_string(),
        );

        let Some(workbook) = &self.first_workbook else {
            return;
        };
        for (name, item) in self.result.inspection_items.iter_mut() {
            item.specification = Some(specification::resolve(workbook, name));
        }
    }
}
