//! パフォーマンスベンチマーク
//!
//! フィクスチャはrust_xlsxwriterでメモリ上に生成します。
//!
//! - デコード（calamine + 表示形式の適用）
//! - 抽出エンジン単体（デコード済みワークブック）
//! - デコードから集計までの一連の実行
//! - 表示形式の描画

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use qipextract::format::render_number;
use qipextract::{
    Extractor, ExtractorBuilder, GroupConfig, SecurityLimits, WorkbookParser, BATCH_NUMBER_HEADER,
};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

/// アンカーページ + 続きページの組の数
const LOTS: usize = 30;

/// 1ページあたりの穴数と検査項目数
const CAVITIES: u16 = 8;
const ITEMS: u32 = 16;

/// 60ページ（30ロット × 2ページ）の検査ワークブックを生成
fn generate_workbook() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let label = Format::new().set_num_format("0\"號穴\"");
    let measurement = Format::new().set_num_format("0.000");

    for lot in 0..LOTS {
        for part in 0..2u16 {
            let sheet = workbook.add_worksheet();
            sheet.set_name(format!("Lot{:03}-{}", lot, part + 1))?;
            if part == 0 {
                sheet.write_string(0, 0, BATCH_NUMBER_HEADER)?;
                sheet.write_string(1, 0, format!("L{:03}", lot))?;
                sheet.write_string(0, 1, "QP-100")?;
            }
            for c in 0..CAVITIES {
                sheet.write_number_with_format(2, 1 + c, (part * CAVITIES + c + 1) as f64, &label)?;
            }
            for item in 0..ITEMS {
                let row = 3 + item;
                sheet.write_string(row, 0, format!("尺寸{:02}", item))?;
                for c in 0..CAVITIES {
                    let value = 10.0 + item as f64 * 0.5 + c as f64 * 0.001 + lot as f64 * 0.0001;
                    sheet.write_number_with_format(row, 1 + c, value, &measurement)?;
                }
            }
        }
    }

    workbook.save_to_buffer()
}

fn extractor() -> Extractor {
    ExtractorBuilder::new()
        .with_group(1, GroupConfig::new("B3:I3", "B4:I19"))
        .with_group(2, GroupConfig::new("B3:I3", "B4:I19").with_page_offset(1))
        .build()
        .unwrap()
}

fn benchmark_decode(c: &mut Criterion) {
    let data = generate_workbook().unwrap();
    let limits = SecurityLimits::default();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);
    group.bench_function("decode_60_pages", |b| {
        b.iter(|| WorkbookParser::decode(black_box(data.clone()), "bench.xlsx", &limits).unwrap());
    });
    group.finish();
}

fn benchmark_engine(c: &mut Criterion) {
    let data = generate_workbook().unwrap();
    let workbook = WorkbookParser::decode(data, "bench.xlsx", &SecurityLimits::default()).unwrap();
    let extractor = extractor();

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(LOTS as u64));
    group.bench_function("extract_30_lots", |b| {
        b.iter(|| {
            extractor
                .run_workbooks(black_box(vec![workbook.clone()]))
                .unwrap()
        });
    });
    group.finish();
}

fn benchmark_full_run(c: &mut Criterion) {
    let data = generate_workbook().unwrap();
    let extractor = extractor();

    let mut group = c.benchmark_group("full_run");
    group.sample_size(10);
    group.bench_function("decode_and_extract", |b| {
        b.iter(|| {
            let result = extractor
                .run_reader(Cursor::new(black_box(&data)), "bench.xlsx")
                .unwrap();
            black_box(result.export_sheets())
        });
    });
    group.finish();
}

fn benchmark_number_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("number_format");
    for (name, code) in [
        ("fixed", "0.000"),
        ("grouped", "#,##0.00"),
        ("date", "yyyy-mm-dd hh:mm"),
        ("sections", "0.0;[Red]-0.0;\"-\""),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| render_number(black_box(45658.123), black_box(code), false));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_decode,
    benchmark_engine,
    benchmark_full_run,
    benchmark_number_format
);
criterion_main!(benches);
