//! Format Module
//!
//! Excelの表示形式（Number Format）を数値セルに適用し、画面に表示される文字列を再現します。

mod parser;
mod sections;
mod tokens;

pub(crate) use parser::NumberFormat;

/// 表示形式を適用した文字列
///
/// 書式で表現できない値は "General" の表示にフォールバックします。
///
/// # 使用例
///
/// ```
/// use qipextract::format::render_number;
///
/// assert_eq!(render_number(1.0, "\"(\"0\")\"", false), "(1)");
/// assert_eq!(render_number(12.5, "0.000", false), "12.500");
/// assert_eq!(render_number(12345.0, "0.00E+00", false), "12345");
/// ```
pub fn render_number(value: f64, format_code: &str, is_1904: bool) -> String {
    NumberFormat::parse(format_code)
        .render(value, is_1904)
        .unwrap_or_else(|| render_general(value))
}

/// "General" 書式での表示
///
/// 整数は小数部なし、それ以外は有効数字10桁程度に丸めて末尾の0を除きます。
/// 絶対値が極端に大きい・小さい値は指数表記（例: `1.23457E+11`）になります。
pub fn render_general(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let abs = value.abs();
    if abs >= 1e11 || abs < 1e-9 {
        return scientific(value);
    }
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }

    let magnitude = abs.log10().floor() as i32;
    let decimals = if magnitude >= 0 { (9 - magnitude).max(0) } else { 9 } as usize;
    trim_fraction(&format!("{:.*}", decimals, value))
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn scientific(value: f64) -> String {
    let text = format!("{:.5E}", value);
    match text.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
        }
        None => text,
    }
}
