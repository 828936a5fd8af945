//! NumberFormat Module
//!
//! Excelの表示形式文字列を解析し、数値セルの表示文字列を生成します。

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use super::sections::FormatSection;
use super::tokens::FormatToken;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// 9999-12-31 のシリアル値
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// 解析済みの表示形式
///
/// # 使用例
///
/// ```ignore
/// let format = NumberFormat::parse("0.00");
/// assert_eq!(format.render(3.14159, false).as_deref(), Some("3.14"));
/// ```
#[derive(Debug, Clone)]
pub(crate) struct NumberFormat {
    sections: Vec<FormatSection>,
}

impl NumberFormat {
    /// 表示形式文字列を解析する
    ///
    /// 解析できない部分はリテラルとして扱うため、失敗しません。
    pub fn parse(format_code: &str) -> Self {
        let mut sections: Vec<FormatSection> = split_sections(format_code)
            .iter()
            .take(4)
            .map(|text| parse_section(text))
            .collect();
        if sections.is_empty() {
            sections.push(FormatSection::default());
        }
        Self { sections }
    }

    /// 数値を表示文字列に変換する
    ///
    /// # 引数
    ///
    /// * `value` - セルの数値
    /// * `is_1904` - 1904年エポックのブックかどうか
    ///
    /// # 戻り値
    ///
    /// この書式で表現できない場合（条件付き書式、指数表記、範囲外の日付など）は`None`
    pub fn render(&self, value: f64, is_1904: bool) -> Option<String> {
        if !value.is_finite() || self.sections.iter().any(|s| s.conditional) {
            return None;
        }

        let numeric_sections = self.sections.len().min(3);
        let (section, needs_sign) = if value < 0.0 && numeric_sections >= 2 {
            (&self.sections[1], false)
        } else if value == 0.0 && numeric_sections >= 3 {
            (&self.sections[2], false)
        } else {
            (&self.sections[0], value < 0.0)
        };
        let magnitude = value.abs();
        let sign = if needs_sign { "-" } else { "" };

        if section.is_datetime() {
            return render_datetime(value, section, is_1904);
        }
        if section.has_digits() {
            let body = render_digits(magnitude, section)?;
            return Some(format!("{}{}", sign, body));
        }

        let mut result = String::new();
        for token in &section.tokens {
            match token {
                FormatToken::General => {
                    result.push_str(sign);
                    result.push_str(&super::render_general(magnitude));
                }
                FormatToken::TextPlaceholder => {
                    result.push_str(sign);
                    result.push_str(&super::render_general(magnitude));
                }
                FormatToken::Literal(text) => result.push_str(text),
                FormatToken::Percent => result.push('%'),
                _ => {}
            }
        }
        if section.tokens.is_empty() && self.sections.len() == 1 {
            result = format!("{}{}", sign, super::render_general(magnitude));
        }
        Some(result)
    }
}

/// `;` でセクションに分割する（引用符と角括弧の中は除く）
fn split_sections(format_code: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;

    for ch in format_code.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' if !in_brackets => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '[' if !in_quotes => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if !in_quotes => {
                in_brackets = false;
                current.push(ch);
            }
            ';' if !in_quotes && !in_brackets => {
                sections.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() || !sections.is_empty() {
        sections.push(current);
    }
    sections
}

/// 直前のリテラルに連結してトークンを追加する
fn push_literal(tokens: &mut Vec<FormatToken>, text: &str) {
    if let Some(FormatToken::Literal(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(FormatToken::Literal(text.to_string()));
    }
}

fn run_length(chars: &[char], start: usize, target: char) -> usize {
    chars[start..]
        .iter()
        .take_while(|c| c.eq_ignore_ascii_case(&target))
        .count()
}

fn starts_with_ignore_case(chars: &[char], start: usize, pattern: &str) -> bool {
    let mut index = start;
    for expected in pattern.chars() {
        match chars.get(index) {
            Some(c) if c.eq_ignore_ascii_case(&expected) => index += 1,
            _ => return false,
        }
    }
    true
}

/// "m" を分と解釈するか（直前が時、または直後が秒）
fn is_minute_context(tokens: &[FormatToken], chars: &[char], after: usize) -> bool {
    let after_hour = tokens
        .iter()
        .rev()
        .find(|t| t.is_datetime())
        .is_some_and(|t| matches!(t, FormatToken::Hour(_) | FormatToken::Elapsed('h', _)));
    let before_second = chars[after..]
        .iter()
        .find(|c| c.is_ascii_alphabetic())
        .is_some_and(|c| c.eq_ignore_ascii_case(&'s'));
    after_hour || before_second
}

/// セクション文字列をトークン列に分解する
fn parse_section(text: &str) -> FormatSection {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut conditional = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '"')
                    .map_or(chars.len(), |p| i + 1 + p);
                let literal: String = chars[i + 1..end].iter().collect();
                push_literal(&mut tokens, &literal);
                i = end + 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    push_literal(&mut tokens, &next.to_string());
                }
                i += 2;
            }
            '_' => {
                push_literal(&mut tokens, " ");
                i += 2;
            }
            '*' => {
                i += 2;
            }
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ']')
                    .map_or(chars.len(), |p| i + 1 + p);
                let content: String = chars[i + 1..end].iter().collect();
                conditional |= parse_bracket(&content, &mut tokens);
                i = end + 1;
            }
            '0' => {
                tokens.push(FormatToken::DigitZero);
                i += 1;
            }
            '#' => {
                tokens.push(FormatToken::DigitHash);
                i += 1;
            }
            '?' => {
                tokens.push(FormatToken::DigitSpace);
                i += 1;
            }
            '.' => {
                tokens.push(FormatToken::DecimalPoint);
                i += 1;
            }
            ',' => {
                tokens.push(FormatToken::ThousandSeparator);
                i += 1;
            }
            '%' => {
                tokens.push(FormatToken::Percent);
                i += 1;
            }
            '@' => {
                tokens.push(FormatToken::TextPlaceholder);
                i += 1;
            }
            'E' | 'e' if matches!(chars.get(i + 1), Some('+') | Some('-')) => {
                tokens.push(FormatToken::Exponent);
                i += 2;
            }
            'y' | 'Y' => {
                let count = run_length(&chars, i, 'y');
                tokens.push(FormatToken::Year(count));
                i += count;
            }
            'd' | 'D' => {
                let count = run_length(&chars, i, 'd');
                tokens.push(FormatToken::Day(count));
                i += count;
            }
            'h' | 'H' => {
                let count = run_length(&chars, i, 'h');
                tokens.push(FormatToken::Hour(count));
                i += count;
            }
            's' | 'S' => {
                let count = run_length(&chars, i, 's');
                tokens.push(FormatToken::Second(count));
                i += count;
            }
            'm' | 'M' => {
                let count = run_length(&chars, i, 'm');
                if count <= 2 && is_minute_context(&tokens, &chars, i + count) {
                    tokens.push(FormatToken::Minute(count));
                } else {
                    tokens.push(FormatToken::Month(count));
                }
                i += count;
            }
            'a' | 'A' if starts_with_ignore_case(&chars, i, "am/pm") => {
                tokens.push(FormatToken::AmPm);
                i += 5;
            }
            'a' | 'A' if starts_with_ignore_case(&chars, i, "a/p") => {
                tokens.push(FormatToken::AmPm);
                i += 3;
            }
            'g' | 'G' if starts_with_ignore_case(&chars, i, "general") => {
                tokens.push(FormatToken::General);
                i += 7;
            }
            _ => {
                push_literal(&mut tokens, &ch.to_string());
                i += 1;
            }
        }
    }

    FormatSection {
        tokens,
        conditional,
    }
}

/// `[h]` `[>100]` `[$€-407]` `[Red]` を解釈する
///
/// 条件付き書式の場合は`true`を返します。
fn parse_bracket(content: &str, tokens: &mut Vec<FormatToken>) -> bool {
    let lower = content.to_ascii_lowercase();
    if let Some(unit) = lower.chars().next().filter(|c| matches!(c, 'h' | 'm' | 's')) {
        if lower.chars().all(|c| c == unit) {
            tokens.push(FormatToken::Elapsed(unit, lower.len()));
            return false;
        }
    }
    if content.starts_with(['<', '>', '=']) {
        return true;
    }
    if let Some(currency) = content.strip_prefix('$') {
        let symbol = currency.split('-').next().unwrap_or_default();
        if !symbol.is_empty() {
            push_literal(tokens, symbol);
        }
    }
    // 色指定やロケール指定は表示文字列に影響しない
    false
}

/// 桁プレースホルダーを持つセクションで数値を描画する（`value`は非負）
fn render_digits(value: f64, section: &FormatSection) -> Option<String> {
    let tokens = &section.tokens;
    if tokens.contains(&FormatToken::Exponent) {
        return None;
    }

    let point = tokens.iter().position(|t| *t == FormatToken::DecimalPoint);
    let int_region = &tokens[..point.unwrap_or(tokens.len())];
    let frac_region = point.map_or(&tokens[tokens.len()..], |p| &tokens[p + 1..]);

    let int_placeholders: Vec<&FormatToken> =
        int_region.iter().filter(|t| t.is_digit()).collect();
    let frac_placeholders: Vec<&FormatToken> =
        frac_region.iter().filter(|t| t.is_digit()).collect();

    // 最後の整数桁の直後のカンマは1000での除算
    let last_int_digit = int_region.iter().rposition(FormatToken::is_digit);
    let scale_commas = last_int_digit.map_or(0, |pos| {
        int_region[pos + 1..]
            .iter()
            .take_while(|t| **t == FormatToken::ThousandSeparator)
            .count()
    });
    let grouping = last_int_digit.is_some_and(|last| {
        int_region[..last]
            .iter()
            .any(|t| *t == FormatToken::ThousandSeparator)
    });

    let percents = tokens.iter().filter(|t| **t == FormatToken::Percent).count();
    let mut scaled = value * 100f64.powi(percents as i32);
    scaled /= 1000f64.powi(scale_commas as i32);

    // 0.5 は切り上げる
    let decimals = frac_placeholders.len();
    if decimals <= 15 {
        let factor = 10f64.powi(decimals as i32);
        scaled = (scaled * factor).round() / factor;
    }
    let fixed = format!("{:.*}", decimals, scaled);
    let (int_str, frac_str) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut int_text = integer_text(int_str, &int_placeholders);
    if grouping {
        let padding = int_text.len() - int_text.trim_start().len();
        int_text = format!(
            "{}{}",
            &int_text[..padding],
            add_thousand_separators(&int_text[padding..])
        );
    }
    let frac_text = fraction_text(frac_str, &frac_placeholders);

    let mut result = String::new();
    let mut int_emitted = false;
    let mut frac_emitted = false;
    for (index, token) in tokens.iter().enumerate() {
        let in_int = point.map_or(true, |p| index < p);
        match token {
            t if t.is_digit() && in_int => {
                if !int_emitted {
                    result.push_str(&int_text);
                    int_emitted = true;
                }
            }
            t if t.is_digit() => {
                if !frac_emitted {
                    result.push_str(&frac_text);
                    frac_emitted = true;
                }
            }
            FormatToken::DecimalPoint => {
                if !int_emitted {
                    result.push_str(&int_text);
                    int_emitted = true;
                }
                result.push('.');
            }
            FormatToken::Percent => result.push('%'),
            FormatToken::Literal(text) => result.push_str(text),
            _ => {}
        }
    }
    Some(result)
}

/// 整数部を右から桁プレースホルダーに割り当てる
fn integer_text(int_str: &str, placeholders: &[&FormatToken]) -> String {
    let digits: Vec<char> = if int_str == "0" {
        Vec::new()
    } else {
        int_str.chars().collect()
    };

    let mut reversed = Vec::new();
    let mut remaining = digits.len();
    for placeholder in placeholders.iter().rev() {
        if remaining > 0 {
            remaining -= 1;
            reversed.push(digits[remaining]);
        } else {
            match placeholder {
                FormatToken::DigitZero => reversed.push('0'),
                FormatToken::DigitSpace => reversed.push(' '),
                _ => {}
            }
        }
    }
    while remaining > 0 {
        remaining -= 1;
        reversed.push(digits[remaining]);
    }
    reversed.iter().rev().collect()
}

/// 小数部の末尾にある任意桁の0を取り除く
fn fraction_text(frac_str: &str, placeholders: &[&FormatToken]) -> String {
    let mut digits: Vec<Option<char>> = frac_str.chars().map(Some).collect();
    for (index, placeholder) in placeholders.iter().enumerate().rev() {
        if digits.get(index) != Some(&Some('0')) {
            break;
        }
        match placeholder {
            FormatToken::DigitHash => digits[index] = None,
            FormatToken::DigitSpace => digits[index] = Some(' '),
            _ => break,
        }
    }
    digits.into_iter().flatten().collect()
}

/// 千の位区切りを追加
fn add_thousand_separators(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut result = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, ch) in chars.iter().enumerate() {
        result.push(*ch);
        let remaining = chars.len() - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            result.push(',');
        }
    }
    result
}

/// シリアル値を日時に変換する
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;

    // 1900年エポックは存在しない 1900-02-29 を含む
    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if days < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::seconds(seconds))
}

fn padded(value: impl Into<i64>, width: usize) -> String {
    format!("{:0width$}", value.into(), width = width.min(2))
}

/// 日付・時刻セクションで描画する
fn render_datetime(serial: f64, section: &FormatSection, is_1904: bool) -> Option<String> {
    let datetime = serial_to_datetime(serial, is_1904)?;
    let twelve_hour = section.tokens.contains(&FormatToken::AmPm);
    let mut result = String::new();

    for token in &section.tokens {
        match token {
            FormatToken::Year(count) if *count <= 2 => {
                result.push_str(&format!("{:02}", datetime.year() % 100));
            }
            FormatToken::Year(_) => result.push_str(&format!("{:04}", datetime.year())),
            FormatToken::Month(count) => {
                let name = MONTH_NAMES[datetime.month0() as usize];
                match count {
                    1 | 2 => result.push_str(&padded(datetime.month(), *count)),
                    3 => result.push_str(&name[..3]),
                    5 => result.push_str(&name[..1]),
                    _ => result.push_str(name),
                }
            }
            FormatToken::Day(count) => {
                let name = DAY_NAMES[datetime.weekday().num_days_from_monday() as usize];
                match count {
                    1 | 2 => result.push_str(&padded(datetime.day(), *count)),
                    3 => result.push_str(&name[..3]),
                    _ => result.push_str(name),
                }
            }
            FormatToken::Hour(count) => {
                let hour = if twelve_hour {
                    match datetime.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    datetime.hour()
                };
                result.push_str(&padded(hour, *count));
            }
            FormatToken::Minute(count) => result.push_str(&padded(datetime.minute(), *count)),
            FormatToken::Second(count) => result.push_str(&padded(datetime.second(), *count)),
            FormatToken::Elapsed(unit, count) => {
                let per_day = match unit {
                    'h' => 24.0,
                    'm' => 1_440.0,
                    _ => 86_400.0,
                };
                let total = (serial * per_day + 1e-9).floor() as i64;
                result.push_str(&format!("{:0width$}", total, width = *count));
            }
            FormatToken::AmPm => {
                result.push_str(if datetime.hour() < 12 { "AM" } else { "PM" });
            }
            FormatToken::Literal(text) => result.push_str(text),
            _ => {}
        }
    }
    Some(result)
}
