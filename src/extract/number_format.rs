//! Displayed text for cell values
//!
//! Renders a value the way a spreadsheet viewer shows it under a number
//! format code: General, fixed/percent/scientific/thousands patterns,
//! literal text, multi-section codes (`pos;neg;zero;text`) and date/time
//! codes including elapsed time and Buddhist-era years. Fractions and
//! conditional sections are rendered as General / first section.

use crate::types::CellValue;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Built-in `numFmtId` codes (ECMA-376 Part 1, 18.8.30)
const BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

const MONTHS: [&str; 12] = [
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

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn builtin_format(id: u32) -> Option<&'static str> {
    BUILTIN_FORMATS
        .iter()
        .find(|(fmt_id, _)| *fmt_id == id)
        .map(|(_, code)| *code)
}

/// Whether the first section of a code renders dates/times
pub fn is_date_format(code: &str) -> bool {
    let sections = split_sections(code);
    let first = sections[0];
    !is_general(first) && is_date_section(&tokenize(first))
}

/// Displayed text for a value, `None` for empty cells
pub fn format_value(value: &CellValue, code: Option<&str>) -> Option<String> {
    let code = code.filter(|c| !c.trim().is_empty());
    match value {
        CellValue::Empty => None,
        CellValue::Boolean(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        CellValue::Error(e) => Some(e.clone()),
        CellValue::Text(s) => Some(match code {
            Some(code) => format_text(s, code),
            None => s.clone(),
        }),
        CellValue::Number(n) => Some(match code {
            Some(code) => format_number(*n, code),
            None => format_general(*n),
        }),
        CellValue::Date(dt) => Some(match code {
            Some(code) if is_date_format(code) => {
                let tokens = tokenize(split_sections(code)[0]);
                format_date_section(*dt, datetime_to_serial(*dt), &tokens)
            }
            Some(code) if !is_general(code) => format_number(datetime_to_serial(*dt), code),
            _ => default_date_text(*dt),
        }),
    }
}

/// Excel "General": integers as-is, up to ten significant digits otherwise
pub fn format_general(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if !(1e-9..1e11).contains(&abs) {
        let mut exp = abs.log10().floor() as i32;
        let mut mantissa = round_half_up(n / 10f64.powi(exp), 5);
        if mantissa.abs() >= 10.0 {
            mantissa = round_half_up(mantissa / 10.0, 5);
            exp += 1;
        }
        let sign = if exp < 0 { '-' } else { '+' };
        return format!(
            "{}E{}{:02}",
            trim_fraction(&format!("{:.5}", mantissa)),
            sign,
            exp.abs()
        );
    }

    let int_digits = if abs >= 1.0 {
        abs.log10().floor() as i32 + 1
    } else {
        0
    };
    let decimals = (10 - int_digits).clamp(0, 9) as usize;
    trim_fraction(&format!("{:.*}", decimals, round_half_up(n, decimals)))
}

/// Round half away from zero; `{:.N}` alone rounds exact halves to even
fn round_half_up(value: f64, decimals: usize) -> f64 {
    if decimals == 0 {
        return value.round();
    }
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Nearest whole second, for time codes that show no fraction of a second
fn round_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    let whole = dt.with_nanosecond(0).unwrap_or(dt);
    if dt.nanosecond() >= 500_000_000 {
        whole + Duration::seconds(1)
    } else {
        whole
    }
}

/// Excel serial day number to a datetime (1900 date system)
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Serials below 61 predate the phantom 1900-02-29
    let base = if serial < 61.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let total_ms = (serial * 86_400_000.0).round() as i64;
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(total_ms))
}

fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let serial = (dt - epoch).num_milliseconds() as f64 / 86_400_000.0;
    if serial < 61.0 {
        serial - 1.0
    } else {
        serial
    }
}

fn default_date_text(dt: NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn is_general(section: &str) -> bool {
    section.trim().eq_ignore_ascii_case("general")
}

//==============================================================================
// Tokenizing
//==============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Code(char),
    /// `[h]`, `[mm]`, `[ss]`
    Elapsed(char),
    /// `AM/PM` or `A/P`
    AmPm(bool),
}

/// Split on `;` outside quotes, escapes and brackets
fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;

    for (i, ch) in code.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            ';' if !in_quotes && !in_brackets => {
                sections.push(&code[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&code[start..]);
    sections
}

fn tokenize(section: &str) -> Vec<Token> {
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '"')
                    .map_or(chars.len(), |p| i + 1 + p);
                tokens.push(Token::Literal(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    tokens.push(Token::Literal(next.to_string()));
                }
                i += 2;
            }
            '_' => {
                tokens.push(Token::Literal(" ".to_string()));
                i += 2;
            }
            '*' => i += 2,
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ']')
                    .map_or(chars.len(), |p| i + 1 + p);
                let content: String = chars[i + 1..end].iter().collect();
                if let Some(token) = bracket_token(&content) {
                    tokens.push(token);
                }
                i = end + 1;
            }
            'A' | 'a' => {
                let long: String = chars[i..].iter().take(5).collect();
                let short: String = chars[i..].iter().take(3).collect();
                if long.eq_ignore_ascii_case("am/pm") {
                    tokens.push(Token::AmPm(true));
                    i += 5;
                } else if short.eq_ignore_ascii_case("a/p") {
                    tokens.push(Token::AmPm(false));
                    i += 3;
                } else {
                    tokens.push(Token::Code(ch));
                    i += 1;
                }
            }
            _ => {
                tokens.push(Token::Code(ch));
                i += 1;
            }
        }
    }

    tokens
}

/// Colors and conditions are dropped; `[$€-407]` keeps its symbol
fn bracket_token(content: &str) -> Option<Token> {
    if let Some(currency) = content.strip_prefix('$') {
        let symbol = currency.split('-').next().unwrap_or_default();
        return (!symbol.is_empty()).then(|| Token::Literal(symbol.to_string()));
    }
    let lower = content.to_ascii_lowercase();
    let first = lower.chars().next()?;
    if matches!(first, 'h' | 'm' | 's') && lower.chars().all(|c| c == first) {
        return Some(Token::Elapsed(first));
    }
    None
}

fn is_date_section(tokens: &[Token]) -> bool {
    tokens.iter().any(|t| match t {
        Token::Code(c) => matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's' | 'b'),
        Token::Elapsed(_) | Token::AmPm(_) => true,
        Token::Literal(_) => false,
    })
}

fn render_literals(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Literal(s) => Some(s.clone()),
            Token::Code(c) => Some(c.to_string()),
            _ => None,
        })
        .collect()
}

//==============================================================================
// Numbers
//==============================================================================

fn format_number(n: f64, code: &str) -> String {
    let sections = split_sections(code);

    let (section, auto_minus) = if n < 0.0 && sections.len() >= 2 {
        (sections[1], false)
    } else if n == 0.0 && sections.len() >= 3 {
        (sections[2], false)
    } else {
        (sections[0], n < 0.0)
    };

    if is_general(section) {
        return if auto_minus || sections.len() < 2 {
            format_general(n)
        } else {
            format_general(n.abs())
        };
    }

    let tokens = tokenize(section);
    if is_date_section(&tokens) {
        return match serial_to_datetime(n) {
            Some(dt) => format_date_section(dt, n, &tokens),
            None => format_general(n),
        };
    }

    let rendered = format_number_section(n.abs(), &tokens);
    if auto_minus && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", rendered)
    } else {
        rendered
    }
}

fn is_placeholder(token: &Token) -> bool {
    matches!(token, Token::Code('0' | '#' | '?'))
}

fn format_number_section(value: f64, tokens: &[Token]) -> String {
    let (Some(first), Some(last)) = (
        tokens.iter().position(is_placeholder),
        tokens.iter().rposition(is_placeholder),
    ) else {
        return render_literals(tokens);
    };

    let mut start = first;
    if start > 0 && tokens[start - 1] == Token::Code('.') {
        start -= 1;
    }
    let mut end = last;
    while matches!(tokens.get(end + 1), Some(Token::Code(',' | '.'))) {
        end += 1;
    }

    let percent = tokens.iter().filter(|t| **t == Token::Code('%')).count();
    let mut v = value;
    for _ in 0..percent {
        v *= 100.0;
    }

    let mut pattern: String = tokens[start..=end]
        .iter()
        .filter_map(|t| match t {
            Token::Code(c) => Some(*c),
            _ => None,
        })
        .collect();
    while pattern.ends_with(',') {
        pattern.pop();
        v /= 1000.0;
    }

    let body = match pattern.find(['E', 'e']) {
        Some(pos) => {
            let mantissa = &pattern[..pos];
            let exponent = &pattern[pos + 1..];
            let plus = exponent.starts_with('+');
            let digits = exponent.chars().filter(|c| matches!(c, '0' | '#' | '?')).count();
            format_scientific(v, mantissa, digits, plus)
        }
        None => format_fixed(v, &pattern),
    };

    format!(
        "{}{}{}",
        render_literals(&tokens[..start]),
        body,
        render_literals(&tokens[end + 1..])
    )
}

fn format_fixed(v: f64, pattern: &str) -> String {
    let (int_pat, frac_pat) = pattern.split_once('.').unwrap_or((pattern, ""));
    let grouping = int_pat.contains(',');
    let min_int = int_pat.chars().filter(|c| *c == '0').count();
    let min_frac = frac_pat.chars().filter(|c| *c == '0').count();
    let max_frac = frac_pat
        .chars()
        .filter(|c| matches!(c, '0' | '#' | '?'))
        .count();

    let rounded = format!("{:.*}", max_frac, round_half_up(v, max_frac));
    let (int_digits, frac_digits) = rounded.split_once('.').unwrap_or((&rounded, ""));

    let mut frac = frac_digits.to_string();
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let mut int = int_digits.trim_start_matches('0').to_string();
    while int.len() < min_int {
        int.insert(0, '0');
    }
    if grouping {
        int = group_thousands(&int);
    }

    if pattern.contains('.') {
        format!("{}.{}", int, frac)
    } else {
        int
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_scientific(v: f64, mantissa_pat: &str, exp_digits: usize, plus: bool) -> String {
    let frac_places = mantissa_pat
        .split_once('.')
        .map_or(0, |(_, f)| f.chars().filter(|c| matches!(c, '0' | '#' | '?')).count());

    let mut exponent = if v == 0.0 {
        0
    } else {
        v.log10().floor() as i32
    };
    let mut mantissa = if v == 0.0 {
        0.0
    } else {
        v / 10f64.powi(exponent)
    };
    let scale = 10f64.powi(frac_places as i32);
    if (mantissa * scale).round() / scale >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }

    let sign = if exponent < 0 {
        "-"
    } else if plus {
        "+"
    } else {
        ""
    };
    format!(
        "{}E{}{:0width$}",
        format_fixed(mantissa, mantissa_pat),
        sign,
        exponent.abs(),
        width = exp_digits.max(1)
    )
}

//==============================================================================
// Text
//==============================================================================

fn format_text(text: &str, code: &str) -> String {
    let sections = split_sections(code);
    let section = if sections.len() >= 4 {
        sections[3]
    } else if sections[0].contains('@') {
        sections[0]
    } else {
        return text.to_string();
    };

    tokenize(section)
        .iter()
        .filter_map(|t| match t {
            Token::Literal(s) => Some(s.clone()),
            Token::Code('@') => Some(text.to_string()),
            Token::Code(c) => Some(c.to_string()),
            _ => None,
        })
        .collect()
}

//==============================================================================
// Dates
//==============================================================================

#[derive(Debug, Clone, PartialEq)]
enum DatePart {
    Year(usize),
    BuddhistYear(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    SubSecond(usize),
    Elapsed(char),
    AmPm(bool),
    Literal(String),
}

fn date_parts(tokens: &[Token]) -> Vec<DatePart> {
    let mut parts: Vec<DatePart> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Code(c) if matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's' | 'b') => {
                let lower = c.to_ascii_lowercase();
                let run = tokens[i..]
                    .iter()
                    .take_while(|t| matches!(t, Token::Code(x) if x.to_ascii_lowercase() == lower))
                    .count();
                parts.push(match lower {
                    'y' => DatePart::Year(run),
                    'b' => DatePart::BuddhistYear(run),
                    'm' => DatePart::Month(run),
                    'd' => DatePart::Day(run),
                    'h' => DatePart::Hour(run),
                    _ => DatePart::Second(run),
                });
                i += run;
            }
            Token::Code('.')
                if matches!(parts.last(), Some(DatePart::Second(_)))
                    && tokens.get(i + 1) == Some(&Token::Code('0')) =>
            {
                let run = tokens[i + 1..]
                    .iter()
                    .take_while(|t| **t == Token::Code('0'))
                    .count();
                parts.push(DatePart::SubSecond(run));
                i += run + 1;
            }
            Token::Code(c) => {
                parts.push(DatePart::Literal(c.to_string()));
                i += 1;
            }
            Token::Literal(s) => {
                parts.push(DatePart::Literal(s.clone()));
                i += 1;
            }
            Token::Elapsed(c) => {
                parts.push(DatePart::Elapsed(*c));
                i += 1;
            }
            Token::AmPm(full) => {
                parts.push(DatePart::AmPm(*full));
                i += 1;
            }
        }
    }

    // `m`/`mm` next to hours or seconds means minutes
    for idx in 0..parts.len() {
        let DatePart::Month(n) = parts[idx] else {
            continue;
        };
        if n > 2 {
            continue;
        }
        let prev = parts[..idx]
            .iter()
            .rev()
            .find(|p| !matches!(p, DatePart::Literal(_)));
        let next = parts[idx + 1..]
            .iter()
            .find(|p| !matches!(p, DatePart::Literal(_)));
        let after_hour = matches!(prev, Some(DatePart::Hour(_) | DatePart::Elapsed('h')));
        let before_second = matches!(next, Some(DatePart::Second(_) | DatePart::Elapsed('s')));
        if after_hour || before_second {
            parts[idx] = DatePart::Minute(n);
        }
    }

    parts
}

fn pad(value: u32, width: usize) -> String {
    if width >= 2 {
        format!("{:02}", value)
    } else {
        value.to_string()
    }
}

fn format_year(year: i32, width: usize) -> String {
    if width <= 2 {
        format!("{:02}", year.rem_euclid(100))
    } else {
        year.to_string()
    }
}

fn format_date_section(dt: NaiveDateTime, serial: f64, tokens: &[Token]) -> String {
    let parts = date_parts(tokens);
    let (dt, serial) = if parts.iter().any(|p| matches!(p, DatePart::SubSecond(_))) {
        (dt, serial)
    } else {
        (round_to_second(dt), (serial * 86_400.0).round() / 86_400.0)
    };
    let twelve_hour = parts.iter().any(|p| matches!(p, DatePart::AmPm(_)));
    let mut out = String::new();

    for part in &parts {
        match part {
            DatePart::Year(n) => out.push_str(&format_year(dt.year(), *n)),
            DatePart::BuddhistYear(n) => out.push_str(&format_year(dt.year() + 543, *n)),
            DatePart::Month(n) => {
                let name = MONTHS[dt.month0() as usize];
                match n {
                    1 | 2 => out.push_str(&pad(dt.month(), *n)),
                    3 => out.push_str(&name[..3]),
                    4 => out.push_str(name),
                    _ => out.push_str(&name[..1]),
                }
            }
            DatePart::Minute(n) => out.push_str(&pad(dt.minute(), *n)),
            DatePart::Day(n) => {
                let name = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
                match n {
                    1 | 2 => out.push_str(&pad(dt.day(), *n)),
                    3 => out.push_str(&name[..3]),
                    _ => out.push_str(name),
                }
            }
            DatePart::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour()
                };
                out.push_str(&pad(hour, *n));
            }
            DatePart::Second(n) => out.push_str(&pad(dt.second(), *n)),
            DatePart::SubSecond(n) => {
                let millis = format!("{:03}", dt.nanosecond() / 1_000_000 % 1000);
                out.push('.');
                out.push_str(&millis[..(*n).min(3)]);
            }
            DatePart::Elapsed(unit) => {
                let per_day = match unit {
                    'h' => 24.0,
                    'm' => 1_440.0,
                    _ => 86_400.0,
                };
                out.push_str(&((serial * per_day).floor() as i64).to_string());
            }
            DatePart::AmPm(full) => {
                let pm = dt.hour() >= 12;
                out.push_str(match (full, pm) {
                    (true, false) => "AM",
                    (true, true) => "PM",
                    (false, false) => "A",
                    (false, true) => "P",
                });
            }
            DatePart::Literal(s) => out.push_str(s),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64, code: &str) -> String {
        format_value(&CellValue::Number(n), Some(code)).unwrap()
    }

    #[test]
    fn test_builtin_format_lookup() {
        assert_eq!(builtin_format(0), Some("General"));
        assert_eq!(builtin_format(10), Some("0.00%"));
        assert_eq!(builtin_format(49), Some("@"));
        assert_eq!(builtin_format(164), None);
    }

    #[test]
    fn test_general() {
        assert_eq!(format_general(2.0), "2");
        assert_eq!(format_general(-15.5), "-15.5");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(1.0 / 3.0), "0.333333333");
        assert_eq!(format_general(123456789012.0), "1.23457E+11");
        assert_eq!(format_general(0.0), "0");
    }

    #[test]
    fn test_fixed_and_thousands() {
        assert_eq!(num(1234.567, "0"), "1235");
        assert_eq!(num(1234.567, "0.00"), "1234.57");
        assert_eq!(num(1234567.891, "#,##0.00"), "1,234,567.89");
        assert_eq!(num(0.5, "#.00"), ".50");
        assert_eq!(num(5.0, "000"), "005");
        assert_eq!(num(1_500_000.0, "#,##0,\"K\""), "1,500K");
    }

    #[test]
    fn test_percent_and_scientific() {
        assert_eq!(num(0.256, "0%"), "26%");
        assert_eq!(num(0.256, "0.00%"), "25.60%");
        assert_eq!(num(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(num(0.00012, "0.00E+00"), "1.20E-04");
    }

    #[test]
    fn test_exact_halves_round_away_from_zero() {
        assert_eq!(num(2.5, "0"), "3");
        assert_eq!(num(0.125, "0.00"), "0.13");
        assert_eq!(num(0.125, "0%"), "13%");
        assert_eq!(num(84.5, "#,##0"), "85");
        assert_eq!(num(-2.5, "0"), "-3");
        assert_eq!(num(2.5, "0.0E+00"), "2.5E+00");
        assert_eq!(num(12.5, "0E+0"), "1E+1");
        assert_eq!(format_general(12345678.125), "12345678.13");
        assert_eq!(format_general(-12345678.125), "-12345678.13");
    }

    #[test]
    fn test_empty_negative_section_hides_negatives() {
        assert_eq!(num(-5.0, "0;"), "");
        assert_eq!(num(5.0, "0;"), "5");
        assert_eq!(num(0.0, "0;"), "0");
        assert_eq!(num(-5.0, "0;;0"), "");
    }

    #[test]
    fn test_sections_and_negatives() {
        assert_eq!(num(-1234.0, "#,##0;(#,##0)"), "(1,234)");
        assert_eq!(num(-1234.0, "#,##0"), "-1,234");
        assert_eq!(num(0.0, "0.00;-0.00;\"zero\""), "zero");
        assert_eq!(num(-5.0, "#,##0 ;[Red](#,##0)"), "(5)");
    }

    #[test]
    fn test_literals_and_currency() {
        assert_eq!(num(12.5, "\"$\"#,##0.00"), "$12.50");
        assert_eq!(num(12.5, "[$€-407]#,##0.00"), "€12.50");
        assert_eq!(num(3.0, "0\\ \"pcs\""), "3 pcs");
        assert_eq!(num(7.0, "0_)"), "7 ");
    }

    #[test]
    fn test_text_sections() {
        let text = CellValue::Text("abc".to_string());
        assert_eq!(format_value(&text, Some("@")).unwrap(), "abc");
        assert_eq!(format_value(&text, Some("0;0;0;\"<\"@\">\"")).unwrap(), "<abc>");
        assert_eq!(format_value(&text, Some("0.00")).unwrap(), "abc");
    }

    #[test]
    fn test_date_detection() {
        assert!(is_date_format("yyyy-mm-dd"));
        assert!(is_date_format("[h]:mm:ss"));
        assert!(is_date_format("h:mm AM/PM"));
        assert!(!is_date_format("0.00"));
        assert!(!is_date_format("General"));
        assert!(!is_date_format("\"days\" 0"));
        assert!(!is_date_format("[Red]#,##0"));
    }

    #[test]
    fn test_serial_dates() {
        let dt = serial_to_datetime(45429.0).unwrap();
        assert_eq!(dt.to_string(), "2024-05-17 00:00:00");
        assert_eq!(serial_to_datetime(1.0).unwrap().to_string(), "1900-01-01 00:00:00");
        assert_eq!(num(45429.5, "yyyy-mm-dd hh:mm"), "2024-05-17 12:00");
        assert_eq!(num(45429.0, "d-mmm-yy"), "17-May-24");
        assert_eq!(num(45429.0, "dddd, mmmm d"), "Friday, May 17");
        assert_eq!(num(45429.0, "dd/mm/bbbb"), "17/05/2567");
    }

    #[test]
    fn test_times() {
        assert_eq!(num(0.75, "h:mm AM/PM"), "6:00 PM");
        assert_eq!(num(0.5 + 1.0 / 86_400.0 * 5.0, "hh:mm:ss"), "12:00:05");
        assert_eq!(num(1.5, "[h]:mm"), "36:00");
        assert_eq!(num(0.0, "mm:ss"), "00:00");
    }

    #[test]
    fn test_times_round_to_nearest_second() {
        let noon_and_nine_tenths = 0.5 + 0.9 / 86_400.0;
        assert_eq!(num(noon_and_nine_tenths, "hh:mm:ss"), "12:00:01");
        assert_eq!(num(noon_and_nine_tenths, "hh:mm:ss.0"), "12:00:00.9");
        assert_eq!(num(0.5 + 0.4 / 86_400.0, "hh:mm:ss"), "12:00:00");

        let almost_midnight = 1.0 - 0.2 / 86_400.0;
        assert_eq!(num(almost_midnight, "[h]:mm:ss"), "24:00:00");

        let dt = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 600)
            .unwrap();
        assert_eq!(
            format_value(&CellValue::Date(dt), Some("yyyy-mm-dd hh:mm:ss")).unwrap(),
            "2024-05-18 00:00:00"
        );
    }

    #[test]
    fn test_date_value_rendering() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let value = CellValue::Date(dt);
        assert_eq!(format_value(&value, Some("yyyy-mm-dd")).unwrap(), "2024-05-17");
        assert_eq!(format_value(&value, None).unwrap(), "2024-05-17");
        assert_eq!(format_value(&value, Some("0")).unwrap(), "45429");
    }

    #[test]
    fn test_empty_booleans_and_errors() {
        assert_eq!(format_value(&CellValue::Empty, Some("0.00")), None);
        assert_eq!(format_value(&CellValue::Boolean(true), None).unwrap(), "TRUE");
        assert_eq!(
            format_value(&CellValue::Error("#DIV/0!".to_string()), None).unwrap(),
            "#DIV/0!"
        );
        assert_eq!(
            format_value(&CellValue::Text(String::new()), None),
            Some(String::new())
        );
    }
}
