//! Vietnamese number formatting (`1.234.567,5`) and loan schedules.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const CURRENCY_SUFFIXES: &[&str] = &["₫", "vnđ", "vnd", "đồng", "đ"];

fn strip_currency(text: &str) -> &str {
    let t = text.trim();
    let lower = t.to_lowercase();
    for suffix in CURRENCY_SUFFIXES {
        if lower.ends_with(suffix) && lower.len() == t.len() {
            return t[..t.len() - suffix.len()].trim_end();
        }
    }
    t
}

fn valid_groups(groups: &[&str]) -> bool {
    match groups.split_first() {
        Some((first, rest)) => {
            (1..=3).contains(&first.len()) && rest.iter().all(|g| g.len() == 3)
        }
        None => false,
    }
}

/// Parses amounts typed the Vietnamese or the English way.
///
/// With both `.` and `,` present the last one is the decimal mark. A single
/// separator kind is grouping when repeated or followed by exactly three
/// digits (`1.500` is fifteen hundred), decimal otherwise.
pub fn parse_amount(text: &str) -> Option<f64> {
    let t = strip_currency(text);
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, t),
    };

    let compact: String = t
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let (int_part, frac_part, group_sep) = match (last_dot, last_comma) {
        (None, None) => (compact.as_str(), "", None),
        (Some(d), Some(c)) => {
            let (dec, grp) = if d > c { (d, ',') } else { (c, '.') };
            (&compact[..dec], &compact[dec + 1..], Some(grp))
        }
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = compact.as_bytes()[pos] as char;
            let repeated = compact.matches(sep).count() > 1;
            let tail = &compact[pos + 1..];
            if repeated || tail.len() == 3 {
                (compact.as_str(), "", Some(sep))
            } else {
                (&compact[..pos], tail, None)
            }
        }
    };

    let digits = match group_sep {
        Some(sep) => {
            let groups: Vec<&str> = int_part.split(sep).collect();
            if !valid_groups(&groups) {
                return None;
            }
            groups.concat()
        }
        None => int_part.to_string(),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if frac_part.is_empty() {
        digits
    } else {
        format!("{digits}.{frac_part}")
    };
    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// `1234567.891, 2` -> `1.234.567,89`.
pub fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if value < 0.0 && formatted.chars().any(|c| matches!(c, '1'..='9')) {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push(',');
        out.push_str(f);
    }
    out
}

pub fn format_vnd(amount: f64) -> String {
    format!("{} ₫", format_number(amount.round(), 0))
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentMethod {
    /// Equal monthly installments.
    Annuity,
    /// Equal principal, interest on the remaining balance ("dư nợ giảm dần").
    Declining,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScheduleRow {
    pub period: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Schedule {
    pub method: RepaymentMethod,
    pub total_payment: f64,
    pub total_interest: f64,
    pub rows: Vec<ScheduleRow>,
}

/// Fifty years; longer terms are rejected before any row is built.
pub const MAX_MONTHS: u32 = 600;

/// Monthly schedule in whole currency units; the last row absorbs rounding.
pub fn amortize(
    principal: f64,
    annual_rate_percent: f64,
    months: u32,
    method: RepaymentMethod,
) -> Result<Schedule, CoreError> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(CoreError::invalid("Số tiền vay phải lớn hơn 0"));
    }
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(CoreError::invalid("Lãi suất không hợp lệ"));
    }
    if months == 0 || months > MAX_MONTHS {
        return Err(CoreError::invalid(format!(
            "Kỳ hạn phải từ 1 đến {MAX_MONTHS} tháng"
        )));
    }

    let r = annual_rate_percent / 12.0 / 100.0;
    let n = f64::from(months);
    let principal = principal.round();

    let annuity_payment = if r == 0.0 {
        principal / n
    } else {
        principal * r / (1.0 - (1.0 + r).powf(-n))
    };
    let fixed_principal = (principal / n).round();

    let mut balance = principal;
    let mut rows = Vec::with_capacity(months as usize);

    for period in 1..=months {
        let interest = (balance * r).round();
        let mut principal_part = match method {
            RepaymentMethod::Annuity => (annuity_payment - interest).round(),
            RepaymentMethod::Declining => fixed_principal,
        };
        if period == months || principal_part > balance {
            principal_part = balance;
        }

        balance -= principal_part;
        rows.push(ScheduleRow {
            period,
            payment: principal_part + interest,
            principal: principal_part,
            interest,
            balance,
        });
    }

    let total_payment = rows.iter().map(|r| r.payment).sum();
    let total_interest = rows.iter().map(|r| r.interest).sum();

    Ok(Schedule {
        method,
        total_payment,
        total_interest,
        rows,
    })
}
