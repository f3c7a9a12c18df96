//! Magnitude formatting. The exact strings matter: they end up verbatim in
//! the narrative.

use crate::config::CURRENCY_SYMBOL;

/// Compact forms go in tables (`£2.8bn`), prose forms in sentences
/// (`£2.8 billion`).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Style {
    Compact,
    Prose,
}

/// An amount already expressed in billions.
pub fn billions(x: f64, style: Style) -> String {
    match style {
        Style::Compact => format!("{}{:.1}bn", CURRENCY_SYMBOL, x.abs()),
        Style::Prose => format!("{}{:.1} billion", CURRENCY_SYMBOL, x.abs()),
    }
}

/// A head count, shown in millions.
pub fn millions(x: f64, style: Style) -> String {
    let m = x.abs() / 1e6;
    match style {
        Style::Compact => format!("{:.1}m", m),
        Style::Prose => format!("{:.1} million", m),
    }
}

/// One decimal place. The sign is kept as given.
pub fn percent(x: f64) -> String {
    format!("{:.1}%", x)
}

/// Whole pounds, without sign.
pub fn currency(x: f64) -> String {
    format!("{}{:.0}", CURRENCY_SYMBOL, x.abs())
}

/// Whole pounds with a leading minus for losses, for tables.
pub fn signed_currency(x: f64) -> String {
    if x < 0.0 && currency(x) != currency(0.0) {
        format!("-{}", currency(x))
    } else {
        currency(x)
    }
}

/// A percentage-point delta with an explicit sign, e.g. `+0.1`.
pub fn signed_pp(x: f64) -> String {
    let s = format!("{:+.1}", x);
    // Negative zero after rounding reads as a loss.
    if s == "-0.0" {
        "+0.0".to_string()
    } else {
        s
    }
}

const ORDINALS: [&str; 10] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Ordinal word for a decile number. Outside 1..=10 this falls back to
/// `<n>th`, which is only right for some numbers.
pub fn ordinal(n: u32) -> String {
    match n {
        1..=10 => ORDINALS[(n - 1) as usize].to_string(),
        _ => format!("{}th", n),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
