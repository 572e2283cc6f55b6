mod cli;

pub use cli::{as_cli, print_usage};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a user supplied amount such as `-12.50`, `$1,000` or `+3`.
pub(crate) fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned = s.trim().replace(['$', ','], "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    Decimal::from_str(cleaned).with_context(|| format!("Invalid amount: {s}"))
}

/// The value following `flag`, e.g. `--carryover 20`.
pub(crate) fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Activity column of `show`: the amount, or `n/a` when it could not be read.
pub(crate) fn activity_cell(activity: &crate::Result<Decimal>) -> String {
    match activity {
        Ok(amount) => format!("{amount:.2}"),
        Err(_) => "n/a".to_string(),
    }
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
