//! Convention-based column discovery
//!
//! Tables in this domain pair related columns by naming convention
//! (min1/max1, mod2min/mod2max, EMinLev1/EMaxLev1). Conventions are declared
//! as data and resolved against a header per call; matching is
//! case-insensitive on the convention keyword while the returned names keep
//! their original casing.

use crate::table::normalize_column;
use serde::{Deserialize, Serialize};

/// A declarative rule pairing a source column with a target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PairConvention {
    /// `source` keyword followed by digits, paired with `target` + the same
    /// digits: min1/max1, amin2/amax2
    PrefixNumber { source: String, target: String },
    /// Fixed `prefix`, digits, then the `source` keyword, paired with the
    /// same prefix and digits plus `target`: mod1min/mod1max
    NumberInfix {
        prefix: String,
        source: String,
        target: String,
    },
    /// `source` keyword followed by any suffix, paired with `target` + the
    /// same suffix: EMin/EMax, EMinLev1/EMaxLev1
    PrefixAny { source: String, target: String },
}

/// Resolve every (source, target) column pair a convention yields for the
/// given header. Pairs whose target column is absent are dropped.
pub fn paired_columns(header: &[String], convention: &PairConvention) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    match convention {
        PairConvention::PrefixNumber { source, target } => {
            let src = normalize_column(source);
            for col in header {
                let name = normalize_column(col);
                let Some(rest) = name.strip_prefix(src.as_str()) else {
                    continue;
                };
                if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
                    continue;
                }
                let wanted = format!("{}{}", normalize_column(target), rest);
                if let Some(t) = find_ci(header, &wanted) {
                    pairs.push((col.clone(), t.clone()));
                }
            }
        }
        PairConvention::NumberInfix {
            prefix,
            source,
            target,
        } => {
            let pre = normalize_column(prefix);
            let src = normalize_column(source);
            for col in header {
                let name = normalize_column(col);
                let Some(rest) = name.strip_prefix(pre.as_str()) else {
                    continue;
                };
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() || rest[digits.len()..] != src {
                    continue;
                }
                let wanted = format!("{}{}{}", pre, digits, normalize_column(target));
                if let Some(t) = find_ci(header, &wanted) {
                    pairs.push((col.clone(), t.clone()));
                }
            }
        }
        PairConvention::PrefixAny { source, target } => {
            let src = normalize_column(source);
            for col in header {
                let name = normalize_column(col);
                let Some(rest) = name.strip_prefix(src.as_str()) else {
                    continue;
                };
                let wanted = format!("{}{}", normalize_column(target), rest);
                if wanted == name {
                    continue;
                }
                if let Some(t) = find_ci(header, &wanted) {
                    pairs.push((col.clone(), t.clone()));
                }
            }
        }
    }
    pairs
}

/// All columns whose normalized name contains any of the given substrings
pub fn columns_containing(header: &[String], substrings: &[String]) -> Vec<String> {
    let wanted: Vec<String> = substrings.iter().map(|s| normalize_column(s)).collect();
    header
        .iter()
        .filter(|col| {
            let name = normalize_column(col);
            wanted.iter().any(|w| !w.is_empty() && name.contains(w.as_str()))
        })
        .cloned()
        .collect()
}

/// All columns whose normalized name starts with the given prefix,
/// in header order
pub fn columns_with_prefix(header: &[String], prefix: &str) -> Vec<String> {
    let pre = normalize_column(prefix);
    header
        .iter()
        .filter(|col| normalize_column(col).starts_with(pre.as_str()))
        .cloned()
        .collect()
}

fn find_ci<'a>(header: &'a [String], normalized: &str) -> Option<&'a String> {
    header.iter().find(|c| normalize_column(c) == normalized)
}
