//! Query text normalization.
//!
//! Canonicalizes a free-text fault description before it reaches any
//! retriever: trims, collapses whitespace, and maps known abbreviations and
//! misspellings to a canonical form. Fault codes and other alphanumeric
//! tokens pass through untouched since they are not natural-language words.

use std::collections::HashMap;
use std::sync::OnceLock;

fn abbreviation_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("刹车", "制动"),
            ("刹车片", "制动片"),
            ("脚刹", "制动踏板"),
            ("发动机盖", "发动机罩"),
            ("车灯", "大灯"),
            ("ABS", "防抱死制动系统"),
            ("ECU", "电子控制单元"),
            ("AC", "空调"),
        ])
    })
}

fn misspelling_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("发东机", "发动机"),
            ("离合气", "离合器"),
            ("变速想", "变速箱"),
        ])
    })
}

/// Collapse any run of ASCII/Unicode whitespace to a single space and trim
/// the ends.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Replace every whitespace-delimited token found in `table` with its
/// canonical value, leaving unrecognized tokens (including fault codes and
/// other alphanumeric identifiers) untouched.
fn apply_token_table(s: &str, table: &HashMap<&str, &str>) -> String {
    s.split(' ')
        .map(|token| table.get(token).copied().unwrap_or(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalize `query`.
///
/// Deterministic and idempotent: `normalize(normalize(q)) == normalize(q)`,
/// since neither table's output values are themselves input keys.
pub fn normalize(query: &str) -> String {
    let collapsed = collapse_whitespace(query);
    let abbreviations_applied = apply_token_table(&collapsed, abbreviation_table());
    apply_token_table(&abbreviations_applied, misspelling_table())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(normalize("  刹车   发软  "), "制动 发软");
    }

    #[test]
    fn maps_known_abbreviation() {
        assert_eq!(normalize("ABS 故障"), "防抱死制动系统 故障");
    }

    #[test]
    fn preserves_fault_codes() {
        assert_eq!(normalize("故障码 P0301 异常"), "故障码 P0301 异常");
    }

    #[test]
    fn is_idempotent() {
        let q = "  刹车   发软 ABS  ";
        let once = normalize(q);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_query_normalizes_to_empty_string() {
        assert_eq!(normalize("   "), "");
    }
}
