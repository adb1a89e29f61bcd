//! Column header normalization
//!
//! SAS exports arrive with UPPERCASE or CamelCase headers; the pipeline works on
//! snake_case names.

use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical name of the calibration-period length column.
pub const T_CAL: &str = "T_cal";

static WORD_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("valid word boundary pattern"));
static CASE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid case boundary pattern"));

/// Convert a column header to snake case.
///
/// `T_CAL` and `t_cal` (exact spelling only) become `T_cal`, which is left untouched
/// on a second pass. Every other header goes through the camel-case splitter, so
/// e.g. `T_Cal` becomes `t__cal`.
pub fn normalize(name: &str) -> String {
    if matches!(name, "T_CAL" | "t_cal" | T_CAL) {
        return T_CAL.to_string();
    }

    let split_words = WORD_BOUNDARY.replace_all(name, "${1}_${2}");
    CASE_BOUNDARY
        .replace_all(&split_words, "${1}_${2}")
        .to_lowercase()
}
