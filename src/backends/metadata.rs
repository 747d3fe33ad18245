//! Metadata encoded in weights file names.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

lazy_static! {
    /// Parameter count in billions, delimited on both sides: `-7b-`, `.13b.`.
    static ref SIZE_PATTERN: Regex = Regex::new(r"(\.|-|_)(\d+)b(\.|-|_)").expect("size pattern is valid");
    /// GGUF-style quantization tag: `.q4_k_m`, `.q8_0`.
    static ref QUANT_PATTERN: Regex = Regex::new(r"\.(q\d(_[a-z0-9])+)").expect("quant pattern is valid");
}

/// Parameter count (billions) and quantization tag parsed from a weights
/// file name. Missing values are logged and returned as `None`.
pub fn parse_size_and_quant(file_name: &str) -> (Option<String>, Option<String>) {
    let lowered = file_name.to_lowercase();

    let size = SIZE_PATTERN
        .captures(&lowered)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string());
    let quant = QUANT_PATTERN
        .captures(&lowered)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if size.is_none() {
        warn!("Could not determine model size from model name {}", file_name);
    }
    if quant.is_none() {
        warn!("Could not determine quant from model name {}", file_name);
    }

    (size, quant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_and_quant() {
        let (size, quant) = parse_size_and_quant("mistral-7b-instruct-v0.2.Q4_K_M.gguf");
        assert_eq!(size.as_deref(), Some("7"));
        assert_eq!(quant.as_deref(), Some("q4_k_m"));

        let (size, quant) = parse_size_and_quant("mythomax-l2-13b.Q8_0.gguf");
        assert_eq!(size.as_deref(), Some("13"));
        assert_eq!(quant.as_deref(), Some("q8_0"));
    }

    #[test]
    fn test_parse_size_and_quant_missing() {
        assert_eq!(parse_size_and_quant("model.bin"), (None, None));
    }
}
