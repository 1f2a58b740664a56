//! Symbol classification and normalization.
//!
//! Inspects raw user input and produces the ordered list of candidates the
//! orchestrator will try. Classification never performs I/O: an input that
//! matches no known shape fails here, before any provider is contacted.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::errors::DataSourceError;
use crate::models::AssetType;

/// One resolution candidate: the symbol rewritten for downstream
/// providers, plus the asset category it should be tried as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub symbol: String,
    pub asset_type: AssetType,
}

impl Candidate {
    fn new(symbol: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            symbol: symbol.into(),
            asset_type,
        }
    }
}

lazy_static! {
    /// Precious-metal alias table. Keys are what users type, values are
    /// the Shanghai Gold Exchange variety codes the spot feed reports.
    static ref METAL_ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("Au999", "Au99.99");
        m.insert("黄金", "Au99.99");
        m.insert("Au99.99", "Au99.99");
        m.insert("Ag999", "Ag99.99");
        m.insert("Ag99.9", "Ag99.99");
        m.insert("白银", "Ag99.99");
        m.insert("Ag99.99", "Ag99.99");
        m
    };
}

/// Quote currencies the crypto adapter walks when the default pair is not
/// listed, in order.
pub const CRYPTO_QUOTE_CASCADE: &[&str] = &["USDT", "USDC", "BTC", "ETH"];

/// Resolve a metal alias to its canonical variety code.
pub fn canonical_metal_variety(code: &str) -> Option<&'static str> {
    METAL_ALIASES.get(code).copied()
}

/// True when the input is exactly six ASCII digits - the shape shared by
/// open-end fund codes and A-share tickers.
pub fn is_six_digit_code(input: &str) -> bool {
    input.len() == 6 && input.bytes().all(|b| b.is_ascii_digit())
}

/// Rewrite a six-digit A-share code with its exchange suffix.
///
/// Leading `6`/`5` trade on Shanghai (`.SS`), leading `0`/`3`/`1` on
/// Shenzhen (`.SZ`). Any other leading digit is passed through unchanged.
pub fn normalize_a_share(code: &str) -> String {
    if !is_six_digit_code(code) {
        return code.to_string();
    }
    match code.as_bytes()[0] {
        b'6' | b'5' => format!("{}.SS", code),
        b'0' | b'3' | b'1' => format!("{}.SZ", code),
        _ => code.to_string(),
    }
}

/// Classify raw user input into an ordered candidate list.
///
/// The first candidate is tried first; for a six-digit code without a
/// contradicting hint the fund candidate always precedes the normalized
/// equity candidate - that fallback order is mandatory.
pub fn classify(
    input: &str,
    hint: Option<AssetType>,
) -> Result<Vec<Candidate>, DataSourceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DataSourceError::Unrecognized {
            input: input.to_string(),
        });
    }

    match hint {
        Some(AssetType::Fund) => Ok(vec![Candidate::new(trimmed, AssetType::Fund)]),
        Some(asset_type @ (AssetType::Stock | AssetType::Etf)) => {
            let symbol = if is_six_digit_code(trimmed) {
                normalize_a_share(trimmed)
            } else {
                trimmed.to_string()
            };
            Ok(vec![Candidate::new(symbol, asset_type)])
        }
        Some(AssetType::Crypto) => Ok(vec![Candidate::new(
            trimmed.to_uppercase(),
            AssetType::Crypto,
        )]),
        Some(AssetType::Metal) => match canonical_metal_variety(trimmed) {
            Some(variety) => Ok(vec![Candidate::new(variety, AssetType::Metal)]),
            None => Err(DataSourceError::Unrecognized {
                input: trimmed.to_string(),
            }),
        },
        Some(AssetType::RealEstate) => {
            Ok(vec![Candidate::new(trimmed, AssetType::RealEstate)])
        }
        // No usable hint: six digits fan out to fund-then-equity,
        // everything else is treated as a global equity/ETF ticker as-is.
        _ => {
            if is_six_digit_code(trimmed) {
                Ok(vec![
                    Candidate::new(trimmed, AssetType::Fund),
                    Candidate::new(normalize_a_share(trimmed), AssetType::Stock),
                ])
            } else {
                Ok(vec![Candidate::new(trimmed, AssetType::Stock)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_digit_produces_fund_then_equity() {
        let candidates = classify("600519", None).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], Candidate::new("600519", AssetType::Fund));
        assert_eq!(
            candidates[1],
            Candidate::new("600519.SS", AssetType::Stock)
        );
    }

    #[test]
    fn test_shanghai_suffix_rule() {
        assert_eq!(normalize_a_share("600519"), "600519.SS");
        assert_eq!(normalize_a_share("510300"), "510300.SS");
    }

    #[test]
    fn test_shenzhen_suffix_rule() {
        assert_eq!(normalize_a_share("000001"), "000001.SZ");
        assert_eq!(normalize_a_share("300750"), "300750.SZ");
        assert_eq!(normalize_a_share("159915"), "159915.SZ");
    }

    #[test]
    fn test_unmapped_leading_digit_passes_through() {
        assert_eq!(normalize_a_share("900001"), "900001");
    }

    #[test]
    fn test_alphabetic_ticker_is_single_equity_candidate() {
        let candidates = classify("AAPL", None).unwrap();
        assert_eq!(candidates, vec![Candidate::new("AAPL", AssetType::Stock)]);
    }

    #[test]
    fn test_stock_hint_normalizes_six_digits() {
        let candidates = classify("600519", Some(AssetType::Stock)).unwrap();
        assert_eq!(
            candidates,
            vec![Candidate::new("600519.SS", AssetType::Stock)]
        );
    }

    #[test]
    fn test_etf_hint_keeps_etf_type() {
        let candidates = classify("510300", Some(AssetType::Etf)).unwrap();
        assert_eq!(candidates, vec![Candidate::new("510300.SS", AssetType::Etf)]);
    }

    #[test]
    fn test_crypto_hint_uppercases_base() {
        let candidates = classify("btc", Some(AssetType::Crypto)).unwrap();
        assert_eq!(candidates, vec![Candidate::new("BTC", AssetType::Crypto)]);
    }

    #[test]
    fn test_metal_aliases_converge() {
        for alias in ["Au999", "黄金", "Au99.99"] {
            let candidates = classify(alias, Some(AssetType::Metal)).unwrap();
            assert_eq!(
                candidates,
                vec![Candidate::new("Au99.99", AssetType::Metal)]
            );
        }
        for alias in ["Ag999", "Ag99.9", "白银"] {
            let candidates = classify(alias, Some(AssetType::Metal)).unwrap();
            assert_eq!(
                candidates,
                vec![Candidate::new("Ag99.99", AssetType::Metal)]
            );
        }
    }

    #[test]
    fn test_unknown_metal_is_classification_error() {
        let err = classify("Pt950", Some(AssetType::Metal)).unwrap_err();
        assert!(matches!(err, DataSourceError::Unrecognized { .. }));
    }

    #[test]
    fn test_blank_input_is_classification_error() {
        let err = classify("   ", None).unwrap_err();
        assert!(matches!(err, DataSourceError::Unrecognized { .. }));
    }
}
