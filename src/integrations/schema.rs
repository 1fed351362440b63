use serde::Deserialize;

use crate::services::balance::normalize_balance;

/// A numeric field that providers send either as a JSON string or a JSON
/// number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlexNumber {
    Text(String),
    Number(serde_json::Number),
}

impl FlexNumber {
    pub fn raw(&self) -> String {
        match self {
            FlexNumber::Text(text) => text.trim().to_string(),
            FlexNumber::Number(number) => number.to_string(),
        }
    }

    /// Atomic or pre-scaled amount, normalized with `decimals`.
    pub fn scaled(&self, decimals: u32) -> f64 {
        normalize_balance(&self.raw(), decimals)
    }

    /// Value taken at face value, no decimal scaling.
    pub fn as_f64(&self) -> Option<f64> {
        let parsed = match self {
            FlexNumber::Text(text) => text.trim().parse::<f64>().ok(),
            FlexNumber::Number(number) => number.as_f64(),
        }?;
        parsed.is_finite().then_some(parsed)
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FlexNumber::Text(text) => text.trim().parse::<u32>().ok(),
            FlexNumber::Number(number) => number.as_u64().and_then(|v| u32::try_from(v).ok()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexNumber::Text(text) => text.trim().parse::<i64>().ok(),
            FlexNumber::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|v| v as i64)),
        }
    }
}

/// Face value of an optional numeric field, zero when missing or malformed.
pub fn face_value(value: Option<&FlexNumber>) -> f64 {
    value.and_then(FlexNumber::as_f64).unwrap_or(0.0)
}

/// Trims a provider string, treating blank values as missing.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        amount: FlexNumber,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let text: Holder = serde_json::from_str(r#"{"amount":"1000000"}"#).expect("text");
        let number: Holder = serde_json::from_str(r#"{"amount":1000000}"#).expect("number");
        assert_eq!(text.amount.scaled(6), 1.0);
        assert_eq!(number.amount.scaled(6), 1.0);
    }

    #[test]
    fn decimal_numbers_are_not_rescaled() {
        let holder: Holder = serde_json::from_str(r#"{"amount":12.5}"#).expect("decimal");
        assert_eq!(holder.amount.scaled(18), 12.5);
        assert_eq!(holder.amount.as_f64(), Some(12.5));
    }

    #[test]
    fn integers_beyond_u64_are_still_atomic() {
        let holder: Holder =
            serde_json::from_str(r#"{"amount":25000000000000000000}"#).expect("big integer");
        assert_eq!(holder.amount.scaled(18), 25.0);
    }

    #[test]
    fn integer_helpers_parse_both_shapes() {
        assert_eq!(FlexNumber::Text(" 18 ".into()).as_u32(), Some(18));
        assert_eq!(FlexNumber::Text("abc".into()).as_u32(), None);
        assert_eq!(FlexNumber::Text("1700000000".into()).as_i64(), Some(1_700_000_000));
        assert_eq!(face_value(None), 0.0);
    }

    #[test]
    fn non_empty_filters_blank_strings() {
        assert_eq!(non_empty(Some("  USDC ")), Some("USDC".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
