//! Field-level and transaction-level similarity scores in [0.0, 1.0].
//!
//! Two absent values of the same field count as equal (1.0); an absent value
//! never matches a present one (0.0).

use crate::levenshtein;
use crate::models::{CurrencyAmount, Transaction, TransactionCategory};

pub const COUNTERPARTY_WEIGHT: f64 = 0.2;
pub const IBAN_WEIGHT: f64 = 0.2;
pub const BIC_WEIGHT: f64 = 0.2;
pub const BOOKING_TEXT_WEIGHT: f64 = 0.2;
pub const USAGE_TEXT_WEIGHT: f64 = 0.3;
pub const CATEGORY_WEIGHT: f64 = 0.1;
pub const TAGS_WEIGHT: f64 = 0.1;
pub const AMOUNT_WEIGHT: f64 = 0.2;

pub fn text_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    if a == b {
        return 1.0;
    }
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let max_len = a.chars().count().max(b.chars().count()) as f64;
    (max_len - levenshtein::distance(a, b) as f64) / max_len
}

pub fn category_similarity(a: Option<TransactionCategory>, b: Option<TransactionCategory>) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Decays smoothly with the absolute difference and never reaches zero.
pub fn numeric_similarity(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (None, None) => 1.0,
        (Some(a), Some(b)) => 1.0 / ((a - b).abs() + 1.0),
        _ => 0.0,
    }
}

/// Mean of the positional text similarities; the shorter list is padded with
/// absent entries.
pub fn tags_similarity(a: &[String], b: &[String]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 1.0;
    }
    let total: f64 = (0..len)
        .map(|i| text_similarity(a.get(i).map(String::as_str), b.get(i).map(String::as_str)))
        .sum();
    total / len as f64
}

/// Amounts in different currencies never match; no conversion is attempted.
pub fn currency_amount_similarity(a: Option<&CurrencyAmount>, b: Option<&CurrencyAmount>) -> f64 {
    if a.map(|x| x.currency.as_str()) != b.map(|x| x.currency.as_str()) {
        return 0.0;
    }
    numeric_similarity(a.map(|x| x.amount), b.map(|x| x.amount))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedValue {
    pub weight: f64,
    pub value: f64,
}

impl WeightedValue {
    pub fn new(weight: f64, value: f64) -> Self {
        Self { weight, value }
    }
}

/// Sum of `weight * value` divided by the sum of weights. An empty or
/// zero-weight input yields 0.0.
pub fn weighted_average(values: &[WeightedValue]) -> f64 {
    let total_weight: f64 = values.iter().map(|v| v.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = values.iter().map(|v| v.weight * v.value).sum();
    weighted / total_weight
}

/// Weighted similarity of two transactions. Dates and identity are not part
/// of the score.
pub fn transaction_similarity(a: &Transaction, b: &Transaction) -> f64 {
    let scores = [
        WeightedValue::new(
            COUNTERPARTY_WEIGHT,
            text_similarity(a.counterparty.as_deref(), b.counterparty.as_deref()),
        ),
        WeightedValue::new(IBAN_WEIGHT, text_similarity(a.iban.as_deref(), b.iban.as_deref())),
        WeightedValue::new(BIC_WEIGHT, text_similarity(a.bic.as_deref(), b.bic.as_deref())),
        WeightedValue::new(
            BOOKING_TEXT_WEIGHT,
            text_similarity(a.booking_text.as_deref(), b.booking_text.as_deref()),
        ),
        WeightedValue::new(
            USAGE_TEXT_WEIGHT,
            text_similarity(a.usage_text.as_deref(), b.usage_text.as_deref()),
        ),
        WeightedValue::new(CATEGORY_WEIGHT, category_similarity(a.category, b.category)),
        WeightedValue::new(TAGS_WEIGHT, tags_similarity(&a.tags, &b.tags)),
        WeightedValue::new(
            AMOUNT_WEIGHT,
            currency_amount_similarity(Some(&a.amount), Some(&b.amount)),
        ),
    ];
    weighted_average(&scores).clamp(0.0, 1.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::levenshtein::tests::mutate;
    use crate::models::TransactionCategory::{Education, Transfer};
    use chrono::NaiveDate;

    const EPS: f64 = 1e-4;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_text(first: Option<&str>, second: Option<&str>, expected: f64) {
        assert_close(text_similarity(first, second), expected);
        assert_close(text_similarity(second, first), expected);
    }

    pub(crate) fn full_transaction() -> Transaction {
        Transaction {
            booking_date: NaiveDate::from_ymd_opt(2021, 10, 29),
            value_date: NaiveDate::from_ymd_opt(2021, 10, 29),
            counterparty: Some("Das Känguru".to_string()),
            iban: Some("DE1234567890".to_string()),
            bic: Some("CSD123456".to_string()),
            booking_text: Some("Ach dein mein,".to_string()),
            usage_text: Some("das sind doch bürgerliche Kategorien".to_string()),
            category: Some(Transfer),
            tags: ["Niemand", "hat", "die", "Absicht", "ein", "Bankkonto", "zu", "errichten"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Transaction::new(CurrencyAmount::new(-12.0, "EUR"))
        }
    }

    fn sparse_transaction() -> Transaction {
        Transaction {
            booking_text: Some("VISA Kartenzahlung".to_string()),
            usage_text: Some("Vorgemerkter Umsatz: VISA Kartenzahlung".to_string()),
            ..Transaction::new(CurrencyAmount::new(-3.01, "EUR"))
        }
    }

    #[test]
    fn test_equal_strings() {
        assert_text(Some("Hello world."), Some("Hello world."), 1.0);
    }

    #[test]
    fn test_one_string_absent() {
        assert_text(Some("Hello world."), None, 0.0);
    }

    #[test]
    fn test_both_strings_absent() {
        assert_text(None, None, 1.0);
    }

    #[test]
    fn test_every_mutation_decreases_similarity() {
        let start = "Hello there";
        let step = 1.0 / start.len() as f64;
        let mut current = start.to_string();
        for i in 0..start.len() {
            assert_text(Some(start), Some(&current), 1.0 - step * i as f64);
            current = mutate(&current, i);
        }
    }

    #[test]
    fn test_every_deletion_decreases_similarity() {
        let start = "Hello there";
        let step = 1.0 / start.len() as f64;
        let mut current = start.to_string();
        for i in 0..start.len() {
            assert_text(Some(start), Some(&current), 1.0 - step * i as f64);
            current.pop();
        }
    }

    #[test]
    fn test_distinct_strings_use_longer_length() {
        // distance("kitten", "sitting") == 3, longer length 7
        assert_text(Some("kitten"), Some("sitting"), 4.0 / 7.0);
        assert_text(Some("abc"), Some("xyz"), 0.0);
    }

    #[test]
    fn test_category_similarity() {
        assert_close(category_similarity(Some(Transfer), Some(Transfer)), 1.0);
        assert_close(category_similarity(Some(Transfer), Some(Education)), 0.0);
        assert_close(category_similarity(None, Some(Transfer)), 0.0);
        assert_close(category_similarity(Some(Transfer), None), 0.0);
        assert_close(category_similarity(None, None), 1.0);
    }

    #[test]
    fn test_numeric_similarity() {
        assert_close(numeric_similarity(Some(10.5), Some(10.5)), 1.0);
        assert_close(numeric_similarity(None, Some(10.9)), 0.0);
        assert_close(numeric_similarity(None, None), 1.0);
        for d in 0..10 {
            let d = d as f64;
            assert_close(numeric_similarity(Some(1.5), Some(1.5 + d)), 1.0 / (d + 1.0));
            assert_close(numeric_similarity(Some(1.5), Some(1.5 - d)), 1.0 / (d + 1.0));
        }
    }

    #[test]
    fn test_numeric_similarity_strictly_decreasing_and_positive() {
        let mut last = 1.0;
        for d in 1..50 {
            let s = numeric_similarity(Some(0.0), Some(d as f64 * 100.0));
            assert!(s < last);
            assert!(s > 0.0);
            last = s;
        }
    }

    #[test]
    fn test_currency_amount_similarity() {
        let eur = CurrencyAmount::new(10.5, "EUR");
        assert_close(currency_amount_similarity(Some(&eur), Some(&eur)), 1.0);
        for d in 0..10 {
            let other = CurrencyAmount::new(10.5 + d as f64, "EUR");
            assert_close(
                currency_amount_similarity(Some(&eur), Some(&other)),
                1.0 / (d as f64 + 1.0),
            );
        }
        assert_close(currency_amount_similarity(None, Some(&eur)), 0.0);
        assert_close(currency_amount_similarity(None, None), 1.0);
        let usd = CurrencyAmount::new(10.5, "USD");
        assert_close(currency_amount_similarity(Some(&eur), Some(&usd)), 0.0);
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tags_similarity() {
        assert_close(tags_similarity(&[], &[]), 1.0);

        let list = tags(&["Hello there", "Hello world", "Hi, my name is Fred"]);
        assert_close(tags_similarity(&list, &list), 1.0);

        let edited = tags(&["Hell there", "Hello world", "Hi, my name is Fred"]);
        assert_close(tags_similarity(&list, &edited), 0.969_696_96);
        assert_close(tags_similarity(&edited, &list), 0.969_696_96);
    }

    #[test]
    fn test_tags_similarity_pads_with_absent() {
        let one = tags(&["abo"]);
        let two = tags(&["abo", "streaming"]);
        assert_close(tags_similarity(&one, &two), 0.5);
        assert_close(tags_similarity(&[], &one), 0.0);
    }

    #[test]
    fn test_weighted_average() {
        let values = [WeightedValue::new(1.0, 1.0), WeightedValue::new(3.0, 0.0)];
        assert_close(weighted_average(&values), 0.25);
        assert_close(weighted_average(&[]), 0.0);
    }

    #[test]
    fn test_transaction_self_similarity() {
        let full = full_transaction();
        assert_close(transaction_similarity(&full, &full), 1.0);
        let sparse = sparse_transaction();
        assert_close(transaction_similarity(&sparse, &sparse), 1.0);
    }

    #[test]
    fn test_transaction_similarity_is_symmetric() {
        let samples = [
            full_transaction(),
            sparse_transaction(),
            Transaction {
                counterparty: Some("Das Kaenguru".to_string()),
                category: Some(Education),
                tags: tags(&["Niemand"]),
                ..full_transaction()
            },
            Transaction::new(CurrencyAmount::new(-12.0, "USD")),
        ];
        for a in &samples {
            for b in &samples {
                let ab = transaction_similarity(a, b);
                let ba = transaction_similarity(b, a);
                assert_eq!(ab, ba);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_transaction_similarity_ignores_dates() {
        let a = full_transaction();
        let b = Transaction {
            booking_date: NaiveDate::from_ymd_opt(2022, 1, 1),
            value_date: None,
            ..a.clone()
        };
        assert_close(transaction_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_transaction_similarity_weights_usage_text() {
        let a = full_transaction();
        let b = Transaction {
            usage_text: None,
            ..a.clone()
        };
        // usage text contributes 0.3 of a total weight of 1.5
        assert_close(transaction_similarity(&a, &b), 1.2 / 1.5);
    }
}
