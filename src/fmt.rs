/// Format an amount with thousands separators and its currency code:
/// `-1,234.56 EUR`
pub fn money(val: f64, currency: &str) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    // -0.001 rounds to 0.00 and should not print a sign
    let sign = if negative && cents.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{with_commas}.{dec_part} {currency}")
}

/// Similarity score as a percentage with one decimal.
pub fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}
