/// Norwegian eight digit numbers are grouped `987 65 432`. Anything else is
/// shown as is.
pub fn phone<T: std::fmt::Display>(s: T, _: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_phone(&s.to_string()))
}

pub fn format_phone(raw: &str) -> String {
    let digits = raw.trim();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }

    format!("{} {} {}", &digits[..3], &digits[3..5], &digits[5..])
}
