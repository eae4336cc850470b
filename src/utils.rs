use chrono::{DateTime, Local, Utc};
use url::Url;

use crate::error::{ClientError, Result};

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Gateway URL next to an API base: same host, `ws`/`wss`, path `/socket`.
pub fn socket_url_for(api_base: &str) -> Result<Url> {
    let mut url = Url::parse(&normalize_url(api_base))?;
    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Config(format!("cannot derive a socket URL from `{api_base}`")))?;
    url.set_path("/socket");
    url.set_query(None);
    Ok(url)
}

pub fn full_name(first: &str, last: &str) -> Option<String> {
    let name = format!("{} {}", first.trim(), last.trim());
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `12,345.60` style amounts for terminal output.
pub fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%b %d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https() {
        assert_eq!(normalize_url(" api.example.com "), "https://api.example.com");
        assert_eq!(normalize_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn socket_url_follows_scheme() {
        assert_eq!(
            socket_url_for("http://localhost:3000/api").unwrap().as_str(),
            "ws://localhost:3000/socket"
        );
        assert_eq!(
            socket_url_for("app.example.com").unwrap().as_str(),
            "wss://app.example.com/socket"
        );
    }

    #[test]
    fn full_name_skips_blanks() {
        assert_eq!(full_name("Ana", ""), Some("Ana".to_string()));
        assert_eq!(full_name(" ", " "), None);
    }

    #[test]
    fn money_is_grouped() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(1234567.5), "$1,234,567.50");
        assert_eq!(format_money(-42.129), "-$42.13");
    }
}
