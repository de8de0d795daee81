// ── Display Formatting ─────────────────────────────────────────
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

fn fixed(value: Decimal, places: u32) -> String {
    let rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", places as usize, rounded).replace('.', ",")
}

/// Two decimal places, comma separator, no thousands grouping.
pub fn format_money(value: Decimal) -> String {
    fixed(value, 2)
}

pub fn format_quantity(value: Decimal) -> String {
    fixed(value, 4)
}

pub fn format_weight(value: Decimal) -> String {
    fixed(value, 3)
}

pub fn format_rate(value: Decimal) -> String {
    fixed(value, 2)
}

/// CNPJ as NN.NNN.NNN/NNNN-NN, CPF as NNN.NNN.NNN-NN, anything else unchanged.
pub fn format_tax_id(value: &str) -> String {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return value.to_string();
    }
    if value.len() == 14 {
        format!("{}.{}.{}/{}-{}", &value[0..2], &value[2..5], &value[5..8], &value[8..12], &value[12..14])
    } else if value.len() == 11 {
        format!("{}.{}.{}-{}", &value[0..3], &value[3..6], &value[6..9], &value[9..11])
    } else {
        value.to_string()
    }
}

pub fn format_postal_code(value: &str) -> String {
    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}", &value[..5], &value[5..])
    } else {
        value.to_string()
    }
}

/// Lenient decimal parse: blanks and garbage become zero.
pub fn parse_decimal(raw: &str) -> Decimal {
    let raw = raw.trim();
    if raw.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or(Decimal::ZERO)
}

enum Stamp {
    Full(DateTime<chrono::FixedOffset>),
    Local(NaiveDateTime),
    Date(NaiveDate),
}

fn parse_stamp(raw: &str) -> Option<Stamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Stamp::Full(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Stamp::Local(dt));
    }
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d")
        .ok()
        .map(Stamp::Date)
}

/// dd/mm/yyyy in the timestamp's own offset. Unparseable input passes through.
pub fn format_date(raw: &str) -> String {
    match parse_stamp(raw) {
        Some(Stamp::Full(dt)) => dt.format("%d/%m/%Y").to_string(),
        Some(Stamp::Local(dt)) => dt.format("%d/%m/%Y").to_string(),
        Some(Stamp::Date(d)) => d.format("%d/%m/%Y").to_string(),
        None => raw.trim().to_string(),
    }
}

/// HH:MM, empty when the input carries no time of day.
pub fn format_time(raw: &str) -> String {
    match parse_stamp(raw) {
        Some(Stamp::Full(dt)) => dt.format("%H:%M").to_string(),
        Some(Stamp::Local(dt)) => dt.format("%H:%M").to_string(),
        _ => {
            let raw = raw.trim();
            let looks_like_time = raw.len() >= 5 && raw.as_bytes()[2] == b':';
            if looks_like_time {
                raw.get(..5).map(str::to_string).unwrap_or_default()
            } else {
                String::new()
            }
        }
    }
}

/// dd/mm/yyyy HH:MM:SS for protocol timestamps.
pub fn format_date_time(raw: &str) -> String {
    match parse_stamp(raw) {
        Some(Stamp::Full(dt)) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        Some(Stamp::Local(dt)) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        Some(Stamp::Date(d)) => d.format("%d/%m/%Y").to_string(),
        None => raw.trim().to_string(),
    }
}

/// Left-pads document numbers the way they appear on printed DANFEs.
pub fn pad_number(value: &str, width: usize) -> String {
    format!("{:0>width$}", value.trim(), width = width)
}

/// Nine-digit document number grouped in thousands: 000.417.533.
pub fn format_document_number(value: &str) -> String {
    let padded = pad_number(value, 9);
    if padded.len() != 9 || !padded.chars().all(|c| c.is_ascii_digit()) {
        return value.trim().to_string();
    }
    format!("{}.{}.{}", &padded[..3], &padded[3..6], &padded[6..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn money_uses_comma_and_two_places() {
        assert_eq!(format_money(Decimal::new(12345, 1)), "1234,50");
        assert_eq!(format_money(Decimal::ZERO), "0,00");
        assert_eq!(format_money(Decimal::new(5, 3)), "0,01");
        assert_eq!(format_money(Decimal::new(-1999, 2)), "-19,99");
    }

    #[test]
    fn quantity_and_weight_precision() {
        assert_eq!(format_quantity(Decimal::new(8, 0)), "8,0000");
        assert_eq!(format_weight(Decimal::new(11, 0)), "11,000");
        assert_eq!(format_rate(Decimal::new(70000, 4)), "7,00");
    }

    #[test]
    fn tax_ids() {
        assert_eq!(format_tax_id("12345678000195"), "12.345.678/0001-95");
        assert_eq!(format_tax_id("12345678901"), "123.456.789-01");
        assert_eq!(format_tax_id("123"), "123");
        assert_eq!(format_tax_id(""), "");
        assert_eq!(format_tax_id("1234567800019X"), "1234567800019X");
    }

    #[test]
    fn postal_code() {
        assert_eq!(format_postal_code("89210300"), "89210-300");
        assert_eq!(format_postal_code("8921"), "8921");
    }

    #[test]
    fn decimals_default_to_zero() {
        assert_eq!(parse_decimal(""), Decimal::ZERO);
        assert_eq!(parse_decimal("abc"), Decimal::ZERO);
        assert_eq!(parse_decimal(" 103.2200000000 "), Decimal::new(10322, 2));
    }

    #[test]
    fn dates_keep_document_offset() {
        assert_eq!(format_date("2025-04-17T23:29:00-03:00"), "17/04/2025");
        assert_eq!(format_time("2025-04-17T23:29:00-03:00"), "23:29");
        assert_eq!(format_date("2025-08-15"), "15/08/2025");
        assert_eq!(format_time("2025-08-15"), "");
        assert_eq!(format_time("17:30:00"), "17:30");
        assert_eq!(format_date("ontem"), "ontem");
        assert_eq!(format_date_time("2025-04-17T17:30:42-03:00"), "17/04/2025 17:30:42");
    }

    #[test]
    fn pads_numbers() {
        assert_eq!(pad_number("417533", 9), "000417533");
        assert_eq!(pad_number("2", 3), "002");
        assert_eq!(format_document_number("417533"), "000.417.533");
        assert_eq!(format_document_number("S/N"), "S/N");
    }

    proptest! {
        #[test]
        fn money_never_contains_a_dot(cents in -10_000_000i64..10_000_000i64) {
            let s = format_money(Decimal::new(cents, 2));
            prop_assert!(!s.contains('.'));
            let (_, frac) = s.rsplit_once(',').unwrap();
            prop_assert_eq!(frac.len(), 2);
        }

        #[test]
        fn other_lengths_pass_through(s in "[0-9]{0,10}|[0-9]{12,13}|[0-9]{15,20}") {
            prop_assert_eq!(format_tax_id(&s), s);
        }
    }
}
