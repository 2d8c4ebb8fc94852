//! ABA routing number check digits
use crate::error::ValidationError;

const WEIGHTS: [u32; 8] = [3, 7, 1, 3, 7, 1, 3, 7];

/// Returns the check digit that completes an 8-digit routing number.
///
/// `None` when the input is not exactly eight ASCII digits.
pub fn calculate_check_digit(routing_number: &str) -> Option<u8> {
    if routing_number.len() != WEIGHTS.len() {
        return None;
    }

    let mut sum = 0;
    for (c, weight) in routing_number.chars().zip(WEIGHTS) {
        sum += c.to_digit(10)? * weight;
    }

    Some(((10 - sum % 10) % 10) as u8)
}

/// Checks a full 9-digit routing number against its trailing check digit.
pub fn check_routing_number(routing_number: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidRoutingNumber(routing_number.to_string());

    if routing_number.len() != 9 || !routing_number.is_ascii() {
        return Err(invalid());
    }
    let (base, check) = routing_number.split_at(8);
    let expected = calculate_check_digit(base).ok_or_else(invalid)?;

    match check.chars().next().and_then(|c| c.to_digit(10)) {
        Some(digit) if digit == u32::from(expected) => Ok(()),
        _ => Err(invalid()),
    }
}
