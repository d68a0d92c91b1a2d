//! ISO-8601 duration parsing for `contentDetails.duration`.
//!
//! YouTube reports durations such as `PT1H2M3S`, `P1DT2H` or `P0D` (live
//! streams). Calendar units (years, months) have no fixed length and are
//! rejected. Fractional seconds are accepted and truncated.

use crate::error::YoutubeError;

const DATE_UNITS: &[(char, u64)] = &[('W', 7 * 86_400), ('D', 86_400)];
const TIME_UNITS: &[(char, u64)] = &[('H', 3_600), ('M', 60), ('S', 1)];

/// Parse an ISO-8601 duration into whole seconds.
pub fn parse_iso8601_duration(input: &str) -> Result<u64, YoutubeError> {
    let invalid = || YoutubeError::InvalidDuration(input.to_string());

    let rest = input.strip_prefix('P').ok_or_else(invalid)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((_, "")) => return Err(invalid()),
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return Err(invalid());
    }

    let mut total = sum_section(date_part, DATE_UNITS).ok_or_else(invalid)?;
    if let Some(time) = time_part {
        let time_secs = sum_section(time, TIME_UNITS).ok_or_else(invalid)?;
        total = total.checked_add(time_secs).ok_or_else(invalid)?;
    }
    Ok(total)
}

/// Sum one section (`nWnD` or `nHnMnS`). Designators must appear in order and
/// at most once; only the seconds component may carry a fraction.
fn sum_section(section: &str, units: &[(char, u64)]) -> Option<u64> {
    let mut total = 0u64;
    let mut next_unit = 0usize;
    let mut number = String::new();

    for c in section.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(c);
            continue;
        }

        let offset = units[next_unit..].iter().position(|(d, _)| *d == c)?;
        let (designator, factor) = units[next_unit + offset];
        next_unit += offset + 1;

        if number.is_empty() {
            return None;
        }
        let whole = match number.split_once(['.', ',']) {
            Some((int, frac)) => {
                if designator != 'S' || frac.chars().any(|f| !f.is_ascii_digit()) {
                    return None;
                }
                int
            }
            None => number.as_str(),
        };
        let value: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        total = total.checked_add(value.checked_mul(factor)?)?;
        number.clear();
    }

    // Trailing digits without a designator.
    if !number.is_empty() {
        return None;
    }
    Some(total)
}
