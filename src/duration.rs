//! ISO-8601 duration codec.
//!
//! The catalog reports video lengths as compact designator strings such as
//! `PT3M12S`. Anything that does not parse cleanly means "duration unknown",
//! which callers must keep distinct from a duration of zero.

const DATE_UNITS: [(char, i64); 2] = [('W', 604_800), ('D', 86_400)];
const TIME_UNITS: [(char, i64); 3] = [('H', 3_600), ('M', 60), ('S', 1)];

/// Converts a compact duration like `PT1H2M3S` or `P1DT2H` into total
/// seconds. Returns `None` for anything malformed: a missing `P`, a dangling
/// number, an unknown or out-of-order designator, a `T` with nothing after
/// it, or calendar-dependent years/months.
pub fn parse_duration_seconds(text: &str) -> Option<i64> {
    let rest = text.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let (date_seconds, date_components) = component_seconds(date_part, &DATE_UNITS)?;
    let (time_seconds, time_components) = match time_part {
        Some(time) => {
            let parsed = component_seconds(time, &TIME_UNITS)?;
            if parsed.1 == 0 {
                return None;
            }
            parsed
        }
        None => (0, 0),
    };

    if date_components + time_components == 0 {
        return None;
    }
    Some(date_seconds + time_seconds)
}

/// Walks one designator section, requiring units to appear in descending
/// order, each at most once, each preceded by an unsigned integer.
fn component_seconds(part: &str, units: &[(char, i64)]) -> Option<(i64, usize)> {
    let mut total = 0i64;
    let mut components = 0usize;
    let mut digits = String::new();
    let mut next_unit = 0usize;

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return None;
        }
        let offset = units[next_unit..]
            .iter()
            .position(|(designator, _)| *designator == c)?;
        let (_, scale) = units[next_unit + offset];
        next_unit += offset + 1;

        let value: i64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(scale)?)?;
        digits.clear();
        components += 1;
    }

    if !digits.is_empty() {
        return None;
    }
    Some((total, components))
}
