const UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Formats a byte count with binary units and two decimals, e.g. `1.50 KiB`.
///
/// Rounds half away from zero. A value that rounds up to `1024.00` of a unit
/// is printed in the next unit instead.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    let mut unit = 0;
    let mut divisor: u128 = 1;
    while unit + 1 < UNITS.len() && u128::from(bytes) >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    // hundredths of the unit, rounded half up (bytes are never negative)
    let mut hundredths = (u128::from(bytes) * 100 + divisor / 2) / divisor;
    if hundredths >= 1024 * 100 && unit + 1 < UNITS.len() {
        divisor *= 1024;
        unit += 1;
        hundredths = (u128::from(bytes) * 100 + divisor / 2) / divisor;
    }

    format!(
        "{}.{:02} {}",
        hundredths / 100,
        hundredths % 100,
        UNITS[unit]
    )
}
