// backend/src/kpi/format.rs
//
// Pure numeric helpers shared by the query layer, the KPI set and the exports.

/// Decimal places for liters-per-kilogram ratios.
pub const WATER_RATIO_PLACES: u32 = 2;
/// Decimal places for chemical-per-kilogram ratios.
pub const CHEMICAL_RATIO_PLACES: u32 = 3;

/// Abbreviates a magnitude with a `k`/`M`/`B` suffix at one decimal.
///
/// Zero and non-finite input render as `"0"`; values below a thousand render
/// as a plain integer.
pub fn abbreviate(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1_000_000_000.0 {
        format!("{:.1}B", value / 1_000_000_000.0)
    } else if magnitude >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{value:.0}")
    }
}

/// Rounds half away from zero, matching PostgreSQL `ROUND(numeric, n)`.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Division that yields 0 instead of infinity or NaN.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

pub fn liters_per_kg(liters: f64, weight_kg: f64) -> f64 {
    round_to(safe_ratio(liters, weight_kg), WATER_RATIO_PLACES)
}

pub fn chemical_per_kg(chemical_kg: f64, weight_kg: f64) -> f64 {
    round_to(safe_ratio(chemical_kg, weight_kg), CHEMICAL_RATIO_PLACES)
}

/// Kilograms per wash cycle at one decimal, 0 when no cycle ran.
pub fn kg_per_cycle(weight_kg: f64, cycles: i64) -> f64 {
    round_to(safe_ratio(weight_kg, cycles as f64), 1)
}

/// Fixed-precision rendering where an exact zero stays `"0"`.
pub fn format_fixed(value: f64, places: usize) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{value:.places$}")
}

/// Integer rendering with `,` thousands separators, e.g. `8,750`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviate_covers_every_suffix() {
        assert_eq!(abbreviate(0.0), "0");
        assert_eq!(abbreviate(999.0), "999");
        assert_eq!(abbreviate(1_500.0), "1.5k");
        assert_eq!(abbreviate(2_300_000.0), "2.3M");
        assert_eq!(abbreviate(4_100_000_000.0), "4.1B");
    }

    #[test]
    fn abbreviate_is_total() {
        assert_eq!(abbreviate(f64::NAN), "0");
        assert_eq!(abbreviate(f64::INFINITY), "0");
        assert_eq!(abbreviate(-1_500.0), "-1.5k");
        assert_eq!(abbreviate(12.4), "12");
    }

    #[test]
    fn liters_per_kg_guards_zero_weight() {
        assert_eq!(liters_per_kg(8_500.0, 0.0), 0.0);
        assert_eq!(liters_per_kg(0.0, 0.0), 0.0);
        assert_eq!(liters_per_kg(8_500.0, 1_250.0), 6.8);
        assert_eq!(liters_per_kg(1_000.0, 3.0), 333.33);
    }

    #[test]
    fn chemical_per_kg_keeps_three_places() {
        assert_eq!(chemical_per_kg(125.0, 0.0), 0.0);
        assert_eq!(chemical_per_kg(1.0, 3.0), 0.333);
        assert_eq!(chemical_per_kg(125.0, 1_250.0), 0.1);
    }

    #[test]
    fn kg_per_cycle_without_cycles_is_zero() {
        assert_eq!(kg_per_cycle(1_250.0, 0), 0.0);
        assert_eq!(kg_per_cycle(1_250.0, 45), 27.8);
    }

    #[test]
    fn round_to_rounds_half_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.5, 0), -1.0);
        assert_eq!(round_to(f64::NAN, 2), 0.0);
    }

    #[test]
    fn format_fixed_renders_zero_bare() {
        assert_eq!(format_fixed(0.0, 2), "0");
        assert_eq!(format_fixed(6.8, 2), "6.80");
        assert_eq!(format_fixed(0.1, 3), "0.100");
    }

    #[test]
    fn format_thousands_groups_digits() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(875.0), "875");
        assert_eq!(format_thousands(8_750.0), "8,750");
        assert_eq!(format_thousands(1_234_567.4), "1,234,567");
        assert_eq!(format_thousands(-12_000.0), "-12,000");
    }
}
