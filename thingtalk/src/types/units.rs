//! Measurement units and their base units
//!
//! Every measure type is `Measure(unit)` where `unit` is one of the units
//! below. Two measure types are compatible when their units share a base unit.

/// Unit, base unit, scale, offset: `base = value * scale + offset`
const UNITS: &[(&str, &str, f64, f64)] = &[
    // time
    ("ms", "ms", 1.0, 0.0),
    ("s", "ms", 1000.0, 0.0),
    ("min", "ms", 60_000.0, 0.0),
    ("h", "ms", 3_600_000.0, 0.0),
    ("day", "ms", 86_400_000.0, 0.0),
    ("week", "ms", 604_800_000.0, 0.0),
    ("mon", "ms", 2_592_000_000.0, 0.0),
    ("year", "ms", 31_536_000_000.0, 0.0),
    // length
    ("m", "m", 1.0, 0.0),
    ("km", "m", 1000.0, 0.0),
    ("mm", "m", 0.001, 0.0),
    ("cm", "m", 0.01, 0.0),
    ("mi", "m", 1609.344, 0.0),
    ("in", "m", 0.0254, 0.0),
    ("ft", "m", 0.3048, 0.0),
    // area
    ("m2", "m2", 1.0, 0.0),
    ("km2", "m2", 1_000_000.0, 0.0),
    ("ft2", "m2", 0.092903, 0.0),
    // volume
    ("m3", "m3", 1.0, 0.0),
    ("l", "m3", 0.001, 0.0),
    ("ml", "m3", 0.000001, 0.0),
    ("gal", "m3", 0.00378541, 0.0),
    // speed
    ("mps", "mps", 1.0, 0.0),
    ("kmph", "mps", 0.277_777_777_8, 0.0),
    ("mph", "mps", 0.44704, 0.0),
    // weight
    ("kg", "kg", 1.0, 0.0),
    ("g", "kg", 0.001, 0.0),
    ("lb", "kg", 0.453592, 0.0),
    ("oz", "kg", 0.0283495, 0.0),
    // pressure
    ("Pa", "Pa", 1.0, 0.0),
    ("bar", "Pa", 100_000.0, 0.0),
    ("psi", "Pa", 6894.76, 0.0),
    ("mmHg", "Pa", 133.322, 0.0),
    ("atm", "Pa", 101_325.0, 0.0),
    // temperature
    ("C", "C", 1.0, 0.0),
    ("F", "C", 5.0 / 9.0, -32.0 * 5.0 / 9.0),
    ("K", "C", 1.0, -273.15),
    // energy
    ("kcal", "kcal", 1.0, 0.0),
    ("kJ", "kcal", 0.239006, 0.0),
    // data size
    ("byte", "byte", 1.0, 0.0),
    ("KB", "byte", 1000.0, 0.0),
    ("MB", "byte", 1_000_000.0, 0.0),
    ("GB", "byte", 1_000_000_000.0, 0.0),
    ("TB", "byte", 1_000_000_000_000.0, 0.0),
    ("KiB", "byte", 1024.0, 0.0),
    ("MiB", "byte", 1_048_576.0, 0.0),
    ("GiB", "byte", 1_073_741_824.0, 0.0),
    // power
    ("W", "W", 1.0, 0.0),
    ("kW", "W", 1000.0, 0.0),
    // illuminance, luminance, signal strength, heart rate, concentration
    ("lx", "lx", 1.0, 0.0),
    ("nit", "nit", 1.0, 0.0),
    ("dBm", "dBm", 1.0, 0.0),
    ("dB", "dB", 1.0, 0.0),
    ("bpm", "bpm", 1.0, 0.0),
    ("ppm", "ppm", 1.0, 0.0),
];

fn lookup(unit: &str) -> Option<&'static (&'static str, &'static str, f64, f64)> {
    UNITS.iter().find(|(name, ..)| *name == unit)
}

/// Whether `unit` is a known measurement unit
pub fn is_unit(unit: &str) -> bool {
    lookup(unit).is_some()
}

/// Base unit of `unit`; unknown units are their own base
pub fn base_unit(unit: &str) -> &str {
    match lookup(unit) {
        Some((_, base, ..)) => base,
        None => unit,
    }
}

/// Convert `value` expressed in `unit` to the base unit
pub fn to_base_unit(value: f64, unit: &str) -> f64 {
    match lookup(unit) {
        Some((_, _, scale, offset)) => value * scale + offset,
        None => value,
    }
}

/// Whether two units measure the same quantity
pub fn same_quantity(a: &str, b: &str) -> bool {
    base_unit(a) == base_unit(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_units() {
        assert_eq!(base_unit("F"), "C");
        assert_eq!(base_unit("km"), "m");
        assert_eq!(base_unit("h"), "ms");
        assert_eq!(base_unit("zorkmid"), "zorkmid");
        assert!(same_quantity("mi", "ft"));
        assert!(!same_quantity("mi", "kg"));
    }

    #[test]
    fn test_conversion() {
        assert_eq!(to_base_unit(2.0, "km"), 2000.0);
        assert_eq!(to_base_unit(1.0, "h"), 3_600_000.0);
        assert!((to_base_unit(212.0, "F") - 100.0).abs() < 1e-9);
        assert!((to_base_unit(0.0, "K") + 273.15).abs() < 1e-9);
    }
}
