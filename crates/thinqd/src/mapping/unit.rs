use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Display unit a refrigerator reports in its `tempUnit` field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    /// Parse the raw `tempUnit` value. Anything other than Fahrenheit,
    /// including a missing field, is Celsius.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("FAHRENHEIT") => TempUnit::Fahrenheit,
            _ => TempUnit::Celsius,
        }
    }

    /// Value echoed back to the device in control patches.
    pub fn as_str(self) -> &'static str {
        match self {
            TempUnit::Celsius => "CELSIUS",
            TempUnit::Fahrenheit => "FAHRENHEIT",
        }
    }

    /// Suffix of the per-unit monitoring value mapping.
    pub fn suffix(self) -> &'static str {
        match self {
            TempUnit::Celsius => "_C",
            TempUnit::Fahrenheit => "_F",
        }
    }
}

impl fmt::Display for TempUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fahrenheit to Celsius, rounded to one decimal.
pub fn to_celsius(fahrenheit: f64) -> f64 {
    ((fahrenheit - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0
}

/// Celsius to Fahrenheit, rounded to a whole degree.
///
/// A round trip through [`to_celsius`] drifts by at most 0.3 °C
/// (e.g. 4 °C -> 39 °F -> 3.9 °C).
pub fn to_fahrenheit(celsius: f64) -> f64 {
    (celsius * 9.0 / 5.0 + 32.0).round()
}

/// The device's current display unit together with the conversions between
/// it and the canonical Celsius used by every capability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnitContext {
    unit: TempUnit,
}

impl UnitContext {
    pub fn new(unit: TempUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> TempUnit {
        self.unit
    }

    /// Key of the unit-specific mapping for a temperature field,
    /// e.g. `fridgeTemp` -> `fridgeTemp_F`.
    pub fn field_key(&self, field: &str) -> String {
        format!("{}{}", field, self.unit.suffix())
    }

    /// Device value in the current unit -> Celsius.
    pub fn to_canonical(&self, value: f64) -> f64 {
        match self.unit {
            TempUnit::Celsius => value,
            TempUnit::Fahrenheit => to_celsius(value),
        }
    }

    /// Celsius -> device value in the current unit.
    pub fn from_canonical(&self, celsius: f64) -> f64 {
        match self.unit {
            TempUnit::Celsius => celsius,
            TempUnit::Fahrenheit => to_fahrenheit(celsius),
        }
    }

    /// Set-point step exposed to the engine, in Celsius.
    pub fn step(&self) -> f64 {
        match self.unit {
            TempUnit::Celsius => 1.0,
            TempUnit::Fahrenheit => 0.1,
        }
    }
}

/// Render a numeric value the way the model writes its labels: whole numbers
/// without a fractional part.
pub(crate) fn format_label(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
