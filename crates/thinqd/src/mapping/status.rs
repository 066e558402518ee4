use tracing::trace;

use super::DOOR_CLOSED;
use super::DeviceModel;
use super::ON_KEY;
use super::Snapshot;
use super::TempUnit;
use super::UnitContext;
use super::field;

/// Read-only view of one snapshot through its device model.
///
/// Built fresh for every update cycle; every property is derived on access.
#[derive(Debug, Clone, Copy)]
pub struct StatusView<'a> {
    snapshot: &'a Snapshot,
    model: &'a DeviceModel,
    units: UnitContext,
}

impl<'a> StatusView<'a> {
    pub fn new(snapshot: &'a Snapshot, model: &'a DeviceModel) -> Self {
        let unit = TempUnit::from_raw(snapshot.field(field::TEMP_UNIT).as_deref());
        Self {
            snapshot,
            model,
            units: UnitContext::new(unit),
        }
    }

    pub fn units(&self) -> UnitContext {
        self.units
    }

    pub fn temp_unit(&self) -> TempUnit {
        self.units.unit()
    }

    pub fn is_online(&self) -> bool {
        self.snapshot.is_online()
    }

    /// Fridge set point in Celsius.
    pub fn fridge_temperature(&self) -> f64 {
        self.temperature(field::FRIDGE_TEMP)
    }

    /// Freezer set point in Celsius.
    pub fn freezer_temperature(&self) -> f64 {
        self.temperature(field::FREEZER_TEMP)
    }

    pub fn is_door_closed(&self) -> bool {
        self.snapshot.field(field::DOOR_OPEN).as_deref() == Some(DOOR_CLOSED)
    }

    pub fn is_express_mode_on(&self) -> bool {
        self.is_toggle_on(field::EXPRESS_MODE)
    }

    pub fn is_express_fridge_on(&self) -> bool {
        self.is_toggle_on(field::EXPRESS_FRIDGE)
    }

    pub fn is_eco_friendly_on(&self) -> bool {
        self.is_toggle_on(field::ECO_FRIENDLY)
    }

    /// Whether a toggle field holds the code this model uses for "on".
    pub fn is_toggle_on(&self, field: &str) -> bool {
        match (
            self.snapshot.field(field),
            self.model.lookup_monitor_name(field, ON_KEY),
        ) {
            (Some(raw), Some(on)) => raw == on,
            _ => false,
        }
    }

    /// Temperature of `field` in Celsius, read from the mapping of the
    /// current display unit. A missing code falls back to the mapping's
    /// `"0"` entry, and a non-numeric label to 0.
    fn temperature(&self, field: &str) -> f64 {
        let key = self.units.field_key(field);
        let fallback = self.model.lookup_monitor_value(&key, "0", "");
        let label = match self.snapshot.field(field) {
            Some(code) => self.model.lookup_monitor_value(&key, &code, fallback),
            None => fallback,
        };

        match label.trim().parse::<f64>() {
            Ok(value) => self.units.to_canonical(value),
            Err(_) => {
                trace!("No numeric label for {} (label '{}'), reporting 0", key, label);
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapping::fixtures;

    #[test]
    fn test_celsius_temperatures() {
        let model = fixtures::model();
        let snapshot = fixtures::snapshot();
        let status = StatusView::new(&snapshot, &model);

        assert_eq!(status.temp_unit(), TempUnit::Celsius);
        assert_eq!(status.fridge_temperature(), 4.0);
        assert_eq!(status.freezer_temperature(), -18.0);
    }

    #[test]
    fn test_fahrenheit_temperatures_are_reported_in_celsius() {
        let model = fixtures::model();
        // fridgeTemp_F code 8 is 39 °F, freezerTemp_F code 9 is 0 °F
        let snapshot = fixtures::snapshot_with(json!({
            "tempUnit": "FAHRENHEIT",
            "fridgeTemp": "8",
            "freezerTemp": "9",
        }));
        let status = StatusView::new(&snapshot, &model);

        assert_eq!(status.temp_unit(), TempUnit::Fahrenheit);
        assert_eq!(status.fridge_temperature(), 3.9);
        assert_eq!(status.freezer_temperature(), -17.8);
    }

    #[test]
    fn test_missing_temperature_degrades_to_zero() {
        let model = fixtures::model();
        let snapshot = Snapshot::default();
        let status = StatusView::new(&snapshot, &model);

        assert_eq!(status.temp_unit(), TempUnit::Celsius);
        assert_eq!(status.fridge_temperature(), 0.0);
        assert_eq!(status.freezer_temperature(), 0.0);
    }

    #[test]
    fn test_unknown_code_uses_zero_entry() {
        let model = DeviceModel::from_value(json!({
            "MonitoringValue": {
                "fridgeTemp_C": {
                    "valueMapping": {
                        "0": { "index": "0", "label": "3" },
                        "1": { "index": "1", "label": "5" }
                    }
                }
            }
        }))
        .unwrap();
        let snapshot = fixtures::snapshot_with(json!({ "fridgeTemp": "99" }));
        let status = StatusView::new(&snapshot, &model);
        assert_eq!(status.fridge_temperature(), 3.0);

        let model = fixtures::model();
        let snapshot = fixtures::snapshot_with(json!({ "fridgeTemp": "IGNORE" }));
        let status = StatusView::new(&snapshot, &model);
        assert_eq!(status.fridge_temperature(), 0.0);
    }

    #[test]
    fn test_door_closed_only_for_close_sentinel() {
        let model = fixtures::model();
        for (raw, expected) in [
            (json!("CLOSE"), true),
            (json!("OPEN"), false),
            (json!("close"), false),
            (json!(""), false),
            (json!(null), false),
        ] {
            let snapshot = fixtures::snapshot_with(json!({ "atLeastOneDoorOpen": raw }));
            let status = StatusView::new(&snapshot, &model);
            assert_eq!(status.is_door_closed(), expected, "{:?}", raw);
        }

        let snapshot = Snapshot::default();
        assert!(!StatusView::new(&snapshot, &model).is_door_closed());
    }

    #[test]
    fn test_toggles_compare_against_model_code() {
        let model = fixtures::model();
        let snapshot = fixtures::snapshot_with(json!({
            "expressMode": "EXPRESS_ON",
            "expressFridge": "ON",
            "ecoFriendly": "OFF",
        }));
        let status = StatusView::new(&snapshot, &model);

        assert!(status.is_express_mode_on());
        assert!(status.is_express_fridge_on());
        assert!(!status.is_eco_friendly_on());

        // "ON" is not the express mode "on" code for this model
        let snapshot = fixtures::snapshot_with(json!({ "expressMode": "ON" }));
        assert!(!StatusView::new(&snapshot, &model).is_express_mode_on());
    }
}
