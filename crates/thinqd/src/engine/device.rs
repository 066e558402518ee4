use serde::Serialize;

/// A device in the thinqd system.
///
/// A device represents one physical appliance that contains one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub entity_ids: Vec<String>,
}

impl Device {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            manufacturer: None,
            model: None,
            serial_number: None,
            entity_ids: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }
}
