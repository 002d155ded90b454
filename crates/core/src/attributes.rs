//! Attribute dictionary: the set of entity attributes a batch may change.
//!
//! The dictionary is an immutable lookup table built once at startup and
//! shared as `Arc<AttributeDictionary>`. It validates attribute names on
//! submission, supplies display labels, and gives the codec a decode kind.
//! Attribute ids double as entity-store column names, so they are restricted
//! to alphanumerics and underscores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::value::ValueKind;

/// Maximum attribute id length.
pub const MAX_ATTRIBUTE_NAME_LENGTH: usize = 100;

/// One known attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDef {
    pub id: String,
    pub label: String,
    pub kind: ValueKind,
}

impl AttributeDef {
    pub fn new(id: &str, label: &str, kind: ValueKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
        }
    }
}

/// Immutable attribute lookup table, ordered as declared.
#[derive(Debug, Clone)]
pub struct AttributeDictionary {
    defs: Vec<AttributeDef>,
    index: BTreeMap<String, usize>,
}

impl AttributeDictionary {
    /// Build a dictionary, rejecting malformed or duplicate ids.
    pub fn new(defs: Vec<AttributeDef>) -> Result<Self, CoreError> {
        let mut index = BTreeMap::new();
        for (pos, def) in defs.iter().enumerate() {
            validate_attribute_name(&def.id)?;
            if index.insert(def.id.clone(), pos).is_some() {
                return Err(CoreError::Validation(format!(
                    "Duplicate attribute '{}' in dictionary",
                    def.id
                )));
            }
        }
        Ok(Self { defs, index })
    }

    /// The employee attributes exposed for bulk editing.
    pub fn employee_defaults() -> Self {
        use ValueKind::{Date, Number, Text};

        let defs = vec![
            AttributeDef::new("full_name", "Full Name", Text),
            AttributeDef::new("preferred_name", "Preferred Name", Text),
            AttributeDef::new("work_email", "Work Email", Text),
            AttributeDef::new("employee_id", "Employee ID", Text),
            AttributeDef::new("job_title", "Job Title", Text),
            AttributeDef::new("department", "Department", Text),
            AttributeDef::new("team", "Team", Text),
            AttributeDef::new("manager_id", "Manager ID", Text),
            AttributeDef::new("job_level", "Job Level", Text),
            AttributeDef::new("employment_type", "Employment Type", Text),
            AttributeDef::new("work_location", "Work Location", Text),
            AttributeDef::new("work_country", "Work Country", Text),
            AttributeDef::new("time_zone", "Time Zone", Text),
            AttributeDef::new("legal_entity", "Legal Entity", Text),
            AttributeDef::new("compensation_effective_date", "Comp Effective Date", Date),
            AttributeDef::new("base_salary", "Base Salary", Number),
            AttributeDef::new("compensation_currency", "Currency", Text),
            AttributeDef::new("equity_shares", "Equity Shares", Number),
            AttributeDef::new("target_annual_bonus_percentage", "Target Bonus %", Number),
            AttributeDef::new("on_target_earnings", "OTE", Number),
        ];

        let mut index = BTreeMap::new();
        for (pos, def) in defs.iter().enumerate() {
            index.insert(def.id.clone(), pos);
        }
        Self { defs, index }
    }

    pub fn get(&self, id: &str) -> Option<&AttributeDef> {
        self.index.get(id).map(|&pos| &self.defs[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind(&self, id: &str) -> Option<ValueKind> {
        self.get(id).map(|def| def.kind)
    }

    /// Display label, falling back to a title-cased id for unknown attributes.
    pub fn label(&self, id: &str) -> String {
        match self.get(id) {
            Some(def) => def.label.clone(),
            None => humanize(id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Reject attribute names the dictionary does not know.
    pub fn ensure_known(&self, id: &str) -> Result<(), CoreError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!("Unknown attribute '{id}'")))
        }
    }
}

/// Validate an attribute id's shape.
pub fn validate_attribute_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Attribute name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_ATTRIBUTE_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Attribute name exceeds maximum length of {MAX_ATTRIBUTE_NAME_LENGTH}"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::Validation(format!(
            "Attribute name '{name}' contains invalid characters. Only alphanumeric and underscore allowed."
        )));
    }
    Ok(())
}

/// `on_target_earnings` -> `On Target Earnings`.
fn humanize(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
