use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activity classes the reference catalog is grouped by.
/// Maps onto the `activity_class` enum type in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_class")]
pub enum ActivityClass {
    Strength,
    Speed,
    Balance,
    Skill,
    Extreme,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReference {
    pub id: Uuid,
    pub activity_class: ActivityClass,
    pub activity_label: String,
    /// Empty means free-text units are accepted.
    pub allowed_units: Vec<String>,
}

impl ActivityReference {
    pub fn unit_allowed(&self, unit: Option<&str>) -> bool {
        if self.allowed_units.is_empty() {
            return true;
        }
        match unit {
            Some(u) => self.allowed_units.iter().any(|allowed| allowed == u),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(units: &[&str]) -> ActivityReference {
        ActivityReference {
            id: Uuid::new_v4(),
            activity_class: ActivityClass::Speed,
            activity_label: "Running".to_string(),
            allowed_units: units.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[test]
    fn empty_allowed_units_accepts_anything() {
        let r = reference(&[]);
        assert!(r.unit_allowed(Some("parsecs")));
        assert!(r.unit_allowed(None));
    }

    #[test]
    fn restricted_units_require_membership() {
        let r = reference(&["km", "mins"]);
        assert!(r.unit_allowed(Some("km")));
        assert!(!r.unit_allowed(Some("miles")));
        assert!(!r.unit_allowed(None));
    }
}
