//! Student record types
//!
//! Wire names (`_id`, `id`, `nom`, `prenom`, `filiere`, `age`, `email`) are the
//! external JSON contract and are kept as-is.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A stored student record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Store-assigned storage key, immutable
    #[serde(rename = "_id")]
    pub storage_key: Uuid,
    /// Sequential display identifier, fixed at creation
    #[serde(rename = "id")]
    pub display_id: i64,
    pub nom: String,
    pub prenom: String,
    pub filiere: String,
    pub age: Option<i64>,
    pub email: String,
}

impl StudentRecord {
    /// The record's field-set without identifiers
    pub fn fields(&self) -> StudentFields {
        StudentFields {
            nom: self.nom.clone(),
            prenom: self.prenom.clone(),
            filiere: self.filiere.clone(),
            age: self.age,
            email: self.email.clone(),
        }
    }
}

/// Field-set for creating a record (no identifiers)
///
/// Missing JSON members default to empty so that validation, not
/// deserialization, reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub prenom: String,
    #[serde(default)]
    pub filiere: String,
    #[serde(default, deserialize_with = "deserialize_age")]
    pub age: Option<i64>,
    #[serde(default)]
    pub email: String,
}

/// A required field was missing or blank
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}' is required")]
pub struct ValidationError {
    pub field: &'static str,
}

impl StudentFields {
    /// Check that `nom`, `filiere` and `email` are non-blank
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("nom", &self.nom),
            ("filiere", &self.filiere),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError { field });
            }
        }
        Ok(())
    }
}

/// Partial update: only members present in the request are changed
///
/// `age` distinguishes "absent" (`None`) from an explicit `null`
/// (`Some(None)`), which clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StudentPatch {
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub filiere: Option<String>,
    #[serde(default, deserialize_with = "deserialize_age_patch")]
    pub age: Option<Option<i64>>,
    pub email: Option<String>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the provided members into `fields`
    pub fn apply_to(&self, fields: &mut StudentFields) {
        if let Some(nom) = &self.nom {
            fields.nom = nom.clone();
        }
        if let Some(prenom) = &self.prenom {
            fields.prenom = prenom.clone();
        }
        if let Some(filiere) = &self.filiere {
            fields.filiere = filiere.clone();
        }
        if let Some(age) = self.age {
            fields.age = age;
        }
        if let Some(email) = &self.email {
            fields.email = email.clone();
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AgeInput {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accept `21`, `21.0`, `"21"`, `""` and `null` for `age`
fn deserialize_age<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<AgeInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(AgeInput::Int(n)) => Ok(Some(n)),
        Some(AgeInput::Float(f))
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            Ok(Some(f as i64))
        }
        Some(AgeInput::Float(f)) => Err(D::Error::custom(format!(
            "age must be an integer, got {}",
            f
        ))),
        Some(AgeInput::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("age must be an integer, got '{}'", s)))
        }
    }
}

fn deserialize_age_patch<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_age(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_fields() -> StudentFields {
        StudentFields {
            nom: "Dupont".to_string(),
            prenom: "Marie".to_string(),
            filiere: "CS".to_string(),
            age: Some(21),
            email: "marie@example.com".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_fields() {
        assert!(valid_fields().validate().is_ok());
    }

    #[test]
    fn test_validate_allows_empty_prenom_and_age() {
        let fields = StudentFields {
            prenom: String::new(),
            age: None,
            ..valid_fields()
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_blank_required_field() {
        let fields = StudentFields {
            filiere: "   ".to_string(),
            ..valid_fields()
        };
        assert_eq!(fields.validate(), Err(ValidationError { field: "filiere" }));

        let fields = StudentFields {
            email: String::new(),
            ..valid_fields()
        };
        assert_eq!(fields.validate(), Err(ValidationError { field: "email" }));
    }

    #[test]
    fn test_fields_deserialize_with_missing_members() {
        let fields: StudentFields = serde_json::from_value(json!({"nom": "Dupont"})).unwrap();
        assert_eq!(fields.nom, "Dupont");
        assert_eq!(fields.prenom, "");
        assert_eq!(fields.age, None);
    }

    #[test]
    fn test_age_coercion() {
        let parse = |v: serde_json::Value| {
            serde_json::from_value::<StudentFields>(json!({ "age": v })).map(|f| f.age)
        };
        assert_eq!(parse(json!(20)).unwrap(), Some(20));
        assert_eq!(parse(json!(20.0)).unwrap(), Some(20));
        assert_eq!(parse(json!("22")).unwrap(), Some(22));
        assert_eq!(parse(json!("")).unwrap(), None);
        assert_eq!(parse(json!(null)).unwrap(), None);
        assert!(parse(json!("twenty")).is_err());
        assert!(parse(json!(20.5)).is_err());
    }

    #[test]
    fn test_age_out_of_range_rejected() {
        let parse = |v: serde_json::Value| {
            serde_json::from_value::<StudentFields>(json!({ "age": v })).map(|f| f.age)
        };
        assert!(parse(json!(1e30)).is_err());
        assert!(parse(json!(-1e30)).is_err());
        assert!(parse(json!(u64::MAX)).is_err());
        assert!(parse(json!(9223372036854775808.0)).is_err());
        assert_eq!(parse(json!(-9223372036854775808.0)).unwrap(), Some(i64::MIN));
    }

    #[test]
    fn test_patch_distinguishes_absent_and_null_age() {
        let absent: StudentPatch = serde_json::from_value(json!({"nom": "X"})).unwrap();
        assert_eq!(absent.age, None);

        let cleared: StudentPatch = serde_json::from_value(json!({"age": null})).unwrap();
        assert_eq!(cleared.age, Some(None));

        let mut fields = valid_fields();
        cleared.apply_to(&mut fields);
        assert_eq!(fields.age, None);
        assert_eq!(fields.nom, "Dupont");
    }

    #[test]
    fn test_record_wire_names() {
        let record = StudentRecord {
            storage_key: Uuid::nil(),
            display_id: 3,
            nom: "Dupont".to_string(),
            prenom: String::new(),
            filiere: "CS".to_string(),
            age: None,
            email: "a@x.com".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["id"], 3);
        assert!(value["age"].is_null());
    }
}
