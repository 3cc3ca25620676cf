//! Student record and the typed merge override schema

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical student record as held by the Record Store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,

    /// National student identifier, when known
    pub ine: Option<String>,

    pub nom: String,

    pub prenom: String,

    pub email: Option<String>,

    pub telephone: Option<String>,

    pub date_naissance: Option<NaiveDate>,

    /// Number of enrollment dossiers attached to this record
    pub dossiers_count: i64,

    /// Deactivated records have been collapsed into a master by a merge
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Minimal constructor for a fresh, active record
    pub fn new(nom: impl Into<String>, prenom: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ine: None,
            nom: nom.into(),
            prenom: prenom.into(),
            email: None,
            telephone: None,
            date_naissance: None,
            dossiers_count: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field-level overrides applied to the master during a merge.
///
/// Every key is part of the fixed schema the Record Store recognizes;
/// unknown keys fail deserialization instead of being silently accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ine: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_naissance: Option<NaiveDate>,
}

impl StudentPatch {
    /// True when no override was requested
    pub fn is_empty(&self) -> bool {
        self.ine.is_none()
            && self.nom.is_none()
            && self.prenom.is_none()
            && self.email.is_none()
            && self.telephone.is_none()
            && self.date_naissance.is_none()
    }

    /// Write the chosen values onto the master record
    pub fn apply(&self, student: &mut Student) {
        if let Some(ref ine) = self.ine {
            student.ine = Some(ine.clone());
        }
        if let Some(ref nom) = self.nom {
            student.nom = nom.clone();
        }
        if let Some(ref prenom) = self.prenom {
            student.prenom = prenom.clone();
        }
        if let Some(ref email) = self.email {
            student.email = Some(email.clone());
        }
        if let Some(ref telephone) = self.telephone {
            student.telephone = Some(telephone.clone());
        }
        if let Some(date_naissance) = self.date_naissance {
            student.date_naissance = Some(date_naissance);
        }
        student.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut student = Student::new("Rakoto", "Jean");
        student.email = Some("jean.rakoto@univ.example".into());

        let patch = StudentPatch {
            nom: Some("Rakotoarisoa".into()),
            ..Default::default()
        };
        patch.apply(&mut student);

        assert_eq!(student.nom, "Rakotoarisoa");
        assert_eq!(student.prenom, "Jean");
        assert_eq!(student.email.as_deref(), Some("jean.rakoto@univ.example"));
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let raw = r#"{ "nom": "Rabe", "Etudiant_mail_typo": "x@y.z" }"#;
        let parsed: Result<StudentPatch, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(StudentPatch::default().is_empty());
        let patch = StudentPatch {
            email: Some("a@b.c".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
