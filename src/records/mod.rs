use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ValidationErrors;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Nhis,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub label: &'static str,
}

const NHIS_FIELDS: [FieldSpec; 3] = [
    FieldSpec {
        column: "opd_number",
        label: "OPD Number",
    },
    FieldSpec {
        column: "nhis_number",
        label: "NHIS Number",
    },
    FieldSpec {
        column: "ccc",
        label: "CCC",
    },
];

const PRIVATE_FIELDS: [FieldSpec; 5] = [
    FieldSpec {
        column: "name",
        label: "Name",
    },
    FieldSpec {
        column: "membership_number",
        label: "Membership Number",
    },
    FieldSpec {
        column: "company",
        label: "Company",
    },
    FieldSpec {
        column: "opd_number",
        label: "OPD Number",
    },
    FieldSpec {
        column: "phone",
        label: "Phone",
    },
];

impl Category {
    pub fn all() -> Vec<Category> {
        Category::iter().collect()
    }

    pub fn table(self) -> &'static str {
        match self {
            Category::Nhis => "records_nhis",
            Category::Private => "records_private",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Nhis => "NHIS Records",
            Category::Private => "Private Insurance Records",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Category::Nhis => "NHIS",
            Category::Private => "Private",
        }
    }

    /// Editable fields in form and column order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Category::Nhis => &NHIS_FIELDS,
            Category::Private => &PRIVATE_FIELDS,
        }
    }

    /// The three columns backing the free-text filters, in filter-slot order.
    pub fn search_fields(self) -> [FieldSpec; 3] {
        match self {
            Category::Nhis => NHIS_FIELDS,
            Category::Private => [PRIVATE_FIELDS[3], PRIVATE_FIELDS[0], PRIVATE_FIELDS[1]],
        }
    }

    pub fn field(self, column: &str) -> Option<FieldSpec> {
        self.fields()
            .iter()
            .copied()
            .find(|spec| spec.column == column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NhisFields {
    pub opd_number: String,
    pub nhis_number: String,
    pub ccc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivateFields {
    pub name: String,
    pub membership_number: String,
    pub company: String,
    pub opd_number: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordFields {
    Nhis(NhisFields),
    Private(PrivateFields),
}

impl RecordFields {
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Nhis => RecordFields::Nhis(NhisFields::default()),
            Category::Private => RecordFields::Private(PrivateFields::default()),
        }
    }

    /// Builds fields from values given in `Category::fields` order.
    /// Missing trailing values become empty strings.
    pub fn from_values<I, S>(category: Category, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter().map(Into::into);
        let mut next = || values.next().unwrap_or_default();
        match category {
            Category::Nhis => RecordFields::Nhis(NhisFields {
                opd_number: next(),
                nhis_number: next(),
                ccc: next(),
            }),
            Category::Private => RecordFields::Private(PrivateFields {
                name: next(),
                membership_number: next(),
                company: next(),
                opd_number: next(),
                phone: next(),
            }),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            RecordFields::Nhis(_) => Category::Nhis,
            RecordFields::Private(_) => Category::Private,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            RecordFields::Nhis(f) => vec![&f.opd_number, &f.nhis_number, &f.ccc],
            RecordFields::Private(f) => vec![
                &f.name,
                &f.membership_number,
                &f.company,
                &f.opd_number,
                &f.phone,
            ],
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.category()
            .fields()
            .iter()
            .position(|spec| spec.column == column)
            .and_then(|idx| self.values().get(idx).copied())
    }

    /// Returns a trimmed copy, or one error per blank required field.
    pub fn validate(&self) -> Result<RecordFields, ValidationErrors> {
        let category = self.category();
        let mut errors = ValidationErrors::default();
        let mut cleaned = Vec::with_capacity(category.fields().len());
        for (spec, value) in category.fields().iter().zip(self.values()) {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                errors.push(spec.column, format!("{} is required", spec.label));
            }
            cleaned.push(trimmed.to_string());
        }
        errors.into_result()?;
        Ok(RecordFields::from_values(category, cleaned))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub fields: RecordFields,
}

impl Record {
    pub fn category(&self) -> Category {
        self.fields.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validate_trims_and_reports_each_missing_field() {
        let fields = RecordFields::from_values(Category::Private, ["  Jane Doe ", "", "Acme", " "]);
        let errors = fields.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.for_field("membership_number"),
            Some("Membership Number is required")
        );
        assert_eq!(errors.for_field("opd_number"), Some("OPD Number is required"));
        assert_eq!(errors.for_field("phone"), Some("Phone is required"));
        assert!(errors.for_field("name").is_none());

        let ok = RecordFields::from_values(Category::Nhis, [" OPD-7 ", "N-1", "C"])
            .validate()
            .expect("valid");
        assert_eq!(ok.get("opd_number"), Some("OPD-7"));
    }

    #[test]
    fn private_search_slots_follow_filter_order() {
        let columns: Vec<_> = Category::Private
            .search_fields()
            .iter()
            .map(|spec| spec.column)
            .collect();
        assert_eq!(columns, vec!["opd_number", "name", "membership_number"]);
        assert_eq!(Category::from_str("NHIS").ok(), Some(Category::Nhis));
        assert_eq!(Category::Private.to_string(), "private");
    }
}
