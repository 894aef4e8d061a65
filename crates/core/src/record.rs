//! Record types
//!
//! - Record: a stored catalog entry (with surrogate `id`)
//! - RecordDraft: a record before the store assigns an `id`
//! - RecordPatch: per-field optional update

use serde::{Deserialize, Deserializer, Serialize};

use crate::query::{Column, FieldValue};

/// Store-assigned surrogate identifier
pub type RecordId = i64;

/// A catalog entry as persisted in the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Surrogate key, immutable once assigned
    pub id: RecordId,
    /// Externally meaningful unique key
    pub number: i64,
    pub name: String,
    pub category_primary: Option<String>,
    pub category_secondary: Option<String>,
    pub total: i64,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub sp_atk: i64,
    pub sp_def: i64,
    pub speed: i64,
    pub generation: i64,
    pub legendary: bool,
}

impl Record {
    /// Attach a store-assigned id to a draft
    pub fn from_draft(id: RecordId, draft: RecordDraft) -> Self {
        Self {
            id,
            number: draft.number,
            name: draft.name,
            category_primary: draft.category_primary,
            category_secondary: draft.category_secondary,
            total: draft.total,
            hp: draft.hp,
            attack: draft.attack,
            defense: draft.defense,
            sp_atk: draft.sp_atk,
            sp_def: draft.sp_def,
            speed: draft.speed,
            generation: draft.generation,
            legendary: draft.legendary,
        }
    }

    /// Typed accessor for a column
    pub fn value(&self, column: Column) -> FieldValue<'_> {
        match column {
            Column::Id => FieldValue::Integer(self.id),
            Column::Number => FieldValue::Integer(self.number),
            Column::Name => FieldValue::Text(Some(&self.name)),
            Column::CategoryPrimary => FieldValue::Text(self.category_primary.as_deref()),
            Column::CategorySecondary => FieldValue::Text(self.category_secondary.as_deref()),
            Column::Total => FieldValue::Integer(self.total),
            Column::Hp => FieldValue::Integer(self.hp),
            Column::Attack => FieldValue::Integer(self.attack),
            Column::Defense => FieldValue::Integer(self.defense),
            Column::SpAtk => FieldValue::Integer(self.sp_atk),
            Column::SpDef => FieldValue::Integer(self.sp_def),
            Column::Speed => FieldValue::Integer(self.speed),
            Column::Generation => FieldValue::Integer(self.generation),
            Column::Legendary => FieldValue::Boolean(self.legendary),
        }
    }

    /// Apply the fields present in `patch`, leaving the rest untouched
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(category) = &patch.category_primary {
            self.category_primary = category.clone();
        }
        if let Some(category) = &patch.category_secondary {
            self.category_secondary = category.clone();
        }
        let stats = [
            (&mut self.total, patch.total),
            (&mut self.hp, patch.hp),
            (&mut self.attack, patch.attack),
            (&mut self.defense, patch.defense),
            (&mut self.sp_atk, patch.sp_atk),
            (&mut self.sp_def, patch.sp_def),
            (&mut self.speed, patch.speed),
            (&mut self.generation, patch.generation),
        ];
        for (field, value) in stats {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(legendary) = patch.legendary {
            self.legendary = legendary;
        }
    }

    /// The mutable fields of this record as a draft
    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            number: self.number,
            name: self.name.clone(),
            category_primary: self.category_primary.clone(),
            category_secondary: self.category_secondary.clone(),
            total: self.total,
            hp: self.hp,
            attack: self.attack,
            defense: self.defense,
            sp_atk: self.sp_atk,
            sp_def: self.sp_def,
            speed: self.speed,
            generation: self.generation,
            legendary: self.legendary,
        }
    }
}

/// A record minus its surrogate id
///
/// Used as the create payload and as the Importer's output row. Absent
/// numeric fields default to 0, `legendary` to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub number: i64,
    pub name: String,
    #[serde(default)]
    pub category_primary: Option<String>,
    #[serde(default)]
    pub category_secondary: Option<String>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub hp: i64,
    #[serde(default)]
    pub attack: i64,
    #[serde(default)]
    pub defense: i64,
    #[serde(default)]
    pub sp_atk: i64,
    #[serde(default)]
    pub sp_def: i64,
    #[serde(default)]
    pub speed: i64,
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub legendary: bool,
}

impl RecordDraft {
    /// Draft with only the required fields set
    pub fn new(number: i64, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            category_primary: None,
            category_secondary: None,
            total: 0,
            hp: 0,
            attack: 0,
            defense: 0,
            sp_atk: 0,
            sp_def: 0,
            speed: 0,
            generation: 0,
            legendary: false,
        }
    }

    /// Patch that overwrites every mutable field with this draft's values
    pub fn as_full_patch(&self) -> RecordPatch {
        RecordPatch {
            name: Some(self.name.clone()),
            category_primary: Some(self.category_primary.clone()),
            category_secondary: Some(self.category_secondary.clone()),
            total: Some(self.total),
            hp: Some(self.hp),
            attack: Some(self.attack),
            defense: Some(self.defense),
            sp_atk: Some(self.sp_atk),
            sp_def: Some(self.sp_def),
            speed: Some(self.speed),
            generation: Some(self.generation),
            legendary: Some(self.legendary),
        }
    }
}

/// Partial update of a record
///
/// `None` means the field was absent from the payload. Category fields carry a
/// second level of `Option` so that an explicit `null` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_primary: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_secondary: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_atk: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_def: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legendary: Option<bool>,
}

impl RecordPatch {
    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// A field that is present in the payload, even as `null`, becomes `Some(..)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
