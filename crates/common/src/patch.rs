//! Present/absent field values for partial updates.

use serde::{Deserialize, Deserializer};

/// A single field of a partial-update request.
///
/// A field missing from the JSON body is [`Patch::Absent`]; a field that is
/// present, including an explicit `null` for `Patch<Option<T>>`, is
/// [`Patch::Present`]. Request structs mark every `Patch` field with
/// `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Present(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Patch::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Absent => None,
            Patch::Present(value) => Some(value),
        }
    }

    /// Overwrites `target` when the field is present.
    pub fn apply_to(self, target: &mut T) {
        if let Patch::Present(value) = self {
            *target = value;
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Present(value),
            None => Patch::Absent,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Present)
    }
}
