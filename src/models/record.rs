//! Import record and reference record models.

use serde::{Deserialize, Serialize};

/// The closed set of destination columns an import mapping may target.
///
/// Source CSV headers are open-ended; destinations are not. Unsupported
/// destinations in a mapping are dropped during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationColumn {
    Hexacle,
    Numero,
    Voie,
    Ville,
    CodPost,
    CodInsee,
}

impl DestinationColumn {
    /// All supported destination columns, in canonical order.
    pub const ALL: [DestinationColumn; 6] = [
        Self::Hexacle,
        Self::Numero,
        Self::Voie,
        Self::Ville,
        Self::CodPost,
        Self::CodInsee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hexacle => "hexacle",
            Self::Numero => "numero",
            Self::Voie => "voie",
            Self::Ville => "ville",
            Self::CodPost => "cod_post",
            Self::CodInsee => "cod_insee",
        }
    }

    /// Parse a destination column name. Names are lower-cased and trimmed
    /// before the check, so "HEXACLE" and " CodPost " both resolve.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hexacle" => Some(Self::Hexacle),
            "numero" => Some(Self::Numero),
            "voie" => Some(Self::Voie),
            "ville" => Some(Self::Ville),
            "cod_post" => Some(Self::CodPost),
            "cod_insee" => Some(Self::CodInsee),
            _ => None,
        }
    }
}

impl std::fmt::Display for DestinationColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized input row.
///
/// Field values are trimmed; empty-after-trim is coerced to None. Records
/// where every mapped field is None are skipped by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Origin identifier (file/job scoped).
    pub source_id: String,
    pub hexacle: Option<String>,
    pub numero: Option<String>,
    pub voie: Option<String>,
    pub ville: Option<String>,
    pub cod_post: Option<String>,
    pub cod_insee: Option<String>,
}

impl ImportRecord {
    /// True iff at least one mapped destination field is non-null.
    pub fn has_mapped_value(&self) -> bool {
        self.hexacle.is_some()
            || self.numero.is_some()
            || self.voie.is_some()
            || self.ville.is_some()
            || self.cod_post.is_some()
            || self.cod_insee.is_some()
    }

    /// Read a destination field by column.
    pub fn get(&self, column: DestinationColumn) -> Option<&str> {
        match column {
            DestinationColumn::Hexacle => self.hexacle.as_deref(),
            DestinationColumn::Numero => self.numero.as_deref(),
            DestinationColumn::Voie => self.voie.as_deref(),
            DestinationColumn::Ville => self.ville.as_deref(),
            DestinationColumn::CodPost => self.cod_post.as_deref(),
            DestinationColumn::CodInsee => self.cod_insee.as_deref(),
        }
    }

    /// Write a destination field by column.
    pub fn set(&mut self, column: DestinationColumn, value: Option<String>) {
        match column {
            DestinationColumn::Hexacle => self.hexacle = value,
            DestinationColumn::Numero => self.numero = value,
            DestinationColumn::Voie => self.voie = value,
            DestinationColumn::Ville => self.ville = value,
            DestinationColumn::CodPost => self.cod_post = value,
            DestinationColumn::CodInsee => self.cod_insee = value,
        }
    }
}

/// A record from the reference contacts store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
    pub landline_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_parse_is_case_insensitive() {
        assert_eq!(
            DestinationColumn::parse("HEXACLE"),
            Some(DestinationColumn::Hexacle)
        );
        assert_eq!(
            DestinationColumn::parse(" Cod_Post "),
            Some(DestinationColumn::CodPost)
        );
        assert_eq!(DestinationColumn::parse("street"), None);
    }

    #[test]
    fn test_has_mapped_value() {
        let mut record = ImportRecord::default();
        assert!(!record.has_mapped_value());

        record.set(DestinationColumn::Ville, Some("Paris".to_string()));
        assert!(record.has_mapped_value());
    }
}
