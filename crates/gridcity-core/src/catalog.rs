//! The dirty tricks catalog.
//!
//! Trick numbers are data, loaded once at startup from YAML. The built-in
//! table ships with the crate (`data/tricks.yaml`); deployments can replace
//! it through `catalog.path`. Control logic only ever matches on the closed
//! [`TrickType`] enum.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use gridcity_types::TrickType;

use crate::config::{BP_SCALE, CatalogConfig};

const BUILTIN_CATALOG: &str = include_str!("../data/tricks.yaml");

/// Errors raised while loading a trick catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read trick catalog: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The YAML could not be parsed.
    #[error("failed to parse trick catalog: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// The same trick appears twice.
    #[error("trick {0} is defined more than once")]
    Duplicate(TrickType),

    /// A row holds an impossible value.
    #[error("trick {trick}: {reason}")]
    InvalidRow {
        /// The offending trick.
        trick: TrickType,
        /// What is wrong with it.
        reason: String,
    },
}

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrickDefinition {
    /// Which trick this row describes.
    pub id: TrickType,
    /// Display name.
    pub name: String,
    /// Cash deducted from the attacker, caught or not.
    pub cost: Decimal,
    /// Damage added to the target.
    pub base_damage: u8,
    /// Chance that installed security catches the attacker, before bonuses.
    pub security_catch_bp: u32,
    /// Chance that the police catch the attacker.
    pub police_catch_bp: u32,
    /// Minimum company level.
    pub level_required: u32,
    /// Whether the trick sets the target on fire.
    pub sets_fire: bool,
}

#[derive(Deserialize)]
struct CatalogFile {
    tricks: Vec<TrickDefinition>,
}

/// Immutable lookup table of trick definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrickCatalog {
    tricks: BTreeMap<TrickType, TrickDefinition>,
}

impl TrickCatalog {
    /// The catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] only if the embedded table is malformed.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CATALOG)
    }

    /// Load the catalog selected by `config`: the file at `config.path` when
    /// set, otherwise the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read or validated.
    pub fn load(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.path {
            Some(path) => Self::from_file(path)?,
            None => Self::builtin()?,
        };
        info!(
            tricks = catalog.len(),
            source = config
                .path
                .as_deref()
                .map_or_else(|| "builtin".to_owned(), |p| p.display().to_string()),
            "Trick catalog loaded"
        );
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read or validated.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a catalog from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on malformed YAML, duplicate rows, catch
    /// rates above 100%, non-positive costs, or zero damage.
    pub fn parse(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yml::from_str(yaml)?;
        let mut tricks = BTreeMap::new();
        for row in file.tricks {
            validate_row(&row)?;
            let id = row.id;
            if tricks.insert(id, row).is_some() {
                return Err(CatalogError::Duplicate(id));
            }
        }
        Ok(Self { tricks })
    }

    /// Row for `trick`, if the catalog defines it.
    pub fn get(&self, trick: TrickType) -> Option<&TrickDefinition> {
        self.tricks.get(&trick)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.tricks.len()
    }

    /// Whether the catalog has no rows.
    pub fn is_empty(&self) -> bool {
        self.tricks.is_empty()
    }

    /// Rows in [`TrickType`] order.
    pub fn definitions(&self) -> impl Iterator<Item = &TrickDefinition> {
        self.tricks.values()
    }
}

fn validate_row(row: &TrickDefinition) -> Result<(), CatalogError> {
    let reason = if row.cost <= Decimal::ZERO {
        Some(format!("cost must be positive, got {}", row.cost))
    } else if row.base_damage == 0 {
        Some("base_damage must be positive".to_owned())
    } else if row.security_catch_bp > BP_SCALE || row.police_catch_bp > BP_SCALE {
        Some(format!("catch rates must not exceed {BP_SCALE} basis points"))
    } else {
        None
    };
    reason.map_or(Ok(()), |reason| {
        Err(CatalogError::InvalidRow {
            trick: row.id,
            reason,
        })
    })
}
