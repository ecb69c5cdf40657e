// Prefill sources: read-only citizen profile consulted once before a wizard starts

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitizenProfile {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub passport_number: String,
    pub national_id: String,
}

pub trait ProfileProvider {
    fn profile(&self) -> Result<Option<CitizenProfile>>;
}

/// No logged-in user; wizards start empty.
#[derive(Debug, Default)]
pub struct NoProfile;

impl ProfileProvider for NoProfile {
    fn profile(&self) -> Result<Option<CitizenProfile>> {
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct StaticProfile(pub CitizenProfile);

impl ProfileProvider for StaticProfile {
    fn profile(&self) -> Result<Option<CitizenProfile>> {
        Ok(Some(self.0.clone()))
    }
}

/// Profile stored as a TOML file, e.g.
///
/// ```toml
/// full_name = "Ayesha Khan"
/// email = "ayesha@example.org"
/// passport_number = "AB1234567"
/// ```
#[derive(Debug, Clone)]
pub struct TomlProfileFile {
    path: PathBuf,
}

impl TomlProfileFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileProvider for TomlProfileFile {
    fn profile(&self) -> Result<Option<CitizenProfile>> {
        if !self.path.exists() {
            info!(
                "[PHASE: prefill] [STEP: load_profile] no profile at {:?}, starting empty",
                self.path
            );
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read profile file: {:?}", self.path))?;
        let profile: CitizenProfile = toml::from_str(&raw)
            .with_context(|| format!("Profile file is not valid TOML: {:?}", self.path))?;

        info!(
            "[PHASE: prefill] [STEP: load_profile] loaded profile from {:?}",
            self.path
        );
        Ok(Some(profile))
    }
}
