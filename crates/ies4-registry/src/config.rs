//! Registry configuration: the region map and write policy.

use crate::error::{RegistryError, Result};
use crate::paths::{PathResolver, RegionContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One region's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    /// File name, looked up in each search directory.
    pub file: String,
    pub display_name: String,
}

impl RegionEntry {
    fn new(file: &str, display_name: &str) -> Self {
        Self {
            file: file.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// Configuration for the registry editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Region code -> document.
    pub regions: BTreeMap<String, RegionEntry>,
    /// Region used when none is given.
    pub default_region: String,
    /// Searched after the built-in candidate directories.
    pub search_dirs: Vec<PathBuf>,
    /// Take a timestamped copy before each write.
    pub backup: bool,
    /// Refuse to save when the file changed since it was loaded.
    pub guard_concurrent_writes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let regions = [
            ("combined", "ies4_consolidated.json", "Combined Database"),
            ("usa", "ies4_usa_consolidated.json", "United States"),
            ("uk", "ies4_uk_consolidated.json", "United Kingdom"),
            ("sweden", "ies4_sweden_consolidated.json", "Sweden"),
            ("russia", "ies4_russia_consolidated.json", "Russia"),
            ("poland", "ies4_poland_consolidated.json", "Poland"),
            ("germany", "ies4_germany_consolidated.json", "Germany"),
            ("finland", "ies4_finland_consolidated.json", "Finland"),
            ("iran", "ies4_iran_consolidated.json", "Iran"),
            ("china", "ies4_china_consolidated.json", "China"),
            ("france", "ies4_france_consolidated.json", "France"),
            ("north_korea", "ies4_north_korea_consolidated.json", "North Korea"),
            ("OP1", "donetsk_oblast.json", "Donetsk Oblast"),
            ("OP2", "dnipropetrovsk_oblast.json", "Dnipropetrovsk Oblast"),
            ("OP3", "zaporizhzhia_oblast.json", "Zaporizhzhia Oblast"),
            ("OP4", "kyiv_oblast.json", "Kyiv Oblast"),
            ("OP5", "kirovohrad_oblast.json", "Kirovohrad Oblast"),
            ("OP6", "mykolaiv_oblast.json", "Mykolaiv Oblast"),
            ("OP7", "odesa_oblast.json", "Odesa Oblast"),
            ("OP8", "sumy_oblast.json", "Sumy Oblast"),
        ]
        .into_iter()
        .map(|(code, file, name)| (code.to_string(), RegionEntry::new(file, name)))
        .collect();

        Self {
            regions,
            default_region: "OP7".to_string(),
            search_dirs: Vec::new(),
            backup: true,
            guard_concurrent_writes: true,
        }
    }
}

impl RegistryConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Region codes match exactly first, then case-insensitively.
    pub fn region(&self, code: &str) -> Result<(&str, &RegionEntry)> {
        let code = code.trim();
        self.regions
            .get_key_value(code)
            .or_else(|| {
                self.regions
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(code))
            })
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| RegistryError::UnknownRegion {
                code: code.to_string(),
                valid: self.regions.keys().cloned().collect(),
            })
    }

    /// Resolve `code` (or the default region) into an explicit context.
    pub fn context(&self, code: Option<&str>, resolver: &PathResolver) -> Result<RegionContext> {
        let (code, entry) = self.region(code.unwrap_or(&self.default_region))?;
        Ok(RegionContext {
            code: code.to_string(),
            display_name: entry.display_name.clone(),
            path: resolver.resolve(&entry.file),
        })
    }
}
