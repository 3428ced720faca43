//! Connection settings for the control plane.
//!
//! Settings come from explicit values (flags / environment variables) first;
//! when a profile is named and something is still missing, the profile's
//! section in the INI credentials file fills the gaps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ControlPlaneError, Result};

pub const PROFILE_ENV: &str = "FACETS_PROFILE";
pub const URL_ENV: &str = "CONTROL_PLANE_URL";
pub const USERNAME_ENV: &str = "FACETS_USERNAME";
pub const TOKEN_ENV: &str = "FACETS_TOKEN";

const CREDENTIALS_URL_KEY: &str = "control_plane_url";
const CREDENTIALS_USERNAME_KEY: &str = "username";
const CREDENTIALS_TOKEN_KEY: &str = "token";

/// Fully resolved connection settings. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub api_base_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub profile: Option<String>,
}

impl Configuration {
    /// Token for display. Only tokens longer than eight characters keep
    /// their first four.
    pub fn masked_token(&self) -> String {
        if self.token.chars().count() <= 8 {
            return "********".to_string();
        }
        let visible: String = self.token.chars().take(4).collect();
        format!("{visible}****")
    }
}

/// Raw, possibly incomplete settings as they arrive from flags and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    pub profile: Option<String>,
    pub api_base_url: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl ConfigSource {
    pub fn from_env() -> Self {
        Self {
            profile: std::env::var(PROFILE_ENV).ok(),
            api_base_url: std::env::var(URL_ENV).ok(),
            username: std::env::var(USERNAME_ENV).ok(),
            token: std::env::var(TOKEN_ENV).ok(),
        }
    }

    fn is_complete(&self) -> bool {
        non_empty(&self.api_base_url).is_some()
            && non_empty(&self.username).is_some()
            && non_empty(&self.token).is_some()
    }
}

/// `~/.facets/credentials`, or `None` when no home directory is known.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".facets").join("credentials"))
}

/// Resolve settings, consulting `credentials_path` only when a profile is
/// named and an explicit value is missing.
pub fn resolve(source: &ConfigSource, credentials_path: Option<&Path>) -> Result<Configuration> {
    let mut merged = source.clone();
    let profile = non_empty(&source.profile).map(str::to_string);

    if let Some(profile) = profile.as_deref() {
        if !source.is_complete() {
            let path = credentials_path.ok_or_else(|| {
                ControlPlaneError::Configuration(format!(
                    "Profile '{profile}' requested but no credentials file location is known"
                ))
            })?;
            let sections = load_credentials(path)?;
            let section = find_section(&sections, profile).ok_or_else(|| {
                ControlPlaneError::Configuration(format!(
                    "Profile '{profile}' not found in credentials file '{}'",
                    path.display()
                ))
            })?;
            fill_missing(&mut merged.api_base_url, section.get(CREDENTIALS_URL_KEY));
            fill_missing(&mut merged.username, section.get(CREDENTIALS_USERNAME_KEY));
            fill_missing(&mut merged.token, section.get(CREDENTIALS_TOKEN_KEY));
        }
    }

    let mut missing = Vec::new();
    if non_empty(&merged.api_base_url).is_none() {
        missing.push("control plane URL");
    }
    if non_empty(&merged.username).is_none() {
        missing.push("username");
    }
    if non_empty(&merged.token).is_none() {
        missing.push("token");
    }
    if !missing.is_empty() {
        return Err(ControlPlaneError::Configuration(format!(
            "Control plane URL, username, and token are required; missing: {}",
            missing.join(", ")
        )));
    }

    Ok(Configuration {
        api_base_url: merged
            .api_base_url
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/')
            .to_string(),
        username: merged.username.unwrap_or_default().trim().to_string(),
        token: merged.token.unwrap_or_default().trim().to_string(),
        profile,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fill_missing(target: &mut Option<String>, fallback: Option<&String>) {
    if non_empty(target).is_none() {
        if let Some(value) = fallback {
            *target = Some(value.clone());
        }
    }
}

/// Read the INI credentials file into `section -> key -> value`.
///
/// Keys outside any section are dropped. Section and key lookups ignore case.
pub fn load_credentials(path: &Path) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let document = ::config::Config::builder()
        .add_source(::config::File::new(
            &path.to_string_lossy(),
            ::config::FileFormat::Ini,
        ))
        .build()
        .and_then(|settings| settings.try_deserialize::<BTreeMap<String, ::config::Value>>())
        .map_err(|e| {
            ControlPlaneError::Configuration(format!(
                "Failed to read credentials file '{}': {e}",
                path.display()
            ))
        })?;

    let mut sections = BTreeMap::new();
    for (name, value) in document {
        let Ok(table) = value.into_table() else {
            continue;
        };
        let entries: BTreeMap<String, String> = table
            .into_iter()
            .filter_map(|(key, value)| {
                let value = value.into_string().ok()?;
                Some((key.to_ascii_lowercase(), value.trim().to_string()))
            })
            .collect();
        sections.insert(name, entries);
    }
    Ok(sections)
}

fn find_section<'a>(
    sections: &'a BTreeMap<String, BTreeMap<String, String>>,
    profile: &str,
) -> Option<&'a BTreeMap<String, String>> {
    sections.get(profile).or_else(|| {
        sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(profile))
            .map(|(_, section)| section)
    })
}
