//! Emulation profile
//!
//! A profile is a TOML document made of `[SECTION]` tables holding scalar
//! values. The core only consumes its lookup contract: sections by name and
//! keys inside a section, both matched case-insensitively. Values are kept
//! as strings; typed accessors parse on demand.
//!
//! ```toml
//! [SYSTEM]
//! permission = "root"
//!
//! [REGISTRY]
//! "HKEY_LOCAL_MACHINE\\Software\\Vendor\\Name" = "value"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EmuError, Result};

/// Built-in Windows defaults merged under every user profile
const DEFAULT_WINDOWS_PROFILE: &str = r#"
[OS32]
heap_address = "0x05000000"
heap_size = "0x05000000"
stack_address = "0xfffdd000"
stack_size = "0x21000"

[OS64]
heap_address = "0x500000000"
heap_size = "0x5000000"
stack_address = "0x7ffffffde000"
stack_size = "0x40000"

[SYSTEM]
permission = "root"
computername = "EMULATED-PC"
username = "User"

[REGISTRY]
"#;

/// One `[SECTION]` of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSection {
    name: String,
    // folded key -> (original key, value)
    entries: BTreeMap<String, (String, String)>,
}

impl ProfileSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive lookup
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&fold(key)).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Keys in their original spelling
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.entries.insert(fold(&key), (key, value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Integer value, decimal or `0x`-prefixed hex
    pub fn get_int(&self, key: &str) -> Result<Option<u64>> {
        self.get(key).map(|raw| parse_int(raw)).transpose()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|raw| {
            matches!(raw.to_ascii_lowercase().as_str(), "true" | "yes" | "on" | "1")
        })
    }
}

/// A whole profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    sections: BTreeMap<String, ProfileSection>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in Windows defaults
    pub fn windows_default() -> Self {
        // the embedded document is static and known to parse
        Self::from_toml(DEFAULT_WINDOWS_PROFILE).unwrap_or_default()
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let doc: BTreeMap<String, toml::Value> =
            toml::from_str(text).map_err(|e| EmuError::Profile(format!("TOML parse error: {e}")))?;

        let mut profile = Profile::new();
        for (name, value) in doc {
            let toml::Value::Table(table) = value else {
                return Err(EmuError::Profile(format!(
                    "top-level key '{name}' is not a section"
                )));
            };
            let section = profile.section_mut(&name);
            for (key, value) in table {
                section.insert(key.clone(), scalar_to_string(&name, &key, value)?);
            }
        }
        Ok(profile)
    }

    /// Defaults overlaid with the document at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EmuError::Profile(format!("{}: {e}", path.display())))?;
        Self::load(&text)
    }

    /// Defaults overlaid with a TOML document
    pub fn load(text: &str) -> Result<Self> {
        let mut profile = Self::windows_default();
        profile.merge(Self::from_toml(text)?);
        tracing::debug!("loaded profile with {} sections", profile.sections.len());
        Ok(profile)
    }

    /// Overlay `other`; its keys win
    pub fn merge(&mut self, other: Profile) {
        for (_, section) in other.sections {
            let target = self.section_mut(&section.name);
            for (_, (key, value)) in section.entries {
                target.insert(key, value);
            }
        }
    }

    /// Case-insensitive section lookup
    pub fn section(&self, name: &str) -> Option<&ProfileSection> {
        self.sections.get(&fold(name))
    }

    /// Section by name, created empty if absent
    pub fn section_mut(&mut self, name: &str) -> &mut ProfileSection {
        self.sections
            .entry(fold(name))
            .or_insert_with(|| ProfileSection::new(name))
    }

    /// Shorthand for `section(section)?.get(key)`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn sections(&self) -> impl Iterator<Item = &ProfileSection> {
        self.sections.values()
    }
}

fn fold(key: &str) -> String {
    key.to_lowercase()
}

fn scalar_to_string(section: &str, key: &str, value: toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(EmuError::Profile(format!(
            "[{section}] {key}: only scalar values are supported"
        ))),
    }
}

/// Parse decimal or `0x`-prefixed hexadecimal
pub fn parse_int(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => raw.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| EmuError::Profile(format!("'{raw}' is not an integer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let profile = Profile::windows_default();
        assert_eq!(profile.get("SYSTEM", "permission"), Some("root"));
        let os32 = profile.section("os32").unwrap();
        assert_eq!(os32.get_int("stack_address").unwrap(), Some(0xfffd_d000));
        assert!(profile.section("REGISTRY").unwrap().is_empty());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let profile = Profile::load(
            r#"
            [Registry]
            "HKEY_LOCAL_MACHINE\\Software\\X\\Name" = "profiled"
            "#,
        )
        .unwrap();
        let reg = profile.section("REGISTRY").unwrap();
        assert_eq!(reg.get("hkey_local_machine\\software\\x\\name"), Some("profiled"));
        assert_eq!(
            reg.keys().collect::<Vec<_>>(),
            vec!["HKEY_LOCAL_MACHINE\\Software\\X\\Name"]
        );
    }

    #[test]
    fn test_user_profile_overrides_defaults() {
        let profile = Profile::load("[SYSTEM]\npermission = \"user\"\n").unwrap();
        assert_eq!(profile.get("system", "PERMISSION"), Some("user"));
        // untouched defaults survive the merge
        assert_eq!(profile.get("SYSTEM", "username"), Some("User"));
    }

    #[test]
    fn test_scalar_normalisation() {
        let profile = Profile::from_toml("[A]\nn = 16\nflag = true\n").unwrap();
        let a = profile.section("A").unwrap();
        assert_eq!(a.get("n"), Some("16"));
        assert_eq!(a.get_bool("flag"), Some(true));
        assert!(Profile::from_toml("[A]\nlist = [1, 2]\n").is_err());
        assert!(Profile::from_toml("loose = 1\n").is_err());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x7ffffffde000").unwrap(), 0x7fff_fffd_e000);
        assert_eq!(parse_int("4096").unwrap(), 4096);
        assert!(parse_int("nope").is_err());
    }
}
