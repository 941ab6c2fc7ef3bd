//! 注册表仿真（Registry Emulation）
//!
//! A mutable key tree plus a read-only overlay taken from the `[REGISTRY]`
//! profile section. Overlay entries are written `KEY\VALUE = "data"` and
//! always win over the tree for reads; a hit is logged as an access but
//! never copied into the tree.
//!
//! Paths are `\`-separated and matched case-insensitively. A key keeps the
//! spelling it was first created with.

use std::collections::HashMap;
use std::fmt;

use emu_core::memory::{decode_cstring, decode_wstring, encode_cstring, encode_wstring};
use emu_core::{EmuError, GuestMemory, ProfileSection, Result};
use serde::Serialize;

use crate::consts::*;

/// A typed registry value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum RegValue {
    None,
    Sz(String),
    ExpandSz(String),
    Binary(Vec<u8>),
    Dword(u32),
    Qword(u64),
    /// Kept as the raw double-null-terminated block
    MultiSz(Vec<u8>),
}

impl RegValue {
    pub fn reg_type(&self) -> u32 {
        match self {
            RegValue::None => REG_NONE,
            RegValue::Sz(_) => REG_SZ,
            RegValue::ExpandSz(_) => REG_EXPAND_SZ,
            RegValue::Binary(_) => REG_BINARY,
            RegValue::Dword(_) => REG_DWORD,
            RegValue::Qword(_) => REG_QWORD,
            RegValue::MultiSz(_) => REG_MULTI_SZ,
        }
    }

    /// Decode guest bytes of type `ty`; strings stop at the first null
    ///
    /// Types outside the known set are kept as binary.
    pub fn from_raw(ty: u32, data: &[u8], wide: bool) -> Self {
        let string = || {
            if wide {
                decode_wstring(data)
            } else {
                decode_cstring(data)
            }
        };
        let mut fixed = [0u8; 8];
        let n = data.len().min(8);
        fixed[..n].copy_from_slice(&data[..n]);

        match ty {
            REG_NONE => RegValue::None,
            REG_SZ => RegValue::Sz(string()),
            REG_EXPAND_SZ => RegValue::ExpandSz(string()),
            REG_DWORD => RegValue::Dword(u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]])),
            REG_QWORD => RegValue::Qword(u64::from_le_bytes(fixed)),
            REG_MULTI_SZ => RegValue::MultiSz(data.to_vec()),
            _ => RegValue::Binary(data.to_vec()),
        }
    }

    /// Bytes handed back to the guest; strings in the requested width
    pub fn encode(&self, wide: bool) -> Vec<u8> {
        match self {
            RegValue::None => Vec::new(),
            RegValue::Sz(s) | RegValue::ExpandSz(s) => {
                if wide {
                    encode_wstring(s)
                } else {
                    encode_cstring(s)
                }
            }
            RegValue::Binary(data) | RegValue::MultiSz(data) => data.clone(),
            RegValue::Dword(v) => v.to_le_bytes().to_vec(),
            RegValue::Qword(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl fmt::Display for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegValue::None => write!(f, "(none)"),
            RegValue::Sz(s) | RegValue::ExpandSz(s) => write!(f, "\"{s}\""),
            RegValue::Dword(v) => write!(f, "{v:#x}"),
            RegValue::Qword(v) => write!(f, "{v:#x}"),
            RegValue::Binary(data) | RegValue::MultiSz(data) => write!(f, "<{} bytes>", data.len()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RegKey {
    path: String,
    // value name -> value, creation order; names compared case-insensitively
    values: Vec<(String, RegValue)>,
    // display names of direct children, creation order
    subkeys: Vec<String>,
}

impl RegKey {
    fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    fn value_index(&self, name: &str) -> Option<usize> {
        let folded = fold(name);
        self.values.iter().position(|(n, _)| fold(n) == folded)
    }
}

/// One access to the registry, from the overlay or the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegAccess {
    pub path: String,
    pub name: Option<String>,
    pub value: Option<RegValue>,
    pub from_profile: bool,
}

/// One value write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegWrite {
    pub path: String,
    pub name: String,
    pub value: RegValue,
}

/// Everything the guest did to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryDiff {
    pub created: Vec<String>,
    pub written: Vec<RegWrite>,
    pub deleted: Vec<String>,
    pub accessed: Vec<RegAccess>,
}

#[derive(Debug, Clone)]
pub struct RegistryManager {
    overlay: ProfileSection,
    // folded path -> key
    keys: HashMap<String, RegKey>,
    diff: RegistryDiff,
}

fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// Drop empty components: `HKLM\\a\` and `HKLM\a` name the same key
pub fn normalize_path(path: &str) -> String {
    path.split('\\')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

/// Join a key path and a sub-key, either of which may be empty
pub fn join_path(key: &str, sub: &str) -> String {
    normalize_path(&format!("{key}\\{sub}"))
}

fn parent_of(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('\\')
}

impl RegistryManager {
    pub fn new(overlay: ProfileSection) -> Self {
        let mut keys = HashMap::new();
        for (_, root) in ROOT_KEYS {
            keys.insert(fold(root), RegKey::new(root.to_string()));
        }
        tracing::debug!("registry ready, {} profile entries", overlay.len());
        Self {
            overlay,
            keys,
            diff: RegistryDiff::default(),
        }
    }

    pub fn overlay(&self) -> &ProfileSection {
        &self.overlay
    }

    pub fn exists(&self, path: &str) -> bool {
        self.keys.contains_key(&fold(&normalize_path(path)))
    }

    /// Spelling of `path` as stored, or the normalized input when absent
    pub fn display_path(&self, path: &str) -> String {
        let path = normalize_path(path);
        match self.keys.get(&fold(&path)) {
            Some(key) => key.path.clone(),
            None => path,
        }
    }

    /// Insert an empty key, creating missing ancestors
    ///
    /// Creating an existing key leaves it untouched.
    pub fn create(&mut self, path: &str) {
        let path = normalize_path(path);
        if path.is_empty() {
            return;
        }
        let mut current = String::new();
        for component in path.split('\\') {
            let parent = current.clone();
            if !current.is_empty() {
                current.push('\\');
            }
            current.push_str(component);

            let folded = fold(&current);
            if let Some(key) = self.keys.get(&folded) {
                // keep the first spelling for the rest of the path
                current = key.path.clone();
                continue;
            }
            if let Some(parent_key) = self.keys.get_mut(&fold(&parent)) {
                parent_key.subkeys.push(component.to_string());
            }
            self.keys.insert(folded, RegKey::new(current.clone()));
            self.diff.created.push(current.clone());
            tracing::debug!("registry key created: {}", current);
        }
    }

    /// Whether the overlay knows `path`, as an entry or as the key of one
    pub fn profile_has_key(&self, path: &str) -> bool {
        let folded = fold(&normalize_path(path));
        let prefix = format!("{folded}\\");
        self.overlay
            .keys()
            .map(fold)
            .any(|k| k == folded || k.starts_with(&prefix))
    }

    /// Look a value up, overlay first
    ///
    /// `requested` restricts the answer to one value type; `None` or
    /// `REG_NONE` accept any type.
    pub fn read(&mut self, path: &str, name: &str, requested: Option<u32>) -> Option<RegValue> {
        let path = normalize_path(path);
        let entry = format!("{path}\\{name}");

        let value = match self.overlay.get(&entry) {
            Some(raw) => {
                tracing::debug!("value for {} read from profile", entry);
                let value = RegValue::Sz(raw.to_string());
                self.record_access(&path, Some(name), Some(value.clone()), true);
                value
            }
            None => {
                let key = self.keys.get(&fold(&path))?;
                let idx = key.value_index(name)?;
                let value = key.values[idx].1.clone();
                self.record_access(&path, Some(name), Some(value.clone()), false);
                value
            }
        };

        match requested {
            Some(ty) if ty != REG_NONE && ty != value.reg_type() => None,
            _ => Some(value),
        }
    }

    /// Store a decoded value, creating the key if needed
    pub fn set_value(&mut self, path: &str, name: &str, value: RegValue) {
        self.create(path);
        let path = self.display_path(path);
        let Some(key) = self.keys.get_mut(&fold(&path)) else {
            return;
        };
        match key.value_index(name) {
            Some(idx) => key.values[idx].1 = value.clone(),
            None => key.values.push((name.to_string(), value.clone())),
        }
        tracing::debug!("registry write {}\\{} = {}", path, name, value);
        self.diff.written.push(RegWrite {
            path,
            name: name.to_string(),
            value,
        });
    }

    /// Decode `data` as a value of type `ty` and store it
    pub fn write(&mut self, path: &str, name: &str, ty: u32, data: &[u8], wide: bool) {
        self.set_value(path, name, RegValue::from_raw(ty, data, wide));
    }

    /// Write `value` at `dest`, never more than `max_size` bytes
    ///
    /// Returns the full encoded length, which exceeds `max_size` when the
    /// guest buffer was too small. A null `dest` writes nothing.
    pub fn write_reg_value_into_mem(
        &self,
        mem: &mut dyn GuestMemory,
        value: &RegValue,
        dest: u64,
        max_size: usize,
        wide: bool,
    ) -> Result<usize> {
        let data = value.encode(wide);
        if dest != 0 {
            let n = data.len().min(max_size);
            mem.write(dest, &data[..n])?;
        }
        Ok(data.len())
    }

    /// Remove the value `name` under `path`, or else the sub-key `name`
    ///
    /// Returns whether anything was removed.
    pub fn delete(&mut self, path: &str, name: &str) -> bool {
        self.delete_value(path, name) || self.delete_key(&join_path(path, name))
    }

    pub fn delete_value(&mut self, path: &str, name: &str) -> bool {
        let path = normalize_path(path);
        let Some(key) = self.keys.get_mut(&fold(&path)) else {
            return false;
        };
        let Some(idx) = key.value_index(name) else {
            return false;
        };
        key.values.remove(idx);
        self.diff.deleted.push(format!("{}\\{}", key.path, name));
        true
    }

    /// Remove a key and everything below it; root hives are never removed
    pub fn delete_key(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        if parent_of(&path).is_none() {
            tracing::warn!("refusing to delete root key {:?}", path);
            return false;
        }
        let folded = fold(&path);
        let Some(key) = self.keys.remove(&folded) else {
            return false;
        };

        let prefix = format!("{folded}\\");
        self.keys.retain(|k, _| !k.starts_with(&prefix));

        if let Some((parent, leaf)) = parent_of(&path) {
            if let Some(parent_key) = self.keys.get_mut(&fold(parent)) {
                let leaf = fold(leaf);
                parent_key.subkeys.retain(|s| fold(s) != leaf);
            }
        }
        tracing::debug!("registry key deleted: {}", key.path);
        self.diff.deleted.push(key.path);
        true
    }

    /// Overlay entries directly under `path` as `(value name, data)`
    fn profile_values(&self, path: &str) -> Vec<(String, String)> {
        let folded = fold(path);
        self.overlay
            .iter()
            .filter_map(|(k, v)| {
                let (parent, name) = k.rsplit_once('\\')?;
                (fold(&normalize_path(parent)) == folded).then(|| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Direct children of `path` implied by overlay entries
    fn profile_subkeys(&self, path: &str) -> Vec<String> {
        let depth = path.split('\\').count();
        let folded = fold(path);
        let mut out: Vec<String> = Vec::new();
        for key in self.overlay.keys() {
            let parts: Vec<&str> = key.split('\\').filter(|c| !c.is_empty()).collect();
            // the last component names a value, not a key
            if parts.len() < depth + 2 || fold(&parts[..depth].join("\\")) != folded {
                continue;
            }
            let child = parts[depth];
            if !out.iter().any(|o| fold(o) == fold(child)) {
                out.push(child.to_string());
            }
        }
        out
    }

    /// Sub-key `index` of `path`: tree children first, then overlay-only ones
    pub fn enum_subkey(&self, path: &str, index: usize) -> Option<String> {
        let path = normalize_path(path);
        let tree: Vec<String> = self
            .keys
            .get(&fold(&path))
            .map(|k| k.subkeys.clone())
            .unwrap_or_default();
        let extra = self
            .profile_subkeys(&path)
            .into_iter()
            .filter(|s| !tree.iter().any(|t| fold(t) == fold(s)));
        tree.iter().cloned().chain(extra).nth(index)
    }

    /// Value `index` of `path`: tree values first, then overlay-only ones
    pub fn enum_value(&self, path: &str, index: usize) -> Option<(String, RegValue)> {
        let path = normalize_path(path);
        let tree: Vec<(String, RegValue)> = self
            .keys
            .get(&fold(&path))
            .map(|k| k.values.clone())
            .unwrap_or_default();
        let extra = self
            .profile_values(&path)
            .into_iter()
            .filter(|(n, _)| !tree.iter().any(|(t, _)| fold(t) == fold(n)))
            .map(|(n, v)| (n, RegValue::Sz(v)));
        tree.iter().cloned().chain(extra).nth(index)
    }

    /// Record that the guest looked at `path` (and `name`)
    pub fn access(&mut self, path: &str, name: Option<&str>, value: Option<RegValue>) {
        let from_profile = match name {
            Some(n) => self.overlay.contains_key(&format!("{}\\{}", normalize_path(path), n)),
            None => self.profile_has_key(path),
        };
        self.record_access(path, name, value, from_profile);
    }

    fn record_access(&mut self, path: &str, name: Option<&str>, value: Option<RegValue>, from_profile: bool) {
        self.diff.accessed.push(RegAccess {
            path: normalize_path(path),
            name: name.map(str::to_string),
            value,
            from_profile,
        });
    }

    /// Whether `path\name` has been accessed so far
    pub fn was_accessed(&self, path: &str, name: &str) -> bool {
        let path = fold(&normalize_path(path));
        let name = fold(name);
        self.diff
            .accessed
            .iter()
            .any(|a| fold(&a.path) == path && a.name.as_deref().is_some_and(|n| fold(n) == name))
    }

    pub fn diff(&self) -> &RegistryDiff {
        &self.diff
    }

    /// The diff as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.diff)
            .map_err(|e| EmuError::InvalidConfig(format!("registry diff: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{Endian, GuestArch, SoftMemory};

    const KEY: &str = "HKEY_LOCAL_MACHINE\\Software\\X";

    fn manager() -> RegistryManager {
        let mut overlay = ProfileSection::new("REGISTRY");
        overlay.insert("HKEY_LOCAL_MACHINE\\Software\\Vendor\\Product", "from-profile");
        RegistryManager::new(overlay)
    }

    #[test]
    fn test_absent_path() {
        let mut reg = manager();
        assert!(!reg.exists(KEY));
        assert_eq!(reg.read(KEY, "Name", None), None);
        assert!(reg.exists("hkey_local_machine"));
    }

    #[test]
    fn test_create_keeps_first_spelling() {
        let mut reg = manager();
        reg.create(KEY);
        reg.create("hkey_local_machine\\SOFTWARE\\x\\Child");
        assert_eq!(reg.display_path("hkey_local_machine\\software\\x\\child"), format!("{KEY}\\Child"));
        assert_eq!(reg.enum_subkey("HKEY_LOCAL_MACHINE\\Software", 0).as_deref(), Some("X"));
        assert_eq!(reg.diff().created.len(), 3);
    }

    #[test]
    fn test_narrow_and_wide_writes() {
        let mut reg = manager();
        reg.write(KEY, "Name", REG_SZ, b"hello\0junk", false);
        reg.write(KEY, "Wide", REG_SZ, &encode_wstring("wörld"), true);
        assert_eq!(reg.read(KEY, "name", None), Some(RegValue::Sz("hello".into())));
        assert_eq!(reg.read(KEY, "Wide", Some(REG_SZ)), Some(RegValue::Sz("wörld".into())));
        assert_eq!(reg.read(KEY, "Wide", Some(REG_DWORD)), None);
        assert!(reg.was_accessed(KEY, "NAME"));
    }

    #[test]
    fn test_profile_shadows_tree() {
        let mut reg = manager();
        let key = "HKEY_LOCAL_MACHINE\\Software\\Vendor";
        reg.write(key, "Product", REG_SZ, b"from-tree\0", false);
        assert_eq!(reg.read(key, "Product", None), Some(RegValue::Sz("from-profile".into())));
        assert!(reg.was_accessed(key, "Product"));
        assert!(reg.diff().accessed.last().unwrap().from_profile);

        // the tree copy is untouched
        assert_eq!(
            reg.enum_value(key, 0),
            Some(("Product".into(), RegValue::Sz("from-tree".into())))
        );
    }

    #[test]
    fn test_profile_key_lookup() {
        let reg = manager();
        assert!(reg.profile_has_key("HKEY_LOCAL_MACHINE\\Software\\Vendor"));
        assert!(reg.profile_has_key("hkey_local_machine\\software"));
        assert!(!reg.profile_has_key("HKEY_LOCAL_MACHINE\\Software\\Vend"));
        assert_eq!(reg.enum_subkey("HKEY_LOCAL_MACHINE\\Software", 0).as_deref(), Some("Vendor"));
        assert_eq!(
            reg.enum_value("HKEY_LOCAL_MACHINE\\Software\\Vendor", 0),
            Some(("Product".into(), RegValue::Sz("from-profile".into())))
        );
    }

    #[test]
    fn test_truncated_write_reports_full_length() {
        let mut mem = SoftMemory::new(GuestArch::X86, Endian::Little);
        mem.map(0x1000, 0x1000, "buf").unwrap();
        let reg = manager();
        let value = RegValue::Sz("hello".into());

        let len = reg.write_reg_value_into_mem(&mut mem, &value, 0x1000, 3, false).unwrap();
        assert_eq!(len, 6);
        assert_eq!(mem.read_bytes(0x1000, 4).unwrap(), b"hel\0");

        let len = reg.write_reg_value_into_mem(&mut mem, &value, 0x1100, 0x100, true).unwrap();
        assert_eq!(len, 12);
        assert_eq!(mem.read_wstring(0x1100).unwrap(), "hello");

        assert_eq!(reg.write_reg_value_into_mem(&mut mem, &value, 0, 0, false).unwrap(), 6);
    }

    #[test]
    fn test_delete() {
        let mut reg = manager();
        reg.write(KEY, "Name", REG_DWORD, &7u32.to_le_bytes(), false);
        reg.create(&format!("{KEY}\\Sub\\Deeper"));

        assert!(reg.delete(KEY, "Name"));
        assert!(!reg.delete(KEY, "Name"));
        assert!(reg.delete(KEY, "sub"));
        assert!(!reg.exists(&format!("{KEY}\\Sub\\Deeper")));
        assert_eq!(reg.enum_subkey(KEY, 0), None);
        assert!(reg.exists(KEY));
    }

    #[test]
    fn test_root_keys_survive_delete() {
        let mut reg = manager();
        reg.create("HKEY_LOCAL_MACHINE\\Software\\Keep");
        assert!(!reg.delete_key("HKEY_LOCAL_MACHINE"));
        assert!(!reg.delete_key("hkey_local_machine\\"));
        assert!(!reg.delete("HKEY_LOCAL_MACHINE", ""));
        assert!(reg.exists("HKEY_LOCAL_MACHINE"));
        assert!(reg.exists("HKEY_LOCAL_MACHINE\\Software\\Keep"));
    }

    #[test]
    fn test_typed_values() {
        assert_eq!(RegValue::from_raw(REG_DWORD, &[1, 2, 3, 4], false), RegValue::Dword(0x0403_0201));
        assert_eq!(RegValue::from_raw(REG_QWORD, &[1], false), RegValue::Qword(1));
        assert_eq!(RegValue::from_raw(0x42, &[9], false), RegValue::Binary(vec![9]));
        assert_eq!(RegValue::Dword(5).encode(true), vec![5, 0, 0, 0]);
    }

    #[test]
    fn test_json_export() {
        let mut reg = manager();
        reg.write(KEY, "Name", REG_SZ, b"hi\0", false);
        let json = reg.export_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["written"][0]["name"], "Name");
        assert_eq!(parsed["written"][0]["value"]["type"], "Sz");
    }
}
