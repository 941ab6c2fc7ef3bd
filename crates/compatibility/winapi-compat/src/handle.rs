//! 句柄表（Handle Table）
//!
//! The only bridge between a number the guest holds and a host-side object.
//! Lookups by name or object walk the table in insertion order and return
//! the first match.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::consts::*;
use crate::sid::Sid;
use crate::token::Token;

/// First id handed out when the caller does not choose one
pub const FIRST_AUTO_HANDLE: u64 = 0xa0000;

/// Host object wrapped by a handle
#[derive(Debug, Clone, PartialEq)]
pub enum HandleObject {
    None,
    /// Registry key, by full display path
    RegistryKey(String),
    Sid(Sid),
    ServiceManager {
        machine: Option<String>,
        database: Option<String>,
    },
    Service {
        manager: u64,
        name: String,
    },
    Token(Token),
    Opaque(String),
}

impl HandleObject {
    pub fn kind(&self) -> &'static str {
        match self {
            HandleObject::None => "none",
            HandleObject::RegistryKey(_) => "key",
            HandleObject::Sid(_) => "sid",
            HandleObject::ServiceManager { .. } => "scmanager",
            HandleObject::Service { .. } => "service",
            HandleObject::Token(_) => "token",
            HandleObject::Opaque(_) => "object",
        }
    }

    pub fn as_registry_key(&self) -> Option<&str> {
        match self {
            HandleObject::RegistryKey(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_sid(&self) -> Option<&Sid> {
        match self {
            HandleObject::Sid(sid) => Some(sid),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            HandleObject::Token(token) => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for HandleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleObject::None => write!(f, "<none>"),
            HandleObject::RegistryKey(path) => write!(f, "{path}"),
            HandleObject::Sid(sid) => write!(f, "{sid}"),
            HandleObject::ServiceManager { machine, database } => write!(
                f,
                "scmanager({}, {})",
                machine.as_deref().unwrap_or("local"),
                database.as_deref().unwrap_or("default")
            ),
            HandleObject::Service { name, .. } => write!(f, "service({name})"),
            HandleObject::Token(token) => write!(f, "token({})", token.user),
            HandleObject::Opaque(desc) => write!(f, "{desc}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    id: Option<u64>,
    pub name: Option<String>,
    pub obj: HandleObject,
}

impl Handle {
    pub fn new(obj: HandleObject) -> Self {
        Self {
            id: None,
            name: None,
            obj,
        }
    }

    /// Request a specific id instead of an automatically assigned one
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Assigned id; always set once the handle lives in a table
    pub fn id(&self) -> Option<u64> {
        self.id
    }
}

/// Fold the sign-extended form of a 32-bit handle (`(HANDLE)-11` on a
/// 64-bit guest) onto its 32-bit value
pub fn normalize_id(id: u64) -> u64 {
    if id >> 32 == 0xffff_ffff {
        id & 0xffff_ffff
    } else {
        id
    }
}

#[derive(Debug, Clone)]
pub struct HandleTable {
    // insertion sequence -> handle
    handles: BTreeMap<u64, Handle>,
    // id -> insertion sequence
    index: HashMap<u64, u64>,
    next_seq: u64,
    next_id: u64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            next_id: FIRST_AUTO_HANDLE,
        }
    }

    /// Table holding the standard streams and the predefined root keys
    pub fn with_predefined() -> Self {
        let mut table = Self::new();
        for (id, name) in [
            (STD_INPUT_HANDLE, "STD_INPUT_HANDLE"),
            (STD_OUTPUT_HANDLE, "STD_OUTPUT_HANDLE"),
            (STD_ERROR_HANDLE, "STD_ERROR_HANDLE"),
        ] {
            table.append(
                Handle::new(HandleObject::Opaque(name.to_string()))
                    .with_id(id)
                    .with_name(name),
            );
        }
        for (id, name) in ROOT_KEYS {
            table.append(
                Handle::new(HandleObject::RegistryKey(name.to_string()))
                    .with_id(id)
                    .with_name(name),
            );
        }
        table
    }

    /// Whether `id` is one of the handles every process starts with
    pub fn is_predefined(id: u64) -> bool {
        let id = normalize_id(id);
        ROOT_KEYS.iter().any(|(root, _)| *root == id)
            || [STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, STD_ERROR_HANDLE].contains(&id)
    }

    fn allocate_id(&mut self) -> u64 {
        loop {
            let id = self.next_id;
            self.next_id += 1;
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Store `handle`, assigning an id if it has none; returns the id
    ///
    /// An explicit id that is already live replaces the previous handle.
    pub fn append(&mut self, mut handle: Handle) -> u64 {
        let id = match handle.id {
            Some(id) => normalize_id(id),
            None => self.allocate_id(),
        };
        handle.id = Some(id);

        if let Some(seq) = self.index.remove(&id) {
            if let Some(old) = self.handles.remove(&seq) {
                tracing::warn!("handle {:#x} ({}) replaced", id, old.obj.kind());
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.handles.insert(seq, handle);
        self.index.insert(id, seq);
        id
    }

    pub fn get(&self, id: u64) -> Option<&Handle> {
        let seq = self.index.get(&normalize_id(id))?;
        self.handles.get(seq)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Handle> {
        let seq = self.index.get(&normalize_id(id))?;
        self.handles.get_mut(seq)
    }

    /// First handle carrying `name`
    pub fn search(&self, name: &str) -> Option<&Handle> {
        self.handles
            .values()
            .find(|h| h.name.as_deref() == Some(name))
    }

    /// First handle wrapping an object equal to `obj`
    pub fn search_by_obj(&self, obj: &HandleObject) -> Option<&Handle> {
        self.handles.values().find(|h| &h.obj == obj)
    }

    /// Remove a handle; unknown ids are ignored
    pub fn delete(&mut self, id: u64) -> Option<Handle> {
        let seq = self.index.remove(&normalize_id(id))?;
        self.handles.remove(&seq)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Live handles in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.handles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_ids() {
        let mut table = HandleTable::new();
        let a = table.append(Handle::new(HandleObject::Opaque("a".into())));
        let b = table.append(Handle::new(HandleObject::Opaque("b".into())));
        assert_eq!(a, FIRST_AUTO_HANDLE);
        assert_eq!(b, FIRST_AUTO_HANDLE + 1);
        assert_eq!(table.get(a).unwrap().id(), Some(a));
    }

    #[test]
    fn test_auto_ids_skip_live_explicit_ids() {
        let mut table = HandleTable::new();
        table.append(Handle::new(HandleObject::None).with_id(FIRST_AUTO_HANDLE));
        let id = table.append(Handle::new(HandleObject::None));
        assert_eq!(id, FIRST_AUTO_HANDLE + 1);
    }

    #[test]
    fn test_missing_and_deleted() {
        let mut table = HandleTable::with_predefined();
        assert!(table.get(0xdead_beef).is_none());
        // deleting an unknown id is a no-op
        assert!(table.delete(0xdead_beef).is_none());

        let id = table.append(Handle::new(HandleObject::RegistryKey("HKEY_USERS\\x".into())));
        assert!(table.delete(id).is_some());
        assert!(table.get(id).is_none());
    }

    #[test]
    fn test_search_first_in_insertion_order() {
        let mut table = HandleTable::new();
        let first = table.append(Handle::new(HandleObject::Opaque("x".into())).with_name("dup"));
        table.append(Handle::new(HandleObject::Opaque("y".into())).with_name("dup"));
        table.append(Handle::new(HandleObject::Opaque("x".into())));

        assert_eq!(table.search("dup").unwrap().id(), Some(first));
        let found = table.search_by_obj(&HandleObject::Opaque("x".into())).unwrap();
        assert_eq!(found.id(), Some(first));
        assert!(table.search("nothing").is_none());
    }

    #[test]
    fn test_sign_extended_predefined() {
        let table = HandleTable::with_predefined();
        let hklm = table.get(0xffff_ffff_8000_0002).unwrap();
        assert_eq!(hklm.obj.as_registry_key(), Some("HKEY_LOCAL_MACHINE"));
        assert_eq!(table.get(0xffff_ffff_ffff_fff5).unwrap().name.as_deref(), Some("STD_OUTPUT_HANDLE"));
        assert!(HandleTable::is_predefined(HKEY_CURRENT_USER));
        assert!(!HandleTable::is_predefined(FIRST_AUTO_HANDLE));
    }

    #[test]
    fn test_explicit_id_replaces() {
        let mut table = HandleTable::new();
        table.append(Handle::new(HandleObject::Opaque("old".into())).with_id(0x1000));
        table.append(Handle::new(HandleObject::Opaque("new".into())).with_id(0x1000));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0x1000).unwrap().obj, HandleObject::Opaque("new".into()));
    }
}
