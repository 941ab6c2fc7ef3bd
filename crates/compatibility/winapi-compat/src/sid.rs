//! 安全标识符（SID）
//!
//! In-memory layout:
//!
//! ```text
//! +0  Revision            u8
//! +1  SubAuthorityCount   u8
//! +2  IdentifierAuthority [u8; 6]   (big endian)
//! +8  SubAuthority        [u32; n]  (little endian)
//! ```

use std::cell::OnceCell;
use std::fmt;

use emu_core::{EmuError, GuestMemory, Result};
use serde::Serialize;

use crate::consts::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sid {
    pub revision: u8,
    pub authority: [u8; 6],
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    pub const REVISION: u8 = 1;
    /// Offset of `SubAuthorityCount`
    pub const SUB_AUTHORITY_COUNT_OFFSET: u64 = 1;
    /// Offset of the first `SubAuthority` entry
    pub const SUB_AUTHORITY_OFFSET: u64 = 8;
    /// Largest `SubAuthorityCount` the structure can carry
    pub const MAX_SUB_AUTHORITIES: usize = 15;

    pub fn new(authority: [u8; 6], sub_authorities: &[u32]) -> Self {
        Self {
            revision: Self::REVISION,
            authority,
            sub_authorities: sub_authorities.to_vec(),
        }
    }

    /// A SID under `SECURITY_NT_AUTHORITY`
    pub fn nt(sub_authorities: &[u32]) -> Self {
        Self::new(SECURITY_NT_AUTHORITY, sub_authorities)
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        Self::SUB_AUTHORITY_OFFSET as usize + 4 * self.sub_authorities.len()
    }

    /// Offset of sub-authority `index`
    pub fn sub_authority_offset(index: usize) -> u64 {
        Self::SUB_AUTHORITY_OFFSET + 4 * index as u64
    }

    /// Identifier authority as a 48-bit number
    pub fn authority_value(&self) -> u64 {
        self.authority.iter().fold(0, |acc, b| (acc << 8) | *b as u64)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.revision);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority);
        for sub in &self.sub_authorities {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// Decode a SID stored in guest memory
    pub fn read_from(mem: &dyn GuestMemory, addr: u64) -> Result<Self> {
        let header = mem.read_bytes(addr, Self::SUB_AUTHORITY_OFFSET as usize)?;
        let count = header[1] as usize;
        if count > Self::MAX_SUB_AUTHORITIES {
            return Err(EmuError::InvalidConfig(format!(
                "SID at {addr:#x} claims {count} sub-authorities"
            )));
        }

        let mut authority = [0u8; 6];
        authority.copy_from_slice(&header[2..8]);
        let body = mem.read_bytes(addr + Self::SUB_AUTHORITY_OFFSET, 4 * count)?;
        let sub_authorities = body
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            revision: header[0],
            authority,
            sub_authorities,
        })
    }
}

/// `S-1-5-32-544` form
impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority_value())?;
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

/// Built-in alias groups with a fixed, well-known SID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    Administrators,
    Users,
    Guests,
    PowerUsers,
}

impl WellKnown {
    pub const ALL: [WellKnown; 4] = [
        WellKnown::Administrators,
        WellKnown::Users,
        WellKnown::Guests,
        WellKnown::PowerUsers,
    ];

    pub fn rid(self) -> u32 {
        match self {
            WellKnown::Administrators => DOMAIN_ALIAS_RID_ADMINS,
            WellKnown::Users => DOMAIN_ALIAS_RID_USERS,
            WellKnown::Guests => DOMAIN_ALIAS_RID_GUESTS,
            WellKnown::PowerUsers => DOMAIN_ALIAS_RID_POWER_USERS,
        }
    }
}

/// Per-process cache of the well-known SIDs
///
/// Each SID is built on first request and frozen afterwards. Two processes
/// never share a cache.
#[derive(Debug, Default)]
pub struct WellKnownSids {
    admins: OnceCell<Sid>,
    users: OnceCell<Sid>,
    guests: OnceCell<Sid>,
    power_users: OnceCell<Sid>,
}

impl WellKnownSids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, which: WellKnown) -> &Sid {
        let cell = match which {
            WellKnown::Administrators => &self.admins,
            WellKnown::Users => &self.users,
            WellKnown::Guests => &self.guests,
            WellKnown::PowerUsers => &self.power_users,
        };
        cell.get_or_init(|| {
            tracing::debug!("building well-known SID {:?}", which);
            Sid::nt(&[SECURITY_BUILTIN_DOMAIN_RID, which.rid()])
        })
    }

    /// Which well-known SID `sid` equals, compared by value
    pub fn classify(&self, sid: &Sid) -> Option<WellKnown> {
        WellKnown::ALL.into_iter().find(|w| self.get(*w) == sid)
    }

    /// Membership of the calling principal in `sid`
    ///
    /// Administrators and power users follow the configured privilege; users
    /// always match and guests never do. Any other SID is not modelled.
    pub fn check_membership(&self, sid: &Sid, privileged: bool) -> Result<bool> {
        match self.classify(sid) {
            Some(WellKnown::Administrators | WellKnown::PowerUsers) => Ok(privileged),
            Some(WellKnown::Users) => Ok(true),
            Some(WellKnown::Guests) => Ok(false),
            None => Err(EmuError::not_implemented(
                "advapi32",
                format!("token membership for {sid}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{Endian, GuestArch, SoftMemory};

    #[test]
    fn test_layout() {
        let sid = Sid::nt(&[0x20, 0x220]);
        assert_eq!(sid.size(), 16);
        assert_eq!(
            sid.to_bytes(),
            [1, 2, 0, 0, 0, 0, 0, 5, 0x20, 0, 0, 0, 0x20, 0x02, 0, 0]
        );
        assert_eq!(sid.to_string(), "S-1-5-32-544");
        assert_eq!(Sid::sub_authority_offset(1), 12);
    }

    #[test]
    fn test_read_back_from_memory() {
        let mut mem = SoftMemory::new(GuestArch::X86, Endian::Little);
        mem.map(0x1000, 0x1000, "heap").unwrap();
        let sid = Sid::new(SECURITY_MANDATORY_LABEL_AUTHORITY, &[SECURITY_MANDATORY_HIGH_RID]);
        mem.write(0x1000, &sid.to_bytes()).unwrap();
        assert_eq!(Sid::read_from(&mem, 0x1000).unwrap(), sid);
    }

    #[test]
    fn test_well_known_singletons() {
        let sids = WellKnownSids::new();
        let a = sids.get(WellKnown::Administrators).clone();
        let b = sids.get(WellKnown::Administrators);
        assert_eq!(&a, b);
        assert_eq!(sids.classify(&Sid::nt(&[0x20, 0x223])), Some(WellKnown::PowerUsers));

        // a fresh process rebuilds an equal value
        let other = WellKnownSids::new();
        assert_eq!(other.get(WellKnown::Administrators), &a);
    }

    #[test]
    fn test_membership_rules() {
        let sids = WellKnownSids::new();
        let admins = sids.get(WellKnown::Administrators).clone();
        assert!(sids.check_membership(&admins, true).unwrap());
        assert!(!sids.check_membership(&admins, false).unwrap());
        let users = sids.get(WellKnown::Users).clone();
        assert!(sids.check_membership(&users, false).unwrap());
        let guests = sids.get(WellKnown::Guests).clone();
        assert!(!sids.check_membership(&guests, true).unwrap());

        let everyone = Sid::new([0, 0, 0, 0, 0, 1], &[0]);
        assert!(sids.check_membership(&everyone, true).unwrap_err().is_not_implemented());
    }
}
