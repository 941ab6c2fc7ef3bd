//! 访问令牌（Access Token）
//!
//! The process token only answers `GetTokenInformation`. Structures that
//! embed a `PSID` are laid out with the SID bytes directly after the fixed
//! part, so the pointer depends on where the caller's buffer lives.

use emu_core::memory::pack;
use emu_core::Endian;

use crate::consts::*;
use crate::sid::Sid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub user: Sid,
    pub integrity: Sid,
    pub elevated: bool,
    pub ui_access: bool,
}

/// RID of the emulated user account inside its machine domain
pub const USER_RID: u32 = 1000;
const MACHINE_DOMAIN: [u32; 4] = [21, 0x4d2_1a0b, 0x1f37_c2e0, 0x3a5b_9c11];

impl Token {
    /// Token of the emulated principal
    pub fn for_principal(privileged: bool) -> Self {
        let mut user = MACHINE_DOMAIN.to_vec();
        user.push(USER_RID);
        let rid = if privileged {
            SECURITY_MANDATORY_HIGH_RID
        } else {
            SECURITY_MANDATORY_MEDIUM_RID
        };
        Self {
            user: Sid::nt(&user),
            integrity: Sid::new(SECURITY_MANDATORY_LABEL_AUTHORITY, &[rid]),
            elevated: privileged,
            ui_access: false,
        }
    }

    /// Encoded information for `class`, as placed at `dest`
    ///
    /// The length never depends on `dest`. Returns `None` for classes with no
    /// data behind them.
    pub fn information(&self, class: u32, dest: u64, pointer_size: usize, endian: Endian) -> Option<Vec<u8>> {
        let dword = |v: u32| pack(v as u64, 4, endian);
        match class {
            TOKEN_USER => Some(sid_and_attributes(&self.user, 0, dest, pointer_size, endian)),
            TOKEN_GROUPS => {
                // GroupCount = 0 followed by one zeroed SID_AND_ATTRIBUTES
                let header = pointer_size.max(4);
                Some(vec![0u8; header + 2 * pointer_size])
            }
            TOKEN_ELEVATION_TYPE => Some(dword(if self.elevated {
                TOKEN_ELEVATION_TYPE_FULL
            } else {
                TOKEN_ELEVATION_TYPE_LIMITED
            })),
            TOKEN_ELEVATION => Some(dword(self.elevated as u32)),
            TOKEN_INTEGRITY_LEVEL => Some(sid_and_attributes(
                &self.integrity,
                SE_GROUP_INTEGRITY,
                dest,
                pointer_size,
                endian,
            )),
            TOKEN_UI_ACCESS => Some(dword(self.ui_access as u32)),
            _ => None,
        }
    }
}

/// `SID_AND_ATTRIBUTES` followed by the SID it points at
fn sid_and_attributes(sid: &Sid, attributes: u32, dest: u64, pointer_size: usize, endian: Endian) -> Vec<u8> {
    let fixed = 2 * pointer_size;
    let mut out = pack(dest.wrapping_add(fixed as u64), pointer_size, endian);
    out.extend_from_slice(&pack(attributes as u64, 4, endian));
    out.resize(fixed, 0);
    out.extend_from_slice(&sid.to_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_user_layout() {
        let token = Token::for_principal(true);
        let info = token.information(TOKEN_USER, 0x1000, 4, Endian::Little).unwrap();
        assert_eq!(info.len(), 8 + token.user.size());
        assert_eq!(&info[..4], &0x1008u32.to_le_bytes());
        assert_eq!(&info[8..], token.user.to_bytes().as_slice());

        let wide = token.information(TOKEN_USER, 0x1000, 8, Endian::Little).unwrap();
        assert_eq!(wide.len(), 16 + token.user.size());
        assert_eq!(&wide[..8], &0x1010u64.to_le_bytes());
    }

    #[test]
    fn test_length_does_not_depend_on_destination() {
        let token = Token::for_principal(false);
        for class in [TOKEN_USER, TOKEN_GROUPS, TOKEN_INTEGRITY_LEVEL, TOKEN_ELEVATION] {
            let a = token.information(class, 0, 8, Endian::Little).unwrap();
            let b = token.information(class, 0x7fff_0000, 8, Endian::Little).unwrap();
            assert_eq!(a.len(), b.len());
        }
    }

    #[test]
    fn test_elevation_follows_privilege() {
        let admin = Token::for_principal(true);
        let user = Token::for_principal(false);
        assert_eq!(admin.information(TOKEN_ELEVATION, 0, 4, Endian::Little).unwrap(), vec![1, 0, 0, 0]);
        assert_eq!(user.information(TOKEN_ELEVATION_TYPE, 0, 4, Endian::Little).unwrap(), vec![3, 0, 0, 0]);
        assert_eq!(user.integrity.sub_authorities, [SECURITY_MANDATORY_MEDIUM_RID]);

        let label = admin.information(TOKEN_INTEGRITY_LEVEL, 0, 4, Endian::Little).unwrap();
        assert_eq!(&label[4..8], &SE_GROUP_INTEGRITY.to_le_bytes());
        assert!(admin.information(TOKEN_PRIVILEGES, 0, 4, Endian::Little).is_none());
    }

    #[test]
    fn test_layout_follows_byte_order() {
        let token = Token::for_principal(true);
        let label = token
            .information(TOKEN_INTEGRITY_LEVEL, 0x2000, 4, Endian::Big)
            .unwrap();
        assert_eq!(&label[..4], &0x2008u32.to_be_bytes());
        assert_eq!(&label[4..8], &SE_GROUP_INTEGRITY.to_be_bytes());
        assert_eq!(
            token.information(TOKEN_ELEVATION, 0, 4, Endian::Big).unwrap(),
            vec![0, 0, 0, 1]
        );
    }
}
