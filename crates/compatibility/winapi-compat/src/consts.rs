//! Windows ABI 常量
//!
//! Values are the public ABI values guest code compares against.

// ----------------------------------------------------------------------------
// 状态码 (winerror.h)
// ----------------------------------------------------------------------------

pub const ERROR_SUCCESS: u32 = 0;
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
pub const ERROR_INVALID_HANDLE: u32 = 6;
pub const ERROR_INVALID_PARAMETER: u32 = 87;
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub const ERROR_MORE_DATA: u32 = 234;
pub const ERROR_NO_MORE_ITEMS: u32 = 259;
pub const ERROR_SERVICE_DOES_NOT_EXIST: u32 = 1060;
pub const ERROR_SERVICE_EXISTS: u32 = 1073;

pub const TRUE: u64 = 1;
pub const FALSE: u64 = 0;

// ----------------------------------------------------------------------------
// 注册表值类型 (winnt.h)
// ----------------------------------------------------------------------------

pub const REG_NONE: u32 = 0;
pub const REG_SZ: u32 = 1;
pub const REG_EXPAND_SZ: u32 = 2;
pub const REG_BINARY: u32 = 3;
pub const REG_DWORD: u32 = 4;
pub const REG_MULTI_SZ: u32 = 7;
pub const REG_QWORD: u32 = 11;

/// `lpdwDisposition` values of RegCreateKeyEx
pub const REG_CREATED_NEW_KEY: u32 = 1;
pub const REG_OPENED_EXISTING_KEY: u32 = 2;

// ----------------------------------------------------------------------------
// 预定义句柄
// ----------------------------------------------------------------------------

pub const HKEY_CLASSES_ROOT: u64 = 0x8000_0000;
pub const HKEY_CURRENT_USER: u64 = 0x8000_0001;
pub const HKEY_LOCAL_MACHINE: u64 = 0x8000_0002;
pub const HKEY_USERS: u64 = 0x8000_0003;
pub const HKEY_PERFORMANCE_DATA: u64 = 0x8000_0004;
pub const HKEY_CURRENT_CONFIG: u64 = 0x8000_0005;

/// Root keys with their canonical names
pub const ROOT_KEYS: [(u64, &str); 6] = [
    (HKEY_CLASSES_ROOT, "HKEY_CLASSES_ROOT"),
    (HKEY_CURRENT_USER, "HKEY_CURRENT_USER"),
    (HKEY_LOCAL_MACHINE, "HKEY_LOCAL_MACHINE"),
    (HKEY_USERS, "HKEY_USERS"),
    (HKEY_PERFORMANCE_DATA, "HKEY_PERFORMANCE_DATA"),
    (HKEY_CURRENT_CONFIG, "HKEY_CURRENT_CONFIG"),
];

/// `(DWORD)-10`
pub const STD_INPUT_HANDLE: u64 = 0xffff_fff6;
/// `(DWORD)-11`
pub const STD_OUTPUT_HANDLE: u64 = 0xffff_fff5;
/// `(DWORD)-12`
pub const STD_ERROR_HANDLE: u64 = 0xffff_fff4;

// ----------------------------------------------------------------------------
// 安全标识 (winnt.h)
// ----------------------------------------------------------------------------

pub const SECURITY_NT_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 5];
pub const SECURITY_MANDATORY_LABEL_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 16];

pub const SECURITY_BUILTIN_DOMAIN_RID: u32 = 0x20;
pub const DOMAIN_ALIAS_RID_ADMINS: u32 = 0x220;
pub const DOMAIN_ALIAS_RID_USERS: u32 = 0x221;
pub const DOMAIN_ALIAS_RID_GUESTS: u32 = 0x222;
pub const DOMAIN_ALIAS_RID_POWER_USERS: u32 = 0x223;

pub const SECURITY_MANDATORY_MEDIUM_RID: u32 = 0x2000;
pub const SECURITY_MANDATORY_HIGH_RID: u32 = 0x3000;

pub const SE_GROUP_INTEGRITY: u32 = 0x20;

/// Maximum sub-authorities AllocateAndInitializeSid accepts
pub const SID_MAX_SUB_AUTHORITIES: usize = 8;

// ----------------------------------------------------------------------------
// TOKEN_INFORMATION_CLASS
// ----------------------------------------------------------------------------

pub const TOKEN_USER: u32 = 1;
pub const TOKEN_GROUPS: u32 = 2;
pub const TOKEN_PRIVILEGES: u32 = 3;
pub const TOKEN_ELEVATION_TYPE: u32 = 18;
pub const TOKEN_ELEVATION: u32 = 20;
pub const TOKEN_INTEGRITY_LEVEL: u32 = 25;
pub const TOKEN_UI_ACCESS: u32 = 26;

pub const TOKEN_ELEVATION_TYPE_FULL: u32 = 2;
pub const TOKEN_ELEVATION_TYPE_LIMITED: u32 = 3;
