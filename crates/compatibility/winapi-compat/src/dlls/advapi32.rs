//! advapi32.dll: registry, token, SID and service-control routines
//!
//! LSTATUS routines return a status code; BOOL routines return TRUE/FALSE
//! and leave the reason in the last-error slot. Handles that do not resolve
//! are reported to the guest, never raised.

use emu_core::{EmuError, GuestMemory, Result};

use crate::api::ApiDescriptor;
use crate::consts::*;
use crate::fncc::DeclaredConv::Stdcall;
use crate::handle::{Handle, HandleObject, HandleTable};
use crate::os::WindowsOs;
use crate::params::types::*;
use crate::params::{ParamKind, ParamValue, Params};
use crate::registry::{RegValue, join_path, normalize_path};
use crate::sid::Sid;
use crate::token::Token;

/// Name of the handle wrapping the process token
const PROCESS_TOKEN: &str = "process_token";

// ============================================================================
// 公共辅助
// ============================================================================

enum KeyLookup {
    Key(String),
    NotAKey,
    Missing,
}

/// Resolve `hKey` to its registry path, normalizing the param for tracing
fn lookup_key(os: &WindowsOs, params: &mut Params) -> Result<KeyLookup> {
    let raw = params.handle("hKey")?;
    let path = match os.handles.get(raw) {
        None => {
            tracing::debug!("hKey {:#x} does not resolve", raw);
            return Ok(KeyLookup::Missing);
        }
        Some(handle) => match handle.obj.as_registry_key() {
            Some(path) => path.to_string(),
            None => return Ok(KeyLookup::NotAKey),
        },
    };
    params.set("hKey", ParamValue::Resolved(path.clone()))?;
    Ok(KeyLookup::Key(path))
}

/// Resolved key for routines where any failure is an invalid handle
fn key_or_invalid(os: &WindowsOs, params: &mut Params) -> Result<Option<String>> {
    Ok(match lookup_key(os, params)? {
        KeyLookup::Key(path) => Some(path),
        KeyLookup::NotAKey | KeyLookup::Missing => None,
    })
}

fn write_dword(mem: &mut dyn GuestMemory, addr: u64, value: u64) -> Result<()> {
    mem.write_ptr(addr, value, Some(4))
}

/// Zero an out-slot before anything is created for it
///
/// A bad pointer then fails the call while nothing needs undoing.
fn clear_out(mem: &mut dyn GuestMemory, addr: u64, width: Option<usize>) -> Result<()> {
    if addr != 0 {
        mem.write_ptr(addr, 0, width)?;
    }
    Ok(())
}

/// FALSE with `code` as last error
fn fail(os: &mut WindowsOs, code: u32) -> Result<u64> {
    os.last_error = code;
    Ok(FALSE)
}

/// Write a name into a guest buffer sized in characters
///
/// Returns `false` without writing when the buffer cannot hold the name and
/// its terminator.
fn write_name(mem: &mut dyn GuestMemory, dest: u64, cch_ptr: u64, name: &str, wide: bool) -> Result<bool> {
    let chars = if wide { name.encode_utf16().count() } else { name.len() };
    let chars = chars as u64;
    let capacity = mem.read_ptr(cch_ptr, Some(4))?;
    if chars + 1 > capacity {
        return Ok(false);
    }
    if wide {
        mem.write_wstring(dest, name)?;
    } else {
        mem.write_cstring(dest, name)?;
    }
    write_dword(mem, cch_ptr, chars)?;
    Ok(true)
}

// ============================================================================
// 注册表例程
// ============================================================================

fn reg_open_key(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let key = match lookup_key(os, params)? {
        KeyLookup::Key(path) => path,
        KeyLookup::NotAKey => return Ok(ERROR_FILE_NOT_FOUND as u64),
        KeyLookup::Missing => return Ok(ERROR_INVALID_HANDLE as u64),
    };
    let mut id = params.handle("hKey")?;
    let phk = params.ptr("phkResult")?;
    clear_out(os.mem.as_mut(), phk, None)?;

    if let Some(sub) = params.str("lpSubKey")?.filter(|s| !s.is_empty()) {
        let path = join_path(&key, sub);
        if !os.registry.exists(&path) {
            if !os.registry.profile_has_key(&path) {
                tracing::debug!("key {} not present", path);
                return Ok(ERROR_FILE_NOT_FOUND as u64);
            }
            tracing::debug!("using profile for key {}", path);
            os.registry.access(&path, None, None);
        }
        let path = os.registry.display_path(&path);
        id = os.handles.append(Handle::new(HandleObject::RegistryKey(path)));
    }

    if phk != 0 {
        os.mem.write_ptr(phk, id, None)?;
    }
    Ok(ERROR_SUCCESS as u64)
}

fn reg_query_value(os: &mut WindowsOs, params: &mut Params, wide: bool) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let name = params.str("lpValueName")?.unwrap_or_default().to_string();
    let lp_type = params.ptr("lpType")?;
    let lp_data = params.ptr("lpData")?;
    let lp_cb_data = params.ptr("lpcbData")?;

    let Some(value) = os.registry.read(&key, &name, None) else {
        tracing::debug!("value {}\\{} not found", key, name);
        return Ok(ERROR_FILE_NOT_FOUND as u64);
    };

    // lpData may only be set together with lpcbData
    if lp_cb_data == 0 && lp_data != 0 {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    }
    let max_size = if lp_cb_data != 0 {
        os.mem.read_ptr(lp_cb_data, Some(4))? as usize
    } else {
        0
    };

    if lp_type != 0 {
        write_dword(os.mem.as_mut(), lp_type, value.reg_type() as u64)?;
    }
    let length = os
        .registry
        .write_reg_value_into_mem(os.mem.as_mut(), &value, lp_data, max_size, wide)?;
    if lp_cb_data != 0 {
        write_dword(os.mem.as_mut(), lp_cb_data, length as u64)?;
    }

    if lp_data != 0 && max_size < length {
        return Ok(ERROR_MORE_DATA as u64);
    }
    Ok(ERROR_SUCCESS as u64)
}

fn reg_create_key(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let key = match lookup_key(os, params)? {
        KeyLookup::Key(path) => path,
        KeyLookup::NotAKey => return Ok(ERROR_FILE_NOT_FOUND as u64),
        KeyLookup::Missing => return Ok(ERROR_INVALID_HANDLE as u64),
    };
    let mut id = params.handle("hKey")?;
    let mut disposition = REG_OPENED_EXISTING_KEY;
    let phk = params.ptr("phkResult")?;
    let lp_disposition = if params.contains("lpdwDisposition") {
        params.ptr("lpdwDisposition")?
    } else {
        0
    };
    clear_out(os.mem.as_mut(), phk, None)?;
    clear_out(os.mem.as_mut(), lp_disposition, Some(4))?;

    if let Some(sub) = params.str("lpSubKey")?.filter(|s| !s.is_empty()) {
        let path = join_path(&key, sub);
        if !os.registry.exists(&path) {
            os.registry.create(&path);
            disposition = REG_CREATED_NEW_KEY;
        }
        let obj = HandleObject::RegistryKey(os.registry.display_path(&path));
        id = match os.handles.search_by_obj(&obj).and_then(Handle::id) {
            Some(id) => id,
            None => os.handles.append(Handle::new(obj)),
        };
    }

    if phk != 0 {
        os.mem.write_ptr(phk, id, None)?;
    }
    if lp_disposition != 0 {
        write_dword(os.mem.as_mut(), lp_disposition, disposition as u64)?;
    }
    Ok(ERROR_SUCCESS as u64)
}

/// RegSetValue: sets the default value of a (possibly new) sub-key
fn reg_set_value(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    if params.int("dwType")? != REG_SZ as u64 {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    }
    let Some(data) = params.str("lpData")?.map(str::to_string) else {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    };
    let path = match params.str("lpSubKey")? {
        Some(sub) => join_path(&key, sub),
        None => key,
    };
    os.registry.set_value(&path, "", RegValue::Sz(data));
    Ok(ERROR_SUCCESS as u64)
}

fn reg_set_value_ex(os: &mut WindowsOs, params: &mut Params, wide: bool) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let lp_data = params.ptr("lpData")?;
    if lp_data == 0 {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    }
    let name = params.str("lpValueName")?.unwrap_or_default().to_string();
    let ty = params.int("dwType")? as u32;
    let data = os.mem.read_bytes(lp_data, params.int("cbData")? as usize)?;
    os.registry.write(&key, &name, ty, &data, wide);
    Ok(ERROR_SUCCESS as u64)
}

fn reg_delete_key(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    // a sub-key of separators only would name `hKey` itself
    let Some(sub) = params
        .str("lpSubKey")?
        .map(normalize_path)
        .filter(|s| !s.is_empty())
    else {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    };
    if os.registry.delete_key(&join_path(&key, &sub)) {
        Ok(ERROR_SUCCESS as u64)
    } else {
        Ok(ERROR_FILE_NOT_FOUND as u64)
    }
}

fn reg_delete_value(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let name = params.str("lpValueName")?.unwrap_or_default().to_string();
    if os.registry.delete_value(&key, &name) {
        Ok(ERROR_SUCCESS as u64)
    } else {
        Ok(ERROR_FILE_NOT_FOUND as u64)
    }
}

fn reg_close_key(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let Some(_) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let raw = params.raw("hKey")?;
    // root keys outlive every close
    if !HandleTable::is_predefined(raw) {
        os.handles.delete(raw);
    }
    Ok(ERROR_SUCCESS as u64)
}

fn reg_enum_value(os: &mut WindowsOs, params: &mut Params, wide: bool) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let index = params.int("dwIndex")? as usize;
    let Some((name, value)) = os.registry.enum_value(&key, index) else {
        return Ok(ERROR_NO_MORE_ITEMS as u64);
    };

    let lp_name = params.ptr("lpValueName")?;
    let lp_cch = params.ptr("lpcchValueName")?;
    if lp_name == 0 || lp_cch == 0 {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    }
    if !write_name(os.mem.as_mut(), lp_name, lp_cch, &name, wide)? {
        return Ok(ERROR_MORE_DATA as u64);
    }

    let lp_type = params.ptr("lpType")?;
    if lp_type != 0 {
        write_dword(os.mem.as_mut(), lp_type, value.reg_type() as u64)?;
    }

    let lp_data = params.ptr("lpData")?;
    let lp_cb_data = params.ptr("lpcbData")?;
    if lp_cb_data == 0 {
        return Ok(if lp_data == 0 {
            ERROR_SUCCESS as u64
        } else {
            ERROR_INVALID_PARAMETER as u64
        });
    }
    let max_size = os.mem.read_ptr(lp_cb_data, Some(4))? as usize;
    let length = os
        .registry
        .write_reg_value_into_mem(os.mem.as_mut(), &value, lp_data, max_size, wide)?;
    write_dword(os.mem.as_mut(), lp_cb_data, length as u64)?;
    if lp_data != 0 && max_size < length {
        return Ok(ERROR_MORE_DATA as u64);
    }
    Ok(ERROR_SUCCESS as u64)
}

fn reg_enum_key_ex(os: &mut WindowsOs, params: &mut Params, wide: bool) -> Result<u64> {
    let Some(key) = key_or_invalid(os, params)? else {
        return Ok(ERROR_INVALID_HANDLE as u64);
    };
    let index = params.int("dwIndex")? as usize;
    let Some(name) = os.registry.enum_subkey(&key, index) else {
        return Ok(ERROR_NO_MORE_ITEMS as u64);
    };

    let lp_name = params.ptr("lpName")?;
    let lp_cch = params.ptr("lpcchName")?;
    if lp_name == 0 || lp_cch == 0 {
        return Ok(ERROR_INVALID_PARAMETER as u64);
    }
    if !write_name(os.mem.as_mut(), lp_name, lp_cch, &name, wide)? {
        return Ok(ERROR_MORE_DATA as u64);
    }

    // no class names, no timestamps
    let lp_class = params.ptr("lpClass")?;
    let lp_cch_class = params.ptr("lpcchClass")?;
    if lp_class != 0 && lp_cch_class != 0 {
        write_name(os.mem.as_mut(), lp_class, lp_cch_class, "", wide)?;
    }
    let lp_time = params.ptr("lpftLastWriteTime")?;
    if lp_time != 0 {
        os.mem.write(lp_time, &[0u8; 8])?;
    }
    Ok(ERROR_SUCCESS as u64)
}

fn reg_query_value_ex_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_query_value(os, params, false)
}

fn reg_query_value_ex_w(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_query_value(os, params, true)
}

fn reg_set_value_ex_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_set_value_ex(os, params, false)
}

fn reg_set_value_ex_w(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_set_value_ex(os, params, true)
}

fn reg_enum_value_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_enum_value(os, params, false)
}

fn reg_enum_value_w(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_enum_value(os, params, true)
}

fn reg_enum_key_ex_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_enum_key_ex(os, params, false)
}

fn reg_enum_key_ex_w(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    reg_enum_key_ex(os, params, true)
}

// ============================================================================
// 令牌与 SID
// ============================================================================

fn open_process_token(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let out = params.ptr("TokenHandle")?;
    if out == 0 {
        return fail(os, ERROR_INVALID_PARAMETER);
    }
    let id = match os.handles.search(PROCESS_TOKEN).and_then(Handle::id) {
        Some(id) => id,
        None => {
            let token = Token::for_principal(os.is_privileged());
            os.handles
                .append(Handle::new(HandleObject::Token(token)).with_name(PROCESS_TOKEN))
        }
    };
    os.mem.write_ptr(out, id, None)?;
    Ok(TRUE)
}

fn get_token_information(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let raw = params.handle("TokenHandle")?;
    let Some(token) = os.handles.get(raw).and_then(|h| h.obj.as_token()).cloned() else {
        return fail(os, ERROR_INVALID_HANDLE);
    };
    params.set("TokenHandle", ParamValue::Resolved(format!("token({})", token.user)))?;

    let class = params.int("TokenInformationClass")? as u32;
    let dest = params.ptr("TokenInformation")?;
    let length = params.int("TokenInformationLength")? as usize;
    let ret_len = params.ptr("ReturnLength")?;

    let Some(info) = token.information(class, dest, os.ctx.pointer_size(), os.mem.endian()) else {
        if dest != 0 {
            return Err(EmuError::not_implemented(
                "advapi32",
                format!("GetTokenInformation class {class}"),
            ));
        }
        return fail(os, ERROR_INVALID_PARAMETER);
    };

    tracing::debug!("the target is checking its token (class {})", class);
    if ret_len != 0 {
        write_dword(os.mem.as_mut(), ret_len, info.len() as u64)?;
    }
    if info.len() > length {
        return fail(os, ERROR_INSUFFICIENT_BUFFER);
    }
    if dest == 0 {
        return Err(EmuError::not_implemented(
            "advapi32",
            "GetTokenInformation into a null buffer",
        ));
    }
    os.mem.write(dest, &info)?;
    Ok(TRUE)
}

/// SID registered under `addr`, the address doubling as its handle id
fn registered_sid(os: &WindowsOs, addr: u64) -> Option<Sid> {
    os.handles.get(addr).and_then(|h| h.obj.as_sid()).cloned()
}

/// SID at `addr`: a registered one, or a valid SID laid out in guest memory
///
/// The second form covers SIDs embedded in `GetTokenInformation` output and
/// SIDs the guest builds in its own buffers.
fn sid_at(os: &WindowsOs, addr: u64) -> Option<Sid> {
    if let Some(sid) = registered_sid(os, addr) {
        return Some(sid);
    }
    if addr == 0 {
        return None;
    }
    match Sid::read_from(os.mem.as_ref(), addr) {
        Ok(sid) if sid.revision == Sid::REVISION => Some(sid),
        _ => None,
    }
}

fn get_sid_sub_authority_count(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let p_sid = params.ptr("pSid")?;
    if sid_at(os, p_sid).is_none() {
        os.last_error = ERROR_INVALID_HANDLE;
        return Ok(0);
    }
    Ok(p_sid + Sid::SUB_AUTHORITY_COUNT_OFFSET)
}

fn get_sid_sub_authority(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let p_sid = params.ptr("pSid")?;
    let index = params.int("nSubAuthority")? as usize;
    let Some(sid) = sid_at(os, p_sid) else {
        os.last_error = ERROR_INVALID_HANDLE;
        return Ok(0);
    };
    if index >= sid.sub_authorities.len() {
        os.last_error = ERROR_INVALID_PARAMETER;
        return Ok(0);
    }
    Ok(p_sid + Sid::sub_authority_offset(index))
}

fn allocate_and_initialize_sid(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let count = params.int("nSubAuthorityCount")? as usize;
    let dest = params.ptr("pSid")?;
    if count > SID_MAX_SUB_AUTHORITIES || dest == 0 {
        return fail(os, ERROR_INVALID_PARAMETER);
    }

    let p_auth = params.ptr("pIdentifierAuthority")?;
    let authority = if p_auth == 0 {
        SECURITY_NT_AUTHORITY
    } else {
        let mut authority = [0u8; 6];
        os.mem.read(p_auth, &mut authority)?;
        authority
    };
    let subs = (0..count)
        .map(|i| params.int(&format!("nSubAuthority{i}")).map(|v| v as u32))
        .collect::<Result<Vec<_>>>()?;

    clear_out(os.mem.as_mut(), dest, None)?;
    let sid = Sid::new(authority, &subs);
    let addr = os.heap.alloc(sid.size())?;
    if let Err(err) = os.mem.write(addr, &sid.to_bytes()) {
        os.heap.free(addr);
        return Err(err);
    }
    tracing::debug!("allocated {} at {:#x}", sid, addr);
    os.handles.append(Handle::new(HandleObject::Sid(sid)).with_id(addr));
    os.mem.write_ptr(dest, addr, None)?;
    Ok(TRUE)
}

fn check_token_membership(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    if params.handle("TokenHandle")? != 0 {
        return Err(EmuError::not_implemented(
            "advapi32",
            "CheckTokenMembership with an explicit token",
        ));
    }
    let p_sid = params.ptr("SidToCheck")?;
    let Some(sid) = sid_at(os, p_sid) else {
        return fail(os, ERROR_INVALID_HANDLE);
    };
    params.set("SidToCheck", ParamValue::Resolved(sid.to_string()))?;

    let is_member = os.sids.check_membership(&sid, os.is_privileged())?;
    let out = params.ptr("IsMember")?;
    if out == 0 {
        return fail(os, ERROR_INVALID_PARAMETER);
    }
    write_dword(os.mem.as_mut(), out, is_member as u64)?;
    Ok(TRUE)
}

/// Returns NULL on success, `pSid` when nothing was freed
fn free_sid(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let p_sid = params.ptr("pSid")?;
    let Some(sid) = registered_sid(os, p_sid) else {
        return Ok(p_sid);
    };
    // a stale pointer must not decode as a SID afterwards
    os.mem.write(p_sid, &vec![0u8; sid.size()])?;
    os.heap.free(p_sid);
    os.handles.delete(p_sid);
    Ok(0)
}

fn equal_sid(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let (Some(a), Some(b)) = (sid_at(os, params.ptr("pSid1")?), sid_at(os, params.ptr("pSid2")?)) else {
        return fail(os, ERROR_INVALID_HANDLE);
    };
    os.last_error = ERROR_SUCCESS;
    Ok(if a == b { TRUE } else { FALSE })
}

// ============================================================================
// 服务控制管理器
// ============================================================================

fn open_sc_manager_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let machine = params.str("lpMachineName")?.map(str::to_string);
    let database = params.str("lpDatabaseName")?.map(str::to_string);
    let name = format!(
        "sc_{}_{}",
        machine.as_deref().unwrap_or(""),
        database.as_deref().unwrap_or("")
    );
    if let Some(id) = os.handles.search(&name).and_then(Handle::id) {
        return Ok(id);
    }
    let obj = HandleObject::ServiceManager { machine, database };
    Ok(os.handles.append(Handle::new(obj).with_name(name)))
}

fn is_manager(os: &WindowsOs, id: u64) -> bool {
    os.handles
        .get(id)
        .is_some_and(|h| matches!(h.obj, HandleObject::ServiceManager { .. }))
}

fn create_service_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let manager = params.handle("hSCManager")?;
    if !is_manager(os, manager) {
        os.last_error = ERROR_INVALID_HANDLE;
        return Ok(0);
    }
    let Some(name) = params.str("lpServiceName")?.map(str::to_string) else {
        os.last_error = ERROR_INVALID_PARAMETER;
        return Ok(0);
    };
    if os.services.contains_key(&name) {
        os.last_error = ERROR_SERVICE_EXISTS;
        return Ok(0);
    }
    let binary = params.str("lpBinaryPathName")?.unwrap_or_default().to_string();
    tracing::debug!("service {} -> {}", name, binary);
    os.services.insert(name.clone(), binary);
    let obj = HandleObject::Service {
        manager,
        name: name.clone(),
    };
    Ok(os.handles.append(Handle::new(obj).with_name(name)))
}

fn open_service_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let manager = params.handle("hSCManager")?;
    if !is_manager(os, manager) {
        os.last_error = ERROR_INVALID_HANDLE;
        return Ok(0);
    }
    let name = params.str("lpServiceName")?.unwrap_or_default().to_string();
    if !os.services.contains_key(&name) {
        os.last_error = ERROR_SERVICE_DOES_NOT_EXIST;
        return Ok(0);
    }
    let obj = HandleObject::Service {
        manager,
        name: name.clone(),
    };
    Ok(os.handles.append(Handle::new(obj).with_name(name)))
}

fn close_service_handle(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let id = params.handle("hSCObject")?;
    let is_service_object = os.handles.get(id).is_some_and(|h| {
        matches!(
            h.obj,
            HandleObject::ServiceManager { .. } | HandleObject::Service { .. }
        )
    });
    if !is_service_object {
        return fail(os, ERROR_INVALID_HANDLE);
    }
    os.handles.delete(id);
    Ok(TRUE)
}

fn start_service_a(os: &mut WindowsOs, _address: u64, params: &mut Params) -> Result<u64> {
    let id = params.handle("hService")?;
    let known = match os.handles.get(id).map(|h| &h.obj) {
        Some(HandleObject::Service { name, .. }) => os.services.contains_key(name),
        _ => false,
    };
    if !known {
        return fail(os, ERROR_INVALID_HANDLE);
    }
    Ok(TRUE)
}

// ============================================================================
// 例程描述
// ============================================================================

const REG_OPEN_KEY_EX_A: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCSTR),
    ("ulOptions", DWORD),
    ("samDesired", REGSAM),
    ("phkResult", PHKEY),
];
const REG_OPEN_KEY_EX_W: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCWSTR),
    ("ulOptions", DWORD),
    ("samDesired", REGSAM),
    ("phkResult", PHKEY),
];
const REG_OPEN_KEY_A: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpSubKey", LPCSTR), ("phkResult", PHKEY)];
const REG_OPEN_KEY_W: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpSubKey", LPCWSTR), ("phkResult", PHKEY)];
const REG_QUERY_VALUE_EX_A: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpValueName", LPCSTR),
    ("lpReserved", LPDWORD),
    ("lpType", LPDWORD),
    ("lpData", LPBYTE),
    ("lpcbData", LPDWORD),
];
const REG_QUERY_VALUE_EX_W: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpValueName", LPCWSTR),
    ("lpReserved", LPDWORD),
    ("lpType", LPDWORD),
    ("lpData", LPBYTE),
    ("lpcbData", LPDWORD),
];
const REG_CLOSE_KEY: &[(&str, ParamKind)] = &[("hKey", HKEY)];
const REG_CREATE_KEY_EX_A: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCSTR),
    ("Reserved", DWORD),
    ("lpClass", LPSTR),
    ("dwOptions", DWORD),
    ("samDesired", REGSAM),
    ("lpSecurityAttributes", LPSECURITY_ATTRIBUTES),
    ("phkResult", PHKEY),
    ("lpdwDisposition", LPDWORD),
];
const REG_CREATE_KEY_EX_W: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCWSTR),
    ("Reserved", DWORD),
    ("lpClass", LPWSTR),
    ("dwOptions", DWORD),
    ("samDesired", REGSAM),
    ("lpSecurityAttributes", LPSECURITY_ATTRIBUTES),
    ("phkResult", PHKEY),
    ("lpdwDisposition", LPDWORD),
];
const REG_SET_VALUE_A: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCSTR),
    ("dwType", DWORD),
    ("lpData", LPCSTR),
    ("cbData", DWORD),
];
const REG_SET_VALUE_W: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpSubKey", LPCWSTR),
    ("dwType", DWORD),
    ("lpData", LPCWSTR),
    ("cbData", DWORD),
];
const REG_SET_VALUE_EX_A: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpValueName", LPCSTR),
    ("Reserved", DWORD),
    ("dwType", DWORD),
    ("lpData", LPBYTE),
    ("cbData", DWORD),
];
const REG_SET_VALUE_EX_W: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("lpValueName", LPCWSTR),
    ("Reserved", DWORD),
    ("dwType", DWORD),
    ("lpData", LPBYTE),
    ("cbData", DWORD),
];
const REG_DELETE_KEY_A: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpSubKey", LPCSTR)];
const REG_DELETE_KEY_W: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpSubKey", LPCWSTR)];
const REG_DELETE_VALUE_A: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpValueName", LPCSTR)];
const REG_DELETE_VALUE_W: &[(&str, ParamKind)] = &[("hKey", HKEY), ("lpValueName", LPCWSTR)];
const REG_ENUM_VALUE: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("dwIndex", DWORD),
    ("lpValueName", LPSTR),
    ("lpcchValueName", LPDWORD),
    ("lpReserved", LPDWORD),
    ("lpType", LPDWORD),
    ("lpData", LPBYTE),
    ("lpcbData", LPDWORD),
];
const REG_ENUM_KEY_EX: &[(&str, ParamKind)] = &[
    ("hKey", HKEY),
    ("dwIndex", DWORD),
    ("lpName", LPSTR),
    ("lpcchName", LPDWORD),
    ("lpReserved", LPDWORD),
    ("lpClass", LPSTR),
    ("lpcchClass", LPDWORD),
    ("lpftLastWriteTime", PFILETIME),
];
const OPEN_PROCESS_TOKEN: &[(&str, ParamKind)] = &[
    ("ProcessHandle", HANDLE),
    ("DesiredAccess", DWORD),
    ("TokenHandle", PHANDLE),
];
const GET_TOKEN_INFORMATION: &[(&str, ParamKind)] = &[
    ("TokenHandle", HANDLE),
    ("TokenInformationClass", TOKEN_INFORMATION_CLASS),
    ("TokenInformation", LPVOID),
    ("TokenInformationLength", DWORD),
    ("ReturnLength", PDWORD),
];
const GET_SID_SUB_AUTHORITY_COUNT: &[(&str, ParamKind)] = &[("pSid", PSID)];
const GET_SID_SUB_AUTHORITY: &[(&str, ParamKind)] = &[("pSid", PSID), ("nSubAuthority", DWORD)];
const ALLOCATE_AND_INITIALIZE_SID: &[(&str, ParamKind)] = &[
    ("pIdentifierAuthority", PSID_IDENTIFIER_AUTHORITY),
    ("nSubAuthorityCount", BYTE),
    ("nSubAuthority0", DWORD),
    ("nSubAuthority1", DWORD),
    ("nSubAuthority2", DWORD),
    ("nSubAuthority3", DWORD),
    ("nSubAuthority4", DWORD),
    ("nSubAuthority5", DWORD),
    ("nSubAuthority6", DWORD),
    ("nSubAuthority7", DWORD),
    ("pSid", PPSID),
];
const CHECK_TOKEN_MEMBERSHIP: &[(&str, ParamKind)] = &[
    ("TokenHandle", HANDLE),
    ("SidToCheck", PSID),
    ("IsMember", PBOOL),
];
const FREE_SID: &[(&str, ParamKind)] = &[("pSid", PSID)];
const EQUAL_SID: &[(&str, ParamKind)] = &[("pSid1", PSID), ("pSid2", PSID)];
const OPEN_SC_MANAGER_A: &[(&str, ParamKind)] = &[
    ("lpMachineName", LPCSTR),
    ("lpDatabaseName", LPCSTR),
    ("dwDesiredAccess", DWORD),
];
const CREATE_SERVICE_A: &[(&str, ParamKind)] = &[
    ("hSCManager", SC_HANDLE),
    ("lpServiceName", LPCSTR),
    ("lpDisplayName", LPCSTR),
    ("dwDesiredAccess", DWORD),
    ("dwServiceType", DWORD),
    ("dwStartType", DWORD),
    ("dwErrorControl", DWORD),
    ("lpBinaryPathName", LPCSTR),
    ("lpLoadOrderGroup", LPCSTR),
    ("lpdwTagId", LPDWORD),
    ("lpDependencies", LPCSTR),
    ("lpServiceStartName", LPCSTR),
    ("lpPassword", LPCSTR),
];
const OPEN_SERVICE_A: &[(&str, ParamKind)] = &[
    ("hSCManager", SC_HANDLE),
    ("lpServiceName", LPCSTR),
    ("dwDesiredAccess", DWORD),
];
const CLOSE_SERVICE_HANDLE: &[(&str, ParamKind)] = &[("hSCObject", SC_HANDLE)];
const START_SERVICE_A: &[(&str, ParamKind)] = &[
    ("hService", SC_HANDLE),
    ("dwNumServiceArgs", DWORD),
    ("lpServiceArgVectors", POINTER),
];

/// Every advapi32 routine
pub const ROUTINES: &[ApiDescriptor] = &[
    ApiDescriptor::new("RegOpenKeyExA", Stdcall, REG_OPEN_KEY_EX_A, reg_open_key),
    ApiDescriptor::new("RegOpenKeyExW", Stdcall, REG_OPEN_KEY_EX_W, reg_open_key),
    ApiDescriptor::new("RegOpenKeyA", Stdcall, REG_OPEN_KEY_A, reg_open_key),
    ApiDescriptor::new("RegOpenKeyW", Stdcall, REG_OPEN_KEY_W, reg_open_key),
    ApiDescriptor::new("RegQueryValueExA", Stdcall, REG_QUERY_VALUE_EX_A, reg_query_value_ex_a),
    ApiDescriptor::new("RegQueryValueExW", Stdcall, REG_QUERY_VALUE_EX_W, reg_query_value_ex_w),
    ApiDescriptor::new("RegCloseKey", Stdcall, REG_CLOSE_KEY, reg_close_key),
    ApiDescriptor::new("RegCreateKeyA", Stdcall, REG_OPEN_KEY_A, reg_create_key),
    ApiDescriptor::new("RegCreateKeyW", Stdcall, REG_OPEN_KEY_W, reg_create_key),
    ApiDescriptor::new("RegCreateKeyExA", Stdcall, REG_CREATE_KEY_EX_A, reg_create_key),
    ApiDescriptor::new("RegCreateKeyExW", Stdcall, REG_CREATE_KEY_EX_W, reg_create_key),
    ApiDescriptor::new("RegSetValueA", Stdcall, REG_SET_VALUE_A, reg_set_value),
    ApiDescriptor::new("RegSetValueW", Stdcall, REG_SET_VALUE_W, reg_set_value),
    ApiDescriptor::new("RegSetValueExA", Stdcall, REG_SET_VALUE_EX_A, reg_set_value_ex_a),
    ApiDescriptor::new("RegSetValueExW", Stdcall, REG_SET_VALUE_EX_W, reg_set_value_ex_w),
    ApiDescriptor::new("RegDeleteKeyA", Stdcall, REG_DELETE_KEY_A, reg_delete_key),
    ApiDescriptor::new("RegDeleteKeyW", Stdcall, REG_DELETE_KEY_W, reg_delete_key),
    ApiDescriptor::new("RegDeleteValueA", Stdcall, REG_DELETE_VALUE_A, reg_delete_value),
    ApiDescriptor::new("RegDeleteValueW", Stdcall, REG_DELETE_VALUE_W, reg_delete_value),
    ApiDescriptor::new("RegEnumValueA", Stdcall, REG_ENUM_VALUE, reg_enum_value_a),
    ApiDescriptor::new("RegEnumValueW", Stdcall, REG_ENUM_VALUE, reg_enum_value_w),
    ApiDescriptor::new("RegEnumKeyExA", Stdcall, REG_ENUM_KEY_EX, reg_enum_key_ex_a),
    ApiDescriptor::new("RegEnumKeyExW", Stdcall, REG_ENUM_KEY_EX, reg_enum_key_ex_w),
    ApiDescriptor::new("OpenProcessToken", Stdcall, OPEN_PROCESS_TOKEN, open_process_token),
    ApiDescriptor::new("GetTokenInformation", Stdcall, GET_TOKEN_INFORMATION, get_token_information),
    ApiDescriptor::new(
        "GetSidSubAuthorityCount",
        Stdcall,
        GET_SID_SUB_AUTHORITY_COUNT,
        get_sid_sub_authority_count,
    ),
    ApiDescriptor::new("GetSidSubAuthority", Stdcall, GET_SID_SUB_AUTHORITY, get_sid_sub_authority),
    ApiDescriptor::new(
        "AllocateAndInitializeSid",
        Stdcall,
        ALLOCATE_AND_INITIALIZE_SID,
        allocate_and_initialize_sid,
    ),
    ApiDescriptor::new("CheckTokenMembership", Stdcall, CHECK_TOKEN_MEMBERSHIP, check_token_membership),
    ApiDescriptor::new("FreeSid", Stdcall, FREE_SID, free_sid),
    ApiDescriptor::new("EqualSid", Stdcall, EQUAL_SID, equal_sid),
    ApiDescriptor::new("OpenSCManagerA", Stdcall, OPEN_SC_MANAGER_A, open_sc_manager_a),
    ApiDescriptor::new("CreateServiceA", Stdcall, CREATE_SERVICE_A, create_service_a),
    ApiDescriptor::new("OpenServiceA", Stdcall, OPEN_SERVICE_A, open_service_a),
    ApiDescriptor::new("CloseServiceHandle", Stdcall, CLOSE_SERVICE_HANDLE, close_service_handle),
    ApiDescriptor::new("StartServiceA", Stdcall, START_SERVICE_A, start_service_a),
];
