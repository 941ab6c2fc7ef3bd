//! SID、令牌与服务控制集成测试

use emu_arch::ArchContext;
use emu_core::{Endian, GuestArch, GuestMemory, Profile};
use winapi_compat::consts::*;
use winapi_compat::{HandleObject, Sid, WellKnown, WindowsOs};

fn process(arch: GuestArch, permission: &str) -> WindowsOs {
    let profile = Profile::load(&format!("[SYSTEM]\npermission = \"{permission}\"\n")).unwrap();
    let ctx = ArchContext::new(arch, Endian::Little, None);
    WindowsOs::new(ctx, profile).unwrap()
}

fn slot(os: &mut WindowsOs, size: usize) -> u64 {
    let addr = os.heap_mut().alloc(size).unwrap();
    os.mem_mut().write(addr, &vec![0; size]).unwrap();
    addr
}

fn cstr(os: &mut WindowsOs, s: &str) -> u64 {
    let addr = os.heap_mut().alloc(s.len() + 1).unwrap();
    os.mem_mut().write_cstring(addr, s).unwrap();
    addr
}

fn dword(os: &WindowsOs, addr: u64) -> u64 {
    os.mem().read_ptr(addr, Some(4)).unwrap()
}

/// AllocateAndInitializeSid with NT authority; returns the SID pointer
fn allocate_sid(os: &mut WindowsOs, subs: &[u32]) -> u64 {
    let auth = slot(os, 6);
    os.mem_mut().write(auth, &SECURITY_NT_AUTHORITY).unwrap();
    let out = slot(os, 8);

    let mut args = vec![auth, subs.len() as u64];
    args.extend((0..8).map(|i| subs.get(i).copied().unwrap_or(0) as u64));
    args.push(out);
    assert_eq!(os.invoke("AllocateAndInitializeSid", &args).unwrap(), TRUE);
    os.mem().read_ptr(out, None).unwrap()
}

fn admins(os: &mut WindowsOs) -> u64 {
    allocate_sid(os, &[SECURITY_BUILTIN_DOMAIN_RID, DOMAIN_ALIAS_RID_ADMINS])
}

// ============================================================================
// SID
// ============================================================================

#[test]
fn test_well_known_sid_is_stable() {
    let os = process(GuestArch::X86, "root");
    let first = os.sids().get(WellKnown::Administrators).clone();
    let second = os.sids().get(WellKnown::Administrators);
    assert_eq!(&first, second);
    assert_eq!(first.to_string(), "S-1-5-32-544");
    assert_eq!(first, Sid::nt(&[SECURITY_BUILTIN_DOMAIN_RID, DOMAIN_ALIAS_RID_ADMINS]));
}

#[test]
fn test_allocated_sid_is_in_guest_memory() {
    let mut os = process(GuestArch::X86, "root");
    let p_sid = admins(&mut os);

    let sid = Sid::read_from(os.mem(), p_sid).unwrap();
    assert_eq!(&sid, os.sids().get(WellKnown::Administrators));
    assert!(matches!(os.handles().get(p_sid).unwrap().obj, HandleObject::Sid(_)));

    let count = os.invoke("GetSidSubAuthorityCount", &[p_sid]).unwrap();
    assert_eq!(count, p_sid + 1);
    assert_eq!(os.mem().read_bytes(count, 1).unwrap(), [2u8]);

    let sub = os.invoke("GetSidSubAuthority", &[p_sid, 1]).unwrap();
    assert_eq!(sub, p_sid + 12);
    assert_eq!(dword(&os, sub), DOMAIN_ALIAS_RID_ADMINS as u64);

    assert_eq!(os.invoke("GetSidSubAuthority", &[p_sid, 2]).unwrap(), 0);
    assert_eq!(os.last_error(), ERROR_INVALID_PARAMETER);
}

#[test]
fn test_allocate_rejects_too_many_sub_authorities() {
    let mut os = process(GuestArch::X86, "root");
    let out = slot(&mut os, 4);
    let mut args = vec![0, 9];
    args.extend([0u64; 8]);
    args.push(out);
    assert_eq!(os.invoke("AllocateAndInitializeSid", &args).unwrap(), FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_PARAMETER);
}

#[test]
fn test_membership_follows_permission() {
    for (permission, expected) in [("root", 1), ("user", 0)] {
        let mut os = process(GuestArch::X86, permission);
        let p_sid = admins(&mut os);
        let is_member = slot(&mut os, 4);
        let ok = os
            .invoke("CheckTokenMembership", &[0, p_sid, is_member])
            .unwrap();
        assert_eq!(ok, TRUE);
        assert_eq!(dword(&os, is_member), expected, "{permission}");
    }

    let mut os = process(GuestArch::X86, "user");
    let users = allocate_sid(&mut os, &[SECURITY_BUILTIN_DOMAIN_RID, DOMAIN_ALIAS_RID_USERS]);
    let is_member = slot(&mut os, 4);
    os.invoke("CheckTokenMembership", &[0, users, is_member]).unwrap();
    assert_eq!(dword(&os, is_member), 1);
}

#[test]
fn test_membership_edge_cases() {
    let mut os = process(GuestArch::X86, "root");
    let is_member = slot(&mut os, 4);

    let ok = os
        .invoke("CheckTokenMembership", &[0, 0xDEAD_BEEF, is_member])
        .unwrap();
    assert_eq!(ok, FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_HANDLE);

    let odd = allocate_sid(&mut os, &[18]);
    let err = os
        .invoke("CheckTokenMembership", &[0, odd, is_member])
        .unwrap_err();
    assert!(err.is_not_implemented());
}

#[test]
fn test_equal_and_free_sid() {
    let mut os = process(GuestArch::X86, "root");
    let a = admins(&mut os);
    let b = admins(&mut os);
    let users = allocate_sid(&mut os, &[SECURITY_BUILTIN_DOMAIN_RID, DOMAIN_ALIAS_RID_USERS]);
    assert_ne!(a, b);

    assert_eq!(os.invoke("EqualSid", &[a, b]).unwrap(), TRUE);
    assert_eq!(os.invoke("EqualSid", &[a, users]).unwrap(), FALSE);
    assert_eq!(os.last_error(), ERROR_SUCCESS);

    let in_use = os.heap().in_use();
    assert_eq!(os.invoke("FreeSid", &[b]).unwrap(), 0);
    assert!(os.heap().in_use() < in_use);
    assert!(os.handles().get(b).is_none());
    assert_eq!(os.invoke("FreeSid", &[b]).unwrap(), b);

    assert_eq!(os.invoke("EqualSid", &[a, b]).unwrap(), FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_HANDLE);
}

// ============================================================================
// 令牌
// ============================================================================

fn open_token(os: &mut WindowsOs) -> u64 {
    let out = slot(os, 8);
    assert_eq!(
        os.invoke("OpenProcessToken", &[0xffff_ffff, 0x8, out]).unwrap(),
        TRUE
    );
    os.mem().read_ptr(out, None).unwrap()
}

#[test]
fn test_process_token_is_reused() {
    let mut os = process(GuestArch::X86, "root");
    let first = open_token(&mut os);
    let second = open_token(&mut os);
    assert_eq!(first, second);
    assert!(os.handles().get(first).unwrap().obj.as_token().is_some());
}

#[test]
fn test_token_elevation_sizing() {
    let mut os = process(GuestArch::X86, "root");
    let token = open_token(&mut os);
    let ret_len = slot(&mut os, 4);

    let ok = os
        .invoke("GetTokenInformation", &[token, TOKEN_ELEVATION as u64, 0, 0, ret_len])
        .unwrap();
    assert_eq!(ok, FALSE);
    assert_eq!(os.last_error(), ERROR_INSUFFICIENT_BUFFER);
    assert_eq!(dword(&os, ret_len), 4);

    let buf = slot(&mut os, 4);
    let ok = os
        .invoke("GetTokenInformation", &[token, TOKEN_ELEVATION as u64, buf, 4, ret_len])
        .unwrap();
    assert_eq!(ok, TRUE);
    assert_eq!(dword(&os, buf), 1);

    let ok = os
        .invoke("GetTokenInformation", &[token, TOKEN_ELEVATION_TYPE as u64, buf, 4, ret_len])
        .unwrap();
    assert_eq!(ok, TRUE);
    assert_eq!(dword(&os, buf), TOKEN_ELEVATION_TYPE_FULL as u64);
}

#[test]
fn test_token_integrity_level_64() {
    let mut os = process(GuestArch::X8664, "user");
    let token = open_token(&mut os);
    let buf = slot(&mut os, 64);
    let ret_len = slot(&mut os, 4);

    let ok = os
        .invoke(
            "GetTokenInformation",
            &[token, TOKEN_INTEGRITY_LEVEL as u64, buf, 64, ret_len],
        )
        .unwrap();
    assert_eq!(ok, TRUE);
    assert_eq!(dword(&os, ret_len), 16 + 12);

    let p_sid = os.mem().read_ptr(buf, None).unwrap();
    assert_eq!(p_sid, buf + 16);
    assert_eq!(dword(&os, buf + 8), SE_GROUP_INTEGRITY as u64);
    let label = Sid::read_from(os.mem(), p_sid).unwrap();
    assert_eq!(label.to_string(), "S-1-16-8192");
}

#[test]
fn test_token_sids_feed_sid_routines() {
    for (arch, permission, rid) in [
        (GuestArch::X86, "root", SECURITY_MANDATORY_HIGH_RID),
        (GuestArch::X8664, "user", SECURITY_MANDATORY_MEDIUM_RID),
    ] {
        let mut os = process(arch, permission);
        let token = open_token(&mut os);
        let label = slot(&mut os, 64);
        let user = slot(&mut os, 64);
        let ret_len = slot(&mut os, 4);
        for (class, buf) in [(TOKEN_INTEGRITY_LEVEL, label), (TOKEN_USER, user)] {
            let ok = os
                .invoke("GetTokenInformation", &[token, class as u64, buf, 64, ret_len])
                .unwrap();
            assert_eq!(ok, TRUE);
        }

        // integrity level check as guest code performs it
        let p_label = os.mem().read_ptr(label, None).unwrap();
        let count = os.invoke("GetSidSubAuthorityCount", &[p_label]).unwrap();
        assert_eq!(count, p_label + 1);
        assert_eq!(os.mem().read_bytes(count, 1).unwrap(), [1u8]);
        let sub = os.invoke("GetSidSubAuthority", &[p_label, 0]).unwrap();
        assert_eq!(sub, p_label + 8);
        assert_eq!(dword(&os, sub), rid as u64, "{permission}");

        let p_user = os.mem().read_ptr(user, None).unwrap();
        let copy = os.mem().read_bytes(p_user, 28).unwrap();
        let other = slot(&mut os, 28);
        os.mem_mut().write(other, &copy).unwrap();
        assert_eq!(os.invoke("EqualSid", &[p_user, other]).unwrap(), TRUE);
        assert_eq!(os.invoke("EqualSid", &[p_user, p_label]).unwrap(), FALSE);
        assert_eq!(os.last_error(), ERROR_SUCCESS);

        // token storage is not FreeSid's to release
        assert_eq!(os.invoke("FreeSid", &[p_user]).unwrap(), p_user);
        assert_eq!(os.invoke("GetSidSubAuthority", &[p_user, 4]).unwrap(), p_user + 24);
    }
}

#[test]
fn test_allocate_sid_leaves_nothing_behind_on_bad_out_pointer() {
    let mut os = process(GuestArch::X86, "root");
    let in_use = os.heap().in_use();
    let handles = os.handles().len();

    let mut args = vec![0, 2, SECURITY_BUILTIN_DOMAIN_RID as u64, DOMAIN_ALIAS_RID_ADMINS as u64];
    args.extend([0u64; 6]);
    args.push(0xDEAD_0000);
    assert!(os.invoke("AllocateAndInitializeSid", &args).is_err());
    assert_eq!(os.heap().in_use(), in_use);
    assert_eq!(os.handles().len(), handles);
}

#[test]
fn test_unbacked_token_class() {
    let mut os = process(GuestArch::X86, "root");
    let token = open_token(&mut os);
    let ret_len = slot(&mut os, 4);

    // TokenOwner
    let ok = os
        .invoke("GetTokenInformation", &[token, 4, 0, 0, ret_len])
        .unwrap();
    assert_eq!(ok, FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_PARAMETER);

    let buf = slot(&mut os, 64);
    let err = os
        .invoke("GetTokenInformation", &[token, 4, buf, 64, ret_len])
        .unwrap_err();
    assert!(err.is_not_implemented());

    let ok = os
        .invoke("GetTokenInformation", &[0xDEAD_BEEF, TOKEN_USER as u64, buf, 64, ret_len])
        .unwrap();
    assert_eq!(ok, FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_HANDLE);
}

// ============================================================================
// 服务控制管理器
// ============================================================================

#[test]
fn test_service_lifecycle() {
    let mut os = process(GuestArch::X86, "root");
    let manager = os.invoke("OpenSCManagerA", &[0, 0, 0xf003f]).unwrap();
    assert_ne!(manager, 0);
    assert_eq!(os.invoke("OpenSCManagerA", &[0, 0, 0xf003f]).unwrap(), manager);

    let name = cstr(&mut os, "updater");
    let path = cstr(&mut os, "C:\\Windows\\Temp\\updater.exe");
    let mut create = vec![manager, name, name, 0xf01ff, 0x10, 2, 1, path];
    create.extend([0u64; 5]);

    let service = os.invoke("CreateServiceA", &create).unwrap();
    assert_ne!(service, 0);
    assert_eq!(
        os.services().get("updater").map(String::as_str),
        Some("C:\\Windows\\Temp\\updater.exe")
    );

    assert_eq!(os.invoke("CreateServiceA", &create).unwrap(), 0);
    assert_eq!(os.last_error(), ERROR_SERVICE_EXISTS);

    let opened = os.invoke("OpenServiceA", &[manager, name, 0x10]).unwrap();
    assert_ne!(opened, 0);
    assert_eq!(os.invoke("StartServiceA", &[opened, 0, 0]).unwrap(), TRUE);

    let missing = cstr(&mut os, "missing");
    assert_eq!(os.invoke("OpenServiceA", &[manager, missing, 0x10]).unwrap(), 0);
    assert_eq!(os.last_error(), ERROR_SERVICE_DOES_NOT_EXIST);

    assert_eq!(os.invoke("StartServiceA", &[manager, 0, 0]).unwrap(), FALSE);
    assert_eq!(os.last_error(), ERROR_INVALID_HANDLE);

    assert_eq!(os.invoke("CloseServiceHandle", &[opened]).unwrap(), TRUE);
    assert_eq!(os.invoke("CloseServiceHandle", &[opened]).unwrap(), FALSE);
    assert_eq!(os.invoke("CloseServiceHandle", &[service]).unwrap(), TRUE);
    assert_eq!(os.invoke("CloseServiceHandle", &[manager]).unwrap(), TRUE);
}
