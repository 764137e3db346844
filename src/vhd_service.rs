// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Creates, attaches, and detaches sparse virtual-disk container files
//! (spec §4.F). Generalizes the teacher's `vhdutilities` module — written
//! for mounting a VHDX as a disposable test fixture — into the lifecycle a
//! backup container needs: a block size fixed at 32 MiB, a logical sector
//! size that always matches the source disk rather than a hard-coded 512,
//! and a `create_and_attach_rw` that never closes the handle between
//! `CreateVirtualDisk` and `AttachVirtualDisk` (closing in between is what
//! made the teacher's two-call sequence fail with an invalid-parameter
//! error on some hosts; see spec §9, Open Questions 2 and 3).

use crate::errors::ChronosError;
use crate::models::SectorSize;
use crate::virtdisk::VirtualDisk;
use crate::virtdiskdefs::*;
use std::collections::HashMap;
use std::sync::Mutex;

const CONTAINER_BLOCK_SIZE_BYTES: u32 = 32 * 1024 * 1024;

fn default_storage_type() -> VirtualStorageType {
    // Vendor-unknown lets CreateVirtualDisk/OpenVirtualDisk infer the
    // provider from the file extension, same as vhdutilities did.
    VirtualStorageType {
        device_id: 0,
        vendor_id: VIRTUAL_STORAGE_TYPE_VENDOR_UNKNOWN,
    }
}

/// Creates a sparse container file without attaching it. Exposed for
/// callers (e.g. sidecar tooling) that need to stat or inspect a container
/// without mounting it; the backup pipeline itself always goes through
/// [`create_and_attach_rw`].
pub fn create_dynamic(
    path: &str,
    max_size: u64,
    logical_sector_size: SectorSize,
) -> Result<VirtualDisk, ChronosError> {
    let mut parameters = unsafe { std::mem::zeroed::<create_virtual_disk::Parameters>() };
    parameters.version = create_virtual_disk::Version::Version2;
    unsafe {
        parameters.version_details.version2.maximum_size = max_size;
        parameters.version_details.version2.block_size_in_bytes = CONTAINER_BLOCK_SIZE_BYTES;
        parameters.version_details.version2.sector_size_in_bytes = logical_sector_size.bytes();
    }

    VirtualDisk::create(
        default_storage_type(),
        path,
        crate::virtdiskdefs::VirtualDiskAccessMask::None,
        None,
        create_virtual_disk::Flag::None as u32,
        0,
        &parameters,
        None,
    )
    .map_err(ChronosError::from)
}

fn attach(virtual_disk: &VirtualDisk, read_only: bool) -> Result<(), ChronosError> {
    let mut parameters = unsafe { std::mem::zeroed::<attach_virtual_disk::Parameters>() };
    parameters.version = attach_virtual_disk::Version::Version1;

    let flags = if read_only {
        attach_virtual_disk::Flag::ReadOnly as u32 | attach_virtual_disk::Flag::NoDriveLetter as u32
    } else {
        attach_virtual_disk::Flag::NoDriveLetter as u32
    };

    virtual_disk
        .attach(None, flags, 0, &parameters, None)
        .map_err(ChronosError::from)
}

/// Owns an attached container: the `VirtualDisk` handle plus the
/// OS-assigned raw device path writes go through. Detaches on drop.
pub struct AttachedContainer {
    virtual_disk: VirtualDisk,
    device_path: String,
    container_path: String,
}

impl AttachedContainer {
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl Drop for AttachedContainer {
    fn drop(&mut self) {
        let _ = self.virtual_disk.detach(detach_virtual_disk::Flag::None as u32, 0);
        unregister_mount(&self.container_path);
    }
}

/// Opens an existing container read-write and attaches it.
pub fn attach_read_write(path: &str) -> Result<AttachedContainer, ChronosError> {
    open_and_attach(path, false)
}

/// Opens an existing container read-only and attaches it (restore source,
/// verify engine).
pub fn attach_read_only(path: &str) -> Result<AttachedContainer, ChronosError> {
    open_and_attach(path, true)
}

fn open_and_attach(path: &str, read_only: bool) -> Result<AttachedContainer, ChronosError> {
    let mut parameters = unsafe { std::mem::zeroed::<open_virtual_disk::Parameters>() };
    parameters.version = open_virtual_disk::Version::Version2;
    unsafe {
        parameters.version_details.version2.read_only = read_only as crate::windefs::Bool;
    }

    let virtual_disk = VirtualDisk::open(
        default_storage_type(),
        path,
        crate::virtdiskdefs::VirtualDiskAccessMask::None,
        open_virtual_disk::Flag::ParentCachedIo as u32,
        Some(&parameters),
    )
    .map_err(ChronosError::from)?;

    attach(&virtual_disk, read_only)?;
    let device_path = virtual_disk.get_physical_path().map_err(ChronosError::from)?;

    register_mount(path, &device_path);
    Ok(AttachedContainer { virtual_disk, device_path, container_path: path.to_string() })
}

/// Creates a container sized to `max_size` with logical sector size
/// `logical_sector_size`, and attaches it read-write in one fused
/// operation — the `VirtualDisk` handle from `create` is never dropped
/// before `attach` runs on it.
pub fn create_and_attach_rw(
    path: &str,
    max_size: u64,
    logical_sector_size: SectorSize,
) -> Result<AttachedContainer, ChronosError> {
    let virtual_disk = create_dynamic(path, max_size, logical_sector_size)?;
    attach(&virtual_disk, false)?;
    let device_path = virtual_disk.get_physical_path().map_err(ChronosError::from)?;

    register_mount(path, &device_path);
    Ok(AttachedContainer { virtual_disk, device_path, container_path: path.to_string() })
}

/// Process-wide registry of `container path -> device path`, generalizing
/// the teacher's static `FORMAT_CONTEXT`-style globals into an explicit
/// singleton with defined init/teardown (spec §5, §9: "process-wide
/// registries ... explicit singletons").
static MOUNT_REGISTRY: Mutex<Option<HashMap<String, String>>> = Mutex::new(None);

fn register_mount(container_path: &str, device_path: &str) {
    let mut registry = MOUNT_REGISTRY.lock().unwrap();
    registry
        .get_or_insert_with(HashMap::new)
        .insert(container_path.to_string(), device_path.to_string());
}

fn unregister_mount(container_path: &str) {
    if let Some(registry) = MOUNT_REGISTRY.lock().unwrap().as_mut() {
        registry.remove(container_path);
    }
}

/// Detaches every container the registry still knows about by re-opening
/// each by path (without re-attaching) and calling `DetachVirtualDisk`
/// directly on that fresh handle — the VirtDisk API tracks attachment
/// per-file, not per-handle, so this does not require the handle that
/// originally attached it (useful for the application shutdown path, which
/// may run after the owning `AttachedContainer` was leaked or the process
/// is tearing down without unwinding). Tolerates "already gone"/"not
/// attached" as success, since a concurrent user-initiated dismount may
/// have raced this call (spec §5).
pub fn dismount_all() {
    let keys: Vec<String> = MOUNT_REGISTRY
        .lock()
        .unwrap()
        .as_ref()
        .map(|registry| registry.keys().cloned().collect())
        .unwrap_or_default();

    for container_path in keys {
        let _ = detach_by_path(&container_path);
        unregister_mount(&container_path);
    }
}

fn detach_by_path(path: &str) -> Result<(), ChronosError> {
    let virtual_disk = VirtualDisk::open(
        default_storage_type(),
        path,
        crate::virtdiskdefs::VirtualDiskAccessMask::None,
        open_virtual_disk::Flag::None as u32,
        None,
    )
    .map_err(ChronosError::from)?;
    virtual_disk.detach(detach_virtual_disk::Flag::None as u32, 0).map_err(ChronosError::from)
}

/// Assigns the container at `container_path` (already attached via
/// [`attach_read_write`]/[`attach_read_only`]) the highest unused drive
/// letter and returns it, for callers that want Explorer-visible access to
/// a mounted image rather than raw sector I/O (spec §4.F, auxiliary mount
/// helpers). Returns `None` if every letter `D..Z` is taken.
pub fn mount_to_drive_letter(device_path: &str) -> Result<Option<char>, ChronosError> {
    let Some(letter) = first_unused_drive_letter() else {
        return Ok(None);
    };

    let mount_point = format!(r"{}:\", letter);
    let wide_mount_point = widestring::WideCString::from_str(&mount_point).map_err(|_| ChronosError::InvalidParameter)?;
    let wide_target = widestring::WideCString::from_str(&format!(r"{}\", device_path.trim_end_matches('\\')))
        .map_err(|_| ChronosError::InvalidParameter)?;

    let ok = unsafe { winapi::um::fileapi::SetVolumeMountPointW(wide_mount_point.as_ptr(), wide_target.as_ptr()) };
    if ok == 0 {
        return Err(ChronosError::from(crate::errors::error_code_to_result_code(unsafe {
            winapi::um::errhandlingapi::GetLastError()
        })));
    }

    Ok(Some(letter))
}

/// Reverses [`mount_to_drive_letter`]: removes the mount point, leaving the
/// container attached (raw device I/O against it continues to work).
pub fn dismount_drive_letter(letter: char) -> Result<(), ChronosError> {
    let mount_point = format!(r"{}:\", letter);
    let wide_mount_point = widestring::WideCString::from_str(&mount_point).map_err(|_| ChronosError::InvalidParameter)?;

    let ok = unsafe { winapi::um::fileapi::DeleteVolumeMountPointW(wide_mount_point.as_ptr()) };
    if ok == 0 {
        return Err(ChronosError::from(crate::errors::error_code_to_result_code(unsafe {
            winapi::um::errhandlingapi::GetLastError()
        })));
    }
    Ok(())
}

/// Scans drive letters `Z` down to `D` for the first unused one (spec §8,
/// Boundary behaviors: "Drive-letter selection picks the highest unused
/// letter in [D..Z]").
pub fn first_unused_drive_letter() -> Option<char> {
    (b'D'..=b'Z')
        .rev()
        .map(|b| b as char)
        .find(|letter| !drive_letter_in_use(*letter))
}

fn drive_letter_in_use(letter: char) -> bool {
    let path = format!(r"{}:\", letter);
    std::path::Path::new(&path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letter_search_prefers_highest_unused() {
        // We can't guarantee any specific letter is free in a sandbox, but
        // the scan order itself (Z downward, bounded at D) is a pure
        // function we can assert on directly.
        let scanned: Vec<char> = (b'D'..=b'Z').rev().map(|b| b as char).collect();
        assert_eq!(scanned.first(), Some(&'Z'));
        assert_eq!(scanned.last(), Some(&'D'));
    }
}
