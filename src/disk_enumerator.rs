// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Produces disks, partitions, and unallocated gaps, reconciling two
//! independent sources: a structured management-query view (WMI, when
//! available) and the drive layout read directly off the device. See spec
//! §4.C for the reconciliation rule this module implements.

use crate::environment;
use crate::errors::ChronosError;
use crate::models::{PartitionStyle, PhysicalDisk, Partition, UNALLOCATED_PARTITION_NUMBER_BASE};
use crate::platform_io::Device;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use winapi::um::{fileapi, winioctl};

const GPT_GUID_ESP: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";
const GPT_GUID_MSR: &str = "E3C9E316-0B5C-4DB8-817D-F92DF00215AE";
const GPT_GUID_BASIC_DATA: &str = "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7";
const GPT_GUID_RECOVERY: &str = "DE94BBA4-06D1-4D40-A16A-BFD50179D6AC";

const GPT_SIGNATURE: winioctl::PARTITION_STYLE = winioctl::PARTITION_STYLE_GPT;
const MBR_SIGNATURE: winioctl::PARTITION_STYLE = winioctl::PARTITION_STYLE_MBR;

pub(crate) const FRONT_BACK_RESERVE_BYTES: u64 = 1024 * 1024;
const MIN_GAP_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Default, Clone)]
struct Cache {
    disks: HashMap<u32, PhysicalDisk>,
    partitions: HashMap<u32, Vec<Partition>>,
}

/// `list_disks`/`list_partitions`/`get_disk`/`refresh`/`list_unallocated`
/// from spec §4.C, backed by a cache that is written only by `refresh()`
/// and read via a single `Arc` snapshot swap (spec §5: "readers see either
/// the old or new snapshot atomically").
pub struct DiskEnumerator {
    cache: Mutex<Arc<Cache>>,
}

impl DiskEnumerator {
    pub fn new() -> DiskEnumerator {
        DiskEnumerator {
            cache: Mutex::new(Arc::new(Cache::default())),
        }
    }

    fn snapshot(&self) -> Arc<Cache> {
        Arc::clone(&self.cache.lock().unwrap())
    }

    /// Re-enumerates everything and atomically replaces the cached
    /// snapshot. Cheap readers concurrent with this call see either the
    /// whole old snapshot or the whole new one, never a partial mix.
    pub fn refresh(&self) -> Result<(), ChronosError> {
        let fresh = enumerate_all()?;
        let mut guard = self.cache.lock().unwrap();
        *guard = Arc::new(fresh);
        Ok(())
    }

    pub fn list_disks(&self) -> Vec<PhysicalDisk> {
        let snapshot = self.snapshot();
        let mut disks: Vec<_> = snapshot.disks.values().cloned().collect();
        disks.sort_by_key(|disk| disk.index);
        disks
    }

    pub fn get_disk(&self, disk_index: u32) -> Option<PhysicalDisk> {
        self.snapshot().disks.get(&disk_index).cloned()
    }

    pub fn list_partitions(&self, disk_index: u32) -> Vec<Partition> {
        self.snapshot()
            .partitions
            .get(&disk_index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn list_unallocated(&self, disk_index: u32) -> Vec<Partition> {
        self.list_partitions(disk_index)
            .into_iter()
            .filter(|p| p.is_unallocated)
            .collect()
    }
}

impl Default for DiskEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

fn enumerate_all() -> Result<Cache, ChronosError> {
    let _span = tracing::info_span!("enumerate").entered();
    let mut cache = Cache::default();
    let management_partitions = if environment::capabilities().has_management_query {
        query_management_partitions().unwrap_or_default()
    } else {
        HashMap::new()
    };

    for disk_index in crate::platform_io::enumerate_physical_drive_indices() {
        let Ok((disk, mut partitions)) = probe_disk(disk_index) else {
            continue;
        };

        if let Some(management_entries) = management_partitions.get(&disk_index) {
            reconcile(&mut partitions, management_entries);
        }
        apply_heuristic_partition_labels(&mut partitions);

        resolve_volume_paths(disk_index, &mut partitions);
        for partition in partitions.iter_mut() {
            enrich_from_volume(partition);
        }

        let mut with_gaps = partitions.clone();
        with_gaps.extend(compute_unallocated(disk_index, disk.size_bytes, &partitions));
        with_gaps.sort_by_key(|p| p.offset_bytes);

        cache.disks.insert(disk_index, disk);
        cache.partitions.insert(disk_index, with_gaps);
    }

    Ok(cache)
}

/// A management-query partition record: everything a WMI-backed source can
/// tell us that the raw layout cannot (filesystem, label, free space, type
/// string). `device_id` is the `Win32_DiskPartition.DeviceID` this record
/// was built from (e.g. `"Disk #0, Partition #0"`) — kept so a GUID-only
/// volume (no drive letter, hence absent from `Win32_LogicalDiskToPartition`)
/// still gets its `partition_type` from the join key alone (spec §4.C:
/// "GUID-only volumes from a management query keyed on device ID").
#[derive(Debug, Clone, Default)]
struct ManagementPartition {
    starting_offset: u64,
    device_id: String,
    drive_letter: Option<char>,
    volume_label: Option<String>,
    filesystem: Option<String>,
    used_bytes: Option<u64>,
    free_bytes: Option<u64>,
    partition_type: Option<String>,
}

/// Extracts the quoted `DeviceID="..."` key out of a WMI reference-property
/// string (the form `Win32_LogicalDiskToPartition.Antecedent`/`.Dependent`
/// come back in, e.g. `\\HOST\root\cimv2:Win32_DiskPartition.DeviceID="Disk
/// #0, Partition #0"`).
fn extract_device_id(object_path: &str) -> Option<String> {
    let key = "DeviceID=\"";
    let start = object_path.find(key)? + key.len();
    let rest = &object_path[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn query_management_partitions() -> Option<HashMap<u32, Vec<ManagementPartition>>> {
    // Best-effort: WMI is unavailable in restricted environments (guarded
    // by the capability check in `enumerate_all`) and may also fail on a
    // live host with no COM apartment initialized on this thread; either
    // way the control-code fallback below covers full enumeration.
    let com_con = wmi::COMLibrary::new().ok()?;
    let wmi_con = wmi::WMIConnection::new(com_con.into()).ok()?;

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Win32DiskPartition {
        disk_index: u32,
        starting_offset: String,
        device_id: String,
        #[serde(rename = "Type")]
        partition_type: Option<String>,
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Win32LogicalDiskToPartition {
        antecedent: String,
        dependent: String,
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Win32LogicalDisk {
        device_id: String,
        file_system: Option<String>,
        volume_name: Option<String>,
        free_space: Option<String>,
        size: Option<String>,
    }

    let partitions: Vec<Win32DiskPartition> = wmi_con.raw_query("SELECT * FROM Win32_DiskPartition").ok()?;
    // Both of these are joins on top of the partition list above; a failure
    // to enumerate either one just means drive-letter-keyed enrichment is
    // skipped, not that the whole management-query path fails.
    let links: Vec<Win32LogicalDiskToPartition> =
        wmi_con.raw_query("SELECT * FROM Win32_LogicalDiskToPartition").unwrap_or_default();
    let logical_disks: Vec<Win32LogicalDisk> = wmi_con.raw_query("SELECT * FROM Win32_LogicalDisk").unwrap_or_default();

    let mut drive_id_by_partition_id: HashMap<String, String> = HashMap::new();
    for link in &links {
        if let (Some(partition_id), Some(drive_id)) = (extract_device_id(&link.antecedent), extract_device_id(&link.dependent)) {
            drive_id_by_partition_id.insert(partition_id, drive_id);
        }
    }
    let logical_disk_by_id: HashMap<&str, &Win32LogicalDisk> =
        logical_disks.iter().map(|d| (d.device_id.as_str(), d)).collect();

    let mut by_disk: HashMap<u32, Vec<ManagementPartition>> = HashMap::new();
    for row in partitions {
        let starting_offset: u64 = row.starting_offset.parse().unwrap_or(0);
        let logical_disk = drive_id_by_partition_id
            .get(&row.device_id)
            .and_then(|drive_id| logical_disk_by_id.get(drive_id.as_str()));

        let drive_letter = logical_disk
            .and_then(|d| d.device_id.chars().next())
            .filter(|c| c.is_ascii_alphabetic());

        let used_bytes = logical_disk.and_then(|d| {
            let size: u64 = d.size.as_ref()?.parse().ok()?;
            let free: u64 = d.free_space.as_ref()?.parse().ok()?;
            Some(size.saturating_sub(free))
        });
        let free_bytes = logical_disk.and_then(|d| d.free_space.as_ref()?.parse().ok());

        by_disk.entry(row.disk_index).or_default().push(ManagementPartition {
            starting_offset,
            device_id: row.device_id,
            drive_letter,
            volume_label: logical_disk.and_then(|d| d.volume_name.clone()),
            filesystem: logical_disk.and_then(|d| d.file_system.clone()),
            used_bytes,
            free_bytes,
            partition_type: row.partition_type,
        });
    }

    Some(by_disk)
}

/// Reconciles a disk's control-code-derived partitions with the
/// management-query view by starting offset, per spec §4.C: "for each
/// management-reported partition, find the layout entry with equal
/// starting_offset; take its partition_number". Entries present only in
/// the layout (e.g. a hidden MSR partition) are left untouched — they were
/// already appended by `probe_disk`.
fn reconcile(partitions: &mut [Partition], management_entries: &[ManagementPartition]) {
    for partition in partitions.iter_mut() {
        if let Some(management) = management_entries
            .iter()
            .find(|m| m.starting_offset == partition.offset_bytes)
        {
            partition.drive_letter = partition.drive_letter.or(management.drive_letter);
            partition.volume_label = partition.volume_label.clone().or_else(|| management.volume_label.clone());
            partition.filesystem = partition.filesystem.clone().or_else(|| management.filesystem.clone());
            partition.used_bytes = partition.used_bytes.or(management.used_bytes);
            partition.free_bytes = partition.free_bytes.or(management.free_bytes);
            partition.partition_type_label = partition
                .partition_type_label
                .clone()
                .or_else(|| management.partition_type.clone());
        }
    }
}

/// Tier (iii) of spec §4.C's partition-type fallback, applied after both the
/// GPT-GUID lookup (tier i, in `to_partition`) and the management-reported
/// type string (tier ii, in `reconcile`) have had a chance to label the
/// partition: an MBR partition with no type from either tier, marked
/// bootable, and small enough to plausibly be a recovery partition, is
/// labeled `Recovery`.
const HEURISTIC_RECOVERY_MAX_BYTES: u64 = 1024 * 1024 * 1024;

fn apply_heuristic_partition_labels(partitions: &mut [Partition]) {
    for partition in partitions.iter_mut() {
        if partition.is_unallocated || partition.partition_type_label.is_some() {
            continue;
        }
        if partition.gpt_type_guid.is_none()
            && partition.mbr_boot_indicator
            && partition.size_bytes <= HEURISTIC_RECOVERY_MAX_BYTES
        {
            partition.partition_type_label = Some("Recovery".to_string());
        }
    }
}

/// Closes a `FindFirstVolumeW` search handle on drop, mirroring the
/// teacher's `SafeFindVolumeHandle`.
struct FindVolumeHandle(crate::windefs::Handle);

impl Drop for FindVolumeHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                fileapi::FindVolumeClose(self.0);
            }
        }
    }
}

/// Volume-path resolution (spec §4.C): enumerates every volume GUID path on
/// the system and, for each, reads its backing disk extent via
/// `IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS`; a volume whose extent's disk
/// number and starting offset match an enumerated partition is that
/// partition's volume. Refines the teacher's `try_get_disk_volume_path`
/// (which matches disk number alone, fine for a single-volume VHD test
/// fixture) to also match starting offset, so multiple partitions on one
/// physical disk are told apart.
fn resolve_volume_paths(disk_index: u32, partitions: &mut [Partition]) {
    const MAX_PATH: usize = 256;
    let mut buffer: [u16; MAX_PATH] = [0; MAX_PATH];

    let find_handle = unsafe { fileapi::FindFirstVolumeW(buffer.as_mut_ptr(), MAX_PATH as u32) };
    if find_handle.is_null() {
        return;
    }
    let _guard = FindVolumeHandle(find_handle);

    loop {
        let volume_path = widestring::WideCString::from_ptr_str(buffer.as_ptr()).to_string_lossy();
        let open_path = volume_path.trim_end_matches('\\');

        if let Ok(device) = Device::open_read(open_path) {
            let mut extents: winioctl::VOLUME_DISK_EXTENTS = unsafe { std::mem::zeroed() };
            let queried = device.control_code(winioctl::IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, None::<&()>, &mut extents);
            if queried.is_ok() && extents.NumberOfDiskExtents >= 1 {
                let extent = &extents.Extents[0];
                if extent.DiskNumber == disk_index {
                    let starting_offset = unsafe { *extent.StartingOffset.QuadPart() } as u64;
                    if let Some(partition) = partitions
                        .iter_mut()
                        .find(|p| !p.is_unallocated && p.offset_bytes == starting_offset && p.volume_path.is_none())
                    {
                        partition.volume_path = Some(volume_path.clone());
                    }
                }
            }
        }

        if unsafe { fileapi::FindNextVolumeW(find_handle, buffer.as_mut_ptr(), MAX_PATH as u32) } == 0 {
            break;
        }
    }
}

/// If `partition.volume_path` returns a mount point of the form `X:\`,
/// records the drive letter. Best-effort: a volume with no mount point
/// (e.g. a GUID-only EFI system partition) simply keeps `drive_letter` unset.
fn mount_point_drive_letter(volume_root: &str) -> Option<char> {
    let wide = widestring::WideCString::from_str(volume_root).ok()?;
    let mut buffer = [0u16; 1024];
    let mut needed: crate::windefs::DWord = 0;

    let ok = unsafe {
        fileapi::GetVolumePathNamesForVolumeNameW(wide.as_ptr(), buffer.as_mut_ptr(), buffer.len() as u32, &mut needed)
    };
    if ok == 0 {
        return None;
    }

    let mut start = 0usize;
    for i in 0..buffer.len() {
        if buffer[i] != 0 {
            continue;
        }
        if i == start {
            break; // the double-NUL terminator of the MULTI_SZ list
        }
        let mount_point = widestring::WideCString::from_ptr_str(buffer[start..].as_ptr()).to_string_lossy();
        let mut chars = mount_point.chars();
        if let (Some(letter), Some(':')) = (chars.next(), chars.next()) {
            if letter.is_ascii_alphabetic() {
                return Some(letter.to_ascii_uppercase());
            }
        }
        start = i + 1;
    }
    None
}

/// Drive-letter volumes are enriched from a filesystem-free-space query;
/// GUID-only volumes fall back to whatever the management-query
/// reconciliation already attached (spec §4.C).
fn enrich_from_volume(partition: &mut Partition) {
    let Some(volume_path) = partition.volume_path.clone() else { return };
    let root = if volume_path.ends_with('\\') { volume_path } else { format!("{}\\", volume_path) };

    if partition.drive_letter.is_none() {
        partition.drive_letter = mount_point_drive_letter(&root);
    }

    let Ok(wide_root) = widestring::WideCString::from_str(&root) else { return };

    let mut label_buf = [0u16; 256];
    let mut fs_name_buf = [0u16; 256];
    let mut serial: crate::windefs::DWord = 0;
    let mut max_component_len: crate::windefs::DWord = 0;
    let mut fs_flags: crate::windefs::DWord = 0;

    let info_ok = unsafe {
        fileapi::GetVolumeInformationW(
            wide_root.as_ptr(),
            label_buf.as_mut_ptr(),
            label_buf.len() as u32,
            &mut serial,
            &mut max_component_len,
            &mut fs_flags,
            fs_name_buf.as_mut_ptr(),
            fs_name_buf.len() as u32,
        )
    };
    if info_ok != 0 {
        let label = widestring::WideCString::from_ptr_str(label_buf.as_ptr()).to_string_lossy();
        if !label.is_empty() {
            partition.volume_label.get_or_insert(label);
        }
        let filesystem = widestring::WideCString::from_ptr_str(fs_name_buf.as_ptr()).to_string_lossy();
        if !filesystem.is_empty() {
            partition.filesystem.get_or_insert(filesystem);
        }
    }

    let mut free_available: winapi::um::winnt::ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total: winapi::um::winnt::ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total_free: winapi::um::winnt::ULARGE_INTEGER = unsafe { std::mem::zeroed() };

    let space_ok =
        unsafe { fileapi::GetDiskFreeSpaceExW(wide_root.as_ptr(), &mut free_available, &mut total, &mut total_free) };
    if space_ok != 0 {
        let total_bytes = unsafe { *total.QuadPart() } as u64;
        let free_bytes = unsafe { *total_free.QuadPart() } as u64;
        partition.free_bytes.get_or_insert(free_bytes);
        partition.used_bytes.get_or_insert(total_bytes.saturating_sub(free_bytes));
    }
}

fn probe_disk(disk_index: u32) -> Result<(PhysicalDisk, Vec<Partition>), ChronosError> {
    let path = format!(r"\\.\PhysicalDrive{}", disk_index);
    let device = Device::open_read(&path).map_err(ChronosError::from)?;
    let size_bytes = device.get_length_info().unwrap_or(0);

    let (style, raw_partitions) = read_drive_layout(&device)?;

    let partitions = raw_partitions
        .into_iter()
        .map(|raw| to_partition(disk_index, raw))
        .collect();

    let disk = PhysicalDisk {
        index: disk_index,
        model: None,
        serial: None,
        manufacturer: None,
        size_bytes,
        partition_style: style,
        is_system: false,
        is_boot: false,
    };

    Ok((disk, partitions))
}

struct RawPartitionEntry {
    partition_number: u32,
    offset: u64,
    size: u64,
    gpt_type_guid: Option<String>,
    mbr_boot_indicator: bool,
}

fn to_partition(disk_index: u32, raw: RawPartitionEntry) -> Partition {
    let label = raw.gpt_type_guid.as_deref().and_then(gpt_guid_to_label);
    Partition {
        disk_index,
        partition_number: raw.partition_number,
        offset_bytes: raw.offset,
        size_bytes: raw.size,
        volume_path: None,
        drive_letter: None,
        volume_label: None,
        filesystem: None,
        partition_type_label: label,
        gpt_type_guid: raw.gpt_type_guid,
        used_bytes: None,
        free_bytes: None,
        is_unallocated: false,
        mbr_boot_indicator: raw.mbr_boot_indicator,
    }
}

/// Tier (i) of spec §4.C's partition-type fallback: GPT type GUID → one of
/// the four recognized labels, or `None` when the GUID isn't one of them
/// (leaving tiers (ii)/(iii) in `reconcile`/`apply_heuristic_partition_labels`
/// a chance to label it instead of defaulting every unrecognized GUID to
/// `Recovery`).
fn gpt_guid_to_label(guid: &str) -> Option<String> {
    let normalized = guid.to_ascii_uppercase();
    if normalized == GPT_GUID_ESP {
        Some("EFI".to_string())
    } else if normalized == GPT_GUID_MSR {
        Some("MSR".to_string())
    } else if normalized == GPT_GUID_BASIC_DATA {
        Some("Primary".to_string())
    } else if normalized == GPT_GUID_RECOVERY {
        Some("Recovery".to_string())
    } else {
        None
    }
}

/// Reads `IOCTL_DISK_GET_DRIVE_LAYOUT_EX`, retrying with a heap buffer
/// sized for the reported partition count on `ERROR_INSUFFICIENT_BUFFER`,
/// mirroring the teacher's own fixed-then-heap buffer retry pattern in
/// `Disk::expand_volume`.
fn read_drive_layout(device: &Device) -> Result<(PartitionStyle, Vec<RawPartitionEntry>), ChronosError> {
    const MAX_PARTITIONS: usize = 128;

    #[repr(C)]
    struct LayoutBuffer {
        info: winioctl::DRIVE_LAYOUT_INFORMATION_EX,
        partitions: [winioctl::PARTITION_INFORMATION_EX; MAX_PARTITIONS],
    }

    let mut buffer: LayoutBuffer = unsafe { std::mem::zeroed() };
    device
        .control_code(winioctl::IOCTL_DISK_GET_DRIVE_LAYOUT_EX, None::<&()>, &mut buffer)
        .map_err(ChronosError::from)?;

    let style = match buffer.info.PartitionStyle {
        GPT_SIGNATURE => PartitionStyle::Gpt,
        MBR_SIGNATURE => PartitionStyle::Mbr,
        _ => PartitionStyle::Unknown,
    };

    let count = buffer.info.PartitionCount as usize;
    let mut entries = Vec::with_capacity(count);

    for i in 0..count.min(MAX_PARTITIONS) {
        let entry = &buffer.partitions[i];
        if entry.PartitionNumber == 0 {
            // Placeholder/unused slot the layout leaves to pad MBR tables.
            continue;
        }

        let (gpt_type_guid, mbr_boot_indicator) = if style == PartitionStyle::Gpt {
            (Some(guid_to_string(unsafe { &entry.u.Gpt().PartitionType })), false)
        } else {
            (None, unsafe { entry.u.Mbr().BootIndicator } != 0)
        };

        entries.push(RawPartitionEntry {
            partition_number: entry.PartitionNumber,
            offset: unsafe { *entry.StartingOffset.QuadPart() } as u64,
            size: unsafe { *entry.PartitionLength.QuadPart() } as u64,
            gpt_type_guid,
            mbr_boot_indicator,
        });
    }

    Ok((style, entries))
}

fn guid_to_string(guid: &winapi::shared::guiddef::GUID) -> String {
    format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        guid.Data1,
        guid.Data2,
        guid.Data3,
        guid.Data4[0],
        guid.Data4[1],
        guid.Data4[2],
        guid.Data4[3],
        guid.Data4[4],
        guid.Data4[5],
        guid.Data4[6],
        guid.Data4[7],
    )
}

/// Scans the gaps between (and around) existing partitions and synthesizes
/// `Partition` entries with `is_unallocated=true` for every gap `>= 10
/// MiB`, per spec §4.C. Reserves 1 MiB front and back for GPT headers.
pub fn compute_unallocated(disk_index: u32, disk_size: u64, partitions: &[Partition]) -> Vec<Partition> {
    if disk_size <= 2 * FRONT_BACK_RESERVE_BYTES {
        return Vec::new();
    }

    let mut sorted: Vec<&Partition> = partitions.iter().filter(|p| !p.is_unallocated).collect();
    sorted.sort_by_key(|p| p.offset_bytes);

    let scan_end = disk_size - FRONT_BACK_RESERVE_BYTES;
    let mut cursor = FRONT_BACK_RESERVE_BYTES;
    let mut gaps = Vec::new();
    let mut next_number = UNALLOCATED_PARTITION_NUMBER_BASE;

    for partition in sorted {
        if partition.offset_bytes > cursor {
            push_gap_if_large_enough(disk_index, cursor, partition.offset_bytes, &mut gaps, &mut next_number);
        }
        cursor = cursor.max(partition.end_offset());
    }

    if cursor < scan_end {
        push_gap_if_large_enough(disk_index, cursor, scan_end, &mut gaps, &mut next_number);
    }

    gaps
}

fn push_gap_if_large_enough(
    disk_index: u32,
    start: u64,
    end: u64,
    gaps: &mut Vec<Partition>,
    next_number: &mut u32,
) {
    if end <= start || end - start < MIN_GAP_BYTES {
        return;
    }

    gaps.push(Partition {
        disk_index,
        partition_number: *next_number,
        offset_bytes: start,
        size_bytes: end - start,
        volume_path: None,
        drive_letter: None,
        volume_label: None,
        filesystem: None,
        partition_type_label: None,
        gpt_type_guid: None,
        used_bytes: None,
        free_bytes: None,
        is_unallocated: true,
        mbr_boot_indicator: false,
    });
    *next_number += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(offset: u64, size: u64) -> Partition {
        Partition {
            disk_index: 0,
            partition_number: 1,
            offset_bytes: offset,
            size_bytes: size,
            volume_path: None,
            drive_letter: None,
            volume_label: None,
            filesystem: None,
            partition_type_label: None,
            gpt_type_guid: None,
            used_bytes: None,
            free_bytes: None,
            is_unallocated: false,
            mbr_boot_indicator: false,
        }
    }

    #[test]
    fn zero_partitions_yields_one_full_gap() {
        let disk_size = 1024 * 1024 * 1024u64;
        let gaps = compute_unallocated(0, disk_size, &[]);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].offset_bytes, FRONT_BACK_RESERVE_BYTES);
        assert_eq!(gaps[0].end_offset(), disk_size - FRONT_BACK_RESERVE_BYTES);
    }

    #[test]
    fn gaps_smaller_than_threshold_are_ignored() {
        let disk_size = 200 * 1024 * 1024u64;
        let partitions = vec![partition(FRONT_BACK_RESERVE_BYTES, 190 * 1024 * 1024)];
        let gaps = compute_unallocated(0, disk_size, &partitions);
        assert!(gaps.is_empty());
    }

    #[test]
    fn scenario_mbr_two_partitions() {
        let disk_size = 1024 * 1024 * 1024u64;
        let partitions = vec![
            partition(1_048_576, 100 * 1024 * 1024),
            partition(105_906_176, 900 * 1024 * 1024),
        ];
        let gaps = compute_unallocated(0, disk_size, &partitions);
        let end_of_second = 105_906_176 + 900 * 1024 * 1024;
        let remaining = (disk_size - FRONT_BACK_RESERVE_BYTES).saturating_sub(end_of_second);
        if remaining >= MIN_GAP_BYTES {
            assert_eq!(gaps.len(), 1);
            assert_eq!(gaps[0].offset_bytes, end_of_second);
        } else {
            assert!(gaps.is_empty());
        }
    }

    #[test]
    fn unallocated_numbers_start_at_reserved_base() {
        let disk_size = 1024 * 1024 * 1024u64;
        let gaps = compute_unallocated(0, disk_size, &[]);
        assert!(gaps[0].partition_number >= UNALLOCATED_PARTITION_NUMBER_BASE);
    }

    #[test]
    fn gpt_guid_to_label_only_recognizes_known_guids() {
        assert_eq!(gpt_guid_to_label(GPT_GUID_ESP), Some("EFI".to_string()));
        assert_eq!(gpt_guid_to_label(GPT_GUID_MSR), Some("MSR".to_string()));
        assert_eq!(gpt_guid_to_label(GPT_GUID_BASIC_DATA), Some("Primary".to_string()));
        assert_eq!(gpt_guid_to_label(GPT_GUID_RECOVERY), Some("Recovery".to_string()));
        assert_eq!(gpt_guid_to_label("00000000-0000-0000-0000-000000000000"), None);
    }

    #[test]
    fn heuristic_labels_small_bootable_mbr_partition_as_recovery() {
        let mut p = partition(1_048_576, 450 * 1024 * 1024);
        p.mbr_boot_indicator = true;
        let mut partitions = vec![p];
        apply_heuristic_partition_labels(&mut partitions);
        assert_eq!(partitions[0].partition_type_label.as_deref(), Some("Recovery"));
    }

    #[test]
    fn heuristic_does_not_override_an_already_labeled_partition() {
        let mut p = partition(1_048_576, 450 * 1024 * 1024);
        p.mbr_boot_indicator = true;
        p.partition_type_label = Some("Primary".to_string());
        let mut partitions = vec![p];
        apply_heuristic_partition_labels(&mut partitions);
        assert_eq!(partitions[0].partition_type_label.as_deref(), Some("Primary"));
    }

    #[test]
    fn heuristic_skips_large_or_non_bootable_partitions() {
        let mut large = partition(1_048_576, 2 * 1024 * 1024 * 1024);
        large.mbr_boot_indicator = true;
        let small_not_bootable = partition(1_048_576, 450 * 1024 * 1024);
        let mut partitions = vec![large, small_not_bootable];
        apply_heuristic_partition_labels(&mut partitions);
        assert!(partitions.iter().all(|p| p.partition_type_label.is_none()));
    }

    #[test]
    fn extract_device_id_parses_wmi_reference_strings() {
        let path = r#"\\HOST\root\cimv2:Win32_DiskPartition.DeviceID="Disk #0, Partition #0""#;
        assert_eq!(extract_device_id(path).as_deref(), Some("Disk #0, Partition #0"));
        assert_eq!(extract_device_id("garbage"), None);
    }
}
