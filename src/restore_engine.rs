// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Reverses the backup pipeline: attach the image read-only, resolve the
//! target (full disk, or unallocated space on a target disk), prepare the
//! target (§4.G), decompress each packed extent on the fly, and write it
//! back at its original offset (spec §4.J). Also implements the standalone
//! verify operation backup's `verify_after` and restore's `verify_during`
//! both build on.
//!
//! Extent offsets are recorded relative to their owning partition (backup
//! reads from the partition/volume device, not the whole disk), so a
//! full-disk restore re-bases each partition's extents onto
//! `sidecar_partition.offset + extent.original_offset`; a restore into
//! unallocated space writes directly against the new partition's own
//! device path, where extent offsets are already partition-relative.

use crate::backup_engine::{io_error_to_chronos, round_up, CancellationToken, ProgressReporter};
use crate::compression;
use crate::disk_enumerator::DiskEnumerator;
use crate::disk_prep;
use crate::errors::ChronosError;
use crate::models::{Extent, ImageSidecar, Job, OperationProgress, SidecarPartition};
use crate::platform_io::{Device, DeviceIo, SectorReader, SectorWriter};
use crate::vhd_service;
use crate::windefs::Guid;
use crossbeam_channel::Sender;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use winapi::um::winioctl;

const GPT_GUID_BASIC_DATA: &str = "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7";
/// `PARTITION_IFS`: the legacy MBR partition-type byte Windows uses for an
/// NTFS-formatted partition.
const MBR_PARTITION_TYPE_IFS: u8 = 0x07;

/// Runs a `Job::DiskClone`/`Job::PartitionClone` restore to completion.
/// Rejects backup-direction jobs, matching `backup_engine::run_backup`'s
/// reciprocal rejection of restore-direction jobs.
pub fn run_restore(
    job: &Job,
    cancel: &CancellationToken,
    progress: Sender<OperationProgress>,
) -> Result<(), ChronosError> {
    let _span = tracing::info_span!("restore").entered();
    job.validate()?;

    match job {
        Job::DiskClone {
            source_image_path,
            target_disk_index,
            verify_during,
            force_overwrite,
        } => restore_full_disk(source_image_path, *target_disk_index, *verify_during, *force_overwrite, cancel, progress),
        Job::PartitionClone {
            source_image_path,
            source_partition_number,
            target_disk_index,
            target_unallocated_offset,
            target_unallocated_size,
            verify_during,
            force_overwrite,
        } => restore_partition_into_unallocated(
            source_image_path,
            *source_partition_number,
            *target_disk_index,
            *target_unallocated_offset,
            *target_unallocated_size,
            *verify_during,
            *force_overwrite,
            cancel,
            progress,
        ),
        Job::FullDisk { .. } | Job::Partition { .. } => Err(ChronosError::PreconditionFailed(
            "a backup-direction job was passed to the restore engine".to_string(),
        )),
    }
}

fn open_source(source_image_path: &str) -> Result<(vhd_service::AttachedContainer, DeviceIo, ImageSidecar), ChronosError> {
    let sidecar = ImageSidecar::read_from(source_image_path)?;
    let container = vhd_service::attach_read_only(source_image_path)?;

    let geometry_device = Device::open_read(container.device_path()).map_err(ChronosError::from)?;
    let sector_size = geometry_device.get_drive_geometry_ex().map_err(ChronosError::from)?.Geometry.BytesPerSector;
    drop(geometry_device);

    let reader = DeviceIo::open_read(container.device_path(), sector_size).map_err(ChronosError::from)?;
    Ok((container, reader, sidecar))
}

#[allow(clippy::too_many_arguments)]
fn restore_full_disk(
    source_image_path: &str,
    target_disk_index: u32,
    verify_during: bool,
    force_overwrite: bool,
    cancel: &CancellationToken,
    progress_tx: Sender<OperationProgress>,
) -> Result<(), ChronosError> {
    let mut reporter = ProgressReporter::new(progress_tx, "Planning", 1);
    cancel.check()?;

    let (container, reader, sidecar) = open_source(source_image_path)?;

    let enumerator = DiskEnumerator::new();
    enumerator.refresh()?;
    let target_disk = enumerator
        .get_disk(target_disk_index)
        .ok_or_else(|| ChronosError::PreconditionFailed("target disk no longer present".to_string()))?;

    if target_disk.size_bytes < sidecar.disk_size_bytes && !force_overwrite {
        return Err(ChronosError::PreconditionFailed(
            "target disk is smaller than the source disk".to_string(),
        ));
    }

    reporter.set_phase("Preparing target");
    cancel.check()?;
    let volume_paths: Vec<String> = enumerator
        .list_partitions(target_disk_index)
        .into_iter()
        .filter(|p| !p.is_unallocated)
        .filter_map(|p| p.volume_path)
        .collect();
    let prepared = disk_prep::prepare_disk(target_disk_index, &volume_paths, true)?;

    let target_path = format!(r"\\.\PhysicalDrive{}", target_disk_index);
    let writer = DeviceIo::open_read_write(&target_path, reader.logical_sector_size()).map_err(ChronosError::from)?;

    reporter.set_phase("Transferring");
    let total_bytes: u64 = sidecar
        .boot_extent
        .iter()
        .map(|e| e.original_length)
        .chain(sidecar.partitions.iter().flat_map(|p| p.extents.iter().map(|e| e.original_length)))
        .sum();
    reporter.total_bytes = total_bytes.max(1);

    if let Some(boot) = &sidecar.boot_extent {
        cancel.check()?;
        restore_extent(&reader, &writer, boot, boot.original_offset, verify_during, &mut reporter)?;
    }

    for partition in &sidecar.partitions {
        for extent in &partition.extents {
            cancel.check()?;
            let absolute_offset = partition.offset + extent.original_offset;
            restore_extent(&reader, &writer, extent, absolute_offset, verify_during, &mut reporter)?;
        }
    }

    drop(writer);
    drop(prepared); // brings the disk back online, then unlocks volumes
    drop(container); // detaches the source container

    reporter.set_phase("Done");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn restore_partition_into_unallocated(
    source_image_path: &str,
    source_partition_number: Option<u32>,
    target_disk_index: u32,
    target_unallocated_offset: u64,
    target_unallocated_size: u64,
    verify_during: bool,
    _force_overwrite: bool,
    cancel: &CancellationToken,
    progress_tx: Sender<OperationProgress>,
) -> Result<(), ChronosError> {
    let mut reporter = ProgressReporter::new(progress_tx, "Planning", 1);
    cancel.check()?;

    let (container, reader, sidecar) = open_source(source_image_path)?;

    let source_partition = select_source_partition(&sidecar, source_partition_number)?;
    let restore_size = source_partition.size.min(target_unallocated_size);

    reporter.set_phase("Preparing target");
    cancel.check()?;
    let enumerator = DiskEnumerator::new();
    enumerator.refresh()?;
    enumerator
        .get_disk(target_disk_index)
        .ok_or_else(|| ChronosError::PreconditionFailed("target disk no longer present".to_string()))?;

    let new_partition_number = write_new_partition_entry(target_disk_index, target_unallocated_offset, restore_size)?;
    let target_path = format!(r"\\.\Harddisk{}Partition{}", target_disk_index, new_partition_number);

    let prepared = disk_prep::prepare_partition(&target_path)?;
    let writer = DeviceIo::open_read_write(&target_path, reader.logical_sector_size()).map_err(ChronosError::from)?;

    reporter.set_phase("Transferring");
    let total_bytes: u64 = source_partition
        .extents
        .iter()
        .filter(|e| e.original_offset < restore_size)
        .map(|e| e.original_length.min(restore_size - e.original_offset))
        .sum();
    reporter.total_bytes = total_bytes.max(1);

    for extent in &source_partition.extents {
        cancel.check()?;
        if extent.original_offset >= restore_size {
            continue; // only `restore_size` bytes of the source partition fit (spec §8 scenario 5)
        }
        restore_extent(&reader, &writer, extent, extent.original_offset, verify_during, &mut reporter)?;
    }

    drop(writer);
    drop(prepared);
    drop(container);

    reporter.set_phase("Done");
    Ok(())
}

fn select_source_partition(
    sidecar: &ImageSidecar,
    source_partition_number: Option<u32>,
) -> Result<&SidecarPartition, ChronosError> {
    match source_partition_number {
        Some(number) => sidecar
            .partitions
            .iter()
            .find(|p| p.partition_number == number)
            .ok_or_else(|| ChronosError::PreconditionFailed("source partition not found in image".to_string())),
        None if sidecar.partitions.len() == 1 => Ok(&sidecar.partitions[0]),
        None => Err(ChronosError::PreconditionFailed(
            "image holds more than one partition; source_partition_number is required".to_string(),
        )),
    }
}

/// Reads one packed run, decompresses it, and writes it at `target_offset`
/// into `writer`; when `verify_during`, immediately reads the same region
/// back and compares.
fn restore_extent(
    reader: &DeviceIo,
    writer: &DeviceIo,
    extent: &Extent,
    target_offset: u64,
    verify_during: bool,
    reporter: &mut ProgressReporter,
) -> Result<(), ChronosError> {
    let sector_size = writer.logical_sector_size() as u64;
    let decompressed = decompress_extent(reader, extent, sector_size)?;

    let mut padded = decompressed.clone();
    let padded_len = round_up(padded.len() as u64, sector_size) as usize;
    padded.resize(padded_len, 0);

    writer.write_sectors(target_offset, &padded).map_err(io_error_to_chronos)?;

    if verify_during {
        let mut read_back = vec![0u8; padded_len];
        writer.read_sectors(target_offset, &mut read_back).map_err(io_error_to_chronos)?;
        if read_back[..decompressed.len()] != decompressed[..] {
            return Err(ChronosError::SectorMismatch { offset: target_offset });
        }
    }

    reporter.advance(extent.original_length);
    Ok(())
}

fn decompress_extent(reader: &DeviceIo, extent: &Extent, sector_size: u64) -> Result<Vec<u8>, ChronosError> {
    let padded_len = round_up(extent.stored_length, sector_size) as usize;
    let mut compressed = vec![0u8; padded_len];
    reader.read_sectors(extent.container_offset, &mut compressed).map_err(io_error_to_chronos)?;
    compressed.truncate(extent.stored_length as usize);

    let mut decompressed = Vec::with_capacity(extent.original_length as usize);
    compression::decompress_stream(Cursor::new(&compressed), &mut decompressed)
        .map_err(|_| ChronosError::VerifyFailed { offset: extent.original_offset })?;

    if decompressed.len() as u64 != extent.original_length {
        return Err(ChronosError::ImageCorrupt);
    }

    Ok(decompressed)
}

/// Standalone verify (spec §4.J): reads the sidecar off disk, attaches the
/// image, and re-hashes every extent, comparing against the sidecar's
/// optional `sha256` when one was recorded. Always exercises the "lossless
/// decompression" leg of the check even when no hash was recorded.
pub fn verify(image_path: &str) -> Result<(), ChronosError> {
    let sidecar = ImageSidecar::read_from(image_path)?;
    verify_image(image_path, &sidecar)
}

/// Same as [`verify`] but takes an already-built `ImageSidecar`, so the
/// backup engine's `verify_after` step can check freshly produced sidecar
/// data without a disk round trip.
pub fn verify_image(image_path: &str, sidecar: &ImageSidecar) -> Result<(), ChronosError> {
    let _span = tracing::info_span!("verify", image_path).entered();
    let container = vhd_service::attach_read_only(image_path)?;
    let geometry_device = Device::open_read(container.device_path()).map_err(ChronosError::from)?;
    let sector_size = geometry_device.get_drive_geometry_ex().map_err(ChronosError::from)?.Geometry.BytesPerSector;
    drop(geometry_device);

    let reader = DeviceIo::open_read(container.device_path(), sector_size).map_err(ChronosError::from)?;
    let mut hasher = Sha256::new();

    if let Some(boot) = &sidecar.boot_extent {
        let bytes = decompress_extent(&reader, boot, sector_size as u64)?;
        hasher.update(&bytes);
    }

    for partition in &sidecar.partitions {
        for extent in &partition.extents {
            let bytes = decompress_extent(&reader, extent, sector_size as u64)?;
            hasher.update(&bytes);
        }
    }

    if let Some(expected) = &sidecar.sha256 {
        let actual = format!("{:x}", hasher.finalize());
        if &actual != expected {
            return Err(ChronosError::VerifyFailed { offset: 0 });
        }
    }

    Ok(())
}

/// Writes a new partition-table entry at `offset` of length `size` into
/// `disk_index`'s drive layout, GPT or MBR, and returns its assigned
/// partition number. Used by [`restore_partition_into_unallocated`] to turn
/// an unallocated gap (spec scenario 5) into a concrete target the restore
/// can write sectors into.
fn write_new_partition_entry(disk_index: u32, offset: u64, size: u64) -> Result<u32, ChronosError> {
    const MAX_PARTITIONS: usize = 128;

    #[repr(C)]
    struct LayoutBuffer {
        info: winioctl::DRIVE_LAYOUT_INFORMATION_EX,
        partitions: [winioctl::PARTITION_INFORMATION_EX; MAX_PARTITIONS],
    }

    let path = format!(r"\\.\PhysicalDrive{}", disk_index);
    let device = Device::open_read_write(&path).map_err(ChronosError::from)?;

    let mut buffer: LayoutBuffer = unsafe { std::mem::zeroed() };
    device
        .control_code(winioctl::IOCTL_DISK_GET_DRIVE_LAYOUT_EX, None::<&()>, &mut buffer)
        .map_err(ChronosError::from)?;

    let count = buffer.info.PartitionCount as usize;
    if count >= MAX_PARTITIONS {
        return Err(ChronosError::PreconditionFailed("partition table has no free entries".to_string()));
    }

    let used_numbers: Vec<u32> = (0..count).map(|i| buffer.partitions[i].PartitionNumber).collect();
    let new_partition_number = (1u32..=MAX_PARTITIONS as u32)
        .find(|n| !used_numbers.contains(n))
        .ok_or_else(|| ChronosError::PreconditionFailed("no free partition number".to_string()))?;

    {
        let slot = &mut buffer.partitions[count];
        slot.PartitionStyle = buffer.info.PartitionStyle;
        unsafe {
            *slot.StartingOffset.QuadPart_mut() = offset as i64;
            *slot.PartitionLength.QuadPart_mut() = size as i64;
        }
        slot.PartitionNumber = new_partition_number;
        slot.RewritePartition = 1;

        match buffer.info.PartitionStyle {
            winioctl::PARTITION_STYLE_GPT => unsafe {
                let gpt = slot.u.Gpt_mut();
                gpt.PartitionType = parse_guid(GPT_GUID_BASIC_DATA);
                gpt.PartitionId = fresh_guid();
                gpt.Attributes = 0;
                gpt.Name = [0u16; 36];
            },
            winioctl::PARTITION_STYLE_MBR => unsafe {
                let mbr = slot.u.Mbr_mut();
                mbr.PartitionType = MBR_PARTITION_TYPE_IFS;
                mbr.BootIndicator = 0;
                mbr.RecognizedPartition = 1;
                mbr.HiddenSectors = 0;
            },
            _ => return Err(ChronosError::PreconditionFailed("target disk has no recognized partition style".to_string())),
        }
    }

    buffer.info.PartitionCount = (count + 1) as u32;

    device
        .control_code(winioctl::IOCTL_DISK_SET_DRIVE_LAYOUT_EX, Some(&buffer), &mut ())
        .map_err(ChronosError::from)?;
    device
        .control_code(winioctl::IOCTL_DISK_UPDATE_PROPERTIES, None::<&()>, &mut ())
        .map_err(ChronosError::from)?;

    Ok(new_partition_number)
}

fn parse_guid(value: &str) -> Guid {
    let cleaned: String = value.chars().filter(|c| *c != '-').collect();
    let bytes = (0..cleaned.len() / 2)
        .map(|i| u8::from_str_radix(&cleaned[i * 2..i * 2 + 2], 16).unwrap_or(0))
        .collect::<Vec<u8>>();

    Guid {
        Data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        Data2: u16::from_be_bytes([bytes[4], bytes[5]]),
        Data3: u16::from_be_bytes([bytes[6], bytes[7]]),
        Data4: [bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]],
    }
}

fn fresh_guid() -> Guid {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    Guid {
        Data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        Data2: u16::from_be_bytes([bytes[4], bytes[5]]),
        Data3: u16::from_be_bytes([bytes[6], bytes[7]]),
        Data4: [bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartitionStyle;

    fn sidecar_with(partitions: Vec<SidecarPartition>) -> ImageSidecar {
        ImageSidecar {
            chronos_version: "0.1.0".to_string(),
            created_at_utc: chrono::Utc::now(),
            partition_style: PartitionStyle::Gpt,
            disk_model: None,
            disk_serial: None,
            disk_size_bytes: 0,
            source_disk_number: 0,
            boot_extent: None,
            partitions,
            used_snapshot: false,
            sha256: None,
        }
    }

    fn partition(number: u32) -> SidecarPartition {
        SidecarPartition {
            partition_number: number,
            size: 0,
            offset: 0,
            drive_letter: None,
            volume_label: None,
            file_system: None,
            partition_type: None,
            used_space: None,
            free_space: None,
            extents: Vec::new(),
        }
    }

    #[test]
    fn selects_the_only_partition_when_number_is_unspecified() {
        let sidecar = sidecar_with(vec![partition(1)]);
        let selected = select_source_partition(&sidecar, None).unwrap();
        assert_eq!(selected.partition_number, 1);
    }

    #[test]
    fn requires_explicit_number_when_image_holds_several_partitions() {
        let sidecar = sidecar_with(vec![partition(1), partition(2)]);
        assert!(select_source_partition(&sidecar, None).is_err());
        assert_eq!(select_source_partition(&sidecar, Some(2)).unwrap().partition_number, 2);
    }

    #[test]
    fn parses_known_gpt_guid() {
        let guid = parse_guid(GPT_GUID_BASIC_DATA);
        assert_eq!(guid.Data1, 0xEBD0_A0A2);
    }
}
