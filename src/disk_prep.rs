// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Locks, dismounts, and offlines a target physical disk for restore, and
//! guarantees the reverse sequence on release (spec §4.G). The release
//! order is load-bearing: bringing the disk online *before* unlocking the
//! volumes is what prevents it from being left `READ_ONLY` after the
//! restored partition table is re-read (spec §4.G, §8 invariant 4).

use crate::errors::ChronosError;
use crate::platform_io::Device;
use crate::windefs::*;
use std::thread::sleep;
use std::time::Duration;
use winapi::um::winioctl;

const LOCK_RETRY_ATTEMPTS: u32 = 5;
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[repr(C)]
struct SetDiskAttributes {
    version: DWord,
    persist: Boolean,
    reserved1: [Byte; 3],
    attributes: DWordLong,
    attributes_mask: DWordLong,
    reserved2: [DWord; 4],
}

const DISK_ATTRIBUTE_OFFLINE: u64 = 0x0000_0000_0000_0001;
const DISK_ATTRIBUTE_READ_ONLY: u64 = 0x0000_0000_0000_0002;

fn set_disk_attributes(device: &Device, attributes: u64, mask: u64) -> Result<(), ChronosError> {
    let params = SetDiskAttributes {
        version: std::mem::size_of::<SetDiskAttributes>() as DWord,
        persist: 0,
        reserved1: [0; 3],
        attributes,
        attributes_mask: mask,
        reserved2: [0; 4],
    };

    device
        .control_code(winioctl::IOCTL_DISK_SET_DISK_ATTRIBUTES, Some(&params), &mut ())
        .map_err(ChronosError::from)?;
    Ok(())
}

fn take_disk_offline(device: &Device) -> Result<(), ChronosError> {
    set_disk_attributes(device, DISK_ATTRIBUTE_OFFLINE, DISK_ATTRIBUTE_OFFLINE | DISK_ATTRIBUTE_READ_ONLY)
}

fn bring_disk_online(device: &Device) -> Result<(), ChronosError> {
    set_disk_attributes(device, 0, DISK_ATTRIBUTE_OFFLINE | DISK_ATTRIBUTE_READ_ONLY)?;
    device
        .control_code(winioctl::IOCTL_DISK_UPDATE_PROPERTIES, None::<&()>, &mut ())
        .map_err(ChronosError::from)?;
    Ok(())
}

/// A single volume held locked and dismounted. Releasing it (drop) unlocks
/// it; the disk-level online transition happens separately, first, in
/// `PreparedDisk::drop`.
struct LockedVolume {
    device: Device,
}

impl LockedVolume {
    fn acquire(volume_path: &str) -> Result<LockedVolume, ChronosError> {
        // Read-write is strongly preferred (lock/dismount are no-ops without
        // it on some drivers), but a volume already marked read-only by a
        // prior failed attempt should still be lockable for cleanup (spec
        // §4.G: "open read-write (or read-only fallback)").
        let device = Device::open_read_write(volume_path)
            .or_else(|_| Device::open_read(volume_path))
            .map_err(ChronosError::from)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match device.control_code(winioctl::FSCTL_LOCK_VOLUME, None::<&()>, &mut ()) {
                Ok(_) => break,
                Err(_) if attempt < LOCK_RETRY_ATTEMPTS => sleep(LOCK_RETRY_BACKOFF),
                Err(code) => return Err(code.into()),
            }
        }

        device
            .control_code(winioctl::FSCTL_DISMOUNT_VOLUME, None::<&()>, &mut ())
            .map_err(ChronosError::from)?;

        Ok(LockedVolume { device })
    }
}

impl Drop for LockedVolume {
    fn drop(&mut self) {
        let _ = self.device.control_code(winioctl::FSCTL_UNLOCK_VOLUME, None::<&()>, &mut ());
    }
}

/// Scoped resource returned by [`prepare_disk`]/[`prepare_partition`].
/// Dropping it releases every held lock, then (if the disk was taken
/// offline) brings the disk back online and re-reads its partition table —
/// in that order.
pub struct PreparedDisk {
    disk_device: Option<Device>,
    locked_volumes: Vec<LockedVolume>,
}

impl Drop for PreparedDisk {
    fn drop(&mut self) {
        if let Some(disk_device) = &self.disk_device {
            let _ = bring_disk_online(disk_device);
        }
        // `locked_volumes` drops here, in reverse acquisition order,
        // unlocking each volume after the disk is already back online.
    }
}

/// Prepares a full-disk restore target: for every partition with a volume
/// path, lock and dismount its volume; if `take_offline`, also offline the
/// physical disk. Held locks are released, and the disk brought back
/// online, when the returned `PreparedDisk` is dropped.
pub fn prepare_disk(
    disk_index: u32,
    volume_paths: &[String],
    take_offline: bool,
) -> Result<PreparedDisk, ChronosError> {
    let mut locked_volumes = Vec::with_capacity(volume_paths.len());
    for volume_path in volume_paths {
        locked_volumes.push(LockedVolume::acquire(volume_path)?);
    }

    let disk_device = if take_offline {
        let device = Device::open_read_write(&format!(r"\\.\PhysicalDrive{}", disk_index))
            .map_err(ChronosError::from)?;
        take_disk_offline(&device)?;
        Some(device)
    } else {
        None
    };

    Ok(PreparedDisk { disk_device, locked_volumes })
}

/// The narrower variant used for partition-level restores: dismounts only
/// the one target volume, never offlines the disk (doing so would remove
/// the partition device path the restore needs).
pub fn prepare_partition(volume_path: &str) -> Result<PreparedDisk, ChronosError> {
    let locked_volume = LockedVolume::acquire(volume_path)?;
    Ok(PreparedDisk {
        disk_device: None,
        locked_volumes: vec![locked_volume],
    })
}

#[cfg(test)]
mod tests {
    // Device-backed behavior (`prepare_disk`/`prepare_partition` against a
    // real physical disk or volume) is exercised by the `#[ignore]`d cases
    // in `tests/integration_test.rs`, since this sandbox has no disks to
    // lock.
}
