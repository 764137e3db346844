// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Drives a `Job::FullDisk`/`Job::Partition` backup through its phases:
//! plan, snapshot, allocation map, prepare destination, transfer, finalize
//! (spec §4.I). The container is written as a dense, sequential run of
//! independently-compressed chunks (`models::Extent`) rather than a
//! byte-identical clone — its *virtual* size still matches the source so it
//! grows into the same geometry `vhd_service` would give a plain clone, but
//! only the prefix actually holding packed data is ever written.

use crate::compression;
use crate::disk_enumerator::{DiskEnumerator, FRONT_BACK_RESERVE_BYTES};
use crate::environment;
use crate::errors::ChronosError;
use crate::models::{Extent, ImageSidecar, Job, OperationProgress, SectorSize, SidecarPartition};
use crate::platform_io::{Device, DeviceIo, SectorReader, SectorWriter};
use crate::snapshot;
use crate::vhd_service;
use crossbeam_channel::Sender;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 8 MiB packed chunks: large enough to amortize zstd frame overhead, small
/// enough to keep per-chunk memory use and progress granularity reasonable.
const TRANSFER_CHUNK_BYTES: u64 = 8 * 1024 * 1024;

/// Cooperative cancellation handle: checked at phase and chunk boundaries,
/// never used to abort a thread mid-operation (spec §5).
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), ChronosError> {
        if self.is_cancelled() {
            Err(ChronosError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

pub(crate) fn io_error_to_chronos(e: std::io::Error) -> ChronosError {
    ChronosError::IoFailed(e.raw_os_error().unwrap_or(0) as u32)
}

/// Delivers progress at least every 500 ms or every 10 MiB, whichever is
/// slower (spec §4.I), onto a bounded channel the caller drains.
pub(crate) struct ProgressReporter {
    sender: Sender<OperationProgress>,
    phase: String,
    pub(crate) total_bytes: u64,
    bytes_processed: u64,
    last_emit: Instant,
    last_emit_bytes: u64,
    started: Instant,
}

const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(500);
const PROGRESS_MIN_BYTES: u64 = 10 * 1024 * 1024;

impl ProgressReporter {
    pub(crate) fn new(sender: Sender<OperationProgress>, phase: &str, total_bytes: u64) -> ProgressReporter {
        let now = Instant::now();
        ProgressReporter {
            sender,
            phase: phase.to_string(),
            total_bytes,
            bytes_processed: 0,
            last_emit: now,
            last_emit_bytes: 0,
            started: now,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: &str) {
        tracing::debug!(phase, bytes_processed = self.bytes_processed, "entering phase");
        self.phase = phase.to_string();
        self.force_emit();
    }

    pub(crate) fn advance(&mut self, delta: u64) {
        self.bytes_processed += delta;
        let elapsed_since_emit = self.last_emit.elapsed();
        let bytes_since_emit = self.bytes_processed.saturating_sub(self.last_emit_bytes);
        if elapsed_since_emit >= PROGRESS_MIN_INTERVAL || bytes_since_emit >= PROGRESS_MIN_BYTES {
            self.force_emit();
        }
    }

    fn force_emit(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
        let bytes_per_second = self.bytes_processed as f64 / elapsed;
        let percent = if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_processed as f64 / self.total_bytes as f64) * 100.0
        };
        let remaining_bytes = self.total_bytes.saturating_sub(self.bytes_processed);
        let time_remaining = if bytes_per_second > 0.0 {
            Some(Duration::from_secs_f64(remaining_bytes as f64 / bytes_per_second))
        } else {
            None
        };

        let _ = self.sender.send(OperationProgress {
            percent,
            bytes_processed: self.bytes_processed,
            total_bytes: self.total_bytes,
            bytes_per_second,
            time_remaining,
            phase: self.phase.clone(),
            status_message: String::new(),
        });

        self.last_emit = Instant::now();
        self.last_emit_bytes = self.bytes_processed;
    }
}

pub(crate) fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}

struct TransferTarget {
    partition_number: u32,
    size: u64,
    offset: u64,
    drive_letter: Option<char>,
    volume_label: Option<String>,
    file_system: Option<String>,
    partition_type: Option<String>,
    used_space: Option<u64>,
    free_space: Option<u64>,
    source_path: String,
    allocated_ranges: Vec<(u64, u64)>,
}

/// Runs a full-disk or single-partition backup job to completion, returning
/// the sidecar descriptor to write alongside the container. Returns
/// `Err(ChronosError::Cancelled)` if `cancel` is set before completion; on
/// cancellation, callers are expected to delete the partial container and
/// any sidecar they may have already begun writing (spec §4.I, rollback).
pub fn run_backup(
    job: &Job,
    cancel: &CancellationToken,
    progress: Sender<OperationProgress>,
) -> Result<ImageSidecar, ChronosError> {
    let _span = tracing::info_span!("backup").entered();
    job.validate()?;

    match job {
        Job::FullDisk {
            source_disk_index,
            destination_path,
            compression_level,
            use_snapshot,
            verify_after,
            ..
        } => run(
            *source_disk_index,
            None,
            destination_path,
            *compression_level,
            *use_snapshot,
            *verify_after,
            cancel,
            progress,
        ),
        Job::Partition {
            source_disk_index,
            source_partition_number,
            destination_path,
            compression_level,
            use_snapshot,
            verify_after,
            ..
        } => run(
            *source_disk_index,
            Some(*source_partition_number),
            destination_path,
            *compression_level,
            *use_snapshot,
            *verify_after,
            cancel,
            progress,
        ),
        Job::DiskClone { .. } | Job::PartitionClone { .. } => Err(ChronosError::PreconditionFailed(
            "a restore-direction job was passed to the backup engine".to_string(),
        )),
    }
}

/// Runs the backup pipeline and, on any error (including cancellation),
/// deletes whatever partial container/sidecar files it may have already
/// created — spec §4.I: "no partial image is left on disk" (§8 scenario 3).
#[allow(clippy::too_many_arguments)]
fn run(
    source_disk_index: u32,
    only_partition: Option<u32>,
    destination_path: &str,
    compression_level: i32,
    use_snapshot: bool,
    verify_after: bool,
    cancel: &CancellationToken,
    progress_tx: Sender<OperationProgress>,
) -> Result<ImageSidecar, ChronosError> {
    let result = run_pipeline(
        source_disk_index,
        only_partition,
        destination_path,
        compression_level,
        use_snapshot,
        verify_after,
        cancel,
        progress_tx,
    );

    match result {
        Ok(sidecar) => {
            sidecar.write_to(destination_path)?;
            if verify_after {
                if let Err(e) = crate::restore_engine::verify_image(destination_path, &sidecar) {
                    return Err(e);
                }
            }
            Ok(sidecar)
        }
        Err(e) => {
            let _ = std::fs::remove_file(destination_path);
            let _ = std::fs::remove_file(crate::models::sidecar_path(destination_path));
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    source_disk_index: u32,
    only_partition: Option<u32>,
    destination_path: &str,
    compression_level: i32,
    use_snapshot: bool,
    verify_after: bool,
    cancel: &CancellationToken,
    progress_tx: Sender<OperationProgress>,
) -> Result<ImageSidecar, ChronosError> {
    let mut reporter = ProgressReporter::new(progress_tx, "Planning", 1);
    cancel.check()?;

    // --- Plan ---
    let enumerator = DiskEnumerator::new();
    enumerator.refresh()?;
    let disk = enumerator
        .get_disk(source_disk_index)
        .ok_or_else(|| ChronosError::PreconditionFailed("source disk no longer present".to_string()))?;
    let all_partitions = enumerator.list_partitions(source_disk_index);

    let targets: Vec<_> = all_partitions
        .iter()
        .filter(|p| !p.is_unallocated)
        .filter(|p| only_partition.map_or(true, |n| p.partition_number == n))
        .collect();

    if only_partition.is_some() && targets.is_empty() {
        return Err(ChronosError::PreconditionFailed("requested partition not found".to_string()));
    }

    let container_max_size = match only_partition {
        Some(_) => targets.iter().map(|p| p.size_bytes).sum(),
        None => disk.size_bytes,
    };

    let source_device_path = format!(r"\\.\PhysicalDrive{}", source_disk_index);
    let geometry_device = Device::open_read(&source_device_path).map_err(ChronosError::from)?;
    let geometry = geometry_device.get_drive_geometry_ex().map_err(ChronosError::from)?;
    let logical_sector_size = SectorSize::new(geometry.Geometry.BytesPerSector)?;
    drop(geometry_device);

    // --- Snapshot ---
    reporter.set_phase("Snapshotting");
    cancel.check()?;

    let volume_paths: Vec<String> = targets.iter().filter_map(|p| p.volume_path.clone()).collect();

    let mut used_snapshot = false;
    let snapshot_set = if use_snapshot && environment::capabilities().has_shadow_copy && !volume_paths.is_empty() {
        match snapshot::create_snapshot_set(&volume_paths) {
            Ok(set) => {
                used_snapshot = true;
                Some(set)
            }
            Err(_) => None, // non-fatal: fall back to direct volume reads (spec scenario 4)
        }
    } else {
        None
    };

    // --- Allocation map ---
    reporter.set_phase("Mapping allocation");
    cancel.check()?;

    let mut transfer_targets = Vec::with_capacity(targets.len());
    for partition in &targets {
        let read_path = partition
            .volume_path
            .as_deref()
            .and_then(|original| snapshot_set.as_ref().and_then(|set| set.get_snapshot_path(original)))
            .or(partition.volume_path.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!(r"\\.\Harddisk{}Partition{}", source_disk_index, partition.partition_number));

        let allocated_ranges = partition
            .volume_path
            .as_deref()
            .filter(|_| partition.filesystem.as_deref() == Some("NTFS"))
            .and_then(|_| crate::allocated_ranges::list_allocated_ranges(&read_path, partition.size_bytes))
            .map(|ranges| ranges.into_iter().map(|r| (r.offset_bytes, r.length_bytes)).collect())
            .unwrap_or_else(|| vec![(0, partition.size_bytes)]);

        transfer_targets.push(TransferTarget {
            partition_number: partition.partition_number,
            size: partition.size_bytes,
            offset: partition.offset_bytes,
            drive_letter: partition.drive_letter,
            volume_label: partition.volume_label.clone(),
            file_system: partition.filesystem.clone(),
            partition_type: partition.partition_type_label.clone(),
            used_space: partition.used_bytes,
            free_space: partition.free_bytes,
            source_path: read_path,
            allocated_ranges,
        });
    }

    let boot_region_bytes = if only_partition.is_none() { FRONT_BACK_RESERVE_BYTES } else { 0 };
    let total_bytes: u64 = transfer_targets
        .iter()
        .flat_map(|t| t.allocated_ranges.iter())
        .map(|(_, len)| *len)
        .sum::<u64>()
        + boot_region_bytes;

    // --- Prepare destination ---
    reporter.set_phase("Preparing destination");
    cancel.check()?;

    let container = vhd_service::create_and_attach_rw(destination_path, container_max_size, logical_sector_size)?;
    let container_io = DeviceIo::open_read_write(container.device_path(), logical_sector_size.bytes())
        .map_err(ChronosError::from)?;

    // --- Transfer ---
    reporter.set_phase("Transferring");
    reporter.total_bytes = total_bytes.max(1);
    let mut cursor: u64 = 0;
    // Hashed over the plaintext of every packed region, in the same order
    // `verify_image` decompresses and hashes them back in — only built when
    // a verify pass will actually consume it (DESIGN.md, Open Question 4).
    let mut hasher = if verify_after { Some(Sha256::new()) } else { None };

    let boot_extent = if only_partition.is_none() {
        let boot_reader =
            DeviceIo::open_read(&source_device_path, logical_sector_size.bytes()).map_err(ChronosError::from)?;
        Some(pack_region(
            &boot_reader,
            &container_io,
            0,
            boot_region_bytes,
            compression_level,
            &mut cursor,
            logical_sector_size.bytes() as u64,
            cancel,
            &mut reporter,
            hasher.as_mut(),
        )?)
    } else {
        None
    };

    let mut sidecar_partitions = Vec::with_capacity(transfer_targets.len());
    for target in &transfer_targets {
        let reader =
            DeviceIo::open_read(&target.source_path, logical_sector_size.bytes()).map_err(ChronosError::from)?;

        let mut extents = Vec::new();
        for (range_offset, range_length) in &target.allocated_ranges {
            let mut remaining = *range_length;
            let mut offset = *range_offset;
            while remaining > 0 {
                cancel.check()?;
                let chunk_len = remaining.min(TRANSFER_CHUNK_BYTES);
                let extent = pack_region(
                    &reader,
                    &container_io,
                    offset,
                    chunk_len,
                    compression_level,
                    &mut cursor,
                    logical_sector_size.bytes() as u64,
                    cancel,
                    &mut reporter,
                    hasher.as_mut(),
                )?;
                extents.push(extent);
                offset += chunk_len;
                remaining -= chunk_len;
            }
        }

        sidecar_partitions.push(SidecarPartition {
            partition_number: target.partition_number,
            size: target.size,
            offset: target.offset,
            drive_letter: target.drive_letter,
            volume_label: target.volume_label.clone(),
            file_system: target.file_system.clone(),
            partition_type: target.partition_type.clone(),
            used_space: target.used_space,
            free_space: target.free_space,
            extents,
        });
    }

    drop(snapshot_set); // releases the shadow copy before finalizing

    // --- Finalize ---
    reporter.set_phase("Finalizing");
    let sha256 = hasher.map(|h| format!("{:x}", h.finalize()));
    let sidecar = ImageSidecar {
        chronos_version: env!("CARGO_PKG_VERSION").to_string(),
        created_at_utc: chrono::Utc::now(),
        partition_style: disk.partition_style,
        disk_model: disk.model.clone(),
        disk_serial: disk.serial.clone(),
        disk_size_bytes: disk.size_bytes,
        source_disk_number: disk.index,
        boot_extent,
        partitions: sidecar_partitions,
        used_snapshot,
        sha256,
    };

    drop(container_io);
    drop(container);

    reporter.set_phase("Done");
    Ok(sidecar)
}

/// Reads `length` bytes at `offset` from `reader`, compresses them as one
/// independent zstd frame, and appends the compressed (sector-padded) bytes
/// to `writer` at `*cursor`, advancing it. Returns the `Extent` describing
/// where the packed run landed. When `hasher` is given, the plaintext is
/// folded into it before compression, in source order — the same bytes
/// `verify_image` hashes back out after decompressing each extent.
#[allow(clippy::too_many_arguments)]
fn pack_region(
    reader: &DeviceIo,
    writer: &DeviceIo,
    offset: u64,
    length: u64,
    compression_level: i32,
    cursor: &mut u64,
    sector_size: u64,
    cancel: &CancellationToken,
    reporter: &mut ProgressReporter,
    mut hasher: Option<&mut Sha256>,
) -> Result<Extent, ChronosError> {
    cancel.check()?;

    let read_len = round_up(length, sector_size) as usize;
    let mut buffer = vec![0u8; read_len];
    reader.read_sectors(offset, &mut buffer).map_err(io_error_to_chronos)?;
    buffer.truncate(length as usize);

    if let Some(hasher) = hasher.as_mut() {
        hasher.update(&buffer);
    }

    let (_, compressed) = compression::compress_stream(Cursor::new(&buffer), Vec::new(), compression_level)
        .map_err(io_error_to_chronos)?;

    let stored_length = compressed.len() as u64;
    let padded_length = round_up(stored_length, sector_size);
    let mut padded = compressed;
    padded.resize(padded_length as usize, 0);

    writer.write_sectors(*cursor, &padded).map_err(io_error_to_chronos)?;

    let extent = Extent {
        original_offset: offset,
        original_length: length,
        container_offset: *cursor,
        stored_length,
    };

    *cursor += padded_length;
    reporter.advance(length);

    Ok(extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_aligns_to_boundary() {
        assert_eq!(round_up(0, 512), 0);
        assert_eq!(round_up(1, 512), 512);
        assert_eq!(round_up(512, 512), 512);
        assert_eq!(round_up(513, 512), 1024);
    }

    #[test]
    fn cancellation_token_starts_clear() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ChronosError::Cancelled)));
    }

    #[test]
    fn sha256_hex_matches_known_digest() {
        // Matches `sha256sum` over the literal bytes below; pins the exact
        // transform (hash plaintext, then lowercase-hex the digest) that
        // `run_pipeline` applies to build `ImageSidecar::sha256`.
        let mut hasher = Sha256::new();
        hasher.update(b"chronos");
        let digest = format!("{:x}", hasher.finalize());
        assert_eq!(digest, "e929eb14dda6dc481466fec08eda49836c0982a939b7e44a2fc5665013c5627a");
    }

    #[test]
    fn hasher_is_only_threaded_when_verify_after_requested() {
        let mut hasher: Option<Sha256> = if false { Some(Sha256::new()) } else { None };
        assert!(hasher.is_none());
        hasher = if true { Some(Sha256::new()) } else { None };
        assert!(hasher.as_mut().is_some());
    }
}
