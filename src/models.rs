// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! The shared data model: disks/partitions/ranges, the job sum type, the
//! sidecar schema, and progress events. Nothing in this module performs
//! I/O; it is pure data plus the invariant-preserving constructors.

use crate::errors::ChronosError;
use serde::{Deserialize, Serialize};

/// A disk's partitioning scheme, as read from its drive layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStyle {
    #[serde(rename = "MBR")]
    Mbr,
    #[serde(rename = "GPT")]
    Gpt,
    Unknown,
}

/// Identity + geometry of an enumerated physical disk. Immutable once
/// enumerated; a fresh `refresh()` produces a new value rather than
/// mutating this one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDisk {
    pub index: u32,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
    pub size_bytes: u64,
    pub partition_style: PartitionStyle,
    pub is_system: bool,
    pub is_boot: bool,
}

/// Reserved partition numbers `>= UNALLOCATED_PARTITION_NUMBER_BASE` mark
/// synthetic "unallocated gap" entries rather than real partitions.
pub const UNALLOCATED_PARTITION_NUMBER_BASE: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub disk_index: u32,
    pub partition_number: u32,
    pub offset_bytes: u64,
    pub size_bytes: u64,
    pub volume_path: Option<String>,
    pub drive_letter: Option<char>,
    pub volume_label: Option<String>,
    pub filesystem: Option<String>,
    pub partition_type_label: Option<String>,
    pub gpt_type_guid: Option<String>,
    pub used_bytes: Option<u64>,
    pub free_bytes: Option<u64>,
    pub is_unallocated: bool,
    /// `BootIndicator` off the raw MBR layout entry; `false` for GPT
    /// partitions and synthetic unallocated gaps. Feeds the disk
    /// enumerator's tier-(iii) partition-type heuristic; not part of any
    /// serialized schema.
    pub mbr_boot_indicator: bool,
}

impl Partition {
    pub fn end_offset(&self) -> u64 {
        self.offset_bytes + self.size_bytes
    }

    pub fn overlaps(&self, other: &Partition) -> bool {
        self.offset_bytes < other.end_offset() && other.offset_bytes < self.end_offset()
    }
}

/// A sector-aligned, non-overlapping byte range reported by the
/// allocated-range provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedRange {
    pub offset_bytes: u64,
    pub length_bytes: u64,
}

impl AllocatedRange {
    pub fn end_offset(&self) -> u64 {
        self.offset_bytes + self.length_bytes
    }

    /// True when `other` starts exactly where `self` ends, so the two can
    /// be coalesced into one range without creating a gap or overlap.
    pub fn is_adjacent_to(&self, other: &AllocatedRange) -> bool {
        self.end_offset() == other.offset_bytes
    }
}

/// Sector size of a device or container. Only 512 and 4096 are valid; the
/// source crate's bug of silently hard-coding 512 is closed by making this
/// type refuse construction from anything else (DESIGN.md, Open Question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorSize(u32);

impl SectorSize {
    pub fn new(bytes: u32) -> Result<SectorSize, ChronosError> {
        match bytes {
            512 | 4096 => Ok(SectorSize(bytes)),
            _ => Err(ChronosError::InvalidJob("logical_sector_size")),
        }
    }

    pub fn bytes(self) -> u32 {
        self.0
    }
}

/// `{ path, logical_sector_size, physical_sector_size, max_size }` — the
/// core's view of a virtual-disk container file, independent of whether it
/// is currently attached.
#[derive(Debug, Clone)]
pub struct VirtualDiskContainer {
    pub path: String,
    pub logical_sector_size: SectorSize,
    pub physical_sector_size: SectorSize,
    pub max_size: u64,
}

/// The sum type replacing the inherited flag-based job configuration (spec
/// §9, Design Notes: "Tagged variants for jobs"). Each variant carries
/// exactly the fields meaningful to it.
#[derive(Debug, Clone)]
pub enum Job {
    FullDisk {
        source_disk_index: u32,
        destination_path: String,
        compression_level: i32,
        use_snapshot: bool,
        verify_after: bool,
        description: Option<String>,
    },
    Partition {
        source_disk_index: u32,
        source_partition_number: u32,
        destination_path: String,
        compression_level: i32,
        use_snapshot: bool,
        verify_after: bool,
        description: Option<String>,
    },
    DiskClone {
        source_image_path: String,
        target_disk_index: u32,
        verify_during: bool,
        force_overwrite: bool,
    },
    PartitionClone {
        source_image_path: String,
        source_partition_number: Option<u32>,
        target_disk_index: u32,
        target_unallocated_offset: u64,
        target_unallocated_size: u64,
        verify_during: bool,
        force_overwrite: bool,
    },
}

impl Job {
    /// Validates the fields every variant shares an invariant over. More
    /// specific validation (e.g. that `target_unallocated_size` actually
    /// fits in the chosen gap) happens once the disk enumerator has run,
    /// since it requires live disk state this constructor doesn't have.
    pub fn validate(&self) -> Result<(), ChronosError> {
        match self {
            Job::FullDisk { compression_level, .. } | Job::Partition { compression_level, .. } => {
                if !(compression::MIN_LEVEL..=compression::MAX_LEVEL).contains(compression_level) {
                    return Err(ChronosError::InvalidJob("compression_level"));
                }
                Ok(())
            }
            Job::DiskClone { source_image_path, .. } => {
                if source_image_path.is_empty() {
                    return Err(ChronosError::InvalidJob("source_image_path"));
                }
                Ok(())
            }
            Job::PartitionClone {
                source_image_path,
                target_unallocated_size,
                ..
            } => {
                if source_image_path.is_empty() {
                    return Err(ChronosError::InvalidJob("source_image_path"));
                }
                if *target_unallocated_size == 0 {
                    return Err(ChronosError::InvalidJob("target_unallocated_size"));
                }
                Ok(())
            }
        }
    }
}

use crate::compression;

/// One packed, compressed run written into the container: `stored_length`
/// bytes starting at `container_offset` decompress back to exactly
/// `original_length` bytes that belong at `original_offset` on the source
/// disk. The container itself is written as a dense sequence of these runs
/// starting at offset 0, regardless of where the data originated on the
/// source disk — its *virtual* size still matches the source disk/partition
/// (so it can be grown into in place by `vhd_service`), but only the prefix
/// actually holding packed data is ever written, leaving the rest of the
/// sparse container untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub original_offset: u64,
    pub original_length: u64,
    pub container_offset: u64,
    pub stored_length: u64,
}

/// One entry in the sidecar's `partitions` array (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarPartition {
    pub partition_number: u32,
    pub size: u64,
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_letter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_space: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_space: Option<u64>,
    pub extents: Vec<Extent>,
}

/// JSON descriptor written next to each container at backup time (spec §3,
/// §6). Read-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSidecar {
    pub chronos_version: String,
    pub created_at_utc: chrono::DateTime<chrono::Utc>,
    pub partition_style: PartitionStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_serial: Option<String>,
    pub disk_size_bytes: u64,
    pub source_disk_number: u32,
    /// The packed, compressed run holding the first `FRONT_BACK_RESERVE_BYTES`
    /// of the disk (partition table, boot sectors). Only ever present for a
    /// `Job::FullDisk` image; a single-partition image has no disk-level
    /// boot region to restore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_extent: Option<Extent>,
    pub partitions: Vec<SidecarPartition>,
    /// Whether a shadow copy was actually used for this backup. Not part
    /// of the minimal schema in spec §6, but load-bearing for end-to-end
    /// scenario 4 (restricted environment, no snapshot) — surfaced to
    /// restore-side diagnostics.
    pub used_snapshot: bool,
    /// Optional because the source this spec is grounded on defines the
    /// field but never actually populates it (DESIGN.md, Open Question 4).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Path of the sidecar JSON written next to a container file (spec §6):
/// `<image_path>.chronos.json`.
pub fn sidecar_path(image_path: &str) -> std::path::PathBuf {
    let mut path = std::ffi::OsString::from(image_path);
    path.push(".chronos.json");
    std::path::PathBuf::from(path)
}

impl ImageSidecar {
    pub fn write_to(&self, image_path: &str) -> Result<(), ChronosError> {
        let json = serde_json::to_vec_pretty(self).map_err(|_| ChronosError::ImageCorrupt)?;
        std::fs::write(sidecar_path(image_path), json).map_err(|e| ChronosError::IoFailed(e.raw_os_error().unwrap_or(0) as u32))
    }

    pub fn read_from(image_path: &str) -> Result<ImageSidecar, ChronosError> {
        let bytes = std::fs::read(sidecar_path(image_path))
            .map_err(|e| ChronosError::IoFailed(e.raw_os_error().unwrap_or(0) as u32))?;
        serde_json::from_slice(&bytes).map_err(|_| ChronosError::ImageCorrupt)
    }
}

/// `{ percent, bytes_processed, total_bytes, bytes_per_second,
/// time_remaining?, phase, status_message }`, streamed monotonically
/// forward (spec §3).
#[derive(Debug, Clone)]
pub struct OperationProgress {
    pub percent: f64,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
    pub time_remaining: Option<std::time::Duration>,
    pub phase: String,
    pub status_message: String,
}

impl OperationProgress {
    pub fn new(phase: &str, total_bytes: u64) -> OperationProgress {
        OperationProgress {
            percent: 0.0,
            bytes_processed: 0,
            total_bytes,
            bytes_per_second: 0.0,
            time_remaining: None,
            phase: phase.to_string(),
            status_message: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_partition(offset: u64, size: u64) -> Partition {
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
    fn disjoint_partitions_do_not_overlap() {
        let a = sample_partition(0, 100);
        let b = sample_partition(100, 200);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn overlapping_partitions_are_detected() {
        let a = sample_partition(0, 150);
        let b = sample_partition(100, 200);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn sector_size_rejects_invalid_values() {
        assert!(SectorSize::new(512).is_ok());
        assert!(SectorSize::new(4096).is_ok());
        assert!(SectorSize::new(1000).is_err());
    }

    #[test]
    fn job_validation_rejects_bad_compression_level() {
        let job = Job::FullDisk {
            source_disk_index: 0,
            destination_path: "C:\\image.vhdx".to_string(),
            compression_level: 99,
            use_snapshot: true,
            verify_after: false,
            description: None,
        };
        assert!(matches!(job.validate(), Err(ChronosError::InvalidJob("compression_level"))));
    }

    #[test]
    fn sidecar_round_trips_through_json() {
        let sidecar = ImageSidecar {
            chronos_version: "0.1.0".to_string(),
            created_at_utc: chrono::Utc::now(),
            partition_style: PartitionStyle::Gpt,
            disk_model: Some("Contoso SSD".to_string()),
            disk_serial: None,
            disk_size_bytes: 1024 * 1024 * 1024,
            source_disk_number: 0,
            boot_extent: Some(Extent {
                original_offset: 0,
                original_length: 1024 * 1024,
                container_offset: 0,
                stored_length: 4096,
            }),
            partitions: vec![SidecarPartition {
                partition_number: 1,
                size: 100 * 1024 * 1024,
                offset: 1024 * 1024,
                drive_letter: Some('C'),
                volume_label: None,
                file_system: Some("NTFS".to_string()),
                partition_type: None,
                used_space: None,
                free_space: None,
                extents: vec![Extent {
                    original_offset: 1024 * 1024,
                    original_length: 4096,
                    container_offset: 0,
                    stored_length: 512,
                }],
            }],
            used_snapshot: true,
            sha256: None,
        };

        let json = serde_json::to_string(&sidecar).unwrap();
        assert!(!json.contains("diskSerial"));
        let round_tripped: ImageSidecar = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.disk_size_bytes, sidecar.disk_size_bytes);
        assert_eq!(round_tripped.partitions.len(), 1);
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(r"D:\images\disk0.vhdx"),
            std::path::PathBuf::from(r"D:\images\disk0.vhdx.chronos.json")
        );
    }

    #[test]
    fn sidecar_write_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("chronos-sidecar-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image_path = dir.join("image.vhdx");
        let image_path_str = image_path.to_str().unwrap();

        let sidecar = ImageSidecar {
            chronos_version: "0.1.0".to_string(),
            created_at_utc: chrono::Utc::now(),
            partition_style: PartitionStyle::Mbr,
            disk_model: None,
            disk_serial: None,
            disk_size_bytes: 4096,
            source_disk_number: 0,
            boot_extent: None,
            partitions: Vec::new(),
            used_snapshot: false,
            sha256: None,
        };

        sidecar.write_to(image_path_str).unwrap();
        let read_back = ImageSidecar::read_from(image_path_str).unwrap();
        assert_eq!(read_back.disk_size_bytes, sidecar.disk_size_bytes);

        std::fs::remove_file(sidecar_path(image_path_str)).ok();
        std::fs::remove_dir_all(&dir).ok();
    }
}
