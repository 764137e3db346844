// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Thin facade over raw device I/O: open, positioned read/write, typed
//! control-code dispatch, and geometry/layout queries. Every higher layer
//! (enumerator, allocated-range provider, backup/restore engines) goes
//! through this module rather than calling `winapi` directly, so the
//! sector-alignment and error-translation rules only need to be right once.

use crate::errors::{error_code_to_result_code, ResultCode};
use crate::windefs::*;
use std::io;
use winapi::um::{fileapi, ioapiset, winioctl, winnt};

/// An open device or container handle, positioned I/O only. Closed on drop.
pub struct Device {
    handle: Handle,
}

unsafe impl Send for Device {}

impl Device {
    fn open(path: &str, access_mask: DWord, share_mode: DWord) -> Result<Device, ResultCode> {
        let wide = widestring::WideCString::from_str(path).map_err(|_| ResultCode::InvalidParameter)?;
        let handle = unsafe {
            fileapi::CreateFileW(
                wide.as_ptr(),
                access_mask,
                share_mode,
                std::ptr::null_mut(),
                fileapi::OPEN_EXISTING,
                winnt::FILE_FLAG_NO_BUFFERING | winnt::FILE_FLAG_WRITE_THROUGH,
                std::ptr::null_mut(),
            )
        };

        if handle == winapi::um::handleapi::INVALID_HANDLE_VALUE {
            return Err(error_code_to_result_code(unsafe {
                winapi::um::errhandlingapi::GetLastError()
            }));
        }

        Ok(Device { handle })
    }

    /// Opens a device path (`\\.\PhysicalDriveN`, `\\.\HarddiskNPartitionM`,
    /// a volume GUID path, or a drive letter) for exclusive read access.
    pub fn open_read(path: &str) -> Result<Device, ResultCode> {
        Device::open(path, winnt::GENERIC_READ, winnt::FILE_SHARE_READ | winnt::FILE_SHARE_WRITE)
    }

    /// Opens a device path for read-write access. Callers are responsible
    /// for having already locked/dismounted the target via `disk_prep`.
    pub fn open_read_write(path: &str) -> Result<Device, ResultCode> {
        Device::open(
            path,
            winnt::GENERIC_READ | winnt::GENERIC_WRITE,
            winnt::FILE_SHARE_READ | winnt::FILE_SHARE_WRITE,
        )
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`. Both `offset`
    /// and `buf.len()` must be multiples of the device's logical sector
    /// size; violating this returns an OS-level invalid-parameter error on
    /// most drivers, so callers are expected to align.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, ResultCode> {
        let mut overlapped: winapi::um::minwinbase::OVERLAPPED = unsafe { std::mem::zeroed() };
        overlapped.u.s_mut().Offset = (offset & 0xFFFF_FFFF) as u32;
        overlapped.u.s_mut().OffsetHigh = (offset >> 32) as u32;

        let mut bytes_read: DWord = 0;
        let ok = unsafe {
            fileapi::ReadFile(
                self.handle,
                buf.as_mut_ptr() as PVoid,
                buf.len() as DWord,
                &mut bytes_read,
                &mut overlapped,
            )
        };

        if ok == 0 {
            return Err(error_code_to_result_code(unsafe {
                winapi::um::errhandlingapi::GetLastError()
            }));
        }

        Ok(bytes_read as usize)
    }

    /// Writes exactly `buf.len()` bytes starting at `offset`, same
    /// alignment contract as [`Device::read_at`].
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize, ResultCode> {
        let mut overlapped: winapi::um::minwinbase::OVERLAPPED = unsafe { std::mem::zeroed() };
        overlapped.u.s_mut().Offset = (offset & 0xFFFF_FFFF) as u32;
        overlapped.u.s_mut().OffsetHigh = (offset >> 32) as u32;

        let mut bytes_written: DWord = 0;
        let ok = unsafe {
            fileapi::WriteFile(
                self.handle,
                buf.as_ptr() as *const Void as PVoid,
                buf.len() as DWord,
                &mut bytes_written,
                &mut overlapped,
            )
        };

        if ok == 0 {
            return Err(error_code_to_result_code(unsafe {
                winapi::um::errhandlingapi::GetLastError()
            }));
        }

        Ok(bytes_written as usize)
    }

    /// Typed `DeviceIoControl` dispatch: `input` is serialized as-is, the
    /// output buffer is caller-sized, and the actually-used byte count is
    /// returned so variable-length responses (drive layout, volume bitmap)
    /// can detect truncation via `ERROR_INSUFFICIENT_BUFFER`/`ERROR_MORE_DATA`.
    pub fn control_code<I: Sized, O: Sized>(
        &self,
        code: DWord,
        input: Option<&I>,
        output: &mut O,
    ) -> Result<DWord, ResultCode> {
        let (in_ptr, in_size) = match input {
            Some(i) => (i as *const I as PVoid, std::mem::size_of::<I>() as DWord),
            None => (std::ptr::null_mut(), 0),
        };

        let mut bytes_returned: DWord = 0;
        let ok = unsafe {
            ioapiset::DeviceIoControl(
                self.handle,
                code,
                in_ptr,
                in_size,
                output as *mut O as PVoid,
                std::mem::size_of::<O>() as DWord,
                &mut bytes_returned,
                std::ptr::null_mut(),
            )
        };

        if ok == 0 {
            return Err(error_code_to_result_code(unsafe {
                winapi::um::errhandlingapi::GetLastError()
            }));
        }

        Ok(bytes_returned)
    }

    /// Same as [`Device::control_code`] but the output buffer is a raw byte
    /// slice rather than a fixed-size type, for variable-length control
    /// codes like the volume bitmap and drive layout queries.
    pub fn control_code_raw(
        &self,
        code: DWord,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DWord, ResultCode> {
        let mut bytes_returned: DWord = 0;
        let in_ptr = if input.is_empty() {
            std::ptr::null_mut()
        } else {
            input.as_ptr() as *mut Void as PVoid
        };

        let ok = unsafe {
            ioapiset::DeviceIoControl(
                self.handle,
                code,
                in_ptr,
                input.len() as DWord,
                output.as_mut_ptr() as PVoid,
                output.len() as DWord,
                &mut bytes_returned,
                std::ptr::null_mut(),
            )
        };

        if ok == 0 {
            return Err(error_code_to_result_code(unsafe {
                winapi::um::errhandlingapi::GetLastError()
            }));
        }

        Ok(bytes_returned)
    }

    /// `IOCTL_DISK_GET_LENGTH_INFO`: total addressable byte length.
    pub fn get_length_info(&self) -> Result<u64, ResultCode> {
        let mut length_info: winioctl::GET_LENGTH_INFORMATION = unsafe { std::mem::zeroed() };
        self.control_code(winioctl::IOCTL_DISK_GET_LENGTH_INFO, None::<&()>, &mut length_info)?;
        Ok(unsafe { *length_info.Length.QuadPart() } as u64)
    }

    /// `IOCTL_DISK_GET_DRIVE_GEOMETRY_EX`: bytes-per-sector and media type.
    pub fn get_drive_geometry_ex(&self) -> Result<winioctl::DISK_GEOMETRY_EX, ResultCode> {
        let mut geometry: winioctl::DISK_GEOMETRY_EX = unsafe { std::mem::zeroed() };
        self.control_code(winioctl::IOCTL_DISK_GET_DRIVE_GEOMETRY_EX, None::<&()>, &mut geometry)?;
        Ok(geometry)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let mut handle = self.handle;
        crate::winutilities::close_handle(&mut handle);
    }
}

/// A positioned, logical-sector-size-aware reader, abstracting over a raw
/// physical/partition device and a shadow-copy snapshot device behind one
/// interface, per the "polymorphic I/O source" design note.
pub trait SectorReader {
    fn logical_sector_size(&self) -> u32;
    fn size_bytes(&self) -> u64;
    fn read_sectors(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

/// The write-side counterpart, used by the restore engine against an
/// attached container's raw device path or a prepared physical target.
pub trait SectorWriter {
    fn logical_sector_size(&self) -> u32;
    fn write_sectors(&self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

fn to_io_error(code: ResultCode) -> io::Error {
    io::Error::new(io::ErrorKind::Other, code.to_string())
}

/// [`SectorReader`]/[`SectorWriter`] implementation over a plain device
/// path (physical drive, partition, volume, or snapshot device path — they
/// all expose the same `\\.\...` read/write surface).
pub struct DeviceIo {
    device: Device,
    logical_sector_size: u32,
    size_bytes: u64,
}

impl DeviceIo {
    pub fn open_read(path: &str, logical_sector_size: u32) -> Result<DeviceIo, ResultCode> {
        let device = Device::open_read(path)?;
        let size_bytes = device.get_length_info().unwrap_or(0);
        Ok(DeviceIo { device, logical_sector_size, size_bytes })
    }

    pub fn open_read_write(path: &str, logical_sector_size: u32) -> Result<DeviceIo, ResultCode> {
        let device = Device::open_read_write(path)?;
        let size_bytes = device.get_length_info().unwrap_or(0);
        Ok(DeviceIo { device, logical_sector_size, size_bytes })
    }
}

impl SectorReader for DeviceIo {
    fn logical_sector_size(&self) -> u32 {
        self.logical_sector_size
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn read_sectors(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        assert_eq!(offset % self.logical_sector_size as u64, 0, "unaligned read offset");
        assert_eq!(buf.len() % self.logical_sector_size as usize, 0, "unaligned read length");
        self.device.read_at(offset, buf).map(|_| ()).map_err(to_io_error)
    }
}

impl SectorWriter for DeviceIo {
    fn logical_sector_size(&self) -> u32 {
        self.logical_sector_size
    }

    fn write_sectors(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        assert_eq!(offset % self.logical_sector_size as u64, 0, "unaligned write offset");
        assert_eq!(buf.len() % self.logical_sector_size as usize, 0, "unaligned write length");
        self.device.write_at(offset, buf).map(|_| ()).map_err(to_io_error)
    }
}

/// Trial-opens `\\.\PhysicalDrive{N}` for `N` in `0..32`, returning the
/// indices that exist. Used by the disk enumerator's control-code fallback
/// to discover disks without a management-query source.
pub fn enumerate_physical_drive_indices() -> Vec<u32> {
    (0..32)
        .filter(|index| Device::open_read(&format!(r"\\.\PhysicalDrive{}", index)).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_does_not_panic_without_devices() {
        // On a sandbox with no physical drives reachable this just returns
        // an empty vector rather than erroring.
        let _ = enumerate_physical_drive_indices();
    }
}
