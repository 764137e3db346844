// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Two layers of error type, matching the split the rest of the crate is
//! written against: a small `ResultCode` that mirrors the handful of Win32
//! error codes the VirtDisk/disk-utility call sites actually branch on, and
//! a typed `ChronosError` that the higher-level pipeline surfaces to callers.

use winapi::shared::winerror::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER,
    ERROR_IO_PENDING, ERROR_LOCK_VIOLATION, ERROR_NOT_READY, ERROR_OPERATION_ABORTED, ERROR_PATH_NOT_FOUND,
    ERROR_SHARING_VIOLATION, ERROR_SUCCESS, ERROR_WRITE_PROTECT,
};

/// Low-level result of a single Win32 call, as returned by `GetLastError()`
/// or directly by the VirtDisk APIs (which return a `DWORD` status rather
/// than setting the thread-error and returning a `BOOL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    InvalidParameter,
    InsufficientBuffer,
    FileNotFound,
    PathNotFound,
    AccessDenied,
    SharingViolation,
    WriteProtected,
    NotReady,
    IoPending,
    OperationAborted,
    LockViolation,
    GenFailure,
    WindowsErrorCode(u32),
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Success => write!(f, "success"),
            ResultCode::InvalidParameter => write!(f, "invalid parameter"),
            ResultCode::InsufficientBuffer => write!(f, "insufficient buffer"),
            ResultCode::FileNotFound => write!(f, "file not found"),
            ResultCode::PathNotFound => write!(f, "path not found"),
            ResultCode::AccessDenied => write!(f, "access denied"),
            ResultCode::SharingViolation => write!(f, "sharing violation"),
            ResultCode::WriteProtected => write!(f, "media is write protected"),
            ResultCode::NotReady => write!(f, "device not ready"),
            ResultCode::IoPending => write!(f, "io pending"),
            ResultCode::OperationAborted => write!(f, "operation aborted"),
            ResultCode::LockViolation => write!(f, "the volume or disk is locked"),
            ResultCode::GenFailure => write!(f, "general failure"),
            ResultCode::WindowsErrorCode(code) => write!(f, "windows error 0x{:08x}", code),
        }
    }
}

impl std::error::Error for ResultCode {}

/// Translates a raw Win32 error code (as returned by `GetLastError()` or a
/// VirtDisk API's `DWORD` return value) into a `ResultCode`.
pub fn error_code_to_result_code(error_code: u32) -> ResultCode {
    match error_code {
        ERROR_SUCCESS => ResultCode::Success,
        ERROR_INVALID_PARAMETER => ResultCode::InvalidParameter,
        ERROR_INSUFFICIENT_BUFFER => ResultCode::InsufficientBuffer,
        ERROR_FILE_NOT_FOUND => ResultCode::FileNotFound,
        ERROR_PATH_NOT_FOUND => ResultCode::PathNotFound,
        ERROR_ACCESS_DENIED => ResultCode::AccessDenied,
        ERROR_SHARING_VIOLATION => ResultCode::SharingViolation,
        ERROR_WRITE_PROTECT => ResultCode::WriteProtected,
        ERROR_NOT_READY => ResultCode::NotReady,
        ERROR_IO_PENDING => ResultCode::IoPending,
        ERROR_OPERATION_ABORTED => ResultCode::OperationAborted,
        ERROR_LOCK_VIOLATION => ResultCode::LockViolation,
        other => ResultCode::WindowsErrorCode(other),
    }
}

/// The typed error surface the backup/restore pipeline (and everything
/// above the raw device-I/O layer) propagates to its caller.
///
/// Raw platform codes are retained inside the variant payloads so
/// diagnostics never lose the underlying `ResultCode`/HRESULT, while
/// callers can still match on the kind without parsing a code.
#[derive(Debug, thiserror::Error)]
pub enum ChronosError {
    #[error("access to the device was denied")]
    AccessDenied,
    #[error("the volume or disk is locked by another process")]
    Locked,
    #[error("the media is write protected")]
    WriteProtected,
    #[error("the device or path was not found")]
    NotFound,
    #[error("the device is in use by another process")]
    Sharing,
    #[error("an invalid parameter was passed to a platform call")]
    InvalidParameter,
    #[error("device I/O failed with code {0}")]
    IoFailed(u32),

    #[error("shadow copy is unavailable: {0}")]
    SnapshotUnavailable(String),
    #[error("shadow copy operation failed at step '{step}' (hresult 0x{hr:08x})")]
    SnapshotFailed { step: &'static str, hr: i32 },

    #[error("failed to create the virtual-disk container (hresult 0x{0:08x})")]
    ContainerCreateFailed(i32),
    #[error("failed to attach the virtual-disk container (hresult 0x{0:08x})")]
    AttachFailed(i32),
    #[error("failed to query the virtual-disk device path (hresult 0x{0:08x})")]
    PathQueryFailed(i32),

    #[error("the volume's filesystem is not supported for allocation-aware backup")]
    UnsupportedFilesystem,
    #[error("sector mismatch at offset {offset}")]
    SectorMismatch { offset: u64 },
    #[error("verification failed at offset {offset}")]
    VerifyFailed { offset: u64 },
    #[error("the image is corrupt or truncated")]
    ImageCorrupt,

    #[error("the operation was cancelled")]
    Cancelled,
    #[error("the engine is already running a job")]
    Busy,
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid job configuration: field '{0}'")]
    InvalidJob(&'static str),
}

impl ChronosError {
    /// User-visible remediation text for the error kinds spec'd as having one
    /// (§7). Returns `None` for kinds that only carry diagnostic value.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ChronosError::AccessDenied => Some("Run the application elevated."),
            ChronosError::Locked => Some("Close programs that are using the disk or volume."),
            ChronosError::WriteProtected => Some("Take the disk offline before retrying."),
            ChronosError::Cancelled => None,
            _ => None,
        }
    }
}

impl From<ResultCode> for ChronosError {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Success => unreachable!("Success is not an error"),
            ResultCode::InvalidParameter => ChronosError::InvalidParameter,
            ResultCode::InsufficientBuffer => ChronosError::IoFailed(ERROR_INSUFFICIENT_BUFFER),
            ResultCode::FileNotFound => ChronosError::NotFound,
            ResultCode::PathNotFound => ChronosError::NotFound,
            ResultCode::AccessDenied => ChronosError::AccessDenied,
            ResultCode::SharingViolation => ChronosError::Sharing,
            ResultCode::WriteProtected => ChronosError::WriteProtected,
            ResultCode::NotReady => ChronosError::IoFailed(ERROR_NOT_READY),
            ResultCode::IoPending => ChronosError::IoFailed(ERROR_IO_PENDING),
            ResultCode::OperationAborted => ChronosError::Cancelled,
            ResultCode::LockViolation => ChronosError::Locked,
            ResultCode::GenFailure => ChronosError::IoFailed(0),
            ResultCode::WindowsErrorCode(code) => ChronosError::IoFailed(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(error_code_to_result_code(ERROR_SUCCESS), ResultCode::Success);
        assert_eq!(
            error_code_to_result_code(ERROR_ACCESS_DENIED),
            ResultCode::AccessDenied
        );
    }

    #[test]
    fn unknown_code_round_trips() {
        match error_code_to_result_code(0x1234) {
            ResultCode::WindowsErrorCode(0x1234) => {}
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn remediation_present_for_actionable_kinds() {
        assert!(ChronosError::AccessDenied.remediation().is_some());
        assert!(ChronosError::Locked.remediation().is_some());
        assert!(ChronosError::WriteProtected.remediation().is_some());
        assert!(ChronosError::Cancelled.remediation().is_none());
    }
}
