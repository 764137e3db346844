// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Thin, friendlier aliases over the raw Win32 types used throughout this crate.
//!
//! This mirrors the `windefs` module that the upstream VirtDisk/disk-utility
//! bindings are written against: short, PascalCase names for the primitive
//! Win32 types, so call sites read like the Windows SDK headers instead of
//! `winapi`'s C-flavored module paths.

pub use winapi::shared::guiddef::GUID as Guid;
pub use winapi::shared::minwindef::{
    BOOL as Bool, BYTE as Byte, DWORD as DWord, UCHAR as UChar, USHORT as UShort,
};
pub use winapi::shared::ntdef::{
    BOOLEAN as Boolean, HANDLE as Handle, LARGE_INTEGER as LargeInteger, LONGLONG as LongLong,
    PCWSTR as PCWStr, PWSTR as PWStr, ULONG as ULong, ULONG_PTR as ULongPtr, VOID as Void,
    WCHAR as WChar,
};
pub use winapi::um::minwinbase::OVERLAPPED as Overlapped;
pub use winapi::um::winnt::{DWORDLONG as DWordLong, SECURITY_DESCRIPTOR as SecurityDescriptor};

pub type UInt = std::os::raw::c_uint;
pub type PVoid = *mut Void;
pub type LPVoid = *mut Void;

pub const GUID_NULL: Guid = Guid {
    Data1: 0,
    Data2: 0,
    Data3: 0,
    Data4: [0, 0, 0, 0, 0, 0, 0, 0],
};
