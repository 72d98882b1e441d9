//! Guest linear memory access
//!
//! The guest owns a single flat, growable byte buffer; every "pointer" it
//! hands the host is a byte offset into it. [`GuestMemory`] is a non-owning
//! handle over that buffer providing bounds-checked typed reads and writes,
//! C-string decode/encode, and growth.
//!
//! On wasm32 the handle wraps the guest's `WebAssembly.Memory` export and
//! re-derives a view from `memory.buffer()` on every access — growth can
//! reallocate the backing buffer, so views are never cached across calls.
//! On native targets a plain `Vec<u8>` stands in so the whole core can be
//! tested with `cargo test`.
//!
//! Byte order is little-endian at both ends of the ABI: the wasm binary
//! format mandates it for the guest, and the host side is enforced below.
//! Alignment is the caller's responsibility; the view itself does not
//! re-align offsets.

use crate::error::{CrtError, CrtResult};

#[cfg(not(target_arch = "wasm32"))]
use std::cell::RefCell;

#[cfg(target_arch = "wasm32")]
use js_sys::{Uint8Array, WebAssembly};

// The scalar accessors and `read_pod`/`write_pod` assume the host agrees
// with the guest on byte order.
#[cfg(target_endian = "big")]
compile_error!("cshim requires a little-endian host to match the guest ABI");

/// Size of one wasm memory page in bytes
pub const PAGE_SIZE: u32 = 65536;

/// Non-owning handle to the guest's linear memory
pub struct GuestMemory {
    #[cfg(target_arch = "wasm32")]
    memory: WebAssembly::Memory,

    #[cfg(not(target_arch = "wasm32"))]
    data: RefCell<Vec<u8>>,
}

#[cfg(target_arch = "wasm32")]
impl GuestMemory {
    /// Wrap the guest's exported `WebAssembly.Memory`
    pub fn from_export(memory: WebAssembly::Memory) -> Self {
        Self { memory }
    }

    /// Current byte length of the buffer
    pub fn len(&self) -> u32 {
        self.view().length()
    }

    /// Grow by at least `delta_bytes` (rounded up to whole pages), returning
    /// the previous byte length
    pub fn grow(&self, delta_bytes: u32) -> u32 {
        let old_len = self.len();
        let pages = delta_bytes.div_ceil(PAGE_SIZE);
        self.memory.grow(pages);
        old_len
    }

    // A fresh view per call: growth detaches the old ArrayBuffer.
    fn view(&self) -> Uint8Array {
        Uint8Array::new(&self.memory.buffer())
    }

    fn read_into(&self, offset: u32, buf: &mut [u8]) {
        self.view()
            .subarray(offset, offset + buf.len() as u32)
            .copy_to(buf);
    }

    fn write_raw(&self, offset: u32, data: &[u8]) {
        self.view()
            .subarray(offset, offset + data.len() as u32)
            .copy_from(data);
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl GuestMemory {
    /// A zero-filled test memory of `bytes` length
    pub fn with_size(bytes: u32) -> Self {
        Self {
            data: RefCell::new(vec![0u8; bytes as usize]),
        }
    }

    /// A test memory seeded with `data`
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: RefCell::new(data),
        }
    }

    /// Current byte length of the buffer
    pub fn len(&self) -> u32 {
        self.data.borrow().len() as u32
    }

    /// Grow by at least `delta_bytes` (rounded up to whole pages), returning
    /// the previous byte length
    pub fn grow(&self, delta_bytes: u32) -> u32 {
        let mut data = self.data.borrow_mut();
        let old_len = data.len() as u32;
        let pages = delta_bytes.div_ceil(PAGE_SIZE);
        let new_len = data.len() + (pages * PAGE_SIZE) as usize;
        data.resize(new_len, 0);
        old_len
    }

    fn read_into(&self, offset: u32, buf: &mut [u8]) {
        let start = offset as usize;
        buf.copy_from_slice(&self.data.borrow()[start..start + buf.len()]);
    }

    fn write_raw(&self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        self.data.borrow_mut()[start..start + data.len()].copy_from_slice(data);
    }
}

impl GuestMemory {
    /// True if the buffer currently has zero length
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size in whole pages
    pub fn size_pages(&self) -> u32 {
        self.len() / PAGE_SIZE
    }

    fn check(&self, offset: u32, size: u32) -> CrtResult<()> {
        let memory_size = self.len();
        if (offset as u64) + (size as u64) > memory_size as u64 {
            return Err(CrtError::OutOfBounds {
                address: offset,
                size,
                memory_size,
            });
        }
        Ok(())
    }

    /// Read `len` bytes starting at `offset`
    pub fn read_bytes(&self, offset: u32, len: u32) -> CrtResult<Vec<u8>> {
        self.check(offset, len)?;
        let mut buf = vec![0u8; len as usize];
        self.read_into(offset, &mut buf);
        Ok(buf)
    }

    /// Write `data` starting at `offset`
    pub fn write_bytes(&self, offset: u32, data: &[u8]) -> CrtResult<()> {
        self.check(offset, data.len() as u32)?;
        self.write_raw(offset, data);
        Ok(())
    }

    /// Decode a NUL-terminated C string starting at `offset`
    ///
    /// Scans forward to the first zero byte and decodes the span as UTF-8
    /// (lossy). A missing terminator before the end of memory is fatal.
    pub fn read_cstr(&self, offset: u32) -> CrtResult<String> {
        self.check(offset, 0)?;
        let memory_size = self.len();

        // Scan in chunks so long strings do not mean per-byte view traffic
        const CHUNK: u32 = 256;
        let mut bytes = Vec::new();
        let mut cursor = offset;
        loop {
            if cursor >= memory_size {
                return Err(CrtError::UnterminatedString { address: offset });
            }
            let span = CHUNK.min(memory_size - cursor);
            let chunk = self.read_bytes(cursor, span)?;
            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.extend_from_slice(&chunk);
            cursor += span;
        }
    }

    /// Encode `s` at `offset` with a trailing NUL
    pub fn write_cstr(&self, offset: u32, s: &str) -> CrtResult<()> {
        self.check(offset, s.len() as u32 + 1)?;
        self.write_raw(offset, s.as_bytes());
        self.write_raw(offset + s.len() as u32, &[0]);
        Ok(())
    }

    /// Read a `#[repr(C)]` value from `offset` (native byte order; the
    /// little-endian host requirement above makes that the guest's order)
    pub fn read_pod<T: bytemuck::AnyBitPattern>(&self, offset: u32) -> CrtResult<T> {
        let bytes = self.read_bytes(offset, std::mem::size_of::<T>() as u32)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Write a `#[repr(C)]` value at `offset`
    pub fn write_pod<T: bytemuck::NoUninit>(&self, offset: u32, value: &T) -> CrtResult<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }
}

macro_rules! scalar_access {
    ($($ty:ty => $read:ident, $write:ident);* $(;)?) => {
        impl GuestMemory {
            $(
                pub fn $read(&self, offset: u32) -> CrtResult<$ty> {
                    let bytes = self.read_bytes(offset, std::mem::size_of::<$ty>() as u32)?;
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes);
                    Ok(<$ty>::from_le_bytes(raw))
                }

                pub fn $write(&self, offset: u32, value: $ty) -> CrtResult<()> {
                    self.write_bytes(offset, &value.to_le_bytes())
                }
            )*
        }
    };
}

scalar_access! {
    u8  => read_u8,  write_u8;
    i8  => read_i8,  write_i8;
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}
