//! This file contains the trusted traits that make it safe to copy
//! typed values to and from persistent memory.
//!
//! Reading bytes from PM and reinterpreting them as some type `T` is
//! undefined behavior unless every bit pattern of the right length is a
//! valid `T`, and writing a `T` out as bytes is undefined behavior if `T`
//! contains uninitialized padding. `PmSafe` is an unsafe marker trait
//! promising both properties. It is implemented here for the unsigned
//! integer primitives and should otherwise only be obtained through
//! `#[derive(PmSafe)]` from the `pmsafe` crate, which checks that the
//! deriving type is `repr(C)`, has only `PmSafe` fields, and has no
//! padding.
//!
//! `PmCopy` is the safe interface the rest of the crate uses. It is
//! implemented for every `PmSafe + Copy` type.

use crate::pmem::pmemspec_t::PmemError;
use core::mem::{size_of, MaybeUninit};

pub use pmsafe::PmSafe;

/// # Safety
///
/// Implementors must be `repr(C)` (or primitive), contain no padding and
/// no pointers, and accept every bit pattern of `size_of::<Self>()`
/// bytes as a valid value.
pub unsafe trait PmSafe {}

macro_rules! pmsafe_primitive {
    ($($ty:ty),*) => {
        $( unsafe impl PmSafe for $ty {} )*
    };
}

pmsafe_primitive!(u8, u16, u32, u64, u128);

unsafe impl<T: PmSafe, const N: usize> PmSafe for [T; N] {}

pub trait PmCopy: PmSafe + Copy + Sized {
    fn size_of() -> u64 {
        size_of::<Self>() as u64
    }

    fn as_bytes(&self) -> &[u8] {
        let ptr = self as *const Self as *const u8;
        // SAFETY: self is a valid Self, so it is contiguous, non-null and
        // valid for reads of size_of::<Self>() bytes. PmSafe guarantees
        // there is no padding, so every one of those bytes is initialized.
        unsafe { core::slice::from_raw_parts(ptr, size_of::<Self>()) }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, PmemError> {
        if bytes.len() != size_of::<Self>() {
            return Err(PmemError::BufferSizeMismatch {
                expected: size_of::<Self>() as u64,
                actual: bytes.len() as u64,
            });
        }
        let mut value = MaybeUninit::<Self>::uninit();
        // SAFETY: the destination is valid for size_of::<Self>() bytes and
        // does not overlap `bytes`. A byte-wise copy has no alignment
        // requirement. PmSafe guarantees that any fully-initialized bit
        // pattern is a valid Self.
        unsafe {
            core::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                value.as_mut_ptr() as *mut u8,
                size_of::<Self>(),
            );
            Ok(value.assume_init())
        }
    }
}

impl<T: PmSafe + Copy> PmCopy for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_bytes_are_native_endian() {
        let v: u64 = 0x0102_0304_0506_0708;
        assert_eq!(v.as_bytes(), &v.to_ne_bytes());
        assert_eq!(u64::from_bytes(&v.to_ne_bytes()), Ok(v));
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(u64::from_bytes(&[0u8; 7]).is_err());
        assert!(<[u32; 2]>::from_bytes(&[0u8; 8]).is_ok());
    }
}
