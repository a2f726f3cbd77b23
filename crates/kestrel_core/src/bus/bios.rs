use super::{AddrUnit, BusMap};

use thiserror::Error;

use std::fs;
use std::io;
use std::path::Path;

#[derive(Error, Debug)]
pub enum BiosError {
    #[error("failed to load BIOS: {0}")]
    Io(#[from] io::Error),

    #[error("invalid BIOS image: must be 512 kb, is {0} bytes")]
    InvalidSize(usize),
}

/// The BIOS ROM. It's read only, stores to it are dropped by the bus.
pub struct Bios {
    data: Box<[u8]>,
    name: String,
}

impl Bios {
    pub const SIZE: usize = 512 * 1024;

    /// The address the CPU starts executing from.
    pub const RESET_VECTOR: u32 = 0xbfc0_0000;

    pub fn from_file(path: &Path) -> Result<Self, BiosError> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self::from_bytes(data, name)
    }

    /// Create from an image which must be exactly [`Self::SIZE`] bytes.
    pub fn from_bytes(data: Vec<u8>, name: String) -> Result<Self, BiosError> {
        if data.len() != Self::SIZE {
            return Err(BiosError::InvalidSize(data.len()));
        }
        Ok(Self { data: data.into_boxed_slice(), name })
    }

    /// Create an image with `code` placed at the virtual address `base`. The rest is zero, which
    /// decodes to `nop`.
    pub fn from_code(base: u32, code: &[u8]) -> Self {
        let base = super::regioned_addr(base);

        debug_assert!(Self::contains(base));

        let base = (base - Self::BUS_BEGIN) as usize;

        debug_assert!(base + code.len() <= Self::SIZE);

        let mut data = vec![0x0; Self::SIZE];
        data[base..base + code.len()].copy_from_slice(code);

        Self { data: data.into_boxed_slice(), name: "custom".to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn read<T: AddrUnit>(&self, offset: u32) -> T {
        let offset = offset as usize;
        let val = (0..T::WIDTH as usize).fold(0, |val, byte| {
            val | u32::from(self.data[offset + byte]) << (8 * byte)
        });
        T::from_u32(val)
    }
}

impl BusMap for Bios {
    const BUS_BEGIN: u32 = 0x1fc0_0000;
    const BUS_END: u32 = Self::BUS_BEGIN + Self::SIZE as u32 - 1;
}

#[test]
fn wrong_size() {
    assert!(matches!(
        Bios::from_bytes(vec![0; 1024], "small".to_string()),
        Err(BiosError::InvalidSize(1024)),
    ));
}
