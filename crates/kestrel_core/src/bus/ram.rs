use super::{AddrUnit, BusMap};

/// Byte addressed little endian memory.
pub(super) struct RawMem<const SIZE: usize> {
    data: Box<[u8]>,
}

impl<const SIZE: usize> RawMem<SIZE> {
    /// Memory powers on with all bits set.
    const FILL: u8 = 0xff;

    pub fn new() -> Self {
        // Allocated as a vector since a 2 megabyte array may overflow the stack in debug builds.
        Self { data: vec![Self::FILL; SIZE].into_boxed_slice() }
    }

    /// Load a value at `offset`, which is wrapped around `SIZE`.
    #[inline]
    pub fn read<T: AddrUnit>(&self, offset: u32) -> T {
        let offset = offset as usize % SIZE;
        let val = (0..T::WIDTH as usize).fold(0, |val, byte| {
            val | u32::from(self.data[offset + byte]) << (8 * byte)
        });
        T::from_u32(val)
    }

    #[inline]
    pub fn write<T: AddrUnit>(&mut self, offset: u32, val: T) {
        let offset = offset as usize % SIZE;
        let val = val.as_u32();
        for byte in 0..T::WIDTH as usize {
            self.data[offset + byte] = (val >> (8 * byte)) as u8;
        }
    }

    pub fn reset(&mut self) {
        self.data.fill(Self::FILL);
    }
}

const RAM_SIZE: usize = 2 * 1024 * 1024;

/// 2 megabytes of main memory, mirrored four times over the first 8 megabytes of the address
/// space.
pub struct Ram(RawMem<RAM_SIZE>);

impl Ram {
    pub const SIZE: usize = RAM_SIZE;

    pub fn new() -> Self {
        Self(RawMem::new())
    }

    #[inline]
    pub fn read<T: AddrUnit>(&self, offset: u32) -> T {
        self.0.read(offset)
    }

    #[inline]
    pub fn write<T: AddrUnit>(&mut self, offset: u32, val: T) {
        self.0.write(offset, val)
    }

    pub fn reset(&mut self) {
        self.0.reset();
    }
}

impl BusMap for Ram {
    const BUS_BEGIN: u32 = 0x0;
    const BUS_END: u32 = 4 * Self::SIZE as u32 - 1;
}

#[test]
fn mirroring() {
    let mut ram = Ram::new();

    ram.write::<u32>(0x0000_0010, 0xdead_beef);

    assert_eq!(ram.read::<u32>(0x0020_0010), 0xdead_beef);
    assert_eq!(ram.read::<u32>(0x0060_0010), 0xdead_beef);
    assert_eq!(ram.read::<u16>(0x0040_0012), 0xdead);
    assert_eq!(ram.read::<u8>(0x0000_0011), 0xbe);
}
