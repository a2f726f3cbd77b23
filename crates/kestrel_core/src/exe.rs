//! Loading of PS-X EXE files, the executable format used by the Playstation.

use crate::bus::{ram::Ram, regioned_addr};

use bytemuck::{AnyBitPattern, Zeroable};
use thiserror::Error;

use std::fs;
use std::io;
use std::mem;
use std::path::Path;

/// The header takes up the first 2 kilobytes of the file, the text segment follows.
const HEADER_SIZE: usize = 0x800;

#[derive(Error, Debug)]
pub enum ExeError {
    #[error("failed to load exe: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// A loaded PS-X EXE file.
pub struct Exe {
    /// Text segment data.
    pub text: Box<[u8]>,
    /// Entry point.
    pub pc: u32,
    /// Global pointer.
    pub gp: u32,
    /// Base address of the text segment.
    pub text_base: u32,
    /// Base address of the zero initialized bss segment.
    pub bss_base: u32,
    /// Size of the bss segment.
    pub bss_size: u32,
    /// Initial stack and frame pointer. Zero means the value set by the BIOS is kept.
    pub sp: u32,
}

impl Exe {
    pub fn load(path: &Path) -> Result<Self, ExeError> {
        Self::parse(&fs::read(path)?)
    }

    pub fn parse(data: &[u8]) -> Result<Self, ExeError> {
        if data.len() < HEADER_SIZE {
            return Err(ExeError::InvalidHeader(format!(
                "must be at least 2 kilobytes, is {} bytes",
                data.len()
            )));
        }

        let header: Header = bytemuck::pod_read_unaligned(&data[..mem::size_of::<Header>()]);

        if &header.magic != b"PS-X EXE" {
            return Err(ExeError::InvalidHeader(String::from(
                "invalid magic value, must be 'PS-X EXE'",
            )));
        }

        let text = &data[HEADER_SIZE..];
        let text_size = header.text_size as usize;

        if text.len() < text_size {
            return Err(ExeError::InvalidHeader(format!(
                "text segment is {text_size} bytes, but only {} follow the header",
                text.len(),
            )));
        }

        if !fits_in_ram(header.text_base, header.text_size) {
            return Err(ExeError::InvalidHeader(String::from(
                "text segment not contained in RAM",
            )));
        }

        if !fits_in_ram(header.bss_base, header.bss_size) {
            return Err(ExeError::InvalidHeader(String::from(
                "bss segment not contained in RAM",
            )));
        }

        let sp = if header.sp_base == 0 {
            0
        } else {
            header.sp_base.wrapping_add(header.sp_offset)
        };

        Ok(Self {
            text: Box::from(&text[..text_size]),
            pc: header.pc,
            gp: header.gp,
            text_base: header.text_base,
            bss_base: header.bss_base,
            bss_size: header.bss_size,
            sp,
        })
    }
}

/// If the segment at virtual address `base` lies inside the first mirror of RAM.
fn fits_in_ram(base: u32, size: u32) -> bool {
    let base = regioned_addr(base) as usize;
    base.checked_add(size as usize)
        .map_or(false, |end| end <= Ram::SIZE)
}

/// The part of the header that's used.
#[repr(C)]
#[derive(Clone, Copy)]
struct Header {
    /// Should be "PS-X EXE".
    magic: [u8; 8],
    _pad0: [u8; 8],
    pc: u32,
    gp: u32,
    text_base: u32,
    /// Should be the size of the file minus the header.
    text_size: u32,
    _pad1: [u8; 8],
    bss_base: u32,
    bss_size: u32,
    sp_base: u32,
    sp_offset: u32,
}

unsafe impl Zeroable for Header {}

unsafe impl AnyBitPattern for Header {}
