use super::asm::*;
use crate::bus::bios::Bios;
use crate::cpu::RegIdx;
use crate::exe::{Exe, ExeError};
use crate::{StopReason, System};

struct Builder {
    pc: u32,
    gp: u32,
    text_base: u32,
    bss: (u32, u32),
    sp: (u32, u32),
    text: Vec<u8>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            pc: 0x8001_0000,
            gp: 0x8004_0000,
            text_base: 0x8001_0000,
            bss: (0, 0),
            sp: (0, 0),
            text: Vec::new(),
        }
    }
}

impl Builder {
    fn build(&self) -> Vec<u8> {
        let mut data = vec![0; 0x800];
        let mut put = |at: usize, val: u32| {
            data[at..at + 4].copy_from_slice(&val.to_le_bytes());
        };

        put(0x10, self.pc);
        put(0x14, self.gp);
        put(0x18, self.text_base);
        put(0x1c, self.text.len() as u32);
        put(0x28, self.bss.0);
        put(0x2c, self.bss.1);
        put(0x30, self.sp.0);
        put(0x34, self.sp.1);

        data[..8].copy_from_slice(b"PS-X EXE");
        data.extend_from_slice(&self.text);
        data
    }
}

fn is_invalid_header(res: Result<Exe, ExeError>) -> bool {
    matches!(res, Err(ExeError::InvalidHeader(_)))
}

#[test]
fn parse_header() {
    let builder = Builder {
        bss: (0x8002_0000, 0x100),
        sp: (0x801f_ff00, 0xf0),
        text: vec![1, 2, 3, 4, 5, 6, 7, 8],
        ..Default::default()
    };

    let exe = Exe::parse(&builder.build()).unwrap();

    assert_eq!(exe.pc, 0x8001_0000);
    assert_eq!(exe.gp, 0x8004_0000);
    assert_eq!(exe.text_base, 0x8001_0000);
    assert_eq!(&exe.text[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!((exe.bss_base, exe.bss_size), (0x8002_0000, 0x100));
    assert_eq!(exe.sp, 0x801f_fff0);
}

#[test]
fn no_stack_pointer() {
    let builder = Builder { sp: (0, 0x10), ..Default::default() };
    assert_eq!(Exe::parse(&builder.build()).unwrap().sp, 0);
}

#[test]
fn trailing_data_ignored() {
    let mut data = Builder { text: vec![0; 4], ..Default::default() }.build();
    data.extend_from_slice(&[0xff; 16]);

    assert_eq!(Exe::parse(&data).unwrap().text.len(), 4);
}

#[test]
fn invalid_headers() {
    let mut bad_magic = Builder::default().build();
    bad_magic[0] = b'X';
    assert!(is_invalid_header(Exe::parse(&bad_magic)));

    assert!(is_invalid_header(Exe::parse(&[0; 0x400])));

    let mut truncated = Builder { text: vec![0; 16], ..Default::default() }.build();
    truncated.truncate(0x808);
    assert!(is_invalid_header(Exe::parse(&truncated)));

    let outside_ram = Builder {
        text_base: 0x801f_fff0,
        text: vec![0; 0x20],
        ..Default::default()
    };
    assert!(is_invalid_header(Exe::parse(&outside_ram.build())));

    let bss_outside_ram = Builder { bss: (0x8010_0000, 0x20_0000), ..Default::default() };
    assert!(is_invalid_header(Exe::parse(&bss_outside_ram.build())));
}

#[test]
fn missing_file() {
    let res = Exe::load(std::path::Path::new("/nonexistent/kestrel.exe"));
    assert!(matches!(res, Err(ExeError::Io(_))));
}

#[test]
fn sideload_and_run() {
    let code = program![addiu(RegIdx::T0, RegIdx::ZERO, 7), sw(RegIdx::T0, 0, RegIdx::GP), brk()];
    let builder = Builder {
        bss: (0x8002_0000, 8),
        sp: (0x801f_ff00, 0),
        text: assemble(&code),
        ..Default::default()
    };
    let exe = Exe::parse(&builder.build()).unwrap();

    let mut system = System::new(Bios::from_code(Bios::RESET_VECTOR, &[]));
    system.sideload(&exe);

    assert_eq!(system.cpu.pc(), 0x8001_0000);
    assert_eq!(system.cpu.read_reg(RegIdx::SP), 0x801f_ff00);
    assert_eq!(system.cpu.read_reg(RegIdx::FP), 0x801f_ff00);
    assert_eq!(system.cpu.bus().peek::<u32>(0x8002_0004), Some(0));

    assert_eq!(system.run(1_000), StopReason::Break);
    assert_eq!(system.cpu.read_reg(RegIdx::T0), 7);
    assert_eq!(system.cpu.bus().peek::<u32>(0x8004_0000), Some(7));
}
