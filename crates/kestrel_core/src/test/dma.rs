use crate::bus::bios::Bios;
use crate::bus::dma::Port;
use crate::bus::Bus;
use crate::cpu::Irq;

fn bus() -> Bus {
    Bus::new(Bios::from_code(Bios::RESET_VECTOR, &[]))
}

fn write_words(bus: &mut Bus, addr: u32, words: &[u32]) {
    for (i, word) in words.iter().enumerate() {
        bus.write::<u32>(addr + 4 * i as u32, *word).unwrap();
    }
}

#[test]
fn ordering_table_clear() {
    let mut bus = bus();

    bus.write::<u32>(0x1f80_10e0, 16).unwrap();
    bus.write::<u32>(0x1f80_10e4, 5).unwrap();
    bus.write::<u32>(0x1f80_10e8, 0x1100_0002).unwrap();

    assert_eq!(bus.peek::<u32>(16), Some(12));
    assert_eq!(bus.peek::<u32>(12), Some(8));
    assert_eq!(bus.peek::<u32>(8), Some(4));
    assert_eq!(bus.peek::<u32>(4), Some(0));
    assert_eq!(bus.peek::<u32>(0), Some(0x00ff_ffff));

    // Untouched past the table.
    assert_eq!(bus.peek::<u32>(20), Some(0xffff_ffff));

    assert_eq!(bus.take_stall(), 5);
    assert_eq!(bus.dma().channel(Port::Otc).ctrl() & (1 << 24 | 1 << 28), 0);
}

#[test]
fn linked_list_to_gpu() {
    let mut bus = bus();

    write_words(&mut bus, 0x100, &[0x0100_0200, 0xe100_0123]);
    write_words(&mut bus, 0x200, &[0x02ff_ffff, 0xe600_0001, 0x0000_0000]);

    bus.write::<u32>(0x1f80_10a0, 0x100).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x0100_0401).unwrap();

    let words: Vec<u32> = bus.io.gpu.drain_gp0().collect();
    assert_eq!(words, [0xe100_0123, 0xe600_0001, 0x0000_0000]);

    // Headers count towards the stall.
    assert_eq!(bus.take_stall(), 5);

    let chan = bus.dma().channel(Port::Gpu);
    assert_eq!(chan.base(), 0x00ff_ffff);
    assert_eq!(chan.ctrl(), 0x0000_0401);
}

#[test]
fn looping_linked_list_ends() {
    let mut bus = bus();

    // Points to itself.
    bus.write::<u32>(0x100, 0x0000_0100).unwrap();

    bus.write::<u32>(0x1f80_10a0, 0x100).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x0100_0401).unwrap();

    assert_eq!(bus.dma().channel(Port::Gpu).ctrl() & (1 << 24), 0);
    assert_eq!(bus.io.gpu.drain_gp0().count(), 0);
}

#[test]
fn request_transfer() {
    let mut bus = bus();

    let words: Vec<u32> = (0..64).map(|i| 0x0200_0000 | i).collect();
    write_words(&mut bus, 0x1000, &words);

    // 4 blocks of 16 words.
    bus.write::<u32>(0x1f80_10a0, 0x1000).unwrap();
    bus.write::<u32>(0x1f80_10a4, 0x0004_0010).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x0100_0201).unwrap();

    assert_eq!(bus.io.gpu.drain_gp0().count(), 64);
    assert_eq!(bus.take_stall(), 64);

    // The address is left after the last word, and the block count is used up.
    let chan = bus.dma().channel(Port::Gpu);
    assert_eq!(chan.base(), 0x1100);
    assert_eq!(chan.block_ctrl(), 0x0000_0010);
}

#[test]
fn manual_transfer() {
    let mut bus = bus();

    let words: Vec<u32> = (0..16).map(|i| 0xe100_0000 | i).collect();
    write_words(&mut bus, 0x1000, &words);

    bus.write::<u32>(0x1f80_10a0, 0x1000).unwrap();
    bus.write::<u32>(0x1f80_10a4, 16).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x1100_0001).unwrap();

    let sent: Vec<u32> = bus.io.gpu.drain_gp0().collect();
    assert_eq!(sent, words);
    assert_eq!(bus.take_stall(), 16);

    // Manual transfers leave the address and block control alone.
    let chan = bus.dma().channel(Port::Gpu);
    assert_eq!(chan.base(), 0x1000);
    assert_eq!(chan.block_ctrl(), 16);
    assert_eq!(chan.ctrl() & (1 << 24 | 1 << 28), 0);
}

#[test]
fn manual_transfer_waits_for_start() {
    let mut bus = bus();

    bus.write::<u32>(0x1f80_10a0, 0x1000).unwrap();
    bus.write::<u32>(0x1f80_10a4, 2).unwrap();

    // Enabled but not started.
    bus.write::<u32>(0x1f80_10a8, 0x0100_0001).unwrap();
    assert_eq!(bus.take_stall(), 0);

    bus.write::<u32>(0x1f80_10a8, 0x1100_0001).unwrap();
    assert_eq!(bus.take_stall(), 2);
    assert_eq!(bus.io.gpu.drain_gp0().count(), 2);
}

#[test]
fn unsupported_transfer_to_ram_zero_fills() {
    let mut bus = bus();

    bus.write::<u32>(0x1f80_10b0, 0x300).unwrap();
    bus.write::<u32>(0x1f80_10b4, 2).unwrap();
    bus.write::<u32>(0x1f80_10b8, 0x1100_0000).unwrap();

    assert_eq!(bus.peek::<u32>(0x300), Some(0));
    assert_eq!(bus.peek::<u32>(0x304), Some(0));
    assert_eq!(bus.peek::<u32>(0x308), Some(0xffff_ffff));
}

#[test]
fn completion_interrupt() {
    let mut bus = bus();

    // Master enable and the GPU channel.
    bus.write::<u32>(0x1f80_10f4, 1 << 23 | 1 << 18).unwrap();

    bus.write::<u32>(0x1f80_10a0, 0x1000).unwrap();
    bus.write::<u32>(0x1f80_10a4, 1).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x1100_0001).unwrap();

    assert!(bus.io.irq.is_triggered(Irq::Dma));

    let dicr = bus.read::<u32>(0x1f80_10f4).unwrap();
    assert_ne!(dicr & 1 << 26, 0);
    assert_ne!(dicr & 1 << 31, 0);

    // Acknowledge the channel flag.
    bus.write::<u32>(0x1f80_10f4, 1 << 23 | 1 << 18 | 1 << 26).unwrap();

    let dicr = bus.read::<u32>(0x1f80_10f4).unwrap();
    assert_eq!(dicr & (1 << 26 | 1 << 31), 0);
}

#[test]
fn no_interrupt_when_channel_disabled() {
    let mut bus = bus();

    bus.write::<u32>(0x1f80_10f4, 1 << 23).unwrap();

    bus.write::<u32>(0x1f80_10a0, 0x1000).unwrap();
    bus.write::<u32>(0x1f80_10a4, 1).unwrap();
    bus.write::<u32>(0x1f80_10a8, 0x1100_0001).unwrap();

    assert!(!bus.io.irq.is_triggered(Irq::Dma));
}
