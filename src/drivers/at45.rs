//! Atmel AT45 DataFlash client.
//!
//! The device operations are multi-step SPI conversations. Each call to
//! [`At45Device::identify`] or [`At45Device::wait_ready`] performs one step
//! and starts one SPI transfer, then returns [`Progress::Pending`]. The
//! transfer's completion re-queues the bus owner, which calls the same
//! operation again until it returns [`Progress::Done`].
//!
//! The caller must own the bus (see [`At45Device::request`]) for the whole
//! conversation, and releases it when done.

use crate::arch::Arch;
use crate::drivers::spi::{ChipSelect, SpiDevice, SpiHw, SpiMaster};
use crate::sched::{Progress, Task};
use crate::{dbg_info, dbg_warning};
use core::cell::Cell;

/// Command opcodes.
pub mod cmd {
    pub const CONTINUOUS_ARRAY_READ: u8 = 0x0b;
    pub const MAIN_MEMORY_TO_BUFFER_1_TRANSFER: u8 = 0x53;
    pub const BUFFER_1_MAIN_MEMORY_PROGRAM_WITH_ERASE: u8 = 0x83;
    pub const BUFFER_1_WRITE: u8 = 0x84;
    pub const READ_ID: u8 = 0x9f;
    pub const READ_STATUS_REG: u8 = 0xd7;
}

/// Status register: ready for the next command.
pub const STATUS_RDY: u8 = 1 << 7;
/// Status register: sector protection enabled.
pub const STATUS_PROTECT: u8 = 1 << 1;

pub const ATMEL_JEDEC_ID: u8 = 0x1f;
const FAMILY_CODE_MASK: u8 = 0xe0;
const DATAFLASH_FAMILY_CODE: u8 = 0x20;
const DENSITY_CODE_MASK: u8 = 0x1f;
const DENSITY_CODE_MIN: u8 = 2;
const DENSITY_CODE_MAX: u8 = 8;

/// Page addresses are 13 bits wide.
pub const PAGE_ADDR_MASK: u16 = (1 << 13) - 1;
/// Positions within a page are 11 bits wide.
pub const PAGE_POS_MASK: u16 = (1 << 11) - 1;

/// Device size for density code 0. Every code step doubles it.
const DENSITY_CODE_0_SIZE: u32 = 0x8000;
/// Page size for page size id 0. Every id step doubles it.
const PAGE_SIZE_ID_0_SIZE: u32 = 256;

/// Page size id by density code, AT45DB011D through AT45DB642D.
const PAGE_SIZE_ID: [u8; 9] = [0, 0, 0, 0, 0, 0, 1, 1, 2];

/// Check a manufacturer id and first device id byte.
pub fn is_valid_id(manufacturer: u8, device_id1: u8) -> bool {
    let density = device_id1 & DENSITY_CODE_MASK;
    manufacturer == ATMEL_JEDEC_ID
        && device_id1 & FAMILY_CODE_MASK == DATAFLASH_FAMILY_CODE
        && (DENSITY_CODE_MIN..=DENSITY_CODE_MAX).contains(&density)
}

/// Device size in bytes. `device_id1` must be valid.
pub fn size_of_id(device_id1: u8) -> u32 {
    DENSITY_CODE_0_SIZE << (device_id1 & DENSITY_CODE_MASK)
}

/// Page size in bytes. `device_id1` must be valid.
pub fn page_size_of_id(device_id1: u8) -> u32 {
    let density = (device_id1 & DENSITY_CODE_MASK) as usize;
    PAGE_SIZE_ID_0_SIZE << PAGE_SIZE_ID[density]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Idle,
    IdentifyFetchStatus,
    IdentifyGotStatus,
    IdentifyFetchId,
    IdentifyGotId,
    WaitFetchStatus,
    WaitGotStatus,
}

/// AT45 DataFlash on an SPI bus.
pub struct At45Device<'a, A: Arch, H: SpiHw, C: ChipSelect> {
    spi: &'a SpiMaster<'a, A, H>,
    device: SpiDevice<H::DeviceRegs, C>,
    step: Cell<Step>,
    cmdrsp: [Cell<u8>; 5],
    size: Cell<u32>,
    page_size: Cell<u32>,
    valid: Cell<bool>,
    protected: Cell<bool>,
}

impl<'a, A: Arch, H: SpiHw, C: ChipSelect> At45Device<'a, A, H, C> {
    pub fn new(spi: &'a SpiMaster<'a, A, H>, device: SpiDevice<H::DeviceRegs, C>) -> Self {
        Self {
            spi,
            device,
            step: Cell::new(Step::Idle),
            cmdrsp: Default::default(),
            size: Cell::new(0),
            page_size: Cell::new(0),
            valid: Cell::new(false),
            protected: Cell::new(false),
        }
    }

    /// Queue `task` for ownership of the bus.
    pub fn request(&self, task: &'a Task<'a, A>) -> bool {
        self.spi.request_bus(task)
    }

    /// Hand the bus to the next requester.
    pub fn release(&self) {
        self.spi.release_bus();
    }

    pub fn select(&self) {
        self.spi.select(&self.device);
    }

    pub fn deselect(&self) {
        self.spi.deselect(&self.device);
    }

    /// Whether [`identify`](Self::identify) found an AT45 device.
    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    /// Whether sector protection was enabled at identification.
    pub fn is_protected(&self) -> bool {
        self.protected.get()
    }

    /// Device size in bytes, 0 until identified.
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    /// Page size in bytes, 0 until identified.
    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// Check if no operation is half way through.
    pub fn is_idle(&self) -> bool {
        self.step.get() == Step::Idle
    }

    /// Read data into `list`. The read command must already be sent.
    pub fn read_buf_list(&'a self, list: &'a [&'a [Cell<u8>]]) {
        self.spi.read_buf_list(list);
    }

    /// Write data from `list`. The write command must already be sent.
    pub fn write_buf_list(&'a self, list: &'a [&'a [u8]]) {
        self.spi.write_buf_list(list);
    }

    /// Send the first `len` bytes of the command buffer.
    fn write_cmd(&'a self, len: usize) {
        self.spi.write_cells(&self.cmdrsp[..len]);
    }

    /// Read `len` bytes into the response buffer.
    fn read_rsp(&'a self, len: usize) {
        self.spi.read(&self.cmdrsp[..len]);
    }

    fn set_cmd(&self, bytes: [u8; 4]) {
        for (cell, byte) in self.cmdrsp.iter().zip(bytes) {
            cell.set(byte);
        }
    }

    /// Send the read status register command.
    pub fn cmd_read_status_reg(&'a self) {
        self.cmdrsp[0].set(cmd::READ_STATUS_REG);
        self.write_cmd(1);
    }

    /// Send the read manufacturer and device id command.
    pub fn cmd_read_id(&'a self) {
        self.cmdrsp[0].set(cmd::READ_ID);
        self.write_cmd(1);
    }

    /// Start a continuous read at `pos` in `page`.
    ///
    /// The data follows through [`read_buf_list`](Self::read_buf_list).
    ///
    /// # Panics
    ///
    /// Panics if `page` or `pos` does not fit its address field.
    pub fn cmd_cont_array_read(&'a self, page: u16, pos: u16) {
        assert!(page & !PAGE_ADDR_MASK == 0, "AT45 page {} out of range", page);
        assert!(pos & !PAGE_POS_MASK == 0, "AT45 page position {} out of range", pos);
        // 13 bits of page followed by 11 bits of position, then one dummy byte
        self.set_cmd([
            cmd::CONTINUOUS_ARRAY_READ,
            (page >> 5) as u8,
            ((page << 3) | (pos >> 8)) as u8,
            pos as u8,
        ]);
        self.cmdrsp[4].set(0);
        self.write_cmd(5);
    }

    /// Start writing SRAM buffer 1 at `pos`.
    ///
    /// The data follows through [`write_buf_list`](Self::write_buf_list).
    ///
    /// # Panics
    ///
    /// Panics if `pos` does not fit its address field.
    pub fn cmd_buffer_1_write(&'a self, pos: u16) {
        assert!(pos & !PAGE_POS_MASK == 0, "AT45 page position {} out of range", pos);
        self.set_cmd([cmd::BUFFER_1_WRITE, 0, (pos >> 8) as u8, pos as u8]);
        self.write_cmd(4);
    }

    /// Copy main memory `page` into SRAM buffer 1.
    ///
    /// # Panics
    ///
    /// Panics if `page` does not fit its address field.
    pub fn cmd_main_memory_to_buffer_1_transfer(&'a self, page: u16) {
        assert!(page & !PAGE_ADDR_MASK == 0, "AT45 page {} out of range", page);
        self.set_cmd([
            cmd::MAIN_MEMORY_TO_BUFFER_1_TRANSFER,
            (page >> 5) as u8,
            (page << 3) as u8,
            0,
        ]);
        self.write_cmd(4);
    }

    /// Erase main memory `page` and program it from SRAM buffer 1.
    ///
    /// # Panics
    ///
    /// Panics if `page` does not fit its address field.
    pub fn cmd_buffer_1_main_memory_program_with_erase(&'a self, page: u16) {
        assert!(page & !PAGE_ADDR_MASK == 0, "AT45 page {} out of range", page);
        self.set_cmd([
            cmd::BUFFER_1_MAIN_MEMORY_PROGRAM_WITH_ERASE,
            (page >> 5) as u8,
            (page << 3) as u8,
            0,
        ]);
        self.write_cmd(4);
    }

    /// Advance the identification sequence by one step.
    ///
    /// Reads the status register until the device is ready, then the
    /// manufacturer and device id. On completion the device is deselected
    /// and [`is_valid`](Self::is_valid), [`size`](Self::size) and
    /// [`page_size`](Self::page_size) are set.
    pub fn identify(&'a self) -> Progress {
        match self.step.get() {
            Step::IdentifyFetchStatus => {
                self.step.set(Step::IdentifyGotStatus);
                self.read_rsp(1);
            }
            Step::IdentifyGotStatus => {
                let status = self.cmdrsp[0].get();
                if status & STATUS_RDY == 0 {
                    // Still selected; the status register streams out
                    // again on every read.
                    self.read_rsp(1);
                    return Progress::Pending;
                }
                self.deselect();
                dbg_info!("at45_device: Status register: 0x{:02x}\n", status);
                self.protected.set(status & STATUS_PROTECT != 0);

                self.step.set(Step::IdentifyFetchId);
                self.select();
                self.cmd_read_id();
            }
            Step::IdentifyFetchId => {
                self.step.set(Step::IdentifyGotId);
                self.read_rsp(4);
            }
            Step::IdentifyGotId => {
                self.deselect();
                self.step.set(Step::Idle);
                self.decode_id();
                return Progress::Done;
            }
            Step::Idle => self.start_identify(),
            Step::WaitFetchStatus | Step::WaitGotStatus => {
                self.abandon("identify");
                self.start_identify();
            }
        }
        Progress::Pending
    }

    fn start_identify(&'a self) {
        self.step.set(Step::IdentifyFetchStatus);
        self.select();
        self.cmd_read_status_reg();
    }

    /// Advance the wait-until-ready sequence by one step.
    ///
    /// Each round selects the device, reads the status register once and
    /// deselects it again.
    pub fn wait_ready(&'a self) -> Progress {
        match self.step.get() {
            Step::WaitFetchStatus => {
                self.step.set(Step::WaitGotStatus);
                self.read_rsp(1);
                Progress::Pending
            }
            Step::WaitGotStatus => {
                self.deselect();
                if self.cmdrsp[0].get() & STATUS_RDY != 0 {
                    self.step.set(Step::Idle);
                    Progress::Done
                } else {
                    self.poll_status()
                }
            }
            Step::Idle => self.poll_status(),
            Step::IdentifyFetchStatus
            | Step::IdentifyGotStatus
            | Step::IdentifyFetchId
            | Step::IdentifyGotId => {
                self.abandon("wait_ready");
                self.poll_status()
            }
        }
    }

    fn poll_status(&'a self) -> Progress {
        self.step.set(Step::WaitFetchStatus);
        self.select();
        self.cmd_read_status_reg();
        Progress::Pending
    }

    /// Drop a conversation left half way through by another operation.
    fn abandon(&self, op: &str) {
        debug_assert_eq!(
            self.step.get(),
            Step::Idle,
            "AT45 {} started during another operation",
            op
        );
        dbg_warning!("at45_device: {} abandons step {:?}\n", op, self.step.get());
        self.deselect();
        self.step.set(Step::Idle);
    }

    fn decode_id(&self) {
        let [manufacturer, id1, id2, ext] = [
            self.cmdrsp[0].get(),
            self.cmdrsp[1].get(),
            self.cmdrsp[2].get(),
            self.cmdrsp[3].get(),
        ];
        dbg_info!(
            "at45_device: DataFlash information:\n  Manufacturer ID   : 0x{:02x}\n  Device ID (part 1): 0x{:02x}\n  Device ID (part 2): 0x{:02x}\n  Extended info     : 0x{:02x}\n",
            manufacturer,
            id1,
            id2,
            ext
        );

        if !is_valid_id(manufacturer, id1) {
            self.valid.set(false);
            dbg_warning!("at45_device: No valid dataflash detected!\n");
            return;
        }

        let size = size_of_id(id1);
        self.valid.set(true);
        self.size.set(size);
        self.page_size.set(page_size_of_id(id1));
        if size >= 1024 * 1024 {
            dbg_info!("  Flash size        : {} MiB\n", size / (1024 * 1024));
        } else {
            dbg_info!("  Flash size        : {} KiB\n", size / 1024);
        }
        dbg_info!("  Page size         : {}\n", self.page_size.get());
    }
}
