//! Flash access abstraction
//!
//! Wraps the raw non-volatile memory device behind asynchronous erase,
//! write, and read primitives plus geometry queries. NOR flash must be
//! erased (to 0xFF) before it can be programmed, the erase granularity
//! (a page) is much larger than the program granularity (a word), and
//! there is no read-modify-write. Callers own those ordering rules; this
//! layer only moves bytes.
//!
//! Exactly one operation may be in flight at a time. The trait takes
//! `&mut self` on every operation, so a second operation cannot be issued
//! while one is pending - the compiler enforces what the original
//! hardware never did.

/// Errors from raw flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Address or length falls outside the managed region
    OutOfBounds,
    /// Address or length not aligned to the required unit
    Unaligned,
    /// The controller reported a hardware failure
    Io,
}

/// Asynchronous raw flash driver
///
/// Implementations manage one contiguous span of flash,
/// `[start_address, end_address)`. Addresses passed to the operations are
/// absolute. Completion of an operation is observed by awaiting it; the
/// driver never retries - retry policy belongs to callers.
pub trait FlashDriver {
    /// Erase `pages` pages starting at `address`
    ///
    /// `address` must be page-aligned. Erased bytes read back as 0xFF.
    fn erase(
        &mut self,
        address: u32,
        pages: u32,
    ) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Program `data` at `address`
    ///
    /// The target range must have been erased since it was last
    /// programmed. `address` and `data.len()` must be multiples of
    /// [`program_unit`](Self::program_unit).
    fn write(
        &mut self,
        address: u32,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Read `out.len()` bytes from `address`
    fn read(
        &mut self,
        address: u32,
        out: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Erase granularity in bytes
    fn page_size(&self) -> u32;

    /// Program granularity in bytes
    fn program_unit(&self) -> u32;

    /// First address of the managed region
    fn start_address(&self) -> u32;

    /// One past the last address of the managed region
    fn end_address(&self) -> u32;

    /// Block until the controller is idle
    ///
    /// Only for initialization and self-test paths; the asynchronous
    /// operations above must be used everywhere else.
    fn wait_ready(&mut self);

    /// Total bytes available in the managed region
    fn usable_bytes(&self) -> u32 {
        self.end_address() - self.start_address()
    }

    /// Number of pages needed to cover `size` bytes
    fn bytes_to_pages(&self, size: u32) -> u32 {
        size.div_ceil(self.page_size())
    }

    /// `size` rounded up to a whole number of pages
    fn flash_byte_size(&self, size: u32) -> u32 {
        self.bytes_to_pages(size) * self.page_size()
    }

    /// `size` rounded up to a whole number of program units
    fn program_size(&self, size: u32) -> u32 {
        let unit = self.program_unit();
        size.div_ceil(unit) * unit
    }
}
