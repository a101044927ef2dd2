//! Physical memory with tracer hooks.
//!
//! [`Memory`] owns a single contiguous buffer mapped at a fixed guest base.
//! Typed loads and stores either bypass observers entirely (`read`/`write`,
//! used by inspection commands) or run through the traced path
//! (`read_traced`/`write_traced`, used by instruction semantics), which
//! additionally fires any [`MemTracer`] whose span contains the accessed
//! address. This is the sole mechanism debugger watchpoints are built on.

use std::fmt;

use log::trace;

use crate::error::{Error, Result};
use crate::isa::{Word, MEM_BASE, MEM_SIZE};

/// An observer fired when a traced access falls within its address span.
pub struct MemTracer {
    id: u32,
    lo: Word,
    hi: Word,
    callback: Box<dyn FnMut(Word, Word, u8)>,
}

impl MemTracer {
    /// Constructs a tracer over the inclusive span `[lo, hi]`.
    ///
    /// `callback` receives `(vaddr, data, width_in_bytes)` for each traced
    /// access whose address falls within the span.
    pub fn new(lo: Word, hi: Word, callback: impl FnMut(Word, Word, u8) + 'static) -> Self {
        Self { id: 0, lo, hi, callback: Box::new(callback) }
    }

    /// Inclusive address span watched by this tracer.
    #[must_use]
    pub fn span(&self) -> (Word, Word) {
        (self.lo, self.hi)
    }

    /// Id assigned to this tracer once registered.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    fn contains(&self, addr: Word) -> bool {
        (self.lo..=self.hi).contains(&addr)
    }
}

impl fmt::Debug for MemTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTracer")
            .field("id", &self.id)
            .field("lo", &self.lo)
            .field("hi", &self.hi)
            .finish_non_exhaustive()
    }
}

/// The emulated physical memory region.
pub struct Memory {
    buf: Box<[u8]>,
    read_tracers: Vec<MemTracer>,
    write_tracers: Vec<MemTracer>,
    next_id: u32,
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.buf.len())
            .field("read_tracers", &self.read_tracers.len())
            .field("write_tracers", &self.write_tracers.len())
            .finish()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Constructs a zero-initialized memory region of the standard size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; MEM_SIZE as usize].into_boxed_slice(),
            read_tracers: Vec::new(),
            write_tracers: Vec::new(),
            next_id: 0,
        }
    }

    /// Loads a byte slice verbatim starting at the guest base address.
    ///
    /// Used by the minimal raw-image loader; not part of the traced
    /// instruction-facing API.
    ///
    /// # Errors
    ///
    /// Errors if `image` does not fit within the mapped region.
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > self.buf.len() {
            return Err(Error::invalid_address(MEM_BASE + image.len() as Word));
        }
        self.buf[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Returns whether `addr` falls within the mapped region.
    #[must_use]
    pub fn is_valid_addr(&self, addr: Word) -> bool {
        addr >= MEM_BASE && (addr - MEM_BASE) < MEM_SIZE
    }

    /// Returns whether the inclusive span `[lo, hi]` falls entirely within
    /// the mapped region.
    #[must_use]
    pub fn is_valid_span(&self, lo: Word, hi: Word) -> bool {
        lo <= hi && self.is_valid_addr(lo) && self.is_valid_addr(hi)
    }

    fn offset(&self, addr: Word) -> Result<usize> {
        if !self.is_valid_addr(addr) {
            return Err(Error::invalid_address(addr));
        }
        Ok((addr - MEM_BASE) as usize)
    }

    /// Reads an untraced byte.
    ///
    /// # Errors
    ///
    /// Errors if `addr` is outside the mapped region.
    pub fn read8(&self, addr: Word) -> Result<u8> {
        let off = self.offset(addr)?;
        Ok(self.buf[off])
    }

    /// Reads an untraced little-endian halfword.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn read16(&self, addr: Word) -> Result<u16> {
        let lo = self.read8(addr)?;
        let hi = self.read8(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Reads an untraced little-endian word.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn read32(&self, addr: Word) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read8(addr.wrapping_add(i as Word))?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Writes an untraced byte.
    ///
    /// # Errors
    ///
    /// Errors if `addr` is outside the mapped region.
    pub fn write8(&mut self, addr: Word, data: u8) -> Result<()> {
        let off = self.offset(addr)?;
        self.buf[off] = data;
        Ok(())
    }

    /// Writes an untraced little-endian halfword.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn write16(&mut self, addr: Word, data: u16) -> Result<()> {
        let [lo, hi] = data.to_le_bytes();
        self.write8(addr, lo)?;
        self.write8(addr.wrapping_add(1), hi)?;
        Ok(())
    }

    /// Writes an untraced little-endian word.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn write32(&mut self, addr: Word, data: u32) -> Result<()> {
        for (i, b) in data.to_le_bytes().into_iter().enumerate() {
            self.write8(addr.wrapping_add(i as Word), b)?;
        }
        Ok(())
    }

    /// Reads a traced byte, firing any matching read tracers.
    ///
    /// # Errors
    ///
    /// Errors if `addr` is outside the mapped region.
    pub fn read8_traced(&mut self, addr: Word) -> Result<u8> {
        let v = self.read8(addr)?;
        self.fire_read(addr, Word::from(v), 1);
        Ok(v)
    }

    /// Reads a traced little-endian halfword, firing any matching read
    /// tracers.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn read16_traced(&mut self, addr: Word) -> Result<u16> {
        let v = self.read16(addr)?;
        self.fire_read(addr, Word::from(v), 2);
        Ok(v)
    }

    /// Reads a traced little-endian word, firing any matching read tracers.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn read32_traced(&mut self, addr: Word) -> Result<u32> {
        let v = self.read32(addr)?;
        self.fire_read(addr, v, 4);
        Ok(v)
    }

    /// Writes a traced byte, firing any matching write tracers.
    ///
    /// # Errors
    ///
    /// Errors if `addr` is outside the mapped region.
    pub fn write8_traced(&mut self, addr: Word, data: u8) -> Result<()> {
        self.write8(addr, data)?;
        self.fire_write(addr, Word::from(data), 1);
        Ok(())
    }

    /// Writes a traced little-endian halfword, firing any matching write
    /// tracers.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn write16_traced(&mut self, addr: Word, data: u16) -> Result<()> {
        self.write16(addr, data)?;
        self.fire_write(addr, Word::from(data), 2);
        Ok(())
    }

    /// Writes a traced little-endian word, firing any matching write
    /// tracers.
    ///
    /// # Errors
    ///
    /// Errors if any byte of the access is outside the mapped region.
    pub fn write32_traced(&mut self, addr: Word, data: u32) -> Result<()> {
        self.write32(addr, data)?;
        self.fire_write(addr, data, 4);
        Ok(())
    }

    fn fire_read(&mut self, addr: Word, data: Word, width: u8) {
        for tracer in &mut self.read_tracers {
            if tracer.contains(addr) {
                trace!("read tracer {} fired at {addr:#010x}", tracer.id);
                (tracer.callback)(addr, data, width);
            }
        }
    }

    fn fire_write(&mut self, addr: Word, data: Word, width: u8) {
        for tracer in &mut self.write_tracers {
            if tracer.contains(addr) {
                trace!("write tracer {} fired at {addr:#010x}", tracer.id);
                (tracer.callback)(addr, data, width);
            }
        }
    }

    /// Reserves the next tracer id without registering a tracer.
    ///
    /// Lets a caller build a tracer whose callback needs to know its own id
    /// (as watchpoints do, to print `[Watchpoint <id>]: ...`) before handing
    /// it to [`Memory::add_write_tracer_with_id`].
    pub fn reserve_tracer_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Registers a write tracer under a previously [reserved](Self::reserve_tracer_id) id.
    pub fn add_write_tracer_with_id(&mut self, id: u32, mut tracer: MemTracer) {
        tracer.id = id;
        self.write_tracers.push(tracer);
    }

    /// Registers a read tracer, returning its assigned id.
    pub fn add_read_tracer(&mut self, mut tracer: MemTracer) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        tracer.id = id;
        self.read_tracers.push(tracer);
        id
    }

    /// Registers a write tracer, returning its assigned id.
    pub fn add_write_tracer(&mut self, mut tracer: MemTracer) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        tracer.id = id;
        self.write_tracers.push(tracer);
        id
    }

    /// Removes the read tracer with the given id, if any.
    pub fn remove_read_tracer(&mut self, id: u32) {
        self.read_tracers.retain(|t| t.id != id);
    }

    /// Removes the write tracer with the given id, if any.
    pub fn remove_write_tracer(&mut self, id: u32) {
        self.write_tracers.retain(|t| t.id != id);
    }

    /// Number of currently registered write tracers, for test assertions.
    #[must_use]
    pub fn write_tracer_count(&self) -> usize {
        self.write_tracers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn read_write_roundtrip() {
        let mut mem = Memory::new();
        mem.write32(MEM_BASE, 0xCAFE_BABE).unwrap();
        assert_eq!(mem.read32(MEM_BASE).unwrap(), 0xCAFE_BABE);
        mem.write8(MEM_BASE + 4, 0xAB).unwrap();
        assert_eq!(mem.read8(MEM_BASE + 4).unwrap(), 0xAB);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mem = Memory::new();
        assert!(mem.read8(MEM_BASE - 1).is_err());
        assert!(mem.read8(MEM_BASE + MEM_SIZE).is_err());
    }

    #[test]
    fn write_tracer_fires_on_traced_write_only() {
        let mut mem = Memory::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let hits_cb = Rc::clone(&hits);
        let tracer = MemTracer::new(MEM_BASE, MEM_BASE + 3, move |addr, data, width| {
            hits_cb.borrow_mut().push((addr, data, width));
        });
        mem.add_write_tracer(tracer);
        mem.write32(MEM_BASE, 1).unwrap();
        assert!(hits.borrow().is_empty());
        mem.write32_traced(MEM_BASE, 0xDEAD_BEEF).unwrap();
        assert_eq!(hits.borrow().as_slice(), &[(MEM_BASE, 0xDEAD_BEEF, 4)]);
    }

    #[test]
    fn removing_tracer_restores_registry_size() {
        let mut mem = Memory::new();
        let id = mem.add_write_tracer(MemTracer::new(MEM_BASE, MEM_BASE, |_, _, _| {}));
        assert_eq!(mem.write_tracer_count(), 1);
        mem.remove_write_tracer(id);
        assert_eq!(mem.write_tracer_count(), 0);
    }
}
