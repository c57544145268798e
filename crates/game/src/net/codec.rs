use glam::Vec2;

use super::protocol::PacketError;

// Everything travels little-endian. On little-endian hosts the conversions
// below compile down to plain copies.

/// Cursor over a caller-owned send buffer.
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Writer over an already encoded datagram, positioned at its end.
    pub fn filled(buf: &'a mut [u8]) -> Self {
        let cursor = buf.len();
        Self { buf, cursor }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    fn reserve(&mut self, len: usize) -> Result<&mut [u8], PacketError> {
        let end = self.cursor + len;
        if end > self.buf.len() {
            return Err(PacketError::Overflow {
                needed: end,
                capacity: self.buf.len(),
            });
        }
        let slice = &mut self.buf[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), PacketError> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), PacketError> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), PacketError> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_vec2(&mut self, value: Vec2) -> Result<(), PacketError> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)
    }

    /// Length prefix followed by one u32 per id.
    pub fn write_ids(&mut self, ids: &[u32]) -> Result<(), PacketError> {
        self.write_u32(ids.len() as u32)?;
        ids.iter().try_for_each(|&id| self.write_u32(id))
    }

    /// Overwrites an already written byte without moving the cursor.
    pub fn patch_u8(&mut self, offset: usize, value: u8) -> Result<(), PacketError> {
        if offset >= self.cursor {
            return Err(PacketError::Overflow {
                needed: offset + 1,
                capacity: self.cursor,
            });
        }
        self.buf[offset] = value;
        Ok(())
    }

    /// Overwrites an already written u32 without moving the cursor.
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<(), PacketError> {
        if offset + 4 > self.cursor {
            return Err(PacketError::Overflow {
                needed: offset + 4,
                capacity: self.cursor,
            });
        }
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Cursor over a received datagram. Reads past the end fail instead of panicking.
pub struct WireReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn take<const LEN: usize>(&mut self) -> Result<[u8; LEN], PacketError> {
        let end = self.cursor + LEN;
        let bytes = self
            .data
            .get(self.cursor..end)
            .ok_or(PacketError::Truncated {
                needed: end,
                len: self.data.len(),
            })?;
        self.cursor = end;
        let mut out = [0u8; LEN];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, PacketError> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, PacketError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    /// Reads a record count and checks that `count` records of `record_size`
    /// bytes fit in what is left, and that `count <= max`.
    pub fn read_count(&mut self, record_size: usize, max: usize) -> Result<usize, PacketError> {
        let count = self.read_u32()? as usize;
        if count > max {
            return Err(PacketError::CountOutOfRange { count, max });
        }
        let needed = count * record_size;
        if needed > self.remaining() {
            return Err(PacketError::Truncated {
                needed: self.cursor + needed,
                len: self.data.len(),
            });
        }
        Ok(count)
    }

    pub fn read_ids(&mut self, max: usize) -> Result<Vec<u32>, PacketError> {
        let count = self.read_count(4, max)?;
        (0..count).map(|_| self.read_u32()).collect()
    }
}
