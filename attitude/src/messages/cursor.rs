//! Bounds-checked forward cursor over a payload

use crate::frame::FramingError;

use super::RawTriplet;

pub(crate) struct FieldCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn take(&mut self, width: usize) -> Result<&'a [u8], FramingError> {
        let end = self.offset + width;
        if end > self.data.len() {
            return Err(FramingError::TruncatedPayload {
                offset: self.offset,
                needed: width,
                available: self.data.len(),
            });
        }
        let field = &self.data[self.offset..end];
        self.offset = end;
        Ok(field)
    }

    pub(crate) fn skip(&mut self, width: usize) -> Result<(), FramingError> {
        self.take(width).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, FramingError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, FramingError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, FramingError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_triplet(&mut self) -> Result<RawTriplet, FramingError> {
        let bytes = self.take(RawTriplet::SIZE)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x11, 0x48, 0x00, 0x01, 0x02, 0x03, 0x04, 0xAA];
        let mut cursor = FieldCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x11);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0048);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x0403_0201);
        assert_eq!(cursor.offset(), 7);
        cursor.skip(1).unwrap();
        assert_eq!(cursor.offset(), 8);
    }

    #[test]
    fn test_overrun_reports_position() {
        let data = [0u8; 10];
        let mut cursor = FieldCursor::new(&data);
        cursor.skip(7).unwrap();
        assert_eq!(
            cursor.read_triplet(),
            Err(FramingError::TruncatedPayload {
                offset: 7,
                needed: 6,
                available: 10,
            })
        );
        // Failed read does not advance
        assert_eq!(cursor.offset(), 7);
    }
}
