//! Bounds-checked cursors over `u32` snapshot words.

use crate::error::CodecError;

/// Sequential writer over a word buffer.
pub struct WordWriter<'a> {
    words: &'a mut [u32],
    cursor: usize,
}

impl<'a> WordWriter<'a> {
    pub fn new(words: &'a mut [u32]) -> Self {
        Self { words, cursor: 0 }
    }

    /// Fail unless `count` more words fit.
    pub fn reserve(&self, count: usize) -> Result<(), CodecError> {
        let needed = self.cursor + count;
        if needed > self.words.len() {
            return Err(CodecError::BufferTooSmall {
                needed,
                available: self.words.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.reserve(1)?;
        self.words[self.cursor] = value;
        self.cursor += 1;
        Ok(())
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.write_u32(value as u32)
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<(), CodecError> {
        self.write_u32(value.to_bits())
    }

    /// Write `count` zero words.
    pub fn write_zeros(&mut self, count: usize) -> Result<(), CodecError> {
        self.reserve(count)?;
        self.words[self.cursor..self.cursor + count].fill(0);
        self.cursor += count;
        Ok(())
    }
}

/// Sequential reader over a word buffer.
pub struct WordReader<'a> {
    words: &'a [u32],
    cursor: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, cursor: 0 }
    }

    /// Fail unless `count` more words are available.
    pub fn require(&self, count: usize) -> Result<(), CodecError> {
        let needed = self.cursor + count;
        if needed > self.words.len() {
            return Err(CodecError::BufferTooSmall {
                needed,
                available: self.words.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Words left after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.words.len() - self.cursor
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.require(1)?;
        let value = self.words[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        self.read_u32().map(|w| w as i32)
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        self.read_u32().map(f32::from_bits)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CodecError> {
        self.require(count)?;
        self.cursor += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_and_reader_agree_on_word_order() {
        let mut buf = [0xFFFF_FFFFu32; 5];
        let mut w = WordWriter::new(&mut buf);
        w.write_i32(-3).unwrap();
        w.write_f32(1.5).unwrap();
        w.write_zeros(2).unwrap();
        w.write_u32(7).unwrap();
        assert_eq!(w.position(), 5);
        assert_eq!(buf[2], 0);

        let mut r = WordReader::new(&buf);
        assert_eq!(r.read_i32().unwrap(), -3);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        r.skip(2).unwrap();
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn overruns_report_sizes() {
        let mut buf = [0u32; 2];
        let mut w = WordWriter::new(&mut buf);
        w.write_u32(1).unwrap();
        assert_eq!(
            w.write_zeros(3),
            Err(CodecError::BufferTooSmall {
                needed: 4,
                available: 2
            })
        );

        let mut r = WordReader::new(&buf[..1]);
        r.read_u32().unwrap();
        assert!(matches!(r.read_f32(), Err(CodecError::BufferTooSmall { .. })));
    }
}
