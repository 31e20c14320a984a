use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;

pub trait Decoder {
    fn decode<T>(buffer: &mut T) -> crate::Result<Self>
    where
        Self: Sized,
        T: Buf;
}

pub trait Encoder {
    fn encode(&self, buffer: &mut BytesMut);
    fn encoded_size(&self) -> usize;
}

/// The variable-length remaining-length field of the MQTT fixed header.
///
/// Encoded as 1 to 4 bytes of 7-bit groups, least significant first, with
/// the high bit of each byte flagging a continuation. Values above
/// 268 435 455 cannot be represented and a fifth continuation byte is
/// malformed.
#[derive(PartialEq, Eq, Debug, Default, Clone, Copy)]
pub struct VariableByteInteger(pub u32);

impl Encoder for VariableByteInteger {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut x = self.0;

        loop {
            let mut byte = (x % 128) as u8;
            x /= 128;

            if x > 0 {
                byte |= 0b1000_0000;
            }

            buffer.put_u8(byte);

            if x == 0 {
                break;
            }
        }
    }

    fn encoded_size(&self) -> usize {
        match self.0 {
            0..=127 => 1,
            128..=16_383 => 2,
            16_384..=2_097_151 => 3,
            2_097_152..=268_435_455 => 4,
            _ => unreachable!(),
        }
    }
}

impl Decoder for VariableByteInteger {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let mut multiplier: u32 = 1;
        let mut value: u32 = 0;

        loop {
            if !buffer.has_remaining() {
                return Err(Error::Incomplete);
            }

            if multiplier > 128 * 128 * 128 {
                return Err(Error::Malformed("remaining length exceeds 4 bytes"));
            }

            let byte = buffer.get_u8();
            value += (byte & 0b0111_1111) as u32 * multiplier;
            multiplier *= 128;

            if (byte & 0b1000_0000) == 0 {
                break;
            }
        }

        Ok(VariableByteInteger(value))
    }
}

impl Encoder for String {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u16(self.len() as u16);
        buffer.put(self.as_bytes());
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u16>() + self.len()
    }
}

impl Decoder for String {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        if buffer.remaining() < 2 {
            return Err(Error::Incomplete);
        }

        let length = buffer.get_u16() as usize;
        if buffer.remaining() < length {
            return Err(Error::Malformed("string length exceeds frame"));
        }

        let bytes = buffer.copy_to_bytes(length);
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Malformed("string is not UTF-8"))
    }
}

impl Encoder for u8 {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(*self);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u8>()
    }
}

impl Decoder for u8 {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        if !buffer.has_remaining() {
            return Err(Error::Incomplete);
        }

        Ok(buffer.get_u8())
    }
}

impl Encoder for u16 {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u16(*self);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u16>()
    }
}

impl Decoder for u16 {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        if buffer.remaining() < 2 {
            return Err(Error::Incomplete);
        }

        Ok(buffer.get_u16())
    }
}

/// Length-prefixed binary data, used for the password and will payload
/// fields of CONNECT.
impl Encoder for Bytes {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u16(self.len() as u16);
        buffer.extend_from_slice(self);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u16>() + self.len()
    }
}

impl Decoder for Bytes {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        if buffer.remaining() < 2 {
            return Err(Error::Incomplete);
        }

        let length = buffer.get_u16() as usize;
        if buffer.remaining() < length {
            return Err(Error::Malformed("binary field length exceeds frame"));
        }

        Ok(buffer.copy_to_bytes(length))
    }
}

impl<T> Encoder for Option<T>
where
    T: Encoder,
{
    fn encode(&self, buffer: &mut BytesMut) {
        if let Some(v) = self {
            v.encode(buffer);
        }
    }

    fn encoded_size(&self) -> usize {
        self.as_ref().map_or(0, Encoder::encoded_size)
    }
}

impl<T> Encoder for Vec<T>
where
    T: Encoder,
{
    fn encode(&self, buffer: &mut BytesMut) {
        for e in self {
            e.encode(buffer);
        }
    }

    fn encoded_size(&self) -> usize {
        self.iter().map(Encoder::encoded_size).sum()
    }
}
