use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

/// Release of a QoS 2 message. The fixed-header flags are required to be
/// 0b0010; anything else is a protocol violation.
#[derive(Debug, PartialEq, Eq)]
pub struct PubRelPacket {
    pub packet_id: u16,
}

const PACKET_TYPE: u8 = 0x06;
const FIXED_FLAGS: u8 = 0x02;

impl Encoder for PubRelPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4 | FIXED_FLAGS);
        VariableByteInteger(2).encode(buffer);
        self.packet_id.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubRelPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != FIXED_FLAGS {
            return Err(Error::Malformed("PUBREL flags must be 0b0010"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 2 {
            return Err(Error::Malformed("PUBREL remaining length must be 2"));
        }

        let packet_id = u16::decode(buffer)?;
        if packet_id == 0 {
            return Err(Error::Malformed("zero packet identifier"));
        }

        Ok(PubRelPacket { packet_id })
    }
}
