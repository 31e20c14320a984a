use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

/// First acknowledgement of a QoS 2 PUBLISH (assured receipt).
#[derive(Debug, PartialEq, Eq)]
pub struct PubRecPacket {
    pub packet_id: u16,
}

const PACKET_TYPE: u8 = 0x05;

impl Encoder for PubRecPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(2).encode(buffer);
        self.packet_id.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubRecPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("PUBREC reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 2 {
            return Err(Error::Malformed("PUBREC remaining length must be 2"));
        }

        let packet_id = u16::decode(buffer)?;
        if packet_id == 0 {
            return Err(Error::Malformed("zero packet identifier"));
        }

        Ok(PubRecPacket { packet_id })
    }
}
