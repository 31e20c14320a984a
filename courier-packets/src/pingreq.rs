use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

#[derive(Debug, PartialEq, Eq)]
pub struct PingReqPacket;

const PACKET_TYPE: u8 = 0x0c;

impl Encoder for PingReqPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(0).encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        2
    }
}

impl Decoder for PingReqPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("PINGREQ reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 0 {
            return Err(Error::Malformed("PINGREQ carries no payload"));
        }

        Ok(PingReqPacket)
    }
}
