use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    returncode::SubscribeReturnCode,
};

/// Broker response to SUBSCRIBE: one return code per requested filter,
/// in order.
#[derive(Debug, PartialEq, Eq)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub return_codes: Vec<SubscribeReturnCode>,
}

const PACKET_TYPE: u8 = 0x09;

impl Encoder for SubAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);

        let remaining_len = 2 + self.return_codes.encoded_size();
        VariableByteInteger(remaining_len as u32).encode(buffer);

        self.packet_id.encode(buffer);
        self.return_codes.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let remaining = 2 + self.return_codes.encoded_size();
        1 + VariableByteInteger(remaining as u32).encoded_size() + remaining
    }
}

impl Decoder for SubAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("SUBACK reserved flags must be 0"));
        }

        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len {
            return Err(Error::Incomplete);
        }

        let end = buffer.remaining() - remaining_len;

        let packet_id = u16::decode(buffer)?;

        let mut return_codes = Vec::new();
        while buffer.remaining() > end {
            return_codes.push(SubscribeReturnCode::decode(buffer)?);
        }

        if return_codes.is_empty() {
            return Err(Error::Malformed("SUBACK with no return codes"));
        }

        Ok(SubAckPacket {
            packet_id,
            return_codes,
        })
    }
}
