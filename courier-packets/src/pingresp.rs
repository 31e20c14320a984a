use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

#[derive(Debug, PartialEq, Eq)]
pub struct PingRespPacket;

const PACKET_TYPE: u8 = 0x0d;

impl Encoder for PingRespPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(0).encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        2
    }
}

impl Decoder for PingRespPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("PINGRESP reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 0 {
            return Err(Error::Malformed("PINGRESP carries no payload"));
        }

        Ok(PingRespPacket)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn pingresp_encode_decode() {
        let expected = vec![0xd0, 0x00];

        let mut encoded = BytesMut::new();
        PingRespPacket.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        assert_eq!(
            PingRespPacket::decode(&mut bytes).expect("decode"),
            PingRespPacket
        );
    }
}
