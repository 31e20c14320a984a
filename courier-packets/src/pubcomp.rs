use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

/// Final packet of the QoS 2 handshake.
#[derive(Debug, PartialEq, Eq)]
pub struct PubCompPacket {
    pub packet_id: u16,
}

const PACKET_TYPE: u8 = 0x07;

impl Encoder for PubCompPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(2).encode(buffer);
        self.packet_id.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubCompPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("PUBCOMP reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 2 {
            return Err(Error::Malformed("PUBCOMP remaining length must be 2"));
        }

        let packet_id = u16::decode(buffer)?;
        if packet_id == 0 {
            return Err(Error::Malformed("zero packet identifier"));
        }

        Ok(PubCompPacket { packet_id })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn pubcomp_encode_decode() {
        let expected = vec![0x70, 0x02, 0x00, 0x07];

        let packet = PubCompPacket { packet_id: 7 };
        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        assert_eq!(PubCompPacket::decode(&mut bytes).expect("decode"), packet);
    }
}
