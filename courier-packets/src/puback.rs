use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

/// Acknowledges receipt of a QoS 1 PUBLISH.
#[derive(Debug, PartialEq, Eq)]
pub struct PubAckPacket {
    pub packet_id: u16,
}

const PACKET_TYPE: u8 = 0x04;

impl Encoder for PubAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(2).encode(buffer);
        self.packet_id.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("PUBACK reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 2 {
            return Err(Error::Malformed("PUBACK remaining length must be 2"));
        }

        let packet_id = u16::decode(buffer)?;
        if packet_id == 0 {
            return Err(Error::Malformed("zero packet identifier"));
        }

        Ok(PubAckPacket { packet_id })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn puback_encode_decode() {
        let expected = vec![0x40, 0x02, 0x00, 0x0a];

        let packet = PubAckPacket { packet_id: 10 };
        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        assert_eq!(PubAckPacket::decode(&mut bytes).expect("decode"), packet);
    }

    #[test]
    fn puback_bad_flags() {
        let mut bytes = Bytes::from(vec![0x41, 0x02, 0x00, 0x0a]);
        assert!(matches!(
            PubAckPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }
}
