use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

/// Clean client shutdown notice. In MQTT 3.x this packet carries no
/// reason code and is only ever sent client to broker.
#[derive(Debug, PartialEq, Eq)]
pub struct DisconnectPacket;

const PACKET_TYPE: u8 = 0x0e;

impl Encoder for DisconnectPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(0).encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        2
    }
}

impl Decoder for DisconnectPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("DISCONNECT reserved flags must be 0"));
        }

        if VariableByteInteger::decode(buffer)?.0 != 0 {
            return Err(Error::Malformed("DISCONNECT carries no payload"));
        }

        Ok(DisconnectPacket)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn disconnect_encode_decode() {
        let expected = vec![0xe0, 0x00];

        let mut encoded = BytesMut::new();
        DisconnectPacket.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        assert_eq!(
            DisconnectPacket::decode(&mut bytes).expect("decode"),
            DisconnectPacket
        );
    }
}
