use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    returncode::ConnectReturnCode,
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConnAckPacket {
    /// Broker resumed a stored session for this client id.
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

const PACKET_TYPE: u8 = 0x02;

impl Encoder for ConnAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(2).encode(buffer);
        buffer.put_u8(self.session_present as u8);
        self.return_code.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for ConnAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("CONNACK reserved flags must be 0"));
        }

        let remaining_len = VariableByteInteger::decode(buffer)?;
        if remaining_len.0 != 2 {
            return Err(Error::Malformed("CONNACK remaining length must be 2"));
        }

        let ack_flags = u8::decode(buffer)?;
        if ack_flags & 0b1111_1110 != 0 {
            return Err(Error::Malformed("CONNACK acknowledge flags must be 0 or 1"));
        }

        Ok(ConnAckPacket {
            session_present: ack_flags & 0b0000_0001 != 0,
            return_code: ConnectReturnCode::decode(buffer)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn connack_encode_decode() {
        let expected = vec![0x20, 0x02, 0x00, 0x00];

        let packet = ConnAckPacket {
            session_present: false,
            return_code: ConnectReturnCode::Accepted,
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        assert_eq!(ConnAckPacket::decode(&mut bytes).expect("decode"), packet);
    }

    #[test]
    fn connack_refused() {
        let mut bytes = Bytes::from(vec![0x20, 0x02, 0x00, 0x04]);
        let packet = ConnAckPacket::decode(&mut bytes).expect("decode");
        assert_eq!(packet.return_code, ConnectReturnCode::BadUserNameOrPassword);
        assert!(!packet.return_code.is_accepted());
    }

    #[test]
    fn connack_bad_ack_flags() {
        let mut bytes = Bytes::from(vec![0x20, 0x02, 0x02, 0x00]);
        assert!(matches!(
            ConnAckPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }
}
