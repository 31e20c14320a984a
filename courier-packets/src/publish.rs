use bytes::{Buf, BufMut, Bytes, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    qos::QoS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present exactly when `qos` is above `AtMostOnce`.
    pub packet_id: Option<u16>,
    /// Raw payload; fills the rest of the frame and may be empty.
    pub payload: Bytes,
}

const PACKET_TYPE: u8 = 0x03;

impl PublishPacket {
    fn remaining_len(&self) -> usize {
        let mut len = self.topic.encoded_size();
        if self.packet_id.is_some() {
            len += 2;
        }
        len + self.payload.len()
    }
}

impl Encoder for PublishPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut fixed = PACKET_TYPE << 4;
        if self.dup {
            fixed |= 0b0000_1000;
        }
        fixed |= (self.qos as u8) << 1;
        if self.retain {
            fixed |= 0b0000_0001;
        }
        buffer.put_u8(fixed);

        VariableByteInteger(self.remaining_len() as u32).encode(buffer);

        self.topic.encode(buffer);
        self.packet_id.encode(buffer);
        buffer.extend_from_slice(&self.payload);
    }

    fn encoded_size(&self) -> usize {
        let remaining = self.remaining_len();
        1 + VariableByteInteger(remaining as u32).encoded_size() + remaining
    }
}

impl Decoder for PublishPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        let dup = fixed & 0b0000_1000 != 0;
        let qos = QoS::try_from((fixed >> 1) & 0b0000_0011)?;
        let retain = fixed & 0b0000_0001 != 0;

        if dup && qos == QoS::AtMostOnce {
            return Err(Error::Malformed("DUP set on a QoS 0 publish"));
        }

        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len {
            return Err(Error::Incomplete);
        }

        let before = buffer.remaining();
        let topic = String::decode(buffer)?;

        let packet_id = if qos > QoS::AtMostOnce {
            let id = u16::decode(buffer)?;
            if id == 0 {
                return Err(Error::Malformed("zero packet identifier"));
            }
            Some(id)
        } else {
            None
        };

        let header_len = before - buffer.remaining();
        let payload_len = remaining_len
            .checked_sub(header_len)
            .ok_or(Error::Malformed("PUBLISH remaining length too short"))?;

        Ok(PublishPacket {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload: buffer.copy_to_bytes(payload_len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_qos1_encode_decode() {
        let expected = vec![
            0x32, 0x0c, // QoS 1, remaining length 12
            0x00, 0x03, b'a', b'/', b'b', // topic
            0x00, 0x0a, // packet id 10
            b'h', b'e', b'l', b'l', b'o',
        ];

        let packet = PublishPacket {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: "a/b".into(),
            packet_id: Some(10),
            payload: Bytes::from_static(b"hello"),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);
        assert_eq!(PublishPacket::decode(&mut bytes).expect("decode"), packet);
    }

    #[test]
    fn publish_qos0_empty_payload() {
        let expected = vec![0x31, 0x05, 0x00, 0x03, b'a', b'/', b'b'];

        let packet = PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic: "a/b".into(),
            packet_id: None,
            payload: Bytes::new(),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let decoded = PublishPacket::decode(&mut bytes).expect("decode");
        assert!(decoded.payload.is_empty());
        assert!(decoded.retain);
    }

    #[test]
    fn publish_invalid_qos_is_malformed() {
        let mut bytes = Bytes::from(vec![0x36, 0x05, 0x00, 0x03, b'a', b'/', b'b']);
        assert!(matches!(
            PublishPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn publish_dup_on_qos0_is_malformed() {
        let mut bytes = Bytes::from(vec![0x38, 0x05, 0x00, 0x03, b'a', b'/', b'b']);
        assert!(matches!(
            PublishPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn publish_zero_packet_id_is_malformed() {
        let mut bytes = Bytes::from(vec![0x32, 0x07, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x00]);
        assert!(matches!(
            PublishPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }
}
