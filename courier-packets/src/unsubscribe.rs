use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

#[derive(Debug, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub filters: Vec<String>,
}

const PACKET_TYPE: u8 = 0x0a;
const FIXED_FLAGS: u8 = 0x02;

impl Encoder for UnsubscribePacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4 | FIXED_FLAGS);

        let remaining_len = 2 + self.filters.encoded_size();
        VariableByteInteger(remaining_len as u32).encode(buffer);

        self.packet_id.encode(buffer);
        self.filters.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let remaining = 2 + self.filters.encoded_size();
        1 + VariableByteInteger(remaining as u32).encoded_size() + remaining
    }
}

impl Decoder for UnsubscribePacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != FIXED_FLAGS {
            return Err(Error::Malformed("UNSUBSCRIBE flags must be 0b0010"));
        }

        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len {
            return Err(Error::Incomplete);
        }

        let end = buffer.remaining() - remaining_len;

        let packet_id = u16::decode(buffer)?;
        if packet_id == 0 {
            return Err(Error::Malformed("zero packet identifier"));
        }

        let mut filters = Vec::new();
        while buffer.remaining() > end {
            filters.push(String::decode(buffer)?);
        }

        if filters.is_empty() {
            return Err(Error::Malformed("UNSUBSCRIBE with no filters"));
        }

        Ok(UnsubscribePacket { packet_id, filters })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn unsubscribe_encode_decode() {
        let expected = vec![
            0xa2, 0x07, // flags 0b0010, remaining length 7
            0x00, 0x02, // packet id 2
            0x00, 0x03, b'a', b'/', b'+',
        ];

        let packet = UnsubscribePacket {
            packet_id: 2,
            filters: vec!["a/+".into()],
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);
        assert_eq!(
            UnsubscribePacket::decode(&mut bytes).expect("decode"),
            packet
        );
    }

    #[test]
    fn unsubscribe_bad_flags_is_malformed() {
        let mut bytes = Bytes::from(vec![0xa0, 0x05, 0x00, 0x02, 0x00, 0x01, b'a']);
        assert!(matches!(
            UnsubscribePacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }
}
