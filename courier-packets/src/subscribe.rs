use bytes::{Buf, BufMut, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    qos::QoS,
};

/// One topic filter plus the QoS requested for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub filter: String,
    pub qos: QoS,
}

impl Encoder for SubscriptionRequest {
    fn encode(&self, buffer: &mut BytesMut) {
        self.filter.encode(buffer);
        self.qos.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        self.filter.encoded_size() + 1
    }
}

impl Decoder for SubscriptionRequest {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        Ok(SubscriptionRequest {
            filter: String::decode(buffer)?,
            qos: QoS::decode(buffer)?,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub filters: Vec<SubscriptionRequest>,
}

const PACKET_TYPE: u8 = 0x08;
const FIXED_FLAGS: u8 = 0x02;

impl Encoder for SubscribePacket {
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

impl Decoder for SubscribePacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != FIXED_FLAGS {
            return Err(Error::Malformed("SUBSCRIBE flags must be 0b0010"));
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
            filters.push(SubscriptionRequest::decode(buffer)?);
        }

        if filters.is_empty() {
            return Err(Error::Malformed("SUBSCRIBE with no filters"));
        }

        Ok(SubscribePacket { packet_id, filters })
    }
}
