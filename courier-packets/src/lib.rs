pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

use bytes::BytesMut;

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    Result,
};

use crate::{
    connack::ConnAckPacket, connect::ConnectPacket, disconnect::DisconnectPacket,
    pingreq::PingReqPacket, pingresp::PingRespPacket, puback::PubAckPacket,
    pubcomp::PubCompPacket, publish::PublishPacket, pubrec::PubRecPacket, pubrel::PubRelPacket,
    suback::SubAckPacket, subscribe::SubscribePacket, unsuback::UnsubAckPacket,
    unsubscribe::UnsubscribePacket,
};

/// A complete MQTT 3.x control packet.
#[derive(PartialEq, Eq, Debug)]
pub enum ControlPacket {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
}

#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PacketType {
    Connect = 0x01,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use PacketType::*;

        let res = match value {
            0x01 => Connect,
            0x02 => ConnAck,
            0x03 => Publish,
            0x04 => PubAck,
            0x05 => PubRec,
            0x06 => PubRel,
            0x07 => PubComp,
            0x08 => Subscribe,
            0x09 => SubAck,
            0x0a => Unsubscribe,
            0x0b => UnsubAck,
            0x0c => PingReq,
            0x0d => PingResp,
            0x0e => Disconnect,
            _ => return Err(Error::Malformed("reserved packet type")),
        };

        Ok(res)
    }
}

impl ControlPacket {
    /// Reports whether `src` starts with one complete frame.
    ///
    /// Returns `Err(Incomplete)` when more bytes are needed, without
    /// consuming anything. A malformed remaining-length field is fatal.
    pub fn check(src: &BytesMut) -> Result<()> {
        if src.is_empty() {
            return Err(Error::Incomplete);
        }

        let mut peeker: &[u8] = &src[1..];
        let remaining_len = VariableByteInteger::decode(&mut peeker)?;

        let frame_len = 1 + remaining_len.encoded_size() + remaining_len.0 as usize;
        if src.len() >= frame_len {
            Ok(())
        } else {
            Err(Error::Incomplete)
        }
    }

    /// Decodes one packet from the front of `src`, consuming exactly the
    /// frame. Callers should ensure a full frame is present with
    /// [`ControlPacket::check`] first.
    pub fn parse(src: &mut BytesMut) -> Result<ControlPacket> {
        use ControlPacket::*;

        if src.is_empty() {
            return Err(Error::Incomplete);
        }

        let packet = match PacketType::try_from(src[0] >> 4)? {
            PacketType::Connect => Connect(ConnectPacket::decode(src)?),
            PacketType::ConnAck => ConnAck(ConnAckPacket::decode(src)?),
            PacketType::Publish => Publish(PublishPacket::decode(src)?),
            PacketType::PubAck => PubAck(PubAckPacket::decode(src)?),
            PacketType::PubRec => PubRec(PubRecPacket::decode(src)?),
            PacketType::PubRel => PubRel(PubRelPacket::decode(src)?),
            PacketType::PubComp => PubComp(PubCompPacket::decode(src)?),
            PacketType::Subscribe => Subscribe(SubscribePacket::decode(src)?),
            PacketType::SubAck => SubAck(SubAckPacket::decode(src)?),
            PacketType::Unsubscribe => Unsubscribe(UnsubscribePacket::decode(src)?),
            PacketType::UnsubAck => UnsubAck(UnsubAckPacket::decode(src)?),
            PacketType::PingReq => PingReq(PingReqPacket::decode(src)?),
            PacketType::PingResp => PingResp(PingRespPacket::decode(src)?),
            PacketType::Disconnect => Disconnect(DisconnectPacket::decode(src)?),
        };

        Ok(packet)
    }
}

impl Encoder for ControlPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        use ControlPacket::*;

        match self {
            Connect(p) => p.encode(buffer),
            ConnAck(p) => p.encode(buffer),
            Publish(p) => p.encode(buffer),
            PubAck(p) => p.encode(buffer),
            PubRec(p) => p.encode(buffer),
            PubRel(p) => p.encode(buffer),
            PubComp(p) => p.encode(buffer),
            Subscribe(p) => p.encode(buffer),
            SubAck(p) => p.encode(buffer),
            Unsubscribe(p) => p.encode(buffer),
            UnsubAck(p) => p.encode(buffer),
            PingReq(p) => p.encode(buffer),
            PingResp(p) => p.encode(buffer),
            Disconnect(p) => p.encode(buffer),
        }
    }

    fn encoded_size(&self) -> usize {
        use ControlPacket::*;

        match self {
            Connect(p) => p.encoded_size(),
            ConnAck(p) => p.encoded_size(),
            Publish(p) => p.encoded_size(),
            PubAck(p) => p.encoded_size(),
            PubRec(p) => p.encoded_size(),
            PubRel(p) => p.encoded_size(),
            PubComp(p) => p.encoded_size(),
            Subscribe(p) => p.encoded_size(),
            SubAck(p) => p.encoded_size(),
            Unsubscribe(p) => p.encoded_size(),
            UnsubAck(p) => p.encoded_size(),
            PingReq(p) => p.encoded_size(),
            PingResp(p) => p.encoded_size(),
            Disconnect(p) => p.encoded_size(),
        }
    }
}
