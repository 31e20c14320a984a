use bytes::{Buf, BufMut, Bytes, BytesMut};

use courier_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    protocol::ProtocolVersion,
    qos::QoS,
};

/// Will message carried in the CONNECT payload, published by the broker
/// if the client disappears without a DISCONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ConnectPacket {
    pub version: ProtocolVersion,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

const PACKET_TYPE: u8 = 0x01;

impl ConnectPacket {
    fn flags_byte(&self) -> u8 {
        let mut flags: u8 = 0;

        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }
        if let Some(will) = &self.will {
            flags |= 0b0000_0100;
            flags |= (will.qos as u8) << 3;
            if will.retain {
                flags |= 0b0010_0000;
            }
        }
        if self.clean_session {
            flags |= 0b0000_0010;
        }

        flags
    }

    fn remaining_len(&self) -> usize {
        let mut len = self.version.protocol_name().to_string().encoded_size();
        len += 1; // protocol level
        len += 1; // connect flags
        len += 2; // keep alive
        len += self.client_id.encoded_size();
        if let Some(will) = &self.will {
            len += will.topic.encoded_size();
            len += will.payload.encoded_size();
        }
        len += self.username.encoded_size();
        len += self.password.encoded_size();
        len
    }
}

impl Encoder for ConnectPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(self.remaining_len() as u32).encode(buffer);

        self.version.protocol_name().to_string().encode(buffer);
        buffer.put_u8(self.version.protocol_level());
        buffer.put_u8(self.flags_byte());
        self.keep_alive.encode(buffer);

        self.client_id.encode(buffer);
        if let Some(will) = &self.will {
            will.topic.encode(buffer);
            will.payload.encode(buffer);
        }
        self.username.encode(buffer);
        self.password.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let remaining = self.remaining_len();
        1 + VariableByteInteger(remaining as u32).encoded_size() + remaining
    }
}

impl Decoder for ConnectPacket {
    fn decode<T: Buf>(buffer: &mut T) -> courier_core::Result<Self> {
        let fixed = u8::decode(buffer)?;
        if fixed & 0x0f != 0 {
            return Err(Error::Malformed("CONNECT reserved flags must be 0"));
        }

        let _remaining_len = VariableByteInteger::decode(buffer)?;

        let name = String::decode(buffer)?;
        let level = u8::decode(buffer)?;
        let version = ProtocolVersion::from_name_and_level(&name, level)
            .ok_or(Error::Malformed("unknown protocol name or level"))?;

        let flags = u8::decode(buffer)?;
        if flags & 0b0000_0001 != 0 {
            return Err(Error::Malformed("CONNECT flag bit 0 is reserved"));
        }

        let has_username = flags & 0b1000_0000 != 0;
        let has_password = flags & 0b0100_0000 != 0;
        let will_retain = flags & 0b0010_0000 != 0;
        let will_qos = (flags >> 3) & 0b0000_0011;
        let will_flag = flags & 0b0000_0100 != 0;
        let clean_session = flags & 0b0000_0010 != 0;

        if !will_flag && (will_qos != 0 || will_retain) {
            return Err(Error::Malformed("will bits set without will flag"));
        }
        if has_password && !has_username {
            return Err(Error::Malformed("password flag without username flag"));
        }

        let keep_alive = u16::decode(buffer)?;
        let client_id = String::decode(buffer)?;

        let will = if will_flag {
            Some(LastWill {
                topic: String::decode(buffer)?,
                payload: Bytes::decode(buffer)?,
                qos: QoS::try_from(will_qos)?,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = has_username.then(|| String::decode(buffer)).transpose()?;
        let password = has_password.then(|| Bytes::decode(buffer)).transpose()?;

        Ok(ConnectPacket {
            version,
            clean_session,
            keep_alive,
            client_id,
            will,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_encode_decode() {
        let expected = vec![
            0x10, 0x15, // fixed header, remaining length 21
            0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, // protocol name + level
            0xc2, // username, password, clean session
            0x00, 0x3c, // keep alive 60
            0x00, 0x03, b'a', b'b', b'c', // client id
            0x00, 0x01, b'u', // username
            0x00, 0x01, b'p', // password
        ];

        let packet = ConnectPacket {
            version: ProtocolVersion::V3_1_1,
            clean_session: true,
            keep_alive: 60,
            client_id: "abc".into(),
            will: None,
            username: Some("u".into()),
            password: Some(Bytes::from_static(b"p")),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);
        let decoded = ConnectPacket::decode(&mut bytes).expect("decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn connect_v3_1_uses_legacy_name() {
        let packet = ConnectPacket {
            version: ProtocolVersion::V3_1,
            clean_session: true,
            keep_alive: 30,
            client_id: "c".into(),
            will: None,
            username: None,
            password: None,
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        // protocol name "MQIsdp", level 3
        assert_eq!(&encoded[2..10], &[0x00, 0x06, b'M', b'Q', b'I', b's', b'd', b'p']);
        assert_eq!(encoded[10], 0x03);

        let mut bytes = encoded.freeze();
        let decoded = ConnectPacket::decode(&mut bytes).expect("decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn connect_with_will_round_trip() {
        let packet = ConnectPacket {
            version: ProtocolVersion::V3_1_1,
            clean_session: false,
            keep_alive: 10,
            client_id: "durable".into(),
            will: Some(LastWill {
                topic: "status/durable".into(),
                payload: Bytes::from_static(b"offline"),
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            username: None,
            password: None,
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(packet.encoded_size(), encoded.len());

        let mut bytes = encoded.freeze();
        let decoded = ConnectPacket::decode(&mut bytes).expect("decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn connect_password_without_username_is_malformed() {
        let mut encoded = BytesMut::new();
        ConnectPacket {
            version: ProtocolVersion::V3_1_1,
            clean_session: true,
            keep_alive: 60,
            client_id: "abc".into(),
            will: None,
            username: Some("u".into()),
            password: Some(Bytes::from_static(b"p")),
        }
        .encode(&mut encoded);

        // flip the username flag off, leaving the password flag set
        encoded[9] &= !0b1000_0000;

        let mut bytes = encoded.freeze();
        assert!(matches!(
            ConnectPacket::decode(&mut bytes),
            Err(Error::Malformed(_))
        ));
    }
}
