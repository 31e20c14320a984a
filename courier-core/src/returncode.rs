use core::fmt;

use bytes::{Buf, BytesMut};

use crate::{
    codec::{Decoder, Encoder},
    error::Error,
    qos::QoS,
};

/// CONNACK return code (MQTT 3.1.1, table 3.1).
///
/// Anything other than `Accepted` means the broker rejected the session
/// and will close the network connection.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ConnectReturnCode {
    #[default]
    Accepted = 0x00,
    UnacceptableProtocolVersion = 0x01,
    IdentifierRejected = 0x02,
    ServerUnavailable = 0x03,
    BadUserNameOrPassword = 0x04,
    NotAuthorized = 0x05,
}

impl ConnectReturnCode {
    pub fn is_accepted(&self) -> bool {
        *self == ConnectReturnCode::Accepted
    }
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ConnectReturnCode::*;

        match value {
            0x00 => Ok(Accepted),
            0x01 => Ok(UnacceptableProtocolVersion),
            0x02 => Ok(IdentifierRejected),
            0x03 => Ok(ServerUnavailable),
            0x04 => Ok(BadUserNameOrPassword),
            0x05 => Ok(NotAuthorized),
            _ => Err(Error::Malformed("unknown CONNACK return code")),
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectReturnCode::Accepted => "connection accepted",
            ConnectReturnCode::UnacceptableProtocolVersion => "unacceptable protocol version",
            ConnectReturnCode::IdentifierRejected => "client identifier rejected",
            ConnectReturnCode::ServerUnavailable => "server unavailable",
            ConnectReturnCode::BadUserNameOrPassword => "bad user name or password",
            ConnectReturnCode::NotAuthorized => "not authorized",
        };
        write!(f, "{}", text)
    }
}

impl Encoder for ConnectReturnCode {
    fn encode(&self, buffer: &mut BytesMut) {
        (*self as u8).encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        1
    }
}

impl Decoder for ConnectReturnCode {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        ConnectReturnCode::try_from(u8::decode(buffer)?)
    }
}

/// Per-filter result in a SUBACK payload: the granted QoS, or 0x80 when
/// the broker refused the subscription.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SubscribeReturnCode {
    Granted(QoS),
    Failure,
}

impl SubscribeReturnCode {
    pub fn is_granted(&self) -> bool {
        matches!(self, SubscribeReturnCode::Granted(_))
    }
}

impl TryFrom<u8> for SubscribeReturnCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(SubscribeReturnCode::Failure),
            qos => Ok(SubscribeReturnCode::Granted(QoS::try_from(qos)?)),
        }
    }
}

impl Encoder for SubscribeReturnCode {
    fn encode(&self, buffer: &mut BytesMut) {
        let byte = match self {
            SubscribeReturnCode::Granted(qos) => *qos as u8,
            SubscribeReturnCode::Failure => 0x80,
        };
        byte.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        1
    }
}

impl Decoder for SubscribeReturnCode {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        SubscribeReturnCode::try_from(u8::decode(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_return_code_from_u8() {
        assert_eq!(
            ConnectReturnCode::try_from(0x00),
            Ok(ConnectReturnCode::Accepted)
        );
        assert_eq!(
            ConnectReturnCode::try_from(0x05),
            Ok(ConnectReturnCode::NotAuthorized)
        );
        assert!(ConnectReturnCode::try_from(0x06).is_err());
    }

    #[test]
    fn subscribe_return_code_from_u8() {
        assert_eq!(
            SubscribeReturnCode::try_from(0x01),
            Ok(SubscribeReturnCode::Granted(QoS::AtLeastOnce))
        );
        assert_eq!(
            SubscribeReturnCode::try_from(0x80),
            Ok(SubscribeReturnCode::Failure)
        );
        assert!(SubscribeReturnCode::try_from(0x03).is_err());
    }
}
