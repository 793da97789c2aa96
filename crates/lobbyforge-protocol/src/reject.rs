//! Application-level errors that are reported back to the client.
//!
//! Unlike [`ProtocolError`](crate::ProtocolError), these aren't failures of
//! the server. They are the client's request being refused ("lobby full",
//! "wrong password"). Each variant has a stable machine-readable code the
//! client UI switches on, plus a free-text description.

use crate::{ErrorPayload, Flag, Header, Packet, ProtocolError};

/// A refusal with a machine code and a description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// The payload couldn't be decoded as the expected message.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// A different packet was expected at this point (e.g. Hello first).
    #[error("expected packet: {0}")]
    ExpectedPacket(String),

    /// Client and server disagree on something that must match.
    #[error("data mismatch: {0}")]
    DataMismatch(String),

    /// The payload decoded fine but a value is out of range.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The player isn't allowed to do this right now.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("lobby not found")]
    LobbyNotFound,

    #[error("lobby full")]
    LobbyFull,

    #[error("invalid password")]
    InvalidPassword,

    #[error("already in lobby")]
    AlreadyInLobby,

    #[error("flag not recognized")]
    FlagNotRecognized,

    #[error("header not recognized")]
    HeaderNotRecognized,
}

impl AppError {
    /// The machine-readable code sent as `Message`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPacket(_) => "INVALID_PACKET",
            Self::ExpectedPacket(_) => "NO_EXPECTED_PACKET",
            Self::DataMismatch(_) => "DATA_MISMATCH",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::LobbyNotFound => "LOBBY_NOT_FOUND",
            Self::LobbyFull => "LOBBY_FULL",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::AlreadyInLobby => "ALREADY_IN_LOBBY",
            Self::FlagNotRecognized => "FLAG_NOT_RECOGNIZED",
            Self::HeaderNotRecognized => "HEADER_NOT_RECOGNIZED",
        }
    }

    /// The free-text detail sent as `Description`. Empty for variants
    /// whose code says it all.
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidPacket(d)
            | Self::ExpectedPacket(d)
            | Self::DataMismatch(d)
            | Self::InvalidData(d)
            | Self::Unauthorized(d) => d.as_str(),
            _ => "",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.code().to_string(),
            description: self.description().to_string(),
        }
    }

    /// A non-fatal rejection: Header = Rejected, Flag = None.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the payload can't be encoded.
    pub fn to_rejection(&self) -> Result<Packet, ProtocolError> {
        Packet::with_body(Header::Rejected, Flag::NONE, &self.to_payload())
    }

    /// A fatal disconnect notice: Header = Disconnecting, Flag = None.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the payload can't be encoded.
    pub fn to_disconnect(&self) -> Result<Packet, ProtocolError> {
        Packet::with_body(Header::Disconnecting, Flag::NONE, &self.to_payload())
    }
}

/// A payload that failed to decode is always the client's fault.
impl From<ProtocolError> for AppError {
    fn from(err: ProtocolError) -> Self {
        Self::InvalidPacket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_client_strings() {
        assert_eq!(AppError::ExpectedPacket("HELLO".into()).code(), "NO_EXPECTED_PACKET");
        assert_eq!(AppError::DataMismatch("VERSION".into()).code(), "DATA_MISMATCH");
        assert_eq!(AppError::LobbyFull.code(), "LOBBY_FULL");
        assert_eq!(AppError::FlagNotRecognized.code(), "FLAG_NOT_RECOGNIZED");
    }

    #[test]
    fn test_payload_carries_description() {
        let payload = AppError::InvalidData("MAX_PLAYERS_LESS_THAN_THREE".into()).to_payload();
        assert_eq!(payload.message, "INVALID_DATA");
        assert_eq!(payload.description, "MAX_PLAYERS_LESS_THAN_THREE");

        let payload = AppError::InvalidPassword.to_payload();
        assert_eq!(payload.description, "");
    }

    #[test]
    fn test_rejection_and_disconnect_headers() {
        let err = AppError::Unauthorized("NOT_IN_LOBBY".into());

        let reject = err.to_rejection().unwrap();
        assert_eq!(reject.kind().unwrap(), Header::Rejected);
        assert_eq!(reject.flag, Flag::NONE);

        let disconnect = err.to_disconnect().unwrap();
        assert_eq!(disconnect.kind().unwrap(), Header::Disconnecting);
        assert_eq!(disconnect.body::<ErrorPayload>().unwrap(), err.to_payload());
    }

    #[test]
    fn test_protocol_error_becomes_invalid_packet() {
        let err: AppError = ProtocolError::InvalidUtf8.into();
        assert_eq!(err.code(), "INVALID_PACKET");
    }
}
