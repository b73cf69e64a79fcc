use thiserror::Error;

/// Why a link could not be brought up, or why it went away.
///
/// The display form is the reason string handed to callers.
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum LinkError {
    /// The network id does not resolve to a SIM, modem and context.
    #[error("no_network")]
    NoNetwork,
    /// The context dropped or disappeared once the link was up.
    #[error("network_error")]
    NetworkError,
}

impl LinkError {
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NoNetwork => "no_network",
            Self::NetworkError => "network_error",
        }
    }
}
