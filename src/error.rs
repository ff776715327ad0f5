use thiserror::Error;

#[derive(Debug, Error)]
pub enum FramewatchError {
    #[error("unknown infraction: {0}")]
    UnknownInfraction(String),

    #[error("invalid detection limits: block_cap {block_cap}, section_cap {section_cap}")]
    InvalidLimits { block_cap: u64, section_cap: u64 },

    #[error("invalid session limit for {protocol}: {reason}")]
    InvalidSessionLimit { protocol: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, FramewatchError>;
