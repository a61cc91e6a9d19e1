use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Missing parameter: {name}")]
    MissingParam { name: String },

    #[error("Parameter {name} out of range ({what}): {value}")]
    OutOfRange {
        name: String,
        value: f64,
        what: &'static str,
    },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
