#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("blank or comment line")]
    Ignored,
    #[error("no port and no default for scheme {0:?}")]
    MissingPort(String),
    #[error("port out of range: {0}")]
    InvalidPort(String),
    #[error("unrecognized endpoint line: {0:?}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("unknown selection strategy: {0:?}")]
    UnknownStrategy(String),
}
