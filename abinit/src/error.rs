use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbinitError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input Parse Error: {0}")]
    Parse(String),

    #[error("Variable '{0}' not found in the input")]
    MissingVariable(String),

    #[error("Output Scan Error: {0}")]
    Output(String),
}

pub type AbinitResult<T> = Result<T, AbinitError>;
