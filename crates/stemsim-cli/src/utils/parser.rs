use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' is not a number.")]
    InvalidNumber(String),

    #[error("Invalid position '{0}'. Expected 'X,Y' in Å (e.g., '1.5,-0.25').")]
    InvalidPosition(String),

    #[error("'{command}' expects {expected}.")]
    WrongArity {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Unknown command '{0}'. Type 'help' for the list of commands.")]
    UnknownCommand(String),
}

pub fn parse_number(token: &str) -> Result<f64, ParseError> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(token.trim().to_string()))
}

/// Parses `X,Y` (Å). Used as a clap value parser.
pub fn parse_position(text: &str) -> Result<[f64; 2], ParseError> {
    let invalid = || ParseError::InvalidPosition(text.to_string());
    let (x, y) = text.split_once(',').ok_or_else(invalid)?;
    let x = parse_number(x).map_err(|_| invalid())?;
    let y = parse_number(y).map_err(|_| invalid())?;
    Ok([x, y])
}
