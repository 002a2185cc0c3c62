use crate::{Error, Result};

/// Pulls the single required state code out of the process arguments (program name excluded).
pub fn state_code_from_args<I>(args: I) -> Result<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(code), None) => normalize_state_code(&code),
        _ => Err(Error::Usage),
    }
}

/// Trims and uppercases a state code. Codes are ASCII alphanumeric, e.g. `S24`.
pub fn normalize_state_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidStateCode(raw.to_string()));
    }
    Ok(code)
}
