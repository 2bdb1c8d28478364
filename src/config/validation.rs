//! Options validation.
//!
//! # Design Decisions
//! - Serde handles syntax; this checks the combinations make sense
//! - Checks run in a fixed order and the first failure is reported
//! - Files are not opened here; loading them is the provider's job

use thiserror::Error;

use crate::config::schema::Options;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no listen")]
    NoListen,
    #[error("no tls cert")]
    NoTlsCert,
    #[error("no tls key")]
    NoTlsKey,
    #[error("tls ca requires a certificate and key")]
    CaWithoutCertificate,
    #[error("no tokens file")]
    NoTokenFile,
}

/// Check the options are usable.
pub fn validate_options(options: &Options) -> Result<(), ValidationError> {
    if options.listen.trim().is_empty() {
        return Err(ValidationError::NoListen);
    }

    let tls = &options.tls;
    match (&tls.cert, &tls.key) {
        (None, Some(_)) => return Err(ValidationError::NoTlsCert),
        (Some(_), None) => return Err(ValidationError::NoTlsKey),
        _ => {}
    }
    if tls.ca.is_some() && !tls.is_enabled() {
        return Err(ValidationError::CaWithoutCertificate);
    }

    if options.token_file.is_none() {
        return Err(ValidationError::NoTokenFile);
    }

    Ok(())
}
