//! Request-to-identifier mappers.
//!
//! A mapper decides which bucket a request counts against. Errors fail closed: the
//! middleware answers 500 and records nothing.

use crate::error::MapperError;
use http::header::HeaderName;
use http::Request;

/// Identifier used by [`global`].
pub const GLOBAL_ID: u64 = 0;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash of `key`, for callers that throttle by user id,
/// API key or address.
pub fn identifier_for(key: &str) -> u64 {
    key.bytes().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Every request shares one bucket.
pub fn global<B>() -> impl Fn(&Request<B>) -> Result<u64, MapperError> + Send + Sync + Clone {
    |_req: &Request<B>| Ok(GLOBAL_ID)
}

/// Bucket by the value of header `name`, e.g. `x-real-ip` behind a proxy.
///
/// A missing or non-text header is a [`MapperError`].
pub fn header<B>(
    name: HeaderName,
) -> impl Fn(&Request<B>) -> Result<u64, MapperError> + Send + Sync + Clone {
    move |req: &Request<B>| {
        let value = req
            .headers()
            .get(&name)
            .ok_or_else(|| MapperError::MissingHeader(name.to_string()))?;
        let text = value.to_str().map_err(|_| MapperError::InvalidHeader(name.to_string()))?;
        Ok(identifier_for(text.trim()))
    }
}
