//! Access key recognition.
//!
//! Fiscal QR payloads come in a few shapes depending on the issuing state: a consultation URL
//! with the key in a `p` or `chNFe` query parameter, the bare 44 digits, or free text around
//! them. [`KeyMatcher`] turns any of these into an [`AccessKey`].

mod access_key;
mod fiscal_url;
mod matcher;

pub use access_key::{validate, AccessKey, ACCESS_KEY_LEN};
pub use fiscal_url::{FiscalUrl, KeyParam};
pub use matcher::{KeyMatcher, KeyPolicy};
