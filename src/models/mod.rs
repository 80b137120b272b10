//! Data models for vidlink.

mod link;
mod platform;
mod request;
mod result;

pub use link::{DueReason, LinkRecord};
pub use platform::{DomainMatch, PlatformDescriptor};
pub use request::{ExtractOptions, ExtractionRequest};
pub use result::{
    quality_from_name, Envelope, EnvelopeData, ExtractionResult, Failure, MediaLink, Outcome,
};
