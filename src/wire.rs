use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Body of a single-property `PUT`.
#[derive(Debug, Serialize)]
pub struct PropertyValue<'a, V: ?Sized> {
    pub value: &'a V,
}
