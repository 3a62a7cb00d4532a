//! Request extractors whose rejections use the standard error envelope.

mod json;

pub use json::JsonObject;
