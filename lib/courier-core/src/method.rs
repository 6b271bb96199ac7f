//! HTTP method types.

use derive_more::Display;

/// HTTP request method.
///
/// Only the verbs the backend APIs accept are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum Method {
    /// GET method - retrieve a resource.
    #[default]
    #[display("GET")]
    Get,
    /// POST method - create a resource.
    #[display("POST")]
    Post,
    /// PUT method - replace a resource.
    #[display("PUT")]
    Put,
    /// PATCH method - partially update a resource.
    #[display("PATCH")]
    Patch,
    /// DELETE method - remove a resource.
    #[display("DELETE")]
    Delete,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn method_into_http() {
        assert_eq!(http::Method::from(Method::Get), http::Method::GET);
        assert_eq!(http::Method::from(Method::Patch), http::Method::PATCH);
    }
}
