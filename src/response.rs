use serde::Serialize;

/// Uniform success envelope: `{message, data, success}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: Option<T>,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: Option<T>, message: &str) -> Self {
        Self {
            message: message.into(),
            data,
            success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_null_data() {
        let resp: ApiResponse<()> = ApiResponse::ok(None, "Signed in successfully");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["message"], "Signed in successfully");
        assert_eq!(json["data"], serde_json::Value::Null);
        assert_eq!(json["success"], true);
    }
}
