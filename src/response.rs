//! The uniform `{success, message?, ...payload}` envelope.

use crate::models::{pet::Pet, user::Identity, user::User};
use axum::Json;
use serde::Serialize;

/// Placeholder for envelopes that carry only a message.
#[derive(Serialize, Debug, Default)]
pub struct NoPayload {}

#[derive(Serialize, Debug)]
pub struct Envelope<T = NoPayload> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Flattened into the top level, e.g. `{"success":true,"pets":[...]}`.
    #[serde(flatten)]
    pub payload: Option<T>,
}

impl Envelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: None,
        }
    }
}

pub fn success(message: &str) -> Json<Envelope> {
    Json(Envelope {
        success: true,
        message: Some(message.to_string()),
        payload: None,
    })
}

pub fn success_with<T: Serialize>(message: Option<&str>, payload: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.map(str::to_string),
        payload: Some(payload),
    })
}

#[derive(Serialize, Debug)]
pub struct LoginPayload {
    pub user: Identity,
}

#[derive(Serialize, Debug)]
pub struct PetsPayload {
    pub pets: Vec<Pet>,
}

#[derive(Serialize, Debug)]
pub struct UsersPayload {
    pub users: Vec<User>,
}

#[derive(Serialize, Debug)]
pub struct UploadPayload {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_only_envelopes_have_no_extra_keys() {
        let Json(body) = success("Signup successful");
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"success": true, "message": "Signup successful"})
        );
        assert_eq!(
            serde_json::to_value(Envelope::failure("DB error")).unwrap(),
            json!({"success": false, "message": "DB error"})
        );
    }

    #[test]
    fn payload_fields_sit_beside_success() {
        let Json(body) = success_with(
            None,
            UploadPayload {
                image_url: "http://h/uploads/1-a.png".into(),
            },
        );
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"success": true, "imageUrl": "http://h/uploads/1-a.png"})
        );

        let Json(body) = success_with(
            Some("Login successful"),
            LoginPayload {
                user: Identity {
                    id: 1,
                    name: "alice".into(),
                    role: "user".into(),
                },
            },
        );
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "success": true,
                "message": "Login successful",
                "user": {"id": 1, "name": "alice", "role": "user"}
            })
        );
    }
}
