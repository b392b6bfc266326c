//! Authenticated identity and the session context it travels in.
//!
//! The identity comes from an external authentication provider and is
//! read-only here. It is always passed explicitly through a
//! [`SessionContext`] so the token issuer and connection manager can be
//! exercised without the provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An authenticated user as reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// External user id.
    pub id: String,
    /// Optional username; falls back to `id` wherever a display name is needed.
    pub username: Option<String>,
    /// Optional avatar URL.
    pub image_url: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Name shown to other participants: the username, or the id when the
    /// username is missing or empty.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }

    /// Read an identity from `VIDEO_USER_ID`, `VIDEO_USER_NAME` and
    /// `VIDEO_USER_IMAGE`. Returns `None` when no (non-empty) id is set.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Option<Self> {
        let id = vars.get("VIDEO_USER_ID").filter(|id| !id.is_empty())?;

        Some(Self {
            id: id.clone(),
            username: vars.get("VIDEO_USER_NAME").cloned(),
            image_url: vars.get("VIDEO_USER_IMAGE").cloned(),
        })
    }
}

/// What the authentication provider knows about the current session.
///
/// `is_loaded` is false while the provider is still resolving the session;
/// an identity is only trusted once loading has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Option<Identity>,
    pub is_loaded: bool,
}

impl SessionContext {
    /// A fully loaded session for `identity`.
    #[must_use]
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_loaded: true,
        }
    }

    /// A fully loaded session with nobody signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            is_loaded: true,
        }
    }

    /// The provider has not finished resolving the session yet.
    #[must_use]
    pub fn loading() -> Self {
        Self::default()
    }

    /// The identity, if loading has finished and someone is signed in.
    #[must_use]
    pub fn loaded_identity(&self) -> Option<&Identity> {
        if self.is_loaded {
            self.identity.as_ref()
        } else {
            None
        }
    }
}

/// The user a video client is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Identity> for UserDescriptor {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.display_name().to_string(),
            image: identity.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_username() {
        let identity = Identity::new("user_1").with_username("alice");
        assert_eq!(identity.display_name(), "alice");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(Identity::new("user_1").display_name(), "user_1");
        assert_eq!(
            Identity::new("user_1").with_username("").display_name(),
            "user_1"
        );
    }

    #[test]
    fn test_loaded_identity_requires_loaded_flag() {
        let identity = Identity::new("user_1");

        let ctx = SessionContext {
            identity: Some(identity.clone()),
            is_loaded: false,
        };
        assert!(ctx.loaded_identity().is_none());

        let ctx = SessionContext::authenticated(identity.clone());
        assert_eq!(ctx.loaded_identity(), Some(&identity));

        assert!(SessionContext::anonymous().loaded_identity().is_none());
        assert!(SessionContext::loading().loaded_identity().is_none());
    }

    #[test]
    fn test_user_descriptor_from_identity() {
        let identity = Identity::new("user_1")
            .with_username("alice")
            .with_image_url("https://img.example.com/a.png");

        let user = UserDescriptor::from(&identity);
        assert_eq!(user.id, "user_1");
        assert_eq!(user.name, "alice");
        assert_eq!(user.image.as_deref(), Some("https://img.example.com/a.png"));
    }

    #[test]
    fn test_user_descriptor_omits_missing_image() {
        let user = UserDescriptor::from(&Identity::new("user_1"));
        let json = serde_json::to_value(&user).unwrap_or_default();

        assert_eq!(json["name"], "user_1");
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_identity_from_vars() {
        let vars = HashMap::from([
            ("VIDEO_USER_ID".to_string(), "user_1".to_string()),
            ("VIDEO_USER_NAME".to_string(), "alice".to_string()),
        ]);

        let identity = Identity::from_vars(&vars);
        assert_eq!(identity, Some(Identity::new("user_1").with_username("alice")));

        assert!(Identity::from_vars(&HashMap::new()).is_none());
        let empty = HashMap::from([("VIDEO_USER_ID".to_string(), String::new())]);
        assert!(Identity::from_vars(&empty).is_none());
    }
}
