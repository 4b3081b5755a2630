use serde::{Deserialize, Serialize};

/// The profile of the signed-in user, cached next to the credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

/// A partial profile; only the fields that are `Some` are changed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        UserProfile {
            id: id.into(),
            email: email.into(),
            name: None,
            workspace_name: None,
        }
    }

    /// Merge a partial update into this profile. The id never changes.
    pub fn apply(&mut self, update: UserProfileUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(workspace_name) = update.workspace_name {
            self.workspace_name = Some(workspace_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_touches_present_fields() {
        let mut profile = UserProfile::new("u-1", "ada@example.com");
        profile.name = Some("Ada".to_string());

        profile.apply(UserProfileUpdate {
            workspace_name: Some("Analytical Engines".to_string()),
            ..Default::default()
        });

        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.workspace_name.as_deref(), Some("Analytical Engines"));
    }

    #[test]
    fn profile_uses_camel_case_on_the_wire() {
        let mut profile = UserProfile::new("u-2", "grace@example.com");
        profile.workspace_name = Some("Navy".to_string());
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["workspaceName"], "Navy");
        assert!(json.get("name").is_none());
    }
}
