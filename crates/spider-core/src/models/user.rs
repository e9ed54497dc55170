use serde::{Deserialize, Serialize};

/// The account behind the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(default, deserialize_with = "super::opt_string_or_number")]
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl User {
    /// Name for display, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Unknown user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id_is_accepted() {
        let user: User =
            serde_json::from_str(r#"{"id": 42, "email": "a@b.test", "name": null}"#).unwrap();
        assert_eq!(user.id.as_deref(), Some("42"));
        assert_eq!(user.display_name(), "a@b.test");
    }
}
