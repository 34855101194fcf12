use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The signed-in user as seen by the rest of the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email_address: String,
    pub phone_number: String,
}

impl User {
    /// Builds a user from a Graph `/me` body.
    ///
    /// Every field is extracted on its own and falls back to `""`; a field
    /// that is missing, `null`, empty or not a string counts as absent. Email
    /// prefers `mail` over `userPrincipalName`.
    pub fn from_profile(profile: &Value) -> Self {
        Self {
            first_name: text_field(profile, "givenName").unwrap_or_default(),
            last_name: text_field(profile, "surname").unwrap_or_default(),
            display_name: text_field(profile, "displayName").unwrap_or_default(),
            email_address: text_field(profile, "mail")
                .or_else(|| text_field(profile, "userPrincipalName"))
                .unwrap_or_default(),
            phone_number: text_field(profile, "mobilePhone").unwrap_or_default(),
        }
    }

    pub fn initials(&self) -> String {
        let initials: String = [&self.first_name, &self.last_name]
            .iter()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        if !initials.is_empty() {
            return initials;
        }
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "U".to_string())
    }
}

fn text_field(profile: &Value, name: &str) -> Option<String> {
    profile
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
