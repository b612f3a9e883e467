use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    Employee,
}

impl TryFrom<String> for Role {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_round_trip() {
        assert_eq!(Role::Admin.as_ref(), "ADMIN");
        assert_eq!(Role::Employee.to_string(), "EMPLOYEE");
        assert_eq!(Role::try_from("ADMIN".to_string()), Ok(Role::Admin));
        assert!(Role::try_from("HR".to_string()).is_err());
    }

    #[test]
    fn json_uses_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Employee).unwrap(), "\"EMPLOYEE\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
