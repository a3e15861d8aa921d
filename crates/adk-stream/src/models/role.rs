use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// The role name used on the wire by the agent backend
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "model",
        }
    }
}
