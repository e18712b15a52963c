//! Response schema registry.
//!
//! Maps an action name to the parser for that action's success payload. The
//! registry is built once and only read afterwards; new actions are added by
//! registering another `(action, schema)` pair, without touching the
//! correlator or the state machine.

use crate::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Name of a call action, e.g. `"Authorize"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionName(&'static str);

impl ActionName {
    pub const AUTHORIZE: Self = Self("Authorize");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Status of an `idTagInfo` in an Authorize response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
}

impl AuthorizationStatus {
    pub const ALL: [Self; 4] = [Self::Accepted, Self::Blocked, Self::Expired, Self::Invalid];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTagInfo {
    pub status: AuthorizationStatus,
}

/// Success payload of an Authorize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeConf {
    pub id_tag_info: IdTagInfo,
}

/// A payload that passed its action's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParsedResponse {
    Authorize(AuthorizeConf),
}

/// Pure parser for one action's response shape.
pub type ActionSchema = fn(&Value) -> Result<ParsedResponse, serde_json::Error>;

fn parse_authorize(payload: &Value) -> Result<ParsedResponse, serde_json::Error> {
    AuthorizeConf::deserialize(payload).map(ParsedResponse::Authorize)
}

/// Action name to schema lookup.
#[derive(Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<ActionName, ActionSchema>,
}

impl SchemaRegistry {
    /// A registry with no actions.
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Process-wide registry of the built-in actions.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::default())))
    }

    /// Add or replace the schema for `action`.
    pub fn register(mut self, action: ActionName, schema: ActionSchema) -> Self {
        self.schemas.insert(action, schema);
        self
    }

    pub fn contains(&self, action: ActionName) -> bool {
        self.schemas.contains_key(&action)
    }

    /// Validate `payload` against the schema registered for `action`.
    pub fn validate(
        &self,
        action: ActionName,
        payload: &Value,
    ) -> Result<ParsedResponse, ValidationError> {
        let schema = self
            .schemas
            .get(&action)
            .ok_or_else(|| ValidationError::UnknownAction(action.to_string()))?;

        schema(payload).map_err(|source| ValidationError::Schema {
            action: action.as_str(),
            source,
        })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::empty().register(ActionName::AUTHORIZE, parse_authorize)
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("actions", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}
