use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Context descriptor delivered alongside a lifecycle hook.
///
/// The host hands over an open-ended key/value bag; it is parsed exactly once,
/// here, into explicit fields. Unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    /// Id of the object the operation targets (absent before creation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Id of the user performing the operation.
    pub user_id: String,
    /// Ids of the groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
    /// `true` for creations, `false` for modifications.
    #[serde(default)]
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_acl: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl EventContext {
    /// Minimal context for the given user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            object_id: None,
            user_id: user_id.into(),
            groups: Vec::new(),
            is_new: false,
            request_context: None,
            effective_acl: None,
            params: None,
        }
    }

    /// Builder-style object id assignment.
    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    /// Parse the raw context JSON handed over by the host.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let context: Self =
            serde_json::from_str(raw).map_err(|e| TypeError::MalformedInput(e.to_string()))?;
        if context.user_id.trim().is_empty() {
            return Err(TypeError::MalformedInput(
                "context `userId` must not be blank".into(),
            ));
        }
        Ok(context)
    }
}
