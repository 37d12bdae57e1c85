use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-assigned identifier of a chat user; also the notice recipient.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub handle: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, handle: Option<&str>) -> Self {
        Self { user_id: UserId(user_id.into()), handle: handle.map(normalize_handle) }
    }
}

pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_owned()
}

pub trait AdminDirectory: Send + Sync {
    fn is_admin(&self, identity: &Identity) -> bool;
    fn notice_recipients(&self) -> Vec<UserId>;
}

/// Allow-list of admin handles plus the chats that receive admin notices.
#[derive(Clone, Debug, Default)]
pub struct StaticAdminDirectory {
    handles: BTreeSet<String>,
    recipients: Vec<UserId>,
}

impl StaticAdminDirectory {
    pub fn new<H, R>(handles: H, recipients: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            handles: handles
                .into_iter()
                .map(|handle| normalize_handle(handle.as_ref()))
                .filter(|handle| !handle.is_empty())
                .collect(),
            recipients: recipients.into_iter().map(|id| UserId(id.into())).collect(),
        }
    }
}

impl AdminDirectory for StaticAdminDirectory {
    fn is_admin(&self, identity: &Identity) -> bool {
        identity.handle.as_deref().map(normalize_handle).is_some_and(|h| self.handles.contains(&h))
    }

    fn notice_recipients(&self) -> Vec<UserId> {
        self.recipients.clone()
    }
}
