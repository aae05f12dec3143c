use std::collections::HashSet;

use vigil_core::ModerationConfig;

/// Static allow-list gate consulted before any rate evaluation.
///
/// Built once from configuration; reloading requires reconstructing the
/// policy. Exemption is global across chats, so the chat id is carried for
/// contract stability but does not affect the answer.
#[derive(Clone, Debug)]
pub struct ExemptionPolicy {
    admin_ids: HashSet<i64>,
    whitelisted_ids: HashSet<i64>,
}

impl ExemptionPolicy {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            admin_ids: config.admin_ids.clone(),
            whitelisted_ids: config.whitelisted_ids.clone(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn is_whitelisted(&self, user_id: i64) -> bool {
        self.whitelisted_ids.contains(&user_id)
    }

    /// True iff the user bypasses rate evaluation entirely.
    pub fn is_exempt(&self, user_id: i64, _chat_id: i64) -> bool {
        self.is_admin(user_id) || self.is_whitelisted(user_id)
    }
}
