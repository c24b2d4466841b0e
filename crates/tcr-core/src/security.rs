use crate::domain::UserId;

// ============== Authorization ==============

/// Outcome of an access check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Authorized(UserId),
    Denied,
}

impl Access {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Access::Authorized(_))
    }
}

/// Set of recipient ids allowed to receive relayed photos.
///
/// Deployments configure a single id today; matching is exact equality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowList {
    ids: Vec<i64>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn single(id: i64) -> Self {
        Self { ids: vec![id] }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn authorize(&self, user_id: UserId) -> Access {
        if self.ids.binary_search(&user_id.0).is_ok() {
            Access::Authorized(user_id)
        } else {
            Access::Denied
        }
    }

    /// Authorize a raw JSON value as received from the client.
    ///
    /// Integers, integral floats and numeric strings are coerced; anything
    /// else is denied.
    pub fn authorize_value(&self, raw: &serde_json::Value) -> Access {
        match coerce_user_id(raw) {
            Some(id) => self.authorize(id),
            None => Access::Denied,
        }
    }
}

/// Integer coercion for `user_id` fields which may arrive as numbers or strings.
pub fn coerce_user_id(raw: &serde_json::Value) -> Option<UserId> {
    match raw {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| integral_f64(n.as_f64()?))
            .map(UserId),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok().map(UserId),
        _ => None,
    }
}

/// `1189539923.0` names the same user as `1189539923`.
fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX is not representable, so the upper bound is exclusive.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
