//! Presentation-level control checks.
//!
//! A [`ControlGate`] is what view code talks to when deciding whether to
//! render an optional element (a "Delete" button, an admin menu entry...).
//! It is independent of request admission: a page the principal may see can
//! still hide controls the principal may not use.
//!
//! ```ignore
//! async fn orders_page(Controls(gate): Controls) -> Html<String> {
//!     let mut html = String::from("<h1>Orders</h1>");
//!     if gate.can_show("Orders.Delete").await.unwrap_or(false) {
//!         html.push_str("<button>Delete</button>");
//!     }
//!     Html(html)
//! }
//! ```

use crate::error::AccessControlError;
use crate::principal::Principal;
use crate::scope::RequestScope;

/// Per-request handle answering "should this control be shown?".
///
/// Answers are deterministic within a request: the same key always gets
/// the same answer, however many times it is asked.
#[derive(Clone, Debug)]
pub struct ControlGate {
    scope: RequestScope,
}

impl ControlGate {
    pub(crate) fn new(scope: RequestScope) -> Self {
        Self { scope }
    }

    pub fn principal(&self) -> &Principal {
        self.scope.principal()
    }

    pub async fn can_show(&self, control_key: &str) -> Result<bool, AccessControlError> {
        self.scope.can_show(control_key).await
    }

    /// Check several controls, returning the keys that are shown, in input order.
    pub async fn visible<'k>(
        &self,
        control_keys: &[&'k str],
    ) -> Result<Vec<&'k str>, AccessControlError> {
        let mut visible = Vec::with_capacity(control_keys.len());
        for key in control_keys {
            if self.scope.can_show(key).await? {
                visible.push(*key);
            }
        }
        Ok(visible)
    }
}
