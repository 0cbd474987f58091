//! Session identity.

/// Supplies the id of the session steps are recorded against.
///
/// `None` means there is no session: step tracking is skipped, message
/// appends are not.
pub trait SessionProvider: Send + Sync {
    fn current_session_id(&self) -> Option<String>;
}

/// A [`SessionProvider`] with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct FixedSession {
    id: Option<String>,
}

impl FixedSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// A provider that never has a session.
    pub fn none() -> Self {
        Self { id: None }
    }
}

impl SessionProvider for FixedSession {
    fn current_session_id(&self) -> Option<String> {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_session_reports_its_id() {
        assert_eq!(
            FixedSession::new("demo").current_session_id().as_deref(),
            Some("demo")
        );
        assert!(FixedSession::none().current_session_id().is_none());
    }
}
