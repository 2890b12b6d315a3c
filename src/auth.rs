use tokio::sync::watch;

/// Seam to the hosted backend's auth session.
///
/// The sync core never drives login itself; it only needs to know who the
/// current user is, to hear when that changes, and to be able to end the
/// session.
pub trait IdentityProvider: Send + Sync {
    /// Id of the signed-in user, if any
    fn current_user(&self) -> Option<String>;

    /// Watch sign-in and sign-out transitions
    fn subscribe(&self) -> watch::Receiver<Option<String>>;

    /// Drop the current session
    fn sign_out(&self);
}

/// Identity provider backed by an in-process session slot.
pub struct SessionIdentity {
    user: watch::Sender<Option<String>>,
}

impl SessionIdentity {
    /// Start with no session
    pub fn anonymous() -> Self {
        SessionIdentity {
            user: watch::Sender::new(None),
        }
    }

    /// Start with an established session
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        SessionIdentity {
            user: watch::Sender::new(Some(user_id.into())),
        }
    }

    /// Replace the session, e.g. after a token refresh resolves to a new user
    pub fn set_user(&self, user_id: impl Into<String>) {
        self.user.send_replace(Some(user_id.into()));
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        SessionIdentity::anonymous()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<String> {
        self.user.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.user.subscribe()
    }

    fn sign_out(&self) {
        self.user.send_replace(None);
    }
}
