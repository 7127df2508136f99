use sessioncap_core_types::CompletionToken;

/// Receiver of the one completion the engine ever produces.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, session_marker: &str, csrf_token: &str, username: Option<&str>);
}

impl<F> CompletionHandler for F
where
    F: Fn(&str, &str, Option<&str>) + Send + Sync,
{
    fn on_complete(&self, session_marker: &str, csrf_token: &str, username: Option<&str>) {
        self(session_marker, csrf_token, username)
    }
}

pub(crate) fn deliver(handler: &dyn CompletionHandler, token: &CompletionToken) {
    handler.on_complete(
        &token.session_marker,
        &token.csrf_token,
        token.username.as_deref(),
    );
}
