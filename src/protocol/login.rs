//! Serial console login.
//!
//! Over RS-232 the codec presents a classic `login:` / `Password:` prompt before it
//! will accept commands. Socket sessions are authenticated by the transport, so
//! there the first structured `SystemUnit` status line counts as login success.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingLogin,
    AwaitingPassword,
    AwaitingBanner,
    LoggedIn,
}

/// What the caller should do after a line was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAction {
    None,
    /// Send this text (username or password) to the codec.
    Send(String),
    LoggedIn,
    /// Credentials were rejected; the negotiator is back at `AwaitingLogin`.
    Rejected,
}

pub struct LoginNegotiator {
    username: String,
    password: String,
    is_serial: bool,
    state: LoginState,
}

impl LoginNegotiator {
    pub fn new(username: &str, password: &str, is_serial: bool) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            is_serial,
            state: LoginState::AwaitingLogin,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == LoginState::LoggedIn
    }

    pub fn is_serial(&self) -> bool {
        self.is_serial
    }

    /// Back to the initial state (connection dropped).
    pub fn reset(&mut self) {
        self.state = LoginState::AwaitingLogin;
    }

    /// Observe one complete line or an unterminated prompt.
    pub fn observe(&mut self, text: &str) -> LoginAction {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return LoginAction::None;
        }

        if lower.contains("login incorrect") {
            self.state = LoginState::AwaitingLogin;
            return LoginAction::Rejected;
        }
        if self.state == LoginState::LoggedIn {
            return LoginAction::None;
        }
        if lower.contains("login successful") || lower.starts_with("welcome to") {
            self.state = LoginState::LoggedIn;
            return LoginAction::LoggedIn;
        }
        if !self.is_serial && is_system_unit_status(text) {
            self.state = LoginState::LoggedIn;
            return LoginAction::LoggedIn;
        }
        if lower.ends_with("login:") {
            // stays in AwaitingLogin until the password prompt shows up
            self.state = LoginState::AwaitingLogin;
            return LoginAction::Send(self.username.clone());
        }
        if lower.ends_with("password:") {
            self.state = LoginState::AwaitingBanner;
            return LoginAction::Send(self.password.clone());
        }
        LoginAction::None
    }
}

fn is_system_unit_status(text: &str) -> bool {
    let t = text.trim_start();
    t.starts_with("*s SystemUnit") || t.contains("\"SystemUnit\"")
}
