use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{AuthService, ChatService};
use crate::auth::{self, AuthOutcome, CredentialForm};
use crate::conversation::Conversation;
use crate::error::ApiError;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// The login / register screen.
pub struct LoginView {
    pub form: CredentialForm,
    task: Option<JoinHandle<Result<AuthOutcome, ApiError>>>,
}

impl LoginView {
    fn new() -> Self {
        Self {
            form: CredentialForm::new(),
            task: None,
        }
    }
}

/// The chat screen. Dropping it drops its in-flight task handles; those tasks
/// still run to completion but nothing is left to receive their replies.
pub struct ChatView {
    pub conversation: Conversation,
    pub input_mode: InputMode,
    pub cursor: usize,
    /// Lines scrolled up from the newest message; 0 follows the conversation.
    pub scroll_back: u16,
    tasks: Vec<JoinHandle<Result<String, ApiError>>>,
}

impl ChatView {
    fn new() -> Self {
        Self {
            conversation: Conversation::new(),
            input_mode: InputMode::Editing,
            cursor: 0,
            scroll_back: 0,
            tasks: Vec::new(),
        }
    }
}

pub enum Screen {
    Login(LoginView),
    Chat(ChatView),
}

impl Screen {
    fn for_session(session: &Session) -> Self {
        if session.is_authenticated() {
            Screen::Chat(ChatView::new())
        } else {
            Screen::Login(LoginView::new())
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub session: Session,
    session_rx: watch::Receiver<Option<String>>,
    pub screen: Screen,
    pub server_url: String,
    auth_service: Arc<dyn AuthService>,
    chat_service: Arc<dyn ChatService>,
    // 0-2 for ellipsis animation
    pub animation_frame: u8,
}

impl App {
    pub fn new(
        session: Session,
        auth_service: Arc<dyn AuthService>,
        chat_service: Arc<dyn ChatService>,
        server_url: &str,
    ) -> Self {
        let session_rx = session.subscribe();
        let screen = Screen::for_session(&session);
        Self {
            should_quit: false,
            session,
            session_rx,
            screen,
            server_url: server_url.to_string(),
            auth_service,
            chat_service,
            animation_frame: 0,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self.screen, Screen::Chat(_))
    }

    /// Switch screens if the session changed since the last call.
    pub fn sync_session(&mut self) {
        if !self.session_rx.has_changed().unwrap_or(false) {
            return;
        }
        let authenticated = self.session_rx.borrow_and_update().is_some();
        if authenticated != self.is_chat() {
            self.screen = Screen::for_session(&self.session);
        }
    }

    pub fn submit_credentials(&mut self) {
        let Screen::Login(view) = &mut self.screen else {
            return;
        };
        let Some(draft) = view.form.begin_submit() else {
            return;
        };
        let service = self.auth_service.clone();
        view.task = Some(tokio::spawn(async move {
            auth::authenticate(service.as_ref(), &draft).await
        }));
    }

    pub fn send_message(&mut self) {
        let Screen::Chat(view) = &mut self.screen else {
            return;
        };
        let Some(exchange) = view.conversation.begin_exchange(&self.session) else {
            return;
        };
        view.cursor = 0;
        view.scroll_back = 0;

        if !exchange.has_credentials() {
            view.conversation.complete_exchange(Err(ApiError::NoSession));
            return;
        }
        let service = self.chat_service.clone();
        view.tasks
            .push(tokio::spawn(async move { exchange.run(service.as_ref()).await }));
    }

    pub fn logout(&mut self) {
        if let Screen::Chat(view) = &self.screen {
            view.conversation.logout(&self.session);
        }
        self.sync_session();
    }

    /// Apply the results of any network calls that have finished.
    pub async fn poll_tasks(&mut self) {
        match &mut self.screen {
            Screen::Login(view) => {
                if view.task.as_ref().is_some_and(|t| t.is_finished()) {
                    if let Some(task) = view.task.take() {
                        let result = task
                            .await
                            .unwrap_or_else(|e| Err(ApiError::Task(e.to_string())));
                        view.form.finish_submit(result, &self.session);
                    }
                }
            }
            Screen::Chat(view) => {
                let (done, running): (Vec<_>, Vec<_>) =
                    view.tasks.drain(..).partition(|t| t.is_finished());
                view.tasks = running;
                for task in done {
                    let result = task
                        .await
                        .unwrap_or_else(|e| Err(ApiError::Task(e.to_string())));
                    view.conversation.complete_exchange(result);
                }
            }
        }
        self.sync_session();
    }

    pub fn has_pending_work(&self) -> bool {
        match &self.screen {
            Screen::Login(view) => view.task.is_some(),
            Screen::Chat(view) => !view.tasks.is_empty(),
        }
    }

    pub async fn tick(&mut self) {
        self.poll_tasks().await;
        if self.has_pending_work() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeAuth;
    use crate::auth::{AuthMode, Notice, REGISTERED_NOTICE};
    use crate::conversation::tests::FakeChat;
    use crate::conversation::{Message, EXCHANGE_ERROR};
    use crate::session::MemoryTokenStore;

    fn app_with(store: MemoryTokenStore, auth: FakeAuth, chat: FakeChat) -> App {
        App::new(
            Session::restore(Box::new(store)),
            Arc::new(auth),
            Arc::new(chat),
            "http://localhost:8000",
        )
    }

    async fn settle(app: &mut App) {
        while app.has_pending_work() {
            tokio::task::yield_now().await;
            app.poll_tasks().await;
        }
    }

    fn login_view(app: &mut App) -> &mut LoginView {
        match &mut app.screen {
            Screen::Login(view) => view,
            Screen::Chat(_) => panic!("expected login screen"),
        }
    }

    fn chat_view(app: &mut App) -> &mut ChatView {
        match &mut app.screen {
            Screen::Chat(view) => view,
            Screen::Login(_) => panic!("expected chat screen"),
        }
    }

    #[test]
    fn starts_on_login_without_token() {
        let app = app_with(MemoryTokenStore::new(), FakeAuth::default(), FakeChat::failing());
        assert!(!app.is_chat());
    }

    #[tokio::test]
    async fn persisted_token_restores_chat_without_login_call() {
        let auth = Arc::new(FakeAuth::default());
        let mut app = App::new(
            Session::restore(Box::new(MemoryTokenStore::with_token("old"))),
            auth.clone(),
            Arc::new(FakeChat::replying("hello")),
            "http://localhost:8000",
        );

        assert!(app.is_chat());
        assert!(chat_view(&mut app).conversation.transcript().is_empty());
        assert!(auth.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_switches_to_chat() {
        let auth = FakeAuth::default();
        auth.accounts.lock().unwrap().insert("alice".into(), "pw".into());
        let mut app = app_with(MemoryTokenStore::new(), auth, FakeChat::replying("hello"));

        let view = login_view(&mut app);
        view.form.username = "alice".into();
        view.form.password = "pw".into();
        app.submit_credentials();
        settle(&mut app).await;

        assert!(app.is_chat());
        assert_eq!(app.session.current_token().as_deref(), Some("token-alice"));
    }

    #[tokio::test]
    async fn register_stays_on_login() {
        let mut app = app_with(MemoryTokenStore::new(), FakeAuth::default(), FakeChat::failing());

        let view = login_view(&mut app);
        view.form.username = "bob".into();
        view.form.password = "pw".into();
        view.form.toggle_mode();
        app.submit_credentials();
        settle(&mut app).await;

        assert!(!app.is_chat());
        let form = &login_view(&mut app).form;
        assert_eq!(form.mode, AuthMode::Login);
        assert_eq!(form.notice, Some(Notice::Info(REGISTERED_NOTICE.into())));
    }

    #[tokio::test]
    async fn exchange_round_trip() {
        let mut app = app_with(
            MemoryTokenStore::with_token("tok"),
            FakeAuth::default(),
            FakeChat::replying("hello"),
        );

        chat_view(&mut app).conversation.input = "hi".into();
        app.send_message();
        assert_eq!(
            chat_view(&mut app).conversation.transcript(),
            &[Message::user("hi")]
        );
        settle(&mut app).await;

        assert_eq!(
            chat_view(&mut app).conversation.transcript(),
            &[Message::user("hi"), Message::bot("hello")]
        );
    }

    #[tokio::test]
    async fn failed_exchange_shows_error_row() {
        let mut app = app_with(
            MemoryTokenStore::with_token("tok"),
            FakeAuth::default(),
            FakeChat::failing(),
        );

        chat_view(&mut app).conversation.input = "hi".into();
        app.send_message();
        settle(&mut app).await;

        assert_eq!(
            chat_view(&mut app).conversation.transcript(),
            &[Message::user("hi"), Message::bot(EXCHANGE_ERROR)]
        );
    }

    #[tokio::test]
    async fn logout_returns_to_fresh_login_and_drops_pending() {
        let mut app = app_with(
            MemoryTokenStore::with_token("tok"),
            FakeAuth::default(),
            FakeChat::replying("late"),
        );

        chat_view(&mut app).conversation.input = "hi".into();
        app.send_message();
        app.logout();

        assert!(!app.is_chat());
        assert!(!app.has_pending_work());
        assert_eq!(app.session.current_token(), None);
        assert!(login_view(&mut app).form.username.is_empty());
    }

    #[tokio::test]
    async fn transcript_starts_empty_after_logging_back_in() {
        let auth = FakeAuth::default();
        auth.accounts.lock().unwrap().insert("alice".into(), "pw".into());
        let mut app = app_with(MemoryTokenStore::with_token("tok"), auth, FakeChat::replying("x"));

        chat_view(&mut app).conversation.input = "hi".into();
        app.send_message();
        settle(&mut app).await;
        app.logout();

        let view = login_view(&mut app);
        view.form.username = "alice".into();
        view.form.password = "pw".into();
        app.submit_credentials();
        settle(&mut app).await;

        assert!(chat_view(&mut app).conversation.transcript().is_empty());
    }
}
