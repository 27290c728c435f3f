//! The command state machine. Each inbound message moves one conversation from one
//! `ConversationState` to the next and produces exactly one `Reply`.

use crate::api::TableBackend;
use crate::bot::reply::{self, Affordance, Command, Reply};
use crate::bot::session::{ArtistIntent, ConversationId, ConversationState, Sessions};
use crate::engine::{Binding, EventProvisioner, ExpenseLedger};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{DateRange, EventRequest, Schema};
use crate::registry::ArtistRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A message as the controller sees it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Inbound {
    Text(String),
    /// A sticker, photo or anything else without text.
    NonText,
}

/// Routes messages of all conversations. Shared by every handler task.
pub struct Controller {
    ledger: ExpenseLedger,
    provisioner: EventProvisioner,
    registry: ArtistRegistry,
    sessions: Sessions,
    help_url: String,
}

impl Controller {
    pub fn new(
        backend: Arc<dyn TableBackend>,
        schema: Schema,
        registry: ArtistRegistry,
        help_url: impl Into<String>,
    ) -> Self {
        Self {
            ledger: ExpenseLedger::new(backend.clone(), schema.clone()),
            provisioner: EventProvisioner::new(backend, schema),
            registry,
            sessions: Sessions::new(),
            help_url: help_url.into(),
        }
    }

    /// The current state of a conversation.
    pub async fn state(&self, id: ConversationId) -> ConversationState {
        self.sessions.get(id).await
    }

    /// Handles one message. Never fails: every error becomes a reply.
    pub async fn handle(&self, id: ConversationId, inbound: Inbound) -> Reply {
        let text = match inbound {
            Inbound::Text(text) => text,
            Inbound::NonText => return Reply::main_menu(reply::THANKS_FOR_STICKER),
        };

        let state = self.sessions.take(id).await;
        let from = state.name();
        let (next, reply) = self.step(state, text.trim()).await;
        debug!("Conversation {id}: {from} -> {}", next.name());
        self.sessions.put(id, next).await;
        reply
    }

    async fn step(&self, state: ConversationState, text: &str) -> (ConversationState, Reply) {
        if let Some(command) = Command::parse(text) {
            return self.command(state, command).await;
        }
        match state {
            ConversationState::Idle => (ConversationState::Idle, Reply::main_menu(reply::CHOOSE_COMMAND)),
            ConversationState::AwaitingArtist(intent) => self.choose_artist(intent, text).await,
            ConversationState::AwaitingExpenseDetails(binding) => {
                self.add_expense(&binding, text).await
            }
            ConversationState::AwaitingEventDetails => self.add_event(text).await,
            ConversationState::AwaitingDateRange(binding) => {
                self.view_expenses(&binding, text).await
            }
        }
    }

    async fn command(
        &self,
        state: ConversationState,
        command: Command,
    ) -> (ConversationState, Reply) {
        match command {
            Command::Start => (ConversationState::Idle, Reply::main_menu(reply::WELCOME)),
            Command::Help => (state, Reply::keep(reply::help(&self.help_url))),
            Command::AddExpense => self.pick_artist(ArtistIntent::AddExpense).await,
            Command::ViewExpenses => self.pick_artist(ArtistIntent::ViewExpenses).await,
            Command::AddEvent => (
                ConversationState::AwaitingEventDetails,
                Reply::restart(reply::event_prompt(self.ledger.schema().filter_key)),
            ),
        }
    }

    async fn pick_artist(&self, intent: ArtistIntent) -> (ConversationState, Reply) {
        match self.registry.read().await {
            Ok(artists) => (
                ConversationState::AwaitingArtist(intent),
                Reply::new(reply::CHOOSE_ARTIST, Affordance::ArtistPicker(artists)),
            ),
            Err(e) => failed(e, reply::BACKEND_FAILED),
        }
    }

    async fn choose_artist(&self, intent: ArtistIntent, artist: &str) -> (ConversationState, Reply) {
        let binding = match self.ledger.bind(artist).await {
            Ok(binding) => binding,
            Err(e) => {
                let e = match e.kind() {
                    ErrorType::TableNotFound | ErrorType::WorksheetNotFound => {
                        Error::new(ErrorType::BindingNotEstablished, e)
                    }
                    _ => e,
                };
                return failed(e, reply::NOT_CONNECTED_OR_BAD_FORMAT);
            }
        };
        match intent {
            ArtistIntent::AddExpense => {
                let prompt = reply::expense_prompt(self.ledger.schema());
                (
                    ConversationState::AwaitingExpenseDetails(binding),
                    Reply::restart(format!("{}\n{prompt}", reply::CONNECTED)),
                )
            }
            ArtistIntent::ViewExpenses => (
                ConversationState::AwaitingDateRange(binding),
                Reply::restart(format!("{}\n{}", reply::CONNECTED, reply::PERIOD_PROMPT)),
            ),
        }
    }

    async fn add_expense(&self, binding: &Binding, payload: &str) -> (ConversationState, Reply) {
        match self.ledger.append_payload(binding, payload).await {
            Ok(row) => {
                info!("{} added {} to {}", row.spender, row.amount, binding.artist());
                (ConversationState::Idle, Reply::main_menu(reply::EXPENSE_ADDED))
            }
            Err(e) if e.is(ErrorType::WorksheetNotFound) => failed(e, reply::EVENT_NOT_FOUND),
            Err(e) => failed(e, reply::NOT_CONNECTED_OR_BAD_FORMAT),
        }
    }

    async fn add_event(&self, payload: &str) -> (ConversationState, Reply) {
        let request = match EventRequest::parse(payload, self.ledger.schema().filter_key)
            .pub_result(ErrorType::Validation)
        {
            Ok(request) => request,
            Err(e) => return failed(e, reply::BAD_FORMAT),
        };
        if let Err(e) = self.provisioner.provision(&request).await {
            return match e.kind() {
                ErrorType::TableNotFound => failed(e, reply::CREATE_TABLE_FIRST),
                _ => failed(e, reply::BACKEND_FAILED),
            };
        }
        match self.registry.register(&request.artist).await {
            Ok(true) => info!("Registered a new artist {}", request.artist),
            Ok(false) => {}
            // The worksheets exist, so the event was still created.
            Err(e) => warn!("Unable to register {}: {e:#}", request.artist),
        }
        (ConversationState::Idle, Reply::main_menu(reply::EVENT_CREATED))
    }

    async fn view_expenses(&self, binding: &Binding, payload: &str) -> (ConversationState, Reply) {
        let range = match DateRange::parse(payload).pub_result(ErrorType::Validation) {
            Ok(range) => range,
            Err(e) => return failed(e, reply::BAD_FORMAT),
        };
        match self.ledger.aggregate(binding, range).await {
            Ok(summary) => (
                ConversationState::Idle,
                Reply::main_menu(reply::report(&summary)),
            ),
            Err(e) => failed(e, reply::BAD_FORMAT),
        }
    }
}

/// Ends the current operation with a message chosen by the error kind, `fallback` for kinds that
/// depend on the step.
fn failed(e: Error, fallback: &'static str) -> (ConversationState, Reply) {
    warn!("{e:#}");
    let text = match e.kind() {
        ErrorType::DataFormat => reply::BAD_STORED_AMOUNT,
        ErrorType::Backend | ErrorType::Config | ErrorType::Io => reply::BACKEND_FAILED,
        ErrorType::TableNotFound
        | ErrorType::WorksheetNotFound
        | ErrorType::Validation
        | ErrorType::BindingNotEstablished => fallback,
    };
    (ConversationState::Idle, Reply::main_menu(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellRef;
    use crate::test::TestEnv;

    const CHAT: ConversationId = 42;

    fn controller(env: &TestEnv) -> Controller {
        Controller::new(
            env.backend(),
            env.schema().clone(),
            env.registry(),
            "https://example.com/help",
        )
    }

    async fn say(c: &Controller, text: &str) -> Reply {
        c.handle(CHAT, Inbound::Text(text.to_string())).await
    }

    #[tokio::test]
    async fn test_sticker_keeps_state() {
        let env = TestEnv::new().await;
        let c = controller(&env);
        say(&c, "/добавить_событие").await;
        let reply = c.handle(CHAT, Inbound::NonText).await;
        assert_eq!(reply.text, reply::THANKS_FOR_STICKER);
        assert_eq!(c.state(CHAT).await, ConversationState::AwaitingEventDetails);
    }

    #[tokio::test]
    async fn test_start_and_idle_text() {
        let env = TestEnv::new().await;
        let c = controller(&env);
        let reply = say(&c, "/start").await;
        assert_eq!(reply, Reply::main_menu(reply::WELCOME));

        let reply = say(&c, "HORUS").await;
        assert_eq!(reply.text, reply::CHOOSE_COMMAND);
        assert_eq!(c.state(CHAT).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_help_keeps_state() {
        let env = TestEnv::new().await;
        let c = controller(&env);
        say(&c, "/add_event").await;
        let reply = say(&c, "/help").await;
        assert_eq!(reply.text, "Ссылка на документацию: https://example.com/help");
        assert_eq!(reply.affordance, Affordance::Keep);
        assert_eq!(c.state(CHAT).await, ConversationState::AwaitingEventDetails);
    }

    #[tokio::test]
    async fn test_add_event_then_add_expense_then_report() {
        let env = TestEnv::new().await;
        env.add_artist("HORUS").await;
        let c = controller(&env);

        let reply = say(&c, "/добавить_событие").await;
        assert!(reply.text.contains("HORUS,2025-05-22"));
        assert_eq!(reply.affordance, Affordance::Restart);
        let reply = say(&c, "HORUS,2025-05-22,2025-05-23").await;
        assert_eq!(reply.text, reply::EVENT_CREATED);
        assert_eq!(env.registry().read().await.unwrap(), vec!["HORUS"]);
        assert_eq!(
            env.memory().worksheet_titles("HORUS").await,
            vec!["Общие траты", "2025-05-22", "2025-05-23"]
        );

        let reply = say(&c, "/добавить_трату").await;
        assert_eq!(
            reply,
            Reply::new(
                reply::CHOOSE_ARTIST,
                Affordance::ArtistPicker(vec!["HORUS".to_string()])
            )
        );
        let reply = say(&c, "HORUS").await;
        assert!(reply.text.starts_with(reply::CONNECTED));
        assert!(matches!(
            c.state(CHAT).await,
            ConversationState::AwaitingExpenseDetails(ref b) if b.artist() == "HORUS"
        ));
        let reply = say(&c, "22.05.2025,1 500,Еда,Кирилл,обед").await;
        assert_eq!(reply.text, reply::EXPENSE_ADDED);
        assert_eq!(c.state(CHAT).await, ConversationState::Idle);

        say(&c, "/просмотреть_траты").await;
        let reply = say(&c, "HORUS").await;
        assert!(reply.text.ends_with(reply::PERIOD_PROMPT));
        let reply = say(&c, "22.05.2025,22.05.2025").await;
        assert_eq!(reply.text, "Еда: 1500\nВсего: 1500");
        assert_eq!(reply.affordance, Affordance::MainMenu);
    }

    #[tokio::test]
    async fn test_range_payload_while_adding_expense_appends_nothing() {
        let env = TestEnv::new().await;
        env.add_artist_with_ledger("HORUS", "").await;
        let c = controller(&env);
        say(&c, "/добавить_трату").await;
        say(&c, "HORUS").await;

        let reply = say(&c, "22.05.2025,25.07.2026").await;
        assert_eq!(reply.text, reply::NOT_CONNECTED_OR_BAD_FORMAT);
        assert_eq!(c.state(CHAT).await, ConversationState::Idle);
        let rows = env.memory().rows("HORUS", "Общие траты").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_artist_is_not_bound() {
        let env = TestEnv::new().await;
        let c = controller(&env);
        say(&c, "/просмотреть_траты").await;
        assert_eq!(
            c.state(CHAT).await,
            ConversationState::AwaitingArtist(ArtistIntent::ViewExpenses)
        );
        let reply = say(&c, "NOBODY").await;
        assert_eq!(reply.text, reply::NOT_CONNECTED_OR_BAD_FORMAT);
        assert_eq!(c.state(CHAT).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_event_for_missing_table() {
        let env = TestEnv::new().await;
        let c = controller(&env);
        say(&c, "/добавить_событие").await;
        let reply = say(&c, "NOBODY,2025-05-22").await;
        assert_eq!(reply.text, reply::CREATE_TABLE_FIRST);
        assert!(env.registry().read().await.unwrap().is_empty());

        say(&c, "/добавить_событие").await;
        let reply = say(&c, "NOBODY").await;
        assert_eq!(reply.text, reply::BAD_FORMAT);
    }

    #[tokio::test]
    async fn test_bad_stored_amount_discards_report() {
        let env = TestEnv::new().await;
        env.add_artist_with_ledger("HORUS", "22-05-2025,много,Еда,Кирилл,\n")
            .await;
        let c = controller(&env);
        say(&c, "/view_expenses").await;
        say(&c, "HORUS").await;
        let reply = say(&c, "01.05.2025,31.05.2025").await;
        assert_eq!(reply.text, reply::BAD_STORED_AMOUNT);

        say(&c, "/view_expenses").await;
        say(&c, "HORUS").await;
        let reply = say(&c, "май").await;
        assert_eq!(reply.text, reply::BAD_FORMAT);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let env = TestEnv::venue_keyed().await;
        let (table, _) = env.add_artist_with_ledger("HORUS", "").await;
        env.memory()
            .add_worksheet(&table, "Москва", vec![vec!["HORUS Москва 22-05-2025".to_string()]])
            .await
            .unwrap();
        let c = controller(&env);

        c.handle(1, Inbound::Text("/добавить_трату".to_string())).await;
        c.handle(1, Inbound::Text("HORUS".to_string())).await;
        c.handle(2, Inbound::Text("/просмотреть_траты".to_string())).await;

        let reply = c
            .handle(1, Inbound::Text("Москва,700,Дизайн,Аня".to_string()))
            .await;
        assert_eq!(reply.text, reply::EXPENSE_ADDED);
        assert_eq!(
            c.state(2).await,
            ConversationState::AwaitingArtist(ArtistIntent::ViewExpenses)
        );
        let date = env
            .memory()
            .cell("HORUS", "Общие траты", CellRef::new(2, 1))
            .await
            .unwrap();
        assert_eq!(date, "22-05-2025");

        c.handle(1, Inbound::Text("/добавить_трату".to_string())).await;
        c.handle(1, Inbound::Text("HORUS".to_string())).await;
        let reply = c
            .handle(1, Inbound::Text("Казань,700,Дизайн,Аня".to_string()))
            .await;
        assert_eq!(reply.text, reply::EVENT_NOT_FOUND);
    }
}
