//! What the bot says: commands it understands, reply texts and reply keyboards.

use crate::engine::Summary;
use crate::model::{FilterKey, Schema};

pub(crate) const WELCOME: &str = "Приветствую!
/добавить_трату - внести трату;
/добавить_событие - создать новое мероприятие;
/просмотреть_траты - посмотреть смету за период;
/помощь - руководство пользователя.";
pub(crate) const CHOOSE_ARTIST: &str = "Выберите артиста:";
pub(crate) const CONNECTED: &str = "Установил соединение!";
pub(crate) const PERIOD_PROMPT: &str =
    "Введите период для трат в следующем формате: 22.05.2025,25.07.2026";
pub(crate) const EXPENSE_ADDED: &str = "Запись успешно добавлена!";
pub(crate) const NOT_CONNECTED_OR_BAD_FORMAT: &str =
    "Соединение еще не установлено или формат ввода неверен!";
pub(crate) const EVENT_CREATED: &str = "Успешно создал листы под мероприятие!";
pub(crate) const CREATE_TABLE_FIRST: &str = "Сначала создайте таблицу с соответствующим артистом!";
pub(crate) const EVENT_NOT_FOUND: &str = "Не нашел такого мероприятия!";
pub(crate) const BAD_FORMAT: &str = "Формат ввода неверен! Повторите операцию.";
pub(crate) const CHOOSE_COMMAND: &str = "Выберите команду!";
pub(crate) const THANKS_FOR_STICKER: &str = "Спасибо за стикер! Но выбери команду из списка!";
pub(crate) const BAD_STORED_AMOUNT: &str = "В таблице есть некорректная сумма, итог не посчитан.";
pub(crate) const BACKEND_FAILED: &str = "Не удалось связаться с таблицей, попробуйте позже.";

pub(crate) const START: &str = "/start";
pub(crate) const ADD_EXPENSE: &str = "/добавить_трату";
pub(crate) const ADD_EVENT: &str = "/добавить_событие";
pub(crate) const VIEW_EXPENSES: &str = "/просмотреть_траты";
pub(crate) const HELP: &str = "/помощь";

/// A top-level command.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    Start,
    AddExpense,
    AddEvent,
    ViewExpenses,
    Help,
}

impl Command {
    /// Recognizes a command word, with or without a `@botname` suffix and with or without
    /// arguments after it. English aliases are accepted too.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        if !word.starts_with('/') {
            return None;
        }
        let word = word.split('@').next().unwrap_or(word);
        match word {
            START => Some(Command::Start),
            ADD_EXPENSE | "/add_expense" => Some(Command::AddExpense),
            ADD_EVENT | "/add_event" => Some(Command::AddEvent),
            VIEW_EXPENSES | "/view_expenses" => Some(Command::ViewExpenses),
            HELP | "/help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// The keyboard to show with a reply.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Affordance {
    /// The four top-level commands.
    MainMenu,
    /// A single `/start` button.
    Restart,
    /// One button per artist, then `/start`.
    ArtistPicker(Vec<String>),
    /// Leave whatever keyboard the user has.
    Keep,
}

impl Affordance {
    /// Button labels row by row, or `None` to leave the keyboard alone.
    pub fn rows(&self) -> Option<Vec<Vec<String>>> {
        let rows = match self {
            Affordance::MainMenu => vec![
                vec![ADD_EXPENSE.to_string(), ADD_EVENT.to_string()],
                vec![VIEW_EXPENSES.to_string()],
                vec![HELP.to_string()],
            ],
            Affordance::Restart => vec![vec![START.to_string()]],
            Affordance::ArtistPicker(artists) => artists
                .iter()
                .map(|a| vec![a.clone()])
                .chain(std::iter::once(vec![START.to_string()]))
                .collect(),
            Affordance::Keep => return None,
        };
        Some(rows)
    }
}

/// A reply to one inbound message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reply {
    pub text: String,
    pub affordance: Affordance,
}

impl Reply {
    pub fn new(text: impl Into<String>, affordance: Affordance) -> Self {
        Self {
            text: text.into(),
            affordance,
        }
    }

    pub fn main_menu(text: impl Into<String>) -> Self {
        Self::new(text, Affordance::MainMenu)
    }

    pub fn restart(text: impl Into<String>) -> Self {
        Self::new(text, Affordance::Restart)
    }

    pub fn keep(text: impl Into<String>) -> Self {
        Self::new(text, Affordance::Keep)
    }
}

/// How to type an expense, listing the categories of `schema`.
pub(crate) fn expense_prompt(schema: &Schema) -> String {
    let (key, example) = match schema.filter_key {
        FilterKey::Date => ("дата", "22.05.2025"),
        FilterKey::Venue => ("город", "Москва"),
    };
    format!(
        "Введите трату в формате (запятая разделитель, комментарий необязателен): \n\
         {key},сумма,категория,кто потратил,комментарий. \n\
         Пример: {example},500,Бытовой райдер,Кирилл,купил пиво\n\
         Доступные категории: {}.",
        schema.category_names().collect::<Vec<_>>().join(", ")
    )
}

/// How to type an event.
pub(crate) fn event_prompt(filter_key: FilterKey) -> &'static str {
    match filter_key {
        FilterKey::Date => {
            "Введите артиста и список дат в формате: АРТИСТ,гггг-мм-дд,гггг-мм-дд,гггг-мм-дд \n\
             Пример: HORUS,2025-05-22,2025-05-23,2025-05-25"
        }
        FilterKey::Venue => {
            "Введите артиста и список городов с датами в формате: АРТИСТ,город:дд.мм.гггг,город:дд.мм.гггг \n\
             Пример: HORUS,Москва:22.05.2025,Казань:23.05.2025"
        }
    }
}

/// `category: sum` lines followed by the grand total.
pub(crate) fn report(summary: &Summary) -> String {
    let mut text = String::new();
    for (category, sum) in summary.buckets() {
        text.push_str(&format!("{category}: {sum}\n"));
    }
    text.push_str(&format!("Всего: {}", summary.total()));
    text
}

pub(crate) fn help(url: &str) -> String {
    format!("Ссылка на документацию: {url}")
}
