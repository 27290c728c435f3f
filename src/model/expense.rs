use crate::model::{Amount, FilterKey, LedgerDate, Schema};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};

/// What the first token of an expense payload identifies.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKey {
    /// The date the money was spent.
    Date(LedgerDate),
    /// The venue label of an event worksheet; the date is read from that worksheet.
    Venue(String),
}

/// A validated expense as typed by the user, e.g.
/// `22.05.2025,500,Бытовой райдер,Кирилл,купил воду`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub key: ExpenseKey,
    pub amount: Amount,
    pub category: String,
    pub spender: String,
    pub comment: String,
}

impl ExpenseInput {
    /// Parses a comma separated expense. The comment is optional and is kept as typed, commas and
    /// spaces included; only its outer whitespace is trimmed.
    pub fn parse(payload: &str, schema: &Schema) -> anyhow::Result<Self> {
        let tokens: Vec<&str> = payload.splitn(5, ',').map(str::trim).collect();
        ensure!(
            tokens.len() >= 4,
            "An expense needs at least a {}, an amount, a category and a spender, got '{payload}'",
            match schema.filter_key {
                FilterKey::Date => "date",
                FilterKey::Venue => "venue",
            }
        );

        let key = match schema.filter_key {
            FilterKey::Date => ExpenseKey::Date(LedgerDate::parse(tokens[0])?),
            FilterKey::Venue => {
                ensure!(!tokens[0].is_empty(), "The venue is empty");
                ExpenseKey::Venue(tokens[0].to_string())
            }
        };

        let amount = tokens[1]
            .parse::<Amount>()
            .context("Invalid expense amount")?;

        let category = match schema.category(tokens[2]) {
            Some(c) => c.name.clone(),
            None => bail!(
                "Unknown category '{}', expected one of: {}",
                tokens[2],
                schema.category_names().collect::<Vec<_>>().join(", ")
            ),
        };

        ensure!(!tokens[3].is_empty(), "The spender is empty");

        Ok(Self {
            key,
            amount,
            category,
            spender: tokens[3].to_string(),
            comment: tokens.get(4).copied().unwrap_or_default().to_string(),
        })
    }
}

/// One row of the ledger worksheet, ready to append.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: LedgerDate,
    pub amount: Amount,
    pub category: String,
    pub spender: String,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

impl LedgerRow {
    /// Builds the row from user input once the date is known.
    pub fn new(input: ExpenseInput, date: LedgerDate) -> Self {
        let venue = match input.key {
            ExpenseKey::Date(_) => None,
            ExpenseKey::Venue(v) => Some(v),
        };
        Self {
            date,
            amount: input.amount,
            category: input.category,
            spender: input.spender,
            comment: input.comment,
            venue,
        }
    }

    /// Cell values in ledger column order.
    pub fn values(&self) -> Vec<String> {
        let mut values = vec![
            self.date.stored(),
            self.amount.to_string(),
            self.category.clone(),
            self.spender.clone(),
            self.comment.clone(),
        ];
        if let Some(venue) = &self.venue {
            values.push(venue.clone());
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_expense() {
        let schema = Schema::date_keyed();
        let input =
            ExpenseInput::parse("22.05.2025, 1 500 ,Бытовой райдер,Кирилл,купил воду", &schema)
                .unwrap();
        assert_eq!(
            input.key,
            ExpenseKey::Date(LedgerDate::parse("22-05-2025").unwrap())
        );
        assert_eq!(input.amount.value(), 1500);
        assert_eq!(input.category, "Бытовой райдер");
        assert_eq!(input.spender, "Кирилл");
        assert_eq!(input.comment, "купил воду");
    }

    #[test]
    fn test_parse_comment_optional_and_may_have_commas() {
        let schema = Schema::date_keyed();
        let input = ExpenseInput::parse("22.05.2025,500,Еда,Кирилл", &schema).unwrap();
        assert_eq!(input.comment, "");
        let input = ExpenseInput::parse("22.05.2025,500,Еда,Кирилл,пицца, кола", &schema).unwrap();
        assert_eq!(input.comment, "пицца, кола");
        let input =
            ExpenseInput::parse("22.05.2025,500,Еда,Кирилл, пиво, чипсы и вода ", &schema).unwrap();
        assert_eq!(input.comment, "пиво, чипсы и вода");
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        let schema = Schema::date_keyed();
        assert!(ExpenseInput::parse("22.05.2025,25.07.2026", &schema).is_err());
        assert!(ExpenseInput::parse("22.05.2025,пятьсот,Еда,Кирилл", &schema).is_err());
        assert!(ExpenseInput::parse("вчера,500,Еда,Кирилл", &schema).is_err());
        assert!(ExpenseInput::parse("22.05.2025,500,Пиво,Кирилл", &schema).is_err());
        assert!(ExpenseInput::parse("22.05.2025,500,Еда,", &schema).is_err());
    }

    #[test]
    fn test_parse_venue_keyed() {
        let schema = Schema::venue_keyed();
        let input = ExpenseInput::parse("Москва,300,Реклама,Аня", &schema).unwrap();
        assert_eq!(input.key, ExpenseKey::Venue("Москва".to_string()));
        assert_eq!(input.category, "Реклама");
    }

    #[test]
    fn test_row_values() {
        let schema = Schema::venue_keyed();
        let input = ExpenseInput::parse("Москва,1 000,Такси,Аня,до площадки", &schema).unwrap();
        let row = LedgerRow::new(input, LedgerDate::parse_event("2025-05-22").unwrap());
        assert_eq!(
            row.values(),
            vec!["22-05-2025", "1000", "Такси", "Аня", "до площадки", "Москва"]
        );
    }
}
