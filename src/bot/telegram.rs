//! The Telegram transport: long polling, message classification and reply keyboards.

use crate::bot::controller::{Controller, Inbound};
use crate::bot::reply::{Affordance, Reply};
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, ReplyMarkup};
use tracing::{debug, info};

/// Polls Telegram until the process is stopped.
pub async fn run(token: impl Into<String>, controller: Arc<Controller>) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    match bot.get_me().await {
        Ok(me) => info!("Started as @{}", me.username()),
        Err(e) => anyhow::bail!("Unable to reach Telegram with the given bot token: {e}"),
    }

    let handler = Update::filter_message().endpoint(handle_message);
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .build()
        .dispatch()
        .await;
    info!("Stopped polling");
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, controller: Arc<Controller>) -> ResponseResult<()> {
    let inbound = match msg.text() {
        Some(text) => Inbound::Text(text.to_string()),
        None => Inbound::NonText,
    };
    debug!("Message from chat {}: {inbound:?}", msg.chat.id);
    let reply = controller.handle(msg.chat.id.0, inbound).await;
    send(&bot, msg.chat.id, reply).await
}

async fn send(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    let request = bot.send_message(chat_id, reply.text);
    match markup(&reply.affordance) {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}

fn markup(affordance: &Affordance) -> Option<ReplyMarkup> {
    let rows = affordance.rows()?;
    let buttons: Vec<Vec<KeyboardButton>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();
    let mut keyboard = KeyboardMarkup::new(buttons);
    keyboard.resize_keyboard = Some(true);
    Some(ReplyMarkup::Keyboard(keyboard))
}
