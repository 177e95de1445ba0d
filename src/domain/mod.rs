//! Domain types shared by the API and the bot.

pub mod items;
