//! Plugin trait definitions

use crate::application::errors::{BotResult, HandlerResult};
use crate::application::messaging::Replies;
use crate::application::Bot;
use crate::domain::entities::{
    Contact, ImageChange, IncomingMessage, MemberEvent, Priority, SettingKey, StatusUpdate,
    StoredSetting, TitleChange,
};

/// Listener interface every plugin implements.
///
/// All hooks default to doing nothing, so a plugin only overrides the
/// events it cares about.
pub trait Plugin: Send + Sync {
    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Position among other plugins for every hook.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Called once the bot is assembled, or right after registration for
    /// plugins added later. Commands and filters are registered here.
    fn init(&self, _bot: &Bot) -> BotResult<()> {
        Ok(())
    }

    /// Bot is about to start processing messages.
    fn start(&self, _bot: &Bot) -> HandlerResult {
        Ok(())
    }

    /// Bot is shutting down.
    fn shutdown(&self, _bot: &Bot) -> HandlerResult {
        Ok(())
    }

    /// Ordinary incoming message. Returning `true` consumes it and no
    /// later plugin sees it.
    fn incoming_message(
        &self,
        _bot: &Bot,
        _message: &IncomingMessage,
        _replies: &mut Replies,
    ) -> HandlerResult<bool> {
        Ok(false)
    }

    fn member_added(&self, _bot: &Bot, _event: &MemberEvent, _replies: &mut Replies) -> HandlerResult {
        Ok(())
    }

    fn member_removed(
        &self,
        _bot: &Bot,
        _event: &MemberEvent,
        _replies: &mut Replies,
    ) -> HandlerResult {
        Ok(())
    }

    fn title_changed(
        &self,
        _bot: &Bot,
        _event: &TitleChange,
        _replies: &mut Replies,
    ) -> HandlerResult {
        Ok(())
    }

    fn image_changed(
        &self,
        _bot: &Bot,
        _event: &ImageChange,
        _replies: &mut Replies,
    ) -> HandlerResult {
        Ok(())
    }

    /// Application status update attached to `message`.
    fn status_update(
        &self,
        _bot: &Bot,
        _message: &IncomingMessage,
        _update: &StatusUpdate,
        _replies: &mut Replies,
    ) -> HandlerResult {
        Ok(())
    }

    /// Answer a setting lookup instead of the database. The first plugin
    /// returning a value wins.
    fn get_setting(&self, _bot: &Bot, _key: &SettingKey) -> HandlerResult<Option<String>> {
        Ok(None)
    }

    /// Take over a setting write. The first plugin returning `Some` wins,
    /// otherwise the value goes to the database.
    fn set_setting(
        &self,
        _bot: &Bot,
        _key: &SettingKey,
        _value: &str,
    ) -> HandlerResult<Option<StoredSetting>> {
        Ok(None)
    }

    /// A contact was banned.
    fn ban(&self, _bot: &Bot, _contact: &Contact) -> HandlerResult {
        Ok(())
    }

    /// A contact was unbanned.
    fn unban(&self, _bot: &Bot, _contact: &Contact) -> HandlerResult {
        Ok(())
    }
}
