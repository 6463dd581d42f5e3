//! Admin chat commands.

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    AddPost,
    DeletePost,
    ListPosts,
    Cancel,
}

impl Command {
    /// Parse the leading command of a message.
    ///
    /// Accepts `/cmd`, `/cmd@BotName` and trailing arguments. Returns `None`
    /// for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(cmd, _bot)| cmd);

        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "add_post" => Some(Command::AddPost),
            "delete_post" => Some(Command::DeletePost),
            "list_posts" => Some(Command::ListPosts),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Help => "/help",
            Command::AddPost => "/add_post",
            Command::DeletePost => "/delete_post",
            Command::ListPosts => "/list_posts",
            Command::Cancel => "/cancel",
        }
    }
}
