use anyhow::Result;

use crate::llm::ResponseGenerator;
use crate::platform::IncomingMessage;

/// Keywords answered with a canned reply instead of going to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Signup,
    Knowledge,
    Event,
    Community,
    Idea,
    Help,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Signup,
        Command::Knowledge,
        Command::Event,
        Command::Community,
        Command::Idea,
        Command::Help,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Command::Signup => "signup",
            Command::Knowledge => "knowledge",
            Command::Event => "event",
            Command::Community => "community",
            Command::Idea => "idea",
            Command::Help => "help",
        }
    }

    pub fn response(self) -> &'static str {
        match self {
            Command::Signup => "Click here to sign up: https://forms.google.com/signup_form",
            Command::Knowledge => "Check out these resources: https://resources.example.com",
            Command::Event => {
                "Register for upcoming events: https://forms.google.com/event_registration"
            }
            Command::Community => {
                "Join our discussion group: https://chat.whatsapp.com/invite/community_group"
            }
            Command::Idea => "Submit your idea here: https://forms.google.com/idea_submission",
            Command::Help => {
                "Available Commands:\n\
                 - signup: Get the student signup link\n\
                 - knowledge: Access curated learning resources\n\
                 - event: Register for upcoming events\n\
                 - community: Join our discussion group\n\
                 - idea: Submit an idea for evaluation\n\
                 - help: Show this list of commands"
            }
        }
    }

    /// Case-insensitive exact match. Surrounding whitespace or punctuation
    /// makes the text free text.
    pub fn parse(text: &str) -> Option<Command> {
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|command| command.keyword() == lowered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Static(&'static str),
    Delegate,
}

pub fn classify(text: &str) -> Reply {
    match Command::parse(text) {
        Some(command) => Reply::Static(command.response()),
        None => Reply::Delegate,
    }
}

/// Canned response for commands; everything else goes to the generator verbatim.
pub async fn resolve_reply(
    message: &IncomingMessage,
    generator: &dyn ResponseGenerator,
) -> Result<String> {
    match classify(&message.text) {
        Reply::Static(response) => Ok(response.to_string()),
        Reply::Delegate => {
            generator
                .generate_response(&message.text, &message.user_id, &message.user_name)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::MockGenerator;

    fn incoming(text: &str) -> IncomingMessage {
        IncomingMessage {
            user_id: "16505551234".to_string(),
            user_name: "Ana".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_any_casing() {
        assert_eq!(Command::parse("signup"), Some(Command::Signup));
        assert_eq!(Command::parse("SignUp"), Some(Command::Signup));
        assert_eq!(Command::parse("HELP"), Some(Command::Help));
    }

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(Command::parse(" help"), None);
        assert_eq!(Command::parse("help!"), None);
        assert_eq!(Command::parse("sign up"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_every_command_round_trips_its_keyword() {
        for command in Command::ALL {
            assert_eq!(Command::parse(command.keyword()), Some(command));
            assert!(!command.response().is_empty());
        }
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = Command::Help.response();
        assert!(help.starts_with("Available Commands:\n- signup: "));
        for command in Command::ALL {
            assert!(help.contains(&format!("- {}: ", command.keyword())));
        }
        assert_eq!(help.lines().count(), 7);
    }

    #[test]
    fn test_help_reply_verbatim() {
        assert_eq!(
            classify("HELP"),
            Reply::Static(
                "Available Commands:\n- signup: Get the student signup link\n- knowledge: Access curated learning resources\n- event: Register for upcoming events\n- community: Join our discussion group\n- idea: Submit an idea for evaluation\n- help: Show this list of commands"
            )
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("Event"),
            Reply::Static("Register for upcoming events: https://forms.google.com/event_registration")
        );
        assert_eq!(classify("hello there"), Reply::Delegate);
    }

    #[tokio::test]
    async fn test_command_does_not_delegate() {
        let generator = MockGenerator::replying("should not be used");
        let reply = resolve_reply(&incoming("SIGNUP"), &generator).await.unwrap();
        assert_eq!(
            reply,
            "Click here to sign up: https://forms.google.com/signup_form"
        );
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_free_text_delegates_with_sender() {
        let generator = MockGenerator::replying("Hi!");
        let reply = resolve_reply(&incoming("hello there"), &generator)
            .await
            .unwrap();
        assert_eq!(reply, "Hi!");
        assert_eq!(
            generator.calls(),
            vec![(
                "hello there".to_string(),
                "16505551234".to_string(),
                "Ana".to_string()
            )]
        );
    }
}
