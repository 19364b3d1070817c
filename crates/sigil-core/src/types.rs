//! Wire-level types shared by the dispatcher, the scheduler and platform clients.

use serde::{Deserialize, Serialize};

pub type WorkspaceId = u64;
pub type ChannelId = u64;
pub type UserId = u64;
pub type RoleId = u64;
pub type MessageId = u64;

/// Every option type an interaction payload can carry.
///
/// `SubCommand` and `SubCommandGroup` only ever appear in payloads; they are
/// never valid as the declared type of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Text,
    Integer,
    Boolean,
    Real,
    User,
    Channel,
    Role,
    SubCommand,
    SubCommandGroup,
}

impl OptionType {
    /// Whether this type can be declared on a command option.
    pub fn is_value_type(&self) -> bool {
        !matches!(self, OptionType::SubCommand | OptionType::SubCommandGroup)
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptionType::Text => "text",
            OptionType::Integer => "integer",
            OptionType::Boolean => "boolean",
            OptionType::Real => "real",
            OptionType::User => "user",
            OptionType::Channel => "channel",
            OptionType::Role => "role",
            OptionType::SubCommand => "sub_command",
            OptionType::SubCommandGroup => "sub_command_group",
        };
        f.write_str(name)
    }
}

/// A single option value as supplied by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Real(f64),
    User(UserId),
    Channel(ChannelId),
    Role(RoleId),
    SubCommand(Vec<CommandDataOption>),
    SubCommandGroup(Vec<CommandDataOption>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionType {
        match self {
            OptionValue::Text(_) => OptionType::Text,
            OptionValue::Integer(_) => OptionType::Integer,
            OptionValue::Boolean(_) => OptionType::Boolean,
            OptionValue::Real(_) => OptionType::Real,
            OptionValue::User(_) => OptionType::User,
            OptionValue::Channel(_) => OptionType::Channel,
            OptionValue::Role(_) => OptionType::Role,
            OptionValue::SubCommand(_) => OptionType::SubCommand,
            OptionValue::SubCommandGroup(_) => OptionType::SubCommandGroup,
        }
    }

    /// Nested options for subcommand-typed values.
    pub fn nested(&self) -> Option<&[CommandDataOption]> {
        match self {
            OptionValue::SubCommand(opts) | OptionValue::SubCommandGroup(opts) => Some(opts),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Text(s) => f.write_str(s),
            OptionValue::Integer(n) => write!(f, "{n}"),
            OptionValue::Boolean(b) => write!(f, "{b}"),
            OptionValue::Real(r) => write!(f, "{r}"),
            OptionValue::User(id) => write!(f, "<@{id}>"),
            OptionValue::Channel(id) => write!(f, "<#{id}>"),
            OptionValue::Role(id) => write!(f, "<@&{id}>"),
            OptionValue::SubCommand(_) | OptionValue::SubCommandGroup(_) => Ok(()),
        }
    }
}

/// A named option in an interaction payload. Subcommand trees nest through
/// [`OptionValue::SubCommand`] / [`OptionValue::SubCommandGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    pub value: OptionValue,
}

impl CommandDataOption {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn sub_command(name: impl Into<String>, options: Vec<CommandDataOption>) -> Self {
        Self::new(name, OptionValue::SubCommand(options))
    }

    pub fn group(name: impl Into<String>, options: Vec<CommandDataOption>) -> Self {
        Self::new(name, OptionValue::SubCommandGroup(options))
    }

    pub fn is_sub_command(&self) -> bool {
        !self.value.kind().is_value_type()
    }
}

/// Identity of whoever triggered an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    /// Roles the caller holds in the interaction's workspace.
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl Caller {
    pub fn has_any_role(&self, required: &[RoleId]) -> bool {
        required.iter().any(|r| self.roles.contains(r))
    }
}

/// What the interaction asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionKind {
    /// Invoke a named command.
    Command {
        name: String,
        #[serde(default)]
        options: Option<Vec<CommandDataOption>>,
    },
    /// Trigger an action through a control element on an existing message.
    /// `custom_id` is the compound `name_token1_token2` identifier.
    Action {
        custom_id: String,
        resource_id: MessageId,
    },
}

/// One inbound event from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    pub caller: Caller,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

impl Interaction {
    pub fn command(
        workspace_id: WorkspaceId,
        channel_id: ChannelId,
        caller: Caller,
        name: impl Into<String>,
        options: Option<Vec<CommandDataOption>>,
    ) -> Self {
        Self {
            workspace_id,
            channel_id,
            caller,
            kind: InteractionKind::Command {
                name: name.into(),
                options,
            },
        }
    }

    pub fn action(
        workspace_id: WorkspaceId,
        channel_id: ChannelId,
        caller: Caller,
        custom_id: impl Into<String>,
        resource_id: MessageId,
    ) -> Self {
        Self {
            workspace_id,
            channel_id,
            caller,
            kind: InteractionKind::Action {
                custom_id: custom_id.into(),
                resource_id,
            },
        }
    }
}

/// A field inside an [`Embed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Structured rich content. Rendering is entirely up to the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// A control element attached to a reply. Its `custom_id` comes back as an
/// action interaction when pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub custom_id: String,
}

/// An outbound reply to an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: Option<String>,
    pub embed: Option<Embed>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    /// Only visible to the caller.
    #[serde(default)]
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn button(mut self, label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        self.buttons.push(Button {
            label: label.into(),
            custom_id: custom_id.into(),
        });
        self
    }
}

/// Editable view of an existing message, handed to update mutators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEdit {
    pub text: Option<String>,
    pub embed: Option<Embed>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}
