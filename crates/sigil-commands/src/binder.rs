//! Option binding: turns raw payload options and action-id tokens into typed
//! values a handler can read.

use std::collections::HashMap;

use sigil_core::{
    ChannelId, CommandDataOption, DispatchError, OptionType, OptionValue, RoleId, UserId,
};

use crate::registry::{ACTION_DELIMITER, ActionDescriptor, ActionParamType, CommandDescriptor};

/// Typed option values for one invocation, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundOptions {
    values: HashMap<String, OptionValue>,
}

macro_rules! typed_getter {
    ($name:ident, $required:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, name: &str) -> Option<$ty> {
            match self.values.get(name) {
                Some(OptionValue::$variant(v)) => Some(v.clone()),
                _ => None,
            }
        }

        pub fn $required(&self, name: &str) -> Result<$ty, DispatchError> {
            self.$name(name)
                .ok_or_else(|| DispatchError::invalid(format!("Missing option '{name}'")))
        }
    };
}

impl BoundOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    typed_getter!(text, required_text, Text, String);
    typed_getter!(integer, required_integer, Integer, i64);
    typed_getter!(boolean, required_boolean, Boolean, bool);
    typed_getter!(real, required_real, Real, f64);
    typed_getter!(user, required_user, User, UserId);
    typed_getter!(channel, required_channel, Channel, ChannelId);
    typed_getter!(role, required_role, Role, RoleId);
}

/// Bind `options` against the declared options of `descriptor`.
///
/// Every missing required option is reported at once. Options the descriptor
/// does not declare are logged and skipped.
pub fn bind_options(
    descriptor: &CommandDescriptor,
    options: &[CommandDataOption],
) -> Result<BoundOptions, DispatchError> {
    let missing: Vec<String> = descriptor
        .options
        .iter()
        .filter(|d| d.required && !options.iter().any(|o| o.name == d.name))
        .map(|d| d.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::MissingArguments {
            command: descriptor.path.clone(),
            missing,
        });
    }

    let mut bound = BoundOptions::default();
    for option in options {
        let Some(declared) = descriptor.option(&option.name) else {
            tracing::warn!(
                "Unknown option '{}' for command '{}', skipping",
                option.name,
                descriptor.path
            );
            continue;
        };
        let value = coerce(&option.name, declared.kind, &option.value)?;
        bound.values.insert(option.name.clone(), value);
    }
    Ok(bound)
}

fn coerce(name: &str, expected: OptionType, value: &OptionValue) -> Result<OptionValue, DispatchError> {
    match (expected, value) {
        (OptionType::Real, OptionValue::Integer(n)) => Ok(OptionValue::Real(*n as f64)),
        (expected, value) if value.kind() == expected => Ok(value.clone()),
        (expected, value) => Err(DispatchError::OptionType {
            option: name.to_string(),
            expected,
            got: value.kind(),
        }),
    }
}

/// One decoded action token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArg {
    Text(String),
    Integer(i64),
    Unsigned(u64),
}

/// Positional action arguments, addressable by parameter name or index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs {
    names: Vec<String>,
    values: Vec<ActionArg>,
}

impl ActionArgs {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&ActionArg> {
        self.values.get(index)
    }

    pub fn get(&self, name: &str) -> Option<&ActionArg> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ActionArg::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ActionArg::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn unsigned(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(ActionArg::Unsigned(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Decode `name_tok1_tok2...` against the declared parameters of `action`.
///
/// The first token is the action name and is not checked here. The remaining
/// token count must equal the parameter count exactly.
pub fn parse_action_tokens(
    action: &ActionDescriptor,
    custom_id: &str,
) -> Result<ActionArgs, DispatchError> {
    let tokens: Vec<&str> = custom_id.split(ACTION_DELIMITER).skip(1).collect();
    if tokens.len() != action.params.len() {
        return Err(DispatchError::ActionArity {
            expected: action.params.len(),
            got: tokens.len(),
        });
    }

    let mut args = ActionArgs::default();
    for (param, token) in action.params.iter().zip(tokens) {
        let bad_token = || DispatchError::ActionToken {
            option: param.name.clone(),
            token: token.to_string(),
        };
        let value = match param.kind {
            ActionParamType::Text => ActionArg::Text(token.to_string()),
            ActionParamType::Integer => ActionArg::Integer(token.parse().map_err(|_| bad_token())?),
            ActionParamType::Unsigned => ActionArg::Unsigned(token.parse().map_err(|_| bad_token())?),
        };
        args.names.push(param.name.clone());
        args.values.push(value);
    }
    Ok(args)
}
