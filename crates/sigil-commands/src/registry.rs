//! Descriptor registry: the immutable table of commands, subcommands and
//! actions the dispatcher routes against.
//!
//! Registration is explicit. Callers describe every command with plain
//! [`CommandSpec`] / [`SubcommandSpec`] / [`ActionSpec`] values, hand them to a
//! [`RegistryBuilder`], and `build()` either returns a consistent [`Registry`]
//! or the first [`RegistrationError`]. There is no way to mutate a registry
//! after it has been built.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use sigil_core::{OptionType, OptionValue, RegistrationError};

use crate::handler::{ActionFactory, ActionHandler, CommandFactory, CommandHandler};

/// Delimiter between the action name and its positional tokens.
pub const ACTION_DELIMITER: char = '_';

/// Who may see a command before any role configuration is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPermission {
    #[default]
    Everyone,
    AdminOnly,
}

/// A selectable value offered for an option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub name: String,
    pub value: OptionValue,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Produces the current choices for an option.
pub type ChoiceSource = fn() -> Vec<Choice>;

/// A declared command option.
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    pub name: String,
    pub description: String,
    pub kind: OptionType,
    pub required: bool,
    pub choices: Option<ChoiceSource>,
}

impl OptionDescriptor {
    pub fn required(name: impl Into<String>, description: impl Into<String>, kind: OptionType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
            choices: None,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>, kind: OptionType) -> Self {
        Self {
            required: false,
            ..Self::required(name, description, kind)
        }
    }

    pub fn with_choices(mut self, source: ChoiceSource) -> Self {
        self.choices = Some(source);
        self
    }
}

/// Type of a positional action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionParamType {
    Text,
    Integer,
    Unsigned,
}

/// A positional action parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionParam {
    pub name: String,
    pub kind: ActionParamType,
}

impl ActionParam {
    pub fn new(name: impl Into<String>, kind: ActionParamType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Registration data for a top-level command.
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub default_permission: DefaultPermission,
    pub options: Vec<OptionDescriptor>,
    pub actions: Vec<String>,
    pub schedulable: bool,
    pub dynamic_subcommands: bool,
    pub factory: CommandFactory,
}

impl CommandSpec {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CommandHandler> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            default_permission: DefaultPermission::Everyone,
            options: Vec::new(),
            actions: Vec::new(),
            schedulable: false,
            dynamic_subcommands: false,
            factory: Arc::new(factory),
        }
    }

    pub fn option(mut self, option: OptionDescriptor) -> Self {
        self.options.push(option);
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.default_permission = DefaultPermission::AdminOnly;
        self
    }

    /// Allow the scheduler to re-fire this command.
    pub fn schedulable(mut self) -> Self {
        self.schedulable = true;
        self
    }

    pub fn dynamic_subcommands(mut self) -> Self {
        self.dynamic_subcommands = true;
        self
    }
}

/// Registration data for a subcommand. `parent` is the space-separated path
/// from the top-level command, e.g. `"schedule"` or `"config roles"`.
pub struct SubcommandSpec {
    pub parent: String,
    pub name: String,
    pub description: String,
    pub permission_override: Option<DefaultPermission>,
    pub options: Vec<OptionDescriptor>,
    pub actions: Vec<String>,
    pub dynamic_subcommands: bool,
    pub factory: CommandFactory,
}

impl SubcommandSpec {
    pub fn new<F>(
        parent: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Box<dyn CommandHandler> + Send + Sync + 'static,
    {
        Self {
            parent: parent.into(),
            name: name.into(),
            description: description.into(),
            permission_override: None,
            options: Vec::new(),
            actions: Vec::new(),
            dynamic_subcommands: false,
            factory: Arc::new(factory),
        }
    }

    pub fn option(mut self, option: OptionDescriptor) -> Self {
        self.options.push(option);
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    pub fn permission(mut self, permission: DefaultPermission) -> Self {
        self.permission_override = Some(permission);
        self
    }

    pub fn dynamic_subcommands(mut self) -> Self {
        self.dynamic_subcommands = true;
        self
    }
}

/// Registration data for an action.
pub struct ActionSpec {
    pub name: String,
    pub params: Vec<ActionParam>,
    pub factory: ActionFactory,
}

impl ActionSpec {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ActionHandler> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    pub fn param(mut self, name: impl Into<String>, kind: ActionParamType) -> Self {
        self.params.push(ActionParam::new(name, kind));
        self
    }
}

type NodeId = usize;

/// A registered command or subcommand.
pub struct CommandDescriptor {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub name: String,
    /// Full path from the top-level command, e.g. `schedule add`.
    pub path: String,
    /// Name of the top-level command this descriptor lives under.
    pub root: String,
    pub description: String,
    pub default_permission: DefaultPermission,
    pub options: Vec<OptionDescriptor>,
    pub actions: BTreeMap<String, Arc<ActionDescriptor>>,
    pub schedulable: bool,
    /// Forward unregistered nested subcommands to this handler.
    pub dynamic_subcommands: bool,
    factory: CommandFactory,
}

impl CommandDescriptor {
    pub fn is_subcommand(&self) -> bool {
        self.parent.is_some()
    }

    pub fn option(&self, name: &str) -> Option<&OptionDescriptor> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Build a fresh handler instance.
    pub fn instantiate(&self) -> Box<dyn CommandHandler> {
        (self.factory)()
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("path", &self.path)
            .field("options", &self.options.len())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A registered action.
pub struct ActionDescriptor {
    pub name: String,
    pub params: Vec<ActionParam>,
    /// Path of the command that lists this action.
    pub owner: String,
    /// Top-level command of the owner, used for role lookups.
    pub owner_root: String,
    factory: ActionFactory,
}

impl ActionDescriptor {
    pub fn instantiate(&self) -> Box<dyn ActionHandler> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Collects registration data and validates it into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    commands: Vec<CommandSpec>,
    subcommands: Vec<SubcommandSpec>,
    actions: Vec<ActionSpec>,
    allowed: HashSet<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(mut self, spec: CommandSpec) -> Self {
        self.commands.push(spec);
        self
    }

    pub fn subcommand(mut self, spec: SubcommandSpec) -> Self {
        self.subcommands.push(spec);
        self
    }

    pub fn action(mut self, spec: ActionSpec) -> Self {
        self.actions.push(spec);
        self
    }

    /// Only load the named top-level commands. An empty list loads everything.
    pub fn allow_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Registry, RegistrationError> {
        let mut pending_actions: HashMap<String, ActionSpec> = HashMap::new();
        for spec in self.actions {
            if spec.name.is_empty() || spec.name.contains(ACTION_DELIMITER) {
                return Err(RegistrationError::InvalidActionName(spec.name));
            }
            if pending_actions.contains_key(&spec.name) {
                return Err(RegistrationError::DuplicateAction(spec.name));
            }
            pending_actions.insert(spec.name.clone(), spec);
        }

        let mut registry = Registry {
            nodes: Vec::new(),
            roots: HashMap::new(),
            children: HashMap::new(),
            actions: HashMap::new(),
        };
        let mut claims: HashMap<String, (NodeId, String)> = HashMap::new();
        let mut skipped: HashSet<String> = HashSet::new();

        for spec in self.commands {
            if registry.roots.contains_key(&spec.name) {
                return Err(RegistrationError::DuplicateCommand(spec.name));
            }
            if !(self.allowed.is_empty() || self.allowed.contains(&spec.name)) {
                tracing::debug!("Skipping command {} (not in allowed_commands)", spec.name);
                skipped.insert(spec.name);
                continue;
            }
            validate_options(&spec.name, &spec.options)?;

            let id = registry.nodes.len();
            claim_actions(&mut claims, &pending_actions, id, &spec.name, &spec.actions)?;
            registry.roots.insert(spec.name.clone(), id);
            registry.nodes.push(CommandDescriptor {
                id,
                parent: None,
                children: Vec::new(),
                path: spec.name.clone(),
                root: spec.name.clone(),
                name: spec.name,
                description: spec.description,
                default_permission: spec.default_permission,
                options: spec.options,
                actions: BTreeMap::new(),
                schedulable: spec.schedulable,
                dynamic_subcommands: spec.dynamic_subcommands,
                factory: spec.factory,
            });
        }

        // Parents must exist before their children, so register shallow
        // paths first.
        let mut subcommands = self.subcommands;
        subcommands.sort_by_key(|s| s.parent.split_whitespace().count());

        for spec in subcommands {
            let mut segments = spec.parent.split_whitespace();
            let root_name = segments.next().unwrap_or_default();
            if skipped.contains(root_name) {
                continue;
            }
            let unknown_parent = || RegistrationError::UnknownParent {
                name: spec.name.clone(),
                parent: spec.parent.clone(),
            };
            let mut parent_id = *registry.roots.get(root_name).ok_or_else(unknown_parent)?;
            for segment in segments {
                parent_id = *registry
                    .children
                    .get(&(parent_id, segment.to_string()))
                    .ok_or_else(unknown_parent)?;
            }

            if registry.children.contains_key(&(parent_id, spec.name.clone())) {
                return Err(RegistrationError::DuplicateSubcommand {
                    parent: registry.nodes[parent_id].path.clone(),
                    name: spec.name,
                });
            }

            let path = format!("{} {}", registry.nodes[parent_id].path, spec.name);
            validate_options(&path, &spec.options)?;

            let root = registry.nodes[parent_id].root.clone();
            let root_permission = registry.roots.get(&root).map(|&r| registry.nodes[r].default_permission);
            let id = registry.nodes.len();
            claim_actions(&mut claims, &pending_actions, id, &path, &spec.actions)?;

            registry.children.insert((parent_id, spec.name.clone()), id);
            registry.nodes[parent_id].children.push(id);
            registry.nodes.push(CommandDescriptor {
                id,
                parent: Some(parent_id),
                children: Vec::new(),
                name: spec.name,
                path,
                root,
                description: spec.description,
                default_permission: spec
                    .permission_override
                    .or(root_permission)
                    .unwrap_or_default(),
                options: spec.options,
                actions: BTreeMap::new(),
                schedulable: false,
                dynamic_subcommands: spec.dynamic_subcommands,
                factory: spec.factory,
            });
        }

        for (name, spec) in pending_actions {
            let Some((owner_id, _)) = claims.get(&name) else {
                tracing::debug!("Action {name} is not claimed by any loaded command");
                continue;
            };
            let owner = &registry.nodes[*owner_id];
            let descriptor = Arc::new(ActionDescriptor {
                name: spec.name,
                params: spec.params,
                owner: owner.path.clone(),
                owner_root: owner.root.clone(),
                factory: spec.factory,
            });
            registry.nodes[*owner_id]
                .actions
                .insert(name.clone(), Arc::clone(&descriptor));
            registry.actions.insert(name, descriptor);
        }

        tracing::info!(
            "📚 Registry built: {} commands, {} subcommands, {} actions",
            registry.roots.len(),
            registry.nodes.len() - registry.roots.len(),
            registry.actions.len()
        );
        Ok(registry)
    }
}

fn validate_options(owner: &str, options: &[OptionDescriptor]) -> Result<(), RegistrationError> {
    let mut seen = HashSet::new();
    for option in options {
        if !option.kind.is_value_type() {
            return Err(RegistrationError::UnsupportedOptionType {
                owner: owner.to_string(),
                option: option.name.clone(),
                kind: option.kind,
            });
        }
        if !seen.insert(option.name.as_str()) {
            return Err(RegistrationError::DuplicateOption {
                owner: owner.to_string(),
                option: option.name.clone(),
            });
        }
    }
    Ok(())
}

fn claim_actions(
    claims: &mut HashMap<String, (NodeId, String)>,
    known: &HashMap<String, ActionSpec>,
    id: NodeId,
    path: &str,
    actions: &[String],
) -> Result<(), RegistrationError> {
    for action in actions {
        if !known.contains_key(action) {
            return Err(RegistrationError::UnknownAction {
                command: path.to_string(),
                action: action.clone(),
            });
        }
        if let Some((_, first)) = claims.get(action) {
            return Err(RegistrationError::ActionClaimedTwice {
                action: action.clone(),
                first: first.clone(),
                second: path.to_string(),
            });
        }
        claims.insert(action.clone(), (id, path.to_string()));
    }
    Ok(())
}

/// Immutable lookup table of everything registered at startup.
#[derive(Debug)]
pub struct Registry {
    nodes: Vec<CommandDescriptor>,
    roots: HashMap<String, NodeId>,
    children: HashMap<(NodeId, String), NodeId>,
    actions: HashMap<String, Arc<ActionDescriptor>>,
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Install the process-wide registry. Fails if one is already installed.
    pub fn install_global(registry: Registry) -> Result<Arc<Registry>, RegistrationError> {
        let registry = Arc::new(registry);
        GLOBAL
            .set(Arc::clone(&registry))
            .map_err(|_| RegistrationError::AlreadyInstalled)?;
        Ok(registry)
    }

    /// The process-wide registry, if installed.
    pub fn global() -> Option<Arc<Registry>> {
        GLOBAL.get().cloned()
    }

    /// Top-level command by name.
    pub fn command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.roots.get(name).map(|&id| &self.nodes[id])
    }

    /// Registered child `name` of `parent`.
    pub fn child(&self, parent: &CommandDescriptor, name: &str) -> Option<&CommandDescriptor> {
        self.children
            .get(&(parent.id, name.to_string()))
            .map(|&id| &self.nodes[id])
    }

    pub fn children<'a>(&'a self, parent: &'a CommandDescriptor) -> impl Iterator<Item = &'a CommandDescriptor> + 'a {
        parent.children.iter().map(|&id| &self.nodes[id])
    }

    pub fn parent(&self, descriptor: &CommandDescriptor) -> Option<&CommandDescriptor> {
        descriptor.parent.map(|id| &self.nodes[id])
    }

    /// Action by name. Only actions claimed by a loaded command are routable.
    pub fn action(&self, name: &str) -> Option<&Arc<ActionDescriptor>> {
        self.actions.get(name)
    }

    /// Top-level commands sorted by name.
    pub fn commands(&self) -> Vec<&CommandDescriptor> {
        let mut list: Vec<_> = self.roots.values().map(|&id| &self.nodes[id]).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn command_count(&self) -> usize {
        self.roots.len()
    }

    /// Publishable definitions for every top-level command.
    pub fn definitions(&self) -> Vec<CommandDefinition> {
        self.commands()
            .into_iter()
            .map(|cmd| CommandDefinition {
                name: cmd.name.clone(),
                description: cmd.description.clone(),
                default_permission: cmd.default_permission,
                options: self.option_definitions(cmd),
            })
            .collect()
    }

    fn option_definitions(&self, descriptor: &CommandDescriptor) -> Vec<OptionDefinition> {
        let mut defs: Vec<OptionDefinition> = descriptor
            .options
            .iter()
            .map(|o| OptionDefinition {
                name: o.name.clone(),
                description: o.description.clone(),
                kind: o.kind,
                required: o.required,
                choices: o.choices.map(|source| source()).unwrap_or_default(),
                options: Vec::new(),
            })
            .collect();

        for child in self.children(descriptor) {
            let nested = self.option_definitions(child);
            let kind = if child.children.is_empty() {
                OptionType::SubCommand
            } else {
                OptionType::SubCommandGroup
            };
            defs.push(OptionDefinition {
                name: child.name.clone(),
                description: child.description.clone(),
                kind,
                required: false,
                choices: Vec::new(),
                options: nested,
            });
        }
        defs
    }
}

/// Serializable command definition for the platform to publish.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub default_permission: DefaultPermission,
    pub options: Vec<OptionDefinition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::handler::{ActionContext, CommandContext};
    use async_trait::async_trait;

    pub(crate) struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn handle(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl ActionHandler for Noop {
        async fn handle(&mut self, _ctx: &ActionContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn cmd(name: &str) -> CommandSpec {
        CommandSpec::new(name, format!("{name} command"), || Box::new(Noop))
    }

    pub(crate) fn sub(parent: &str, name: &str) -> SubcommandSpec {
        SubcommandSpec::new(parent, name, format!("{name} subcommand"), || Box::new(Noop))
    }

    pub(crate) fn act(name: &str) -> ActionSpec {
        ActionSpec::new(name, || Box::new(Noop))
    }

    #[test]
    fn test_duplicate_command_fails() {
        let err = Registry::builder()
            .command(cmd("ping"))
            .command(cmd("ping"))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateCommand("ping".into()));
    }

    #[test]
    fn test_duplicate_action_fails() {
        let err = Registry::builder()
            .action(act("vote"))
            .action(act("vote"))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateAction("vote".into()));
    }

    #[test]
    fn test_duplicate_detection_is_deterministic() {
        for _ in 0..5 {
            let result = Registry::builder()
                .command(cmd("a"))
                .command(cmd("b"))
                .command(cmd("a"))
                .build();
            assert_eq!(
                result.err(),
                Some(RegistrationError::DuplicateCommand("a".into()))
            );
        }
    }

    #[test]
    fn test_unknown_parent_fails() {
        let err = Registry::builder()
            .command(cmd("schedule"))
            .subcommand(sub("schedule missing", "add"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownParent { .. }));
    }

    #[test]
    fn test_duplicate_subcommand_under_same_parent_fails() {
        let err = Registry::builder()
            .command(cmd("schedule"))
            .subcommand(sub("schedule", "add"))
            .subcommand(sub("schedule", "add"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateSubcommand { .. }));
    }

    #[test]
    fn test_same_subcommand_name_under_different_parents() {
        let reg = Registry::builder()
            .command(cmd("schedule"))
            .command(cmd("config"))
            .subcommand(sub("schedule", "list"))
            .subcommand(sub("config", "list"))
            .build()
            .unwrap();
        let schedule = reg.command("schedule").unwrap();
        let config = reg.command("config").unwrap();
        assert_eq!(reg.child(schedule, "list").unwrap().path, "schedule list");
        assert_eq!(reg.child(config, "list").unwrap().path, "config list");
    }

    #[test]
    fn test_unsupported_option_type_fails() {
        let err = Registry::builder()
            .command(cmd("host").option(OptionDescriptor::required(
                "nested",
                "not allowed",
                OptionType::SubCommand,
            )))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnsupportedOptionType { .. }));
    }

    #[test]
    fn test_duplicate_option_fails() {
        let err = Registry::builder()
            .command(
                cmd("host")
                    .option(OptionDescriptor::required("boss", "", OptionType::Integer))
                    .option(OptionDescriptor::optional("boss", "", OptionType::Text)),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateOption { .. }));
    }

    #[test]
    fn test_action_name_with_delimiter_fails() {
        let err = Registry::builder().action(act("bad_name")).build().unwrap_err();
        assert_eq!(err, RegistrationError::InvalidActionName("bad_name".into()));
    }

    #[test]
    fn test_unregistered_action_reference_fails() {
        let err = Registry::builder()
            .command(cmd("host").action("missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownAction { .. }));
    }

    #[test]
    fn test_action_claimed_twice_fails() {
        let err = Registry::builder()
            .action(act("quit"))
            .command(cmd("a").action("quit"))
            .command(cmd("b").action("quit"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ActionClaimedTwice { .. }));
    }

    #[test]
    fn test_action_lookup_returns_owner() {
        let reg = Registry::builder()
            .action(act("quit").param("boss", ActionParamType::Integer))
            .command(cmd("host"))
            .subcommand(sub("host", "pvm").action("quit"))
            .build()
            .unwrap();
        let action = reg.action("quit").unwrap();
        assert_eq!(action.owner, "host pvm");
        assert_eq!(action.owner_root, "host");
        assert_eq!(action.params.len(), 1);
        let pvm = reg.child(reg.command("host").unwrap(), "pvm").unwrap();
        assert!(pvm.actions.contains_key("quit"));
    }

    #[test]
    fn test_nested_subcommands_registered_out_of_order() {
        let reg = Registry::builder()
            .command(cmd("a"))
            .subcommand(sub("a b", "c"))
            .subcommand(sub("a", "b"))
            .build()
            .unwrap();
        let a = reg.command("a").unwrap();
        let b = reg.child(a, "b").unwrap();
        let c = reg.child(b, "c").unwrap();
        assert_eq!(c.path, "a b c");
        assert_eq!(c.root, "a");
        assert_eq!(reg.parent(c).unwrap().path, "a b");
    }

    #[test]
    fn test_subcommand_inherits_permission() {
        let reg = Registry::builder()
            .command(cmd("admin").admin_only())
            .subcommand(sub("admin", "inherit"))
            .subcommand(sub("admin", "open").permission(DefaultPermission::Everyone))
            .build()
            .unwrap();
        let admin = reg.command("admin").unwrap();
        assert_eq!(
            reg.child(admin, "inherit").unwrap().default_permission,
            DefaultPermission::AdminOnly
        );
        assert_eq!(
            reg.child(admin, "open").unwrap().default_permission,
            DefaultPermission::Everyone
        );
    }

    #[test]
    fn test_allow_only_filters_commands_and_their_children() {
        let reg = Registry::builder()
            .command(cmd("ping"))
            .command(cmd("schedule"))
            .subcommand(sub("schedule", "add"))
            .allow_only(["ping"])
            .build()
            .unwrap();
        assert!(reg.command("ping").is_some());
        assert!(reg.command("schedule").is_none());
        assert_eq!(reg.command_count(), 1);
    }

    #[test]
    fn test_definitions_nest_subcommands() {
        fn bosses() -> Vec<Choice> {
            vec![Choice::new("Solak", OptionValue::Integer(0))]
        }
        let reg = Registry::builder()
            .command(
                cmd("host").option(
                    OptionDescriptor::required("boss", "Which boss", OptionType::Integer)
                        .with_choices(bosses),
                ),
            )
            .command(cmd("config"))
            .subcommand(sub("config", "roles"))
            .subcommand(sub("config roles", "set"))
            .build()
            .unwrap();

        let defs = reg.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "config");
        assert_eq!(defs[0].options[0].kind, OptionType::SubCommandGroup);
        assert_eq!(defs[0].options[0].options[0].kind, OptionType::SubCommand);
        assert_eq!(defs[1].options[0].choices.len(), 1);

        let json = serde_json::to_value(&defs).unwrap();
        assert_eq!(json[1]["options"][0]["type"], "integer");
    }

    #[test]
    fn test_registry_debug_shows_paths() {
        let reg = Registry::builder()
            .command(cmd("config"))
            .subcommand(sub("config", "roles"))
            .build()
            .unwrap();
        let rendered = format!("{reg:?}");
        assert!(rendered.contains("\"config roles\""));

        let err = Registry::builder().subcommand(sub("missing", "x")).build().unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownParent { .. }));
    }

    #[test]
    fn test_install_global_only_once() {
        let first = Registry::install_global(Registry::builder().command(cmd("ping")).build().unwrap());
        assert!(first.is_ok());
        let second = Registry::install_global(Registry::builder().build().unwrap());
        assert_eq!(second.err(), Some(RegistrationError::AlreadyInstalled));
        assert!(Registry::global().unwrap().command("ping").is_some());
    }
}
