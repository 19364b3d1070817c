//! Subcommand resolution.
//!
//! Walks the nested option tree of a command payload and picks the deepest
//! registered subcommand it names, along with the options that belong to it.

use sigil_core::CommandDataOption;

use crate::registry::{CommandDescriptor, Registry};

/// Deepest registered descendant of `parent` named by `options`.
///
/// Returns `None` when no option names a registered child of `parent`.
/// Descent is depth-first; when several subcommand options are present the
/// one leading to the deepest registered descriptor wins.
pub fn find_deepest<'r, 'o>(
    registry: &'r Registry,
    parent: &'r CommandDescriptor,
    options: &'o [CommandDataOption],
) -> Option<(&'r CommandDescriptor, &'o [CommandDataOption])> {
    let mut best: Option<(usize, &'r CommandDescriptor, &'o [CommandDataOption])> = None;
    descend(registry, parent, options, 1, &mut best);
    best.map(|(_, descriptor, opts)| (descriptor, opts))
}

fn descend<'r, 'o>(
    registry: &'r Registry,
    parent: &'r CommandDescriptor,
    options: &'o [CommandDataOption],
    depth: usize,
    best: &mut Option<(usize, &'r CommandDescriptor, &'o [CommandDataOption])>,
) {
    for option in options {
        let Some(nested) = option.value.nested() else {
            continue;
        };
        let Some(child) = registry.child(parent, &option.name) else {
            continue;
        };
        if best.as_ref().is_none_or(|(d, _, _)| depth > *d) {
            *best = Some((depth, child, nested));
        }
        descend(registry, child, nested, depth + 1, best);
    }
}

/// Resolve the descriptor that should handle `options` under `root`.
///
/// Falls back to `root` itself with the full option list when no registered
/// subcommand is named.
pub fn resolve<'r, 'o>(
    registry: &'r Registry,
    root: &'r CommandDescriptor,
    options: &'o [CommandDataOption],
) -> (&'r CommandDescriptor, &'o [CommandDataOption]) {
    find_deepest(registry, root, options).unwrap_or((root, options))
}
