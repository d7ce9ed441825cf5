use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::NodeId;
use crate::tree::{Environment, Tree};

/// Finds or creates the stack `companion_id` in the stage enclosing `scope`,
/// pinned to `region`, and makes `scope`'s stack depend on it.
///
/// A new companion inherits the requesting stack's account. An existing
/// child named `companion_id` is reused only if it is a stack in `region`.
pub fn resolve(tree: &mut Tree, scope: NodeId, region: &str, companion_id: &str) -> Result<NodeId> {
    let requester = tree.require_stack(scope)?;
    let stage = tree.stage_of(scope).ok_or_else(|| Error::NotInStage(tree.display_path(scope)))?;

    let companion = match tree.find_child(stage, companion_id) {
        Some(existing) => {
            let Some(stack) = tree.stack(existing) else {
                return Err(Error::InvalidCompanion {
                    id: companion_id.to_string(),
                    reason: format!("{} is not a stack", tree.display_path(existing)),
                });
            };
            if stack.env.region.as_deref() != Some(region) {
                return Err(Error::InvalidCompanion {
                    id: companion_id.to_string(),
                    reason: format!(
                        "{} is deployed to {} instead of {region}",
                        tree.display_path(existing),
                        stack.env.region.as_deref().unwrap_or("an unresolved region"),
                    ),
                });
            }
            debug!("reusing companion stack {}", tree.display_path(existing));
            existing
        }
        None => {
            let env = Environment {
                account: tree.account_of(requester).map(str::to_string),
                region: Some(region.to_string()),
            };
            let stack = tree.add_stack(stage, companion_id, env)?;
            info!("created companion stack {} in {region}", tree.display_path(stack));
            stack
        }
    };
    tree.add_dependency(requester, companion)?;
    Ok(companion)
}
