use crate::{Layer, State};
use bourse_types::{Event, Instruction};
use tracing::debug;

/// Execute one instruction on behalf of `username`.
///
/// The instruction runs against a fresh [Layer] over `state`. Staged changes
/// are applied and persisted under `sequence` only when something changed,
/// so a rejected instruction leaves `state` untouched.
pub async fn execute<S: State>(
    state: &mut S,
    now: u64,
    seed: u64,
    sequence: u64,
    username: &str,
    instruction: &Instruction,
) -> Vec<Event> {
    let mut layer = Layer::new(&*state, now, seed);
    let events = layer.apply(username, instruction).await;
    let changes = layer.commit();
    debug!(
        username,
        instruction = instruction.name(),
        changes = changes.len(),
        sequence,
        "executed instruction"
    );

    if !changes.is_empty() {
        state.apply(changes).await;
        state.persist(sequence).await;
    }
    events
}
