//! System prompt assembly.
//!
//! One string from three sources: the `identity` and `behavior` LTM
//! entries, the present state as a tagged block, and a bounded
//! recent-history view of temporal memory. IDs are rendered in a form the
//! compaction agent can reference (`[id:...]` on raw messages,
//! `[summary from:... to:...]` on summaries).

use miriad_core::config::TokenBudgets;
use miriad_store::present::PresentState;
use miriad_store::temporal::{temporal_view, TemporalMessage, TemporalSummary};
use miriad_store::Stores;

use crate::error::EngineError;

/// Messages are truncated to this many characters in the history view.
const MESSAGE_PREVIEW_CHARS: usize = 500;

pub struct PromptAssembler {
    stores: Stores,
    budgets: TokenBudgets,
}

impl PromptAssembler {
    pub fn new(stores: Stores, budgets: TokenBudgets) -> Self {
        Self { stores, budgets }
    }

    /// Build the complete system prompt.
    pub fn assemble(&self) -> Result<String, EngineError> {
        let mut sections: Vec<String> = Vec::new();

        if let Some(identity) = self.stores.ltm.read("identity")? {
            sections.push(identity.body);
        }
        if let Some(behavior) = self.stores.ltm.read("behavior")? {
            sections.push(behavior.body);
        }

        sections.push(render_present(&self.stores.present.get()?));

        let messages = self.stores.temporal.get_messages()?;
        let summaries = self.stores.temporal.get_summaries()?;
        let history = render_history(&messages, &summaries, self.budgets.temporal);
        if !history.is_empty() {
            sections.push(format!("## Recent history\n{history}"));
        }

        Ok(sections.join("\n\n"))
    }
}

fn render_present(state: &PresentState) -> String {
    let mut lines = vec!["<present_state>".to_string()];
    if let Some(mission) = &state.mission {
        lines.push(format!("mission: {mission}"));
    }
    if let Some(status) = &state.status {
        lines.push(format!("status: {status}"));
    }
    for task in &state.tasks {
        let status = serde_json::to_value(task.status)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        match &task.blocked_reason {
            Some(reason) => lines.push(format!(
                "task [{status}] {}: {} (blocked: {reason})",
                task.id, task.content
            )),
            None => lines.push(format!("task [{status}] {}: {}", task.id, task.content)),
        }
    }
    lines.push("</present_state>".to_string());
    lines.join("\n")
}

/// Render the bounded history view: all active summaries plus the newest
/// messages that fit the token budget, merged in chronological order.
pub fn render_history(
    messages: &[TemporalMessage],
    summaries: &[TemporalSummary],
    temporal_budget: i64,
) -> String {
    let view = temporal_view(messages, summaries);

    // Walk messages newest-first until the budget is spent, then restore
    // chronological order.
    let mut budget = temporal_budget;
    let mut selected: Vec<&TemporalMessage> = Vec::new();
    for message in view.messages.iter().rev() {
        if budget - message.tokens < 0 {
            break;
        }
        budget -= message.tokens;
        selected.push(message);
    }
    selected.reverse();

    // Merge by sort key. Summary boundaries are message ids, so the keys
    // share one ordering.
    let mut lines: Vec<(&str, String)> = Vec::new();
    for summary in &view.summaries {
        lines.push((
            summary.start_id.as_str(),
            format!(
                "[summary from:{} to:{}] {}",
                summary.start_id, summary.end_id, summary.narrative
            ),
        ));
    }
    for message in &selected {
        lines.push((
            message.id.as_str(),
            format!(
                "[id:{}] {}: {}",
                message.id,
                message.kind,
                truncate_chars(&message.content, MESSAGE_PREVIEW_CHARS)
            ),
        ));
    }
    lines.sort_by(|a, b| a.0.cmp(b.0));

    lines
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miriad_core::ids::IdService;
    use miriad_core::tokens::estimate_tokens;
    use miriad_store::ltm::Actor;
    use miriad_store::present::{Task, TaskStatus};
    use miriad_store::temporal::MessageKind;
    use miriad_store::Database;

    fn setup() -> (Stores, IdService) {
        (Stores::new(Database::in_memory().unwrap()), IdService::new())
    }

    fn assembler(stores: &Stores) -> PromptAssembler {
        PromptAssembler::new(stores.clone(), TokenBudgets::default())
    }

    #[test]
    fn empty_memory_still_produces_present_block() {
        let (stores, _) = setup();
        let prompt = assembler(&stores).assemble().unwrap();
        assert!(prompt.contains("<present_state>"));
        assert!(prompt.contains("</present_state>"));
    }

    #[test]
    fn identity_and_behavior_lead_the_prompt() {
        let (stores, _) = setup();
        stores
            .ltm
            .create(
                "identity",
                None,
                "Identity",
                "You are a careful coding agent.",
                &[],
                &[],
                Actor::Main,
            )
            .unwrap();
        stores
            .ltm
            .create(
                "behavior",
                None,
                "Behavior",
                "Prefer small, verified steps.",
                &[],
                &[],
                Actor::Main,
            )
            .unwrap();

        let prompt = assembler(&stores).assemble().unwrap();
        let identity_pos = prompt.find("careful coding agent").unwrap();
        let behavior_pos = prompt.find("small, verified steps").unwrap();
        let present_pos = prompt.find("<present_state>").unwrap();
        assert!(identity_pos < behavior_pos);
        assert!(behavior_pos < present_pos);
    }

    #[test]
    fn present_block_renders_mission_and_tasks() {
        let (stores, _) = setup();
        stores.present.set_mission(Some("ship it")).unwrap();
        stores
            .present
            .set_tasks(&[Task {
                id: "1".into(),
                content: "write code".into(),
                status: TaskStatus::InProgress,
                blocked_reason: None,
            }])
            .unwrap();

        let prompt = assembler(&stores).assemble().unwrap();
        assert!(prompt.contains("mission: ship it"));
        assert!(prompt.contains("task [in_progress] 1: write code"));
    }

    #[test]
    fn history_renders_ids_and_roles() {
        let (stores, ids) = setup();
        let id = ids.message_id();
        stores
            .temporal
            .append_message(id.clone(), MessageKind::User, "hello there", 3)
            .unwrap();

        let prompt = assembler(&stores).assemble().unwrap();
        assert!(prompt.contains(&format!("[id:{id}] user: hello there")));
    }

    #[test]
    fn long_messages_truncated_at_500_chars() {
        let (stores, ids) = setup();
        let long = "x".repeat(800);
        stores
            .temporal
            .append_message(ids.message_id(), MessageKind::Assistant, &long, 200)
            .unwrap();

        let prompt = assembler(&stores).assemble().unwrap();
        assert!(prompt.contains(&format!("{}…", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
    }

    #[test]
    fn budget_drops_oldest_messages_first() {
        let (stores, ids) = setup();
        // Three messages of ~25 tokens each with a 60-token budget: the
        // oldest must fall out.
        for i in 0..3 {
            let content = format!("message number {i} {}", "pad ".repeat(20));
            stores
                .temporal
                .append_message(
                    ids.message_id(),
                    MessageKind::User,
                    &content,
                    estimate_tokens(&content),
                )
                .unwrap();
        }

        let messages = stores.temporal.get_messages().unwrap();
        let summaries = stores.temporal.get_summaries().unwrap();
        let history = render_history(&messages, &summaries, 60);

        assert!(!history.contains("message number 0"));
        assert!(history.contains("message number 1"));
        assert!(history.contains("message number 2"));

        // And chronological order is preserved.
        let pos1 = history.find("message number 1").unwrap();
        let pos2 = history.find("message number 2").unwrap();
        assert!(pos1 < pos2);
    }

    #[test]
    fn summaries_render_with_range_markers() {
        let (stores, ids) = setup();
        let a = ids.message_id();
        stores
            .temporal
            .append_message(a.clone(), MessageKind::User, "one", 1)
            .unwrap();
        let b = ids.message_id();
        stores
            .temporal
            .append_message(b.clone(), MessageKind::Assistant, "two", 1)
            .unwrap();
        stores
            .temporal
            .create_summary(
                ids.summary_id(),
                1,
                a.as_str(),
                b.as_str(),
                "a short exchange",
                &[],
                &[],
                3,
            )
            .unwrap();

        let messages = stores.temporal.get_messages().unwrap();
        let summaries = stores.temporal.get_summaries().unwrap();
        let history = render_history(&messages, &summaries, 10_000);

        assert!(history.contains(&format!("[summary from:{a} to:{b}] a short exchange")));
        // Covered messages are hidden.
        assert!(!history.contains("[id:"));
    }

    #[test]
    fn summary_precedes_later_messages() {
        let (stores, ids) = setup();
        let a = ids.message_id();
        stores
            .temporal
            .append_message(a.clone(), MessageKind::User, "old", 1)
            .unwrap();
        let b = ids.message_id();
        stores
            .temporal
            .append_message(b.clone(), MessageKind::Assistant, "also old", 1)
            .unwrap();
        stores
            .temporal
            .create_summary(ids.summary_id(), 1, a.as_str(), b.as_str(), "the past", &[], &[], 2)
            .unwrap();
        stores
            .temporal
            .append_message(ids.message_id(), MessageKind::User, "fresh message", 3)
            .unwrap();

        let messages = stores.temporal.get_messages().unwrap();
        let summaries = stores.temporal.get_summaries().unwrap();
        let history = render_history(&messages, &summaries, 10_000);

        let summary_pos = history.find("the past").unwrap();
        let fresh_pos = history.find("fresh message").unwrap();
        assert!(summary_pos < fresh_pos);
    }
}
