//! Plain-text rendering of the active path and the whole tree.

use chat_core::{Message, MessageStatus, Role};
use chat_state::ActiveEntry;
use colored::{ColoredString, Colorize};
use conversation_tree::Conversation;
use uuid::Uuid;

fn role_label(role: Role) -> ColoredString {
    match role {
        Role::System => "system".magenta().bold(),
        Role::User => "you".cyan().bold(),
        Role::Assistant => "assistant".green().bold(),
    }
}

fn status_suffix(message: &Message) -> &'static str {
    match message.status {
        MessageStatus::Pending => " (generating)",
        MessageStatus::Interrupted => " (interrupted)",
        MessageStatus::Failed => " (failed)",
        MessageStatus::Complete => "",
    }
}

/// One numbered line per message on the active path. Messages with siblings
/// carry a `<i/n>` marker.
pub fn render_active_path(entries: &[ActiveEntry]) -> String {
    let mut out = String::new();
    for (position, entry) in entries.iter().enumerate() {
        let marker = if entry.navigation.has_alternatives() {
            format!(
                " <{}/{}>",
                entry.navigation.current_index + 1,
                entry.navigation.total_branches
            )
        } else {
            String::new()
        };
        out.push_str(&format!(
            "[{}] {}{}{}: {}\n",
            position + 1,
            role_label(entry.message.role),
            marker.yellow(),
            status_suffix(&entry.message).dimmed(),
            entry.message.content
        ));
        if let Some(reasoning) = &entry.message.reasoning {
            out.push_str(&format!("    {}\n", format!("thinking: {}", reasoning).dimmed()));
        }
    }
    out
}

/// Every message, depth-first, indented by depth. Returns the listing and
/// the ids in listing order so `/select k` can refer to them.
pub fn render_tree(conversation: &Conversation) -> (String, Vec<Uuid>) {
    let tree = conversation.tree();
    let active = conversation.active_path();
    let mut out = String::new();
    let mut ids = Vec::new();

    for node in tree.walk() {
        ids.push(node.id());
        let bullet = if active.contains(&node.id()) { "*" } else { "-" };
        out.push_str(&format!(
            "{:>3} {}{} {}: {}\n",
            ids.len(),
            "  ".repeat(node.depth),
            bullet,
            role_label(node.message.role),
            first_line(&node.message.content)
        ));
    }
    (out, ids)
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversation_tree::BranchNavigation;

    fn entry(message: Message, navigation: BranchNavigation) -> ActiveEntry {
        ActiveEntry {
            message,
            navigation,
        }
    }

    #[test]
    fn test_marker_only_for_alternatives() {
        colored::control::set_override(false);
        let mut conversation = Conversation::default();
        let user = conversation.push_message(Message::user("hi", None)).unwrap();
        let _old = conversation
            .add_message(Message::assistant("old", Some(user)))
            .unwrap();
        let new = conversation
            .push_message(Message::assistant("new", Some(user)))
            .unwrap();

        let entries = vec![
            entry(
                conversation.get(&user).unwrap().clone(),
                conversation.branch_navigation(&user),
            ),
            entry(
                conversation.get(&new).unwrap().clone(),
                conversation.branch_navigation(&new),
            ),
        ];

        let rendered = render_active_path(&entries);
        assert_eq!(rendered, "[1] you: hi\n[2] assistant <2/2>: new\n");
    }

    #[test]
    fn test_tree_lists_all_messages() {
        colored::control::set_override(false);
        let mut conversation = Conversation::default();
        let user = conversation.push_message(Message::user("hi", None)).unwrap();
        let old = conversation
            .add_message(Message::assistant("old", Some(user)))
            .unwrap();
        let new = conversation
            .push_message(Message::assistant("new\nmore", Some(user)))
            .unwrap();

        let (rendered, ids) = render_tree(&conversation);
        assert_eq!(ids, vec![user, old, new]);
        assert!(rendered.contains("  1 * you: hi"));
        assert!(rendered.contains("  2   - assistant: old"));
        assert!(rendered.contains("  3   * assistant: new\n"));
    }
}
