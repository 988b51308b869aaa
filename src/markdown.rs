//! Task-list surgery on raw sticker markdown.
//!
//! The rendered view only knows a task item's visible label, never its source offset, so a
//! checkbox is located by searching the source for a marker followed by that label.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

const CHECKED_MARKER: &str = "[x]";
const UNCHECKED_MARKER: &str = "[ ]";

/// A task list item as the renderer shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub label: String,
    pub checked: bool,
}

/// Returns `markdown` with the first `[ ]`/`[x]` marker followed by whitespace and `label`,
/// ending its line, set to `checked`. Everything else, the label and the whitespace included, is kept
/// byte-for-byte. A label that no longer appears in the source is a no-op.
///
/// When the same label is used by several items only the earliest one is updated.
pub fn toggle_task(markdown: &str, label: &str, checked: bool) -> String {
    if label.is_empty() {
        return markdown.to_string();
    }

    // The label must fill the rest of the marker's line; trailing blanks are allowed.
    let pattern = format!(
        r"\[[x ]\][^\S\r\n]+{}[^\S\r\n]*(?:\r?\n|$)",
        regex::escape(label)
    );
    let matcher = match Regex::new(&pattern) {
        Ok(matcher) => matcher,
        Err(err) => {
            log::warn!("task matcher rejected label_len={} err={err}", label.len());
            return markdown.to_string();
        }
    };

    let Some(found) = matcher.find(markdown) else {
        log::debug!("task label not found; leaving markdown unchanged");
        return markdown.to_string();
    };

    let marker = if checked {
        CHECKED_MARKER
    } else {
        UNCHECKED_MARKER
    };
    let marker_end = found.start() + UNCHECKED_MARKER.len();
    let mut next = String::with_capacity(markdown.len());
    next.push_str(&markdown[..found.start()]);
    next.push_str(marker);
    next.push_str(&markdown[marker_end..]);
    next
}

/// Lists task items in document order with their labels as rendered: inline markup
/// stripped, soft breaks collapsed to spaces, trimmed.
pub fn task_items(markdown: &str) -> Vec<TaskItem> {
    let parser = Parser::new_ext(
        markdown,
        Options::ENABLE_TASKLISTS | Options::ENABLE_STRIKETHROUGH,
    );

    let mut items: Vec<TaskItem> = Vec::new();
    // One slot per open list item; `Some(index)` once the item turned out to be a task.
    let mut open: Vec<Option<usize>> = Vec::new();

    for event in parser {
        match event {
            Event::Start(Tag::Item) => open.push(None),
            Event::TaskListMarker(checked) => {
                if let Some(slot) = open.last_mut() {
                    items.push(TaskItem {
                        label: String::new(),
                        checked,
                    });
                    *slot = Some(items.len() - 1);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(Some(index)) = open.last() {
                    items[*index].label.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(Some(index)) = open.last() {
                    items[*index].label.push(' ');
                }
            }
            Event::End(TagEnd::Item) => {
                if let Some(Some(index)) = open.pop() {
                    let trimmed = items[index].label.trim().to_string();
                    items[index].label = trimmed;
                }
            }
            _ => {}
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_matching_item_and_keeps_other_lines() {
        let source = "# Groceries\n- [ ] buy milk\n- [ ] bread\n\ntext after\n";
        let next = toggle_task(source, "buy milk", true);
        assert_eq!(next, "# Groceries\n- [x] buy milk\n- [ ] bread\n\ntext after\n");
    }

    #[test]
    fn unchecks_item() {
        let next = toggle_task("- [x] done thing", "done thing", false);
        assert_eq!(next, "- [ ] done thing");
    }

    #[test]
    fn missing_label_returns_input_unchanged() {
        let source = "- [ ] buy milk\n";
        assert_eq!(toggle_task(source, "nonexistent label", true), source);
        assert_eq!(toggle_task("", "anything", true), "");
    }

    #[test]
    fn empty_label_is_a_no_op() {
        let source = "- [ ] first\n";
        assert_eq!(toggle_task(source, "", true), source);
    }

    #[test]
    fn only_first_duplicate_is_toggled() {
        let source = "- [ ] call mom\n- [ ] call mom\n";
        let next = toggle_task(source, "call mom", true);
        assert_eq!(next, "- [x] call mom\n- [ ] call mom\n");
    }

    #[test]
    fn label_must_match_whole_line_not_prefix() {
        let source = "- [ ] buy milk and eggs\n- [ ] buy milk\n";
        let next = toggle_task(source, "buy milk", true);
        assert_eq!(next, "- [ ] buy milk and eggs\n- [x] buy milk\n");
        assert_eq!(toggle_task("- [ ] buy milk and eggs", "buy milk", true), "- [ ] buy milk and eggs");
    }

    #[test]
    fn trailing_blanks_and_crlf_still_match() {
        assert_eq!(toggle_task("- [ ] tidy  \r\n- [ ] x\r\n", "tidy", true), "- [x] tidy  \r\n- [ ] x\r\n");
    }

    #[test]
    fn label_metacharacters_are_literal() {
        let source = "- [ ] a.c\n- [ ] (a+b)*c? [1]\n";
        // `.` must not match `b` in an unrelated item.
        assert_eq!(toggle_task("- [ ] abc\n", "a.c", true), "- [ ] abc\n");
        let next = toggle_task(source, "(a+b)*c? [1]", true);
        assert_eq!(next, "- [ ] a.c\n- [x] (a+b)*c? [1]\n");
    }

    #[test]
    fn whitespace_between_marker_and_label_is_preserved() {
        let next = toggle_task("* [ ] \t spaced out", "spaced out", true);
        assert_eq!(next, "* [x] \t spaced out");
    }

    #[test]
    fn does_not_match_across_lines() {
        let source = "- [ ]\nbuy milk\n";
        assert_eq!(toggle_task(source, "buy milk", true), source);
    }

    #[test]
    fn uppercase_marker_is_not_recognized() {
        let source = "- [X] shout\n";
        assert_eq!(toggle_task(source, "shout", false), source);
    }

    #[test]
    fn multibyte_labels_are_handled() {
        let next = toggle_task("- [ ] 牛乳を買う 🥛\n", "牛乳を買う 🥛", true);
        assert_eq!(next, "- [x] 牛乳を買う 🥛\n");
    }

    #[test]
    fn task_items_strip_markup_and_follow_document_order() {
        let source = "- [ ] **buy** milk\n- [x] call `mom`\n  - [ ] nested one\n- plain item\n";
        let items = task_items(source);
        assert_eq!(
            items,
            vec![
                TaskItem {
                    label: "buy milk".to_string(),
                    checked: false
                },
                TaskItem {
                    label: "call mom".to_string(),
                    checked: true
                },
                TaskItem {
                    label: "nested one".to_string(),
                    checked: false
                },
            ]
        );
    }

    #[test]
    fn rendered_label_toggles_its_source_item() {
        let source = "Notes\n\n- [ ] water plants\n- [ ] pay rent\n";
        let items = task_items(source);
        let rent = items
            .iter()
            .find(|item| item.label == "pay rent")
            .expect("rent task rendered");
        let next = toggle_task(source, &rent.label, !rent.checked);
        assert_eq!(next, "Notes\n\n- [ ] water plants\n- [x] pay rent\n");
        assert!(task_items(&next)[1].checked);
    }
}
