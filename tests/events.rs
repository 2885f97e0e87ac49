//! Event and log callbacks.
//!
//! The callbacks are process-wide, so this file holds a single test.

use std::sync::{Arc, Mutex};
use textbtree::{
    LineContent, LineSize, LogLevel, Style, TextBTree, ViewId, clear_event_callback,
    clear_log_callback, set_event_callback, set_log_callback,
};

#[test]
fn test_mutations_emit_events_in_order() {
    let mut tree = TextBTree::new();

    let events = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
    let logs = Arc::new(Mutex::new(Vec::<(LogLevel, String)>::new()));
    {
        let events = Arc::clone(&events);
        set_event_callback(move |name, data| {
            events
                .lock()
                .unwrap()
                .push((name.to_string(), data.to_string()));
        });
        let logs = Arc::clone(&logs);
        set_log_callback(move |level, message| {
            logs.lock().unwrap().push((level, message.to_string()));
        });
    }

    let mut at = tree.start_iter();
    tree.insert_text(&mut at, "hello world").unwrap();

    let bold = tree.create_tag("bold", Style::bold()).unwrap();
    let start = tree.iter_at_char(0).unwrap();
    let end = tree.iter_at_char(5).unwrap();
    tree.apply_tag(&start, &end, bold, true).unwrap();

    let at = tree.iter_at_char(6).unwrap();
    let mark = tree.create_mark(Some("word"), &at, true).unwrap();
    tree.remove_mark(mark).unwrap();

    let view = ViewId(9);
    tree.add_view(view, |_: &LineContent<'_>| LineSize::new(1, 1))
        .unwrap();
    tree.validate(view, i32::MAX).unwrap();

    let mut start = tree.iter_at_char(0).unwrap();
    let mut end = tree.iter_at_char(6).unwrap();
    tree.delete_range(&mut start, &mut end).unwrap();
    tree.remove_tag(bold).unwrap();
    tree.remove_view(view).unwrap();

    clear_event_callback();
    clear_log_callback();

    let events = events.lock().unwrap();
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        [
            "insert-text",
            "apply-tag",
            "mark-set",
            "mark-deleted",
            "view-added",
            "delete-range",
            "remove-tag",
            "view-removed",
        ]
    );
    assert_eq!(events[0].1, "offset=0 chars=11 lines=0");
    assert_eq!(events[5].1, "offset=0 chars=6");
    assert!(events[6].1.ends_with("scope=table"), "{}", events[6].1);

    let logs = logs.lock().unwrap();
    assert!(
        logs.iter()
            .any(|(level, message)| *level == LogLevel::Debug && message.starts_with("validated")),
        "{logs:?}"
    );
}
