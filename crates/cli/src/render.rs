use canvas_protocol::{FlatRecord, Group, RawNode, ViewMode};
use canvas_tree::TreeStats;
use std::fmt::Write as _;
use unicode_width::UnicodeWidthStr;

const FAVICON_SIZE: u32 = 32;

pub fn projection(groups: &[Group], view: ViewMode, show_favicons: bool) -> String {
    let mut out = String::new();
    if groups.is_empty() {
        out.push_str("No bookmarks match.\n");
        return out;
    }
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{} ({})", group.title, group.len());
        match view {
            ViewMode::Grid => {
                for record in &group.records {
                    let _ = writeln!(out, "  {} ({})", record.title, record.domain);
                }
            }
            ViewMode::List => {
                // Terminal columns, so CJK titles count double.
                let width = group
                    .records
                    .iter()
                    .map(|r| r.title.width())
                    .max()
                    .unwrap_or(0);
                for record in &group.records {
                    let pad = " ".repeat(width - record.title.width());
                    let _ = write!(out, "  {}{pad}  {}", record.title, record.url);
                    if let Some(icon) = record.favicon.as_ref().filter(|_| show_favicons) {
                        let _ = write!(out, "  {}", icon.service_url(FAVICON_SIZE));
                    }
                    out.push('\n');
                }
            }
        }
    }
    out
}

pub fn stats(stats: &TreeStats, recent: &[FlatRecord]) -> String {
    let mut out = String::new();
    for (label, value) in [
        ("Bookmarks:", stats.total_bookmarks),
        ("Folders:", stats.total_folders),
        ("Added this week:", stats.recent_count),
    ] {
        let _ = writeln!(out, "{label:<17}{value}");
    }
    if !recent.is_empty() {
        out.push_str("\nRecent:\n");
        for record in recent {
            let _ = writeln!(out, "  {} ({})", record.title, record.domain);
        }
    }
    out
}

pub fn nodes(nodes: &[RawNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        let _ = writeln!(
            out,
            "{}\t{}\t{}",
            node.id(),
            node.title(),
            node.url().unwrap_or("")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_protocol::RawNode;
    use canvas_tree::flatten;
    use pretty_assertions::assert_eq;

    fn work_group() -> Vec<Group> {
        let records = flatten(&RawNode::folder(
            "1",
            "Work",
            vec![
                RawNode::bookmark("2", "A", "https://a.com"),
                RawNode::bookmark("3", "Bee", "https://www.b.com/x"),
            ],
        ));
        let mut group = Group::new("Work", "Work", 0);
        group.records = records;
        vec![group]
    }

    #[test]
    fn grid_prints_title_and_domain() {
        assert_eq!(
            projection(&work_group(), ViewMode::Grid, true),
            "Work (2)\n  A (a.com)\n  Bee (b.com)\n"
        );
    }

    #[test]
    fn list_aligns_url_column() {
        assert_eq!(
            projection(&work_group(), ViewMode::List, false),
            "Work (2)\n  A    https://a.com\n  Bee  https://www.b.com/x\n"
        );
    }

    #[test]
    fn list_appends_favicon_when_enabled() {
        let text = projection(&work_group(), ViewMode::List, true);
        assert!(text.contains(
            "  Bee  https://www.b.com/x  https://www.google.com/s2/favicons?domain=www.b.com&sz=32\n"
        ));
    }

    #[test]
    fn wide_titles_pad_by_display_width() {
        let records = flatten(&RawNode::folder(
            "1",
            "工作",
            vec![
                RawNode::bookmark("2", "掘金", "https://juejin.cn"),
                RawNode::bookmark("3", "Kimi", "https://kimi.moonshot.cn"),
            ],
        ));
        let mut group = Group::new("工作", "工作", 0);
        group.records = records;
        assert_eq!(
            projection(&[group], ViewMode::List, false),
            "工作 (2)\n  掘金  https://juejin.cn\n  Kimi  https://kimi.moonshot.cn\n"
        );
    }

    #[test]
    fn empty_projection_says_so() {
        assert_eq!(projection(&[], ViewMode::Grid, true), "No bookmarks match.\n");
    }

    #[test]
    fn stats_lists_recent() {
        let records = flatten(&RawNode::bookmark("9", "Solo", "https://solo.dev"));
        let text = stats(
            &TreeStats {
                total_bookmarks: 1,
                total_folders: 0,
                recent_count: 1,
            },
            &records,
        );
        assert!(text.starts_with("Bookmarks:       1\nFolders:         0\n"));
        assert!(text.contains("  Solo (solo.dev)"));
    }
}
