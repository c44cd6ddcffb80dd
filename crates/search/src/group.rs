use canvas_protocol::{
    Category, FlatRecord, Group, Labels, ALL_GROUP_KEY, OTHER_GROUP_KEY, RECENT_GROUP_KEY,
    RECENT_LIMIT,
};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// Group records for `category` using the default labels.
pub fn group<'a, I>(records: I, category: Category) -> Vec<Group>
where
    I: IntoIterator<Item = &'a FlatRecord>,
{
    group_with_labels(records, category, &Labels::default())
}

/// Group records for `category`.
///
/// | category | key | group order | record order |
/// |---|---|---|---|
/// | folder | `folder_path` (`""` for loose bookmarks) | `folder_order` of first member | `bookmark_index` |
/// | domain | `domain` | title, case-folded | input order |
/// | recent | `recent` | single group | `date_added` desc, newest 50 |
/// | all | `all` | single group | input order |
pub fn group_with_labels<'a, I>(records: I, category: Category, labels: &Labels) -> Vec<Group>
where
    I: IntoIterator<Item = &'a FlatRecord>,
{
    let records: Vec<&FlatRecord> = match category {
        Category::Recent => newest_first(records, RECENT_LIMIT),
        _ => records.into_iter().collect(),
    };

    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for record in records {
        let key = group_key(record, category);
        if let Some(existing) = groups.get_mut(key) {
            existing.records.push(record.clone());
            continue;
        }
        let mut created = Group::new(key, group_title(key, category, labels), group_order(record, category));
        created.records.push(record.clone());
        groups.insert(key.to_string(), created);
    }

    let mut groups: Vec<Group> = groups.into_values().collect();
    match category {
        Category::Folder => {
            groups.sort_by_key(|g| g.order);
            for g in &mut groups {
                g.records.sort_by_key(|r| r.bookmark_index);
            }
        }
        Category::Domain => groups.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        Category::Recent => {
            for g in &mut groups {
                g.records.sort_by(|a, b| b.date_added.cmp(&a.date_added));
            }
        }
        Category::All => {}
    }
    groups
}

fn group_key(record: &FlatRecord, category: Category) -> &str {
    match category {
        Category::Folder => &record.folder_path,
        Category::Domain => &record.domain,
        Category::Recent => RECENT_GROUP_KEY,
        Category::All => ALL_GROUP_KEY,
    }
}

fn group_title<'k>(key: &'k str, category: Category, labels: &Labels) -> &'k str {
    match category {
        Category::Folder if key == OTHER_GROUP_KEY => labels.other_bookmarks,
        Category::Folder | Category::Domain => key,
        Category::Recent => labels.recently_added,
        Category::All => labels.all_bookmarks,
    }
}

const fn group_order(record: &FlatRecord, category: Category) -> usize {
    match category {
        Category::Folder => record.folder_order,
        Category::Domain | Category::Recent | Category::All => 0,
    }
}

fn newest_first<'a, I>(records: I, limit: usize) -> Vec<&'a FlatRecord>
where
    I: IntoIterator<Item = &'a FlatRecord>,
{
    let mut sorted: Vec<&FlatRecord> = records.into_iter().collect();
    sorted.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    sorted.truncate(limit);
    sorted
}

// Case-folded first; the raw comparison keeps the order total.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
