use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::store::{InteractionRow, Store};
use crate::types::ApiResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStat {
    pub year: i32,
    pub month: u32,
    pub comments: i64,
    pub likes: i64,
    pub total_interactions: i64,
}

// Read-only aggregate over everything the author wrote, drafts included:
// authors always see their own numbers.
pub fn monthly_high_interaction<S: Store>(
    store: &mut S,
    author_id: i32,
    min_interactions: i64,
) -> ApiResult<Vec<MonthlyStat>> {
    let rows = store.interaction_rows(author_id)?;
    Ok(aggregate(rows, min_interactions))
}

fn aggregate(rows: Vec<InteractionRow>, min_interactions: i64) -> Vec<MonthlyStat> {
    let mut groups: BTreeMap<(i32, u32), (i64, i64)> = BTreeMap::new();
    for row in rows {
        let key = (row.created_at.year(), row.created_at.month());
        let entry = groups.entry(key).or_insert((0, 0));
        entry.0 += row.comments;
        entry.1 += row.favorites;
    }
    groups
        .into_iter()
        .rev()
        .map(|((year, month), (comments, likes))| MonthlyStat {
            year,
            month,
            comments,
            likes,
            total_interactions: comments + likes,
        })
        .filter(|stat| stat.total_interactions >= min_interactions)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article;
    use crate::comment;
    use crate::store::MemoryStore;
    use crate::test_support::{new_article_at, new_user};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn row(year: i32, month: u32, comments: i64, favorites: i64) -> InteractionRow {
        InteractionRow {
            article_id: 0,
            created_at: NaiveDate::from_ymd_opt(year, month, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            comments,
            favorites,
        }
    }

    #[test]
    fn test_aggregate_groups_by_year_month() {
        let stats = aggregate(
            vec![row(2024, 3, 2, 1), row(2024, 3, 0, 4), row(2024, 4, 1, 0)],
            0,
        );
        assert_eq!(
            stats,
            vec![
                MonthlyStat { year: 2024, month: 4, comments: 1, likes: 0, total_interactions: 1 },
                MonthlyStat { year: 2024, month: 3, comments: 2, likes: 5, total_interactions: 7 },
            ]
        );
    }

    #[test]
    fn test_aggregate_applies_threshold() {
        let stats = aggregate(vec![row(2024, 3, 2, 1), row(2024, 4, 1, 0)], 2);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].month, 3);
    }

    #[test]
    fn test_aggregate_orders_year_desc_month_desc() {
        let stats = aggregate(
            vec![row(2023, 12, 1, 0), row(2024, 1, 1, 0), row(2024, 11, 1, 0)],
            0,
        );
        let keys: Vec<(i32, u32)> = stats.iter().map(|s| (s.year, s.month)).collect();
        assert_eq!(keys, vec![(2024, 11), (2024, 1), (2023, 12)]);
    }

    #[test]
    fn test_stats_count_interactions_through_the_store() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        let anah = new_user(&mut store, "anah");
        let rick = new_user(&mut store, "rick");

        let created = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        new_article_at(&mut store, jake, "Popular Post", false, created);
        article::favorite(&mut store, anah, "popular-post").unwrap();
        article::favorite(&mut store, rick, "popular-post").unwrap();
        comment::add(&mut store, anah, "popular-post", "nice").unwrap();

        // A quiet draft in another month stays below the threshold.
        let created = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        new_article_at(&mut store, jake, "Quiet Draft", true, created);

        let stats = monthly_high_interaction(&mut store, jake, 2).unwrap();
        assert_eq!(
            stats,
            vec![MonthlyStat {
                year: 2024,
                month: 6,
                comments: 1,
                likes: 2,
                total_interactions: 3,
            }]
        );

        // Dropping the threshold surfaces the quiet month too, drafts and
        // all, newest month first.
        let stats = monthly_high_interaction(&mut store, jake, 0).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].year, stats[0].month), (2024, 7));
    }
}
