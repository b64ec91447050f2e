//! Catalog search and recommendations over fetched listings

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{CityUpdate, CommunityHall, Event, User};

/// Recommended events shown at most
pub const RECOMMENDATION_LIMIT: usize = 6;

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Halls whose name or location contains `query`, case-insensitive
pub fn search_halls<'a>(
    halls: &'a [CommunityHall],
    query: &str,
    only_available: bool,
) -> Vec<&'a CommunityHall> {
    let term = query.trim().to_lowercase();
    halls
        .iter()
        .filter(|h| !only_available || h.available)
        .filter(|h| {
            term.is_empty()
                || contains_ci(&h.name, &term)
                || contains_ci(&h.location, &term)
                || h.address.as_deref().is_some_and(|a| contains_ci(a, &term))
        })
        .collect()
}

/// Event list filters; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub query: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        let term = self.query.trim().to_lowercase();
        let matches_search = term.is_empty()
            || contains_ci(&event.title, &term)
            || contains_ci(&event.description, &term);

        let matches_category = self
            .category
            .as_deref()
            .map_or(true, |c| event.category.eq_ignore_ascii_case(c));

        let matches_location = self
            .location
            .as_deref()
            .map_or(true, |l| contains_ci(&event.location, &l.to_lowercase()));

        let matches_date = self.date.map_or(true, |d| event.date == d);

        matches_search && matches_category && matches_location && matches_date
    }
}

pub fn filter_events<'a>(events: &'a [Event], filter: &EventFilter) -> Vec<&'a Event> {
    events.iter().filter(|e| filter.matches(e)).collect()
}

/// City updates newest first, matching `query` in title, description or
/// location and, when any are given, one of `categories`
pub fn search_city_updates<'a>(
    updates: &'a [CityUpdate],
    query: &str,
    categories: &[String],
) -> Vec<&'a CityUpdate> {
    let term = query.trim().to_lowercase();
    let mut results: Vec<_> = updates
        .iter()
        .filter(|u| {
            term.is_empty()
                || contains_ci(&u.title, &term)
                || contains_ci(&u.description, &term)
                || contains_ci(&u.location, &term)
        })
        .filter(|u| categories.is_empty() || categories.contains(&u.category))
        .collect();
    results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    results
}

/// Categories from the user's history, most frequent first. Ties keep the
/// order in which the categories were first viewed.
pub fn top_categories(user: &User) -> Vec<&str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, category) in user.viewed_categories.iter().enumerate() {
        counts.entry(category.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)));
    ranked.into_iter().map(|(category, _)| category).collect()
}

/// Events in the user's viewed categories, best-ranked category first
pub fn recommend_events<'a>(user: &User, events: &'a [Event]) -> Vec<&'a Event> {
    let ranked = top_categories(user);
    let mut picks: Vec<(usize, &Event)> = events
        .iter()
        .filter_map(|e| {
            ranked
                .iter()
                .position(|c| *c == e.category)
                .map(|rank| (rank, e))
        })
        .collect();

    picks.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then(a.starts_at().cmp(&b.starts_at())));
    picks
        .into_iter()
        .take(RECOMMENDATION_LIMIT)
        .map(|(_, e)| e)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::pricing::Money;
    use chrono::{Duration, NaiveTime, Utc};
    use uuid::Uuid;

    fn hall(name: &str, location: &str, available: bool) -> CommunityHall {
        let mut hall = CommunityHall::new(
            name.into(),
            location.into(),
            100,
            Money::from_rupees(300),
            Uuid::new_v4(),
        );
        hall.available = available;
        hall
    }

    fn event(title: &str, category: &str, day: u32) -> Event {
        Event::new(
            Uuid::new_v4(),
            title.into(),
            NaiveDate::from_ymd_opt(2030, 5, day).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            category.into(),
            50,
        )
        .with_location("Shivajinagar".into())
    }

    #[test]
    fn test_hall_search() {
        let halls = vec![
            hall("Shanti Hall", "Kothrud", true),
            hall("Lotus Banquet", "Aundh", false),
            hall("Kothrud Community Centre", "Pune", true),
        ];

        let names: Vec<_> = search_halls(&halls, "kothrud", false)
            .into_iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(names, vec!["Shanti Hall", "Kothrud Community Centre"]);

        assert_eq!(search_halls(&halls, "", true).len(), 2);
        assert!(search_halls(&halls, "lotus", true).is_empty());
    }

    #[test]
    fn test_event_filter() {
        let events = vec![
            event("Startup Meetup", "Meeting", 1),
            event("Marathon", "Sports", 2),
            event("Rust Workshop", "Workshop", 3),
        ];

        let filter = EventFilter {
            category: Some("sports".into()),
            ..Default::default()
        };
        assert_eq!(filter_events(&events, &filter)[0].title, "Marathon");

        let filter = EventFilter {
            query: "work".into(),
            location: Some("shivaji".into()),
            ..Default::default()
        };
        assert_eq!(filter_events(&events, &filter).len(), 1);

        let filter = EventFilter {
            date: NaiveDate::from_ymd_opt(2030, 5, 2),
            ..Default::default()
        };
        assert_eq!(filter_events(&events, &filter)[0].title, "Marathon");
    }

    #[test]
    fn test_city_update_search_newest_first() {
        let author = Uuid::new_v4();
        let mut old = CityUpdate::new(author, "Road repair".into(), "Roads".into(), "FC Road".into());
        old.created_at = Utc::now() - Duration::days(2);
        let new = CityUpdate::new(author, "Water cut".into(), "Utilities".into(), "Road works".into())
            .with_location("Baner".into());

        let updates = vec![old, new];
        let titles: Vec<_> = search_city_updates(&updates, "road", &[])
            .into_iter()
            .map(|u| u.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Water cut", "Road repair"]);

        let roads = search_city_updates(&updates, "", &["Roads".to_string()]);
        assert_eq!(roads.len(), 1);
        assert_eq!(roads[0].title, "Road repair");
    }

    #[test]
    fn test_recommendations() {
        let mut user = User::new(Uuid::new_v4(), "Ravi".into(), "ravi@example.com".into(), UserRole::User);
        user.viewed_categories = vec!["Sports".into(), "Workshop".into(), "Workshop".into()];

        assert_eq!(top_categories(&user), vec!["Workshop", "Sports"]);

        let events = vec![
            event("Marathon", "Sports", 1),
            event("Startup Meetup", "Meeting", 2),
            event("Rust Workshop", "Workshop", 9),
            event("Pottery Workshop", "Workshop", 4),
        ];
        let titles: Vec<_> = recommend_events(&user, &events)
            .into_iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Pottery Workshop", "Rust Workshop", "Marathon"]);
    }

    #[test]
    fn test_no_history_no_recommendations() {
        let user = User::new(Uuid::new_v4(), "New".into(), "new@example.com".into(), UserRole::User);
        let events = vec![event("Marathon", "Sports", 1)];
        assert!(recommend_events(&user, &events).is_empty());
    }
}
