//! Community hall storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    money_to_sql, parse_datetime, parse_json_list, parse_money, parse_uuid, to_json_list,
    OptionalExt,
};
use crate::error::Result;
use crate::models::CommunityHall;

pub struct HallStore<'a> {
    conn: &'a Connection,
}

const HALL_COLUMNS: &str = "id, name, location, address, capacity, price_per_plate, available, \
     facilities, owner_id, image_urls, requires_approval, created_at";

fn hall_from_row(row: &Row<'_>) -> rusqlite::Result<CommunityHall> {
    Ok(CommunityHall {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        location: row.get(2)?,
        address: row.get(3)?,
        capacity: row.get(4)?,
        price_per_plate: parse_money(row.get(5)?)?,
        available: row.get(6)?,
        facilities: parse_json_list(&row.get::<_, String>(7)?)?,
        owner_id: parse_uuid(&row.get::<_, String>(8)?)?,
        image_urls: parse_json_list(&row.get::<_, String>(9)?)?,
        requires_approval: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

impl<'a> HallStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new hall
    #[instrument(skip(self, hall), fields(hall_name = %hall.name))]
    pub fn create(&self, hall: &CommunityHall) -> Result<()> {
        self.conn.execute(
            "INSERT INTO community_halls (id, name, location, address, capacity, price_per_plate, available,
                 facilities, owner_id, image_urls, requires_approval, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                hall.id.to_string(),
                hall.name,
                hall.location,
                hall.address,
                hall.capacity,
                money_to_sql(hall.price_per_plate)?,
                hall.available,
                to_json_list(&hall.facilities),
                hall.owner_id.to_string(),
                to_json_list(&hall.image_urls),
                hall.requires_approval,
                hall.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find hall by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<CommunityHall>> {
        let sql = format!("SELECT {} FROM community_halls WHERE id = ?1", HALL_COLUMNS);
        let hall = self
            .conn
            .query_row(&sql, params![id.to_string()], hall_from_row)
            .optional()?;
        Ok(hall)
    }

    /// All halls, newest first
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<CommunityHall>> {
        let sql = format!(
            "SELECT {} FROM community_halls ORDER BY created_at DESC",
            HALL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let halls = stmt
            .query_map([], hall_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(halls)
    }

    /// Halls owned by a user
    #[instrument(skip(self))]
    pub fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<CommunityHall>> {
        let sql = format!(
            "SELECT {} FROM community_halls WHERE owner_id = ?1 ORDER BY created_at DESC",
            HALL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let halls = stmt
            .query_map(params![owner_id.to_string()], hall_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(halls)
    }

    /// Update a hall's listing
    #[instrument(skip(self, hall), fields(hall_id = %hall.id))]
    pub fn update(&self, hall: &CommunityHall) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE community_halls SET name = ?1, location = ?2, address = ?3, capacity = ?4,
                 price_per_plate = ?5, available = ?6, facilities = ?7, image_urls = ?8,
                 requires_approval = ?9
             WHERE id = ?10",
            params![
                hall.name,
                hall.location,
                hall.address,
                hall.capacity,
                money_to_sql(hall.price_per_plate)?,
                hall.available,
                to_json_list(&hall.facilities),
                to_json_list(&hall.image_urls),
                hall.requires_approval,
                hall.id.to_string(),
            ],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::Money;
    use crate::storage::Database;

    #[test]
    fn test_hall_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let hall = CommunityHall::new(
            "Shanti Hall".into(),
            "Kothrud".into(),
            250,
            Money::from_paise(45_050),
            owner,
        )
        .with_facilities(vec!["Parking".into(), "AC".into()])
        .with_approval();

        db.halls().create(&hall).unwrap();
        let loaded = db.halls().find_by_id(hall.id).unwrap().unwrap();

        assert_eq!(loaded.price_per_plate, Money::from_paise(45_050));
        assert_eq!(loaded.facilities, vec!["Parking".to_string(), "AC".to_string()]);
        assert!(loaded.requires_approval);
        assert!(loaded.available);
        assert_eq!(db.halls().list_by_owner(owner).unwrap().len(), 1);
        assert!(db.halls().list_by_owner(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let mut hall = CommunityHall::new(
            "Tiny".into(),
            "Baner".into(),
            10,
            Money::ZERO,
            Uuid::new_v4(),
        );
        hall.capacity = 0;
        assert!(db.halls().create(&hall).is_err());
    }

    #[test]
    fn test_update_availability() {
        let db = Database::open_in_memory().unwrap();
        let mut hall = CommunityHall::new(
            "Lotus".into(),
            "Aundh".into(),
            80,
            Money::from_rupees(300),
            Uuid::new_v4(),
        );
        db.halls().create(&hall).unwrap();

        hall.available = false;
        assert!(db.halls().update(&hall).unwrap());
        assert!(!db.halls().find_by_id(hall.id).unwrap().unwrap().available);
    }
}
