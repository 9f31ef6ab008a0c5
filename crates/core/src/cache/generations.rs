//! Cache generation management.
//!
//! Generations are opened (created on first use), enumerated and deleted as a
//! whole. Deleting a generation cascades to all of its entries.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to one named cache generation.
///
/// Obtained from [`CacheDb::open_generation`]; entry operations live in
/// [`super::entries`].
#[derive(Clone, Debug)]
pub struct Generation {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl Generation {
    /// The version tag naming this generation.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheDb {
    /// Open the generation with the given name, creating it if absent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Generation { db: self.clone(), name: name.to_string() })
    }

    /// Whether a generation with this name exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing generations, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
