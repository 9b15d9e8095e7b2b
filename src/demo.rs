//! Bundled sample database for demo mode.
//!
//! A trimmed Chinook music store is embedded as SQL and loaded into a private
//! in-memory database, so demo mode needs no files or environment.

/// Schema and rows of the sample database.
pub const SAMPLE_SQL: &str = include_str!("../sample_data/chinook_sample.sql");

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_sample_script_loads() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SAMPLE_SQL).unwrap();

        let genres: i64 = conn
            .query_row("SELECT COUNT(*) FROM Genre", [], |row| row.get(0))
            .unwrap();
        assert_eq!(genres, 25);

        let composer: String = conn
            .query_row(
                "SELECT Composer FROM Track ORDER BY TrackId DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(composer, "Philip Glass");
    }
}
