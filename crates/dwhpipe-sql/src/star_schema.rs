//! Star schema for the song-play event logs
//!
//! Two staging tables mirror the raw JSON datasets. One fact table
//! (`songplays`) and four dimensions (`users`, `songs`, `artists`, `time`)
//! are filled from them with `INSERT ... SELECT`.

use dwhpipe_core::S3Config;

use crate::copy::{CopyStatement, JsonFormat, SqlError};
use crate::statement::{Statement, StatementKind};

/// Table names
pub mod tables {
    pub const STAGING_EVENTS: &str = "staging_events";
    pub const STAGING_SONGS: &str = "staging_songs";
    pub const SONGPLAYS: &str = "songplays";
    pub const USERS: &str = "users";
    pub const SONGS: &str = "songs";
    pub const ARTISTS: &str = "artists";
    pub const TIME: &str = "time";

    /// Every table, staging first
    pub const ALL: [&str; 7] = [STAGING_EVENTS, STAGING_SONGS, SONGPLAYS, USERS, SONGS, ARTISTS, TIME];
}

const CREATE_STAGING_EVENTS: &str = "CREATE TABLE IF NOT EXISTS staging_events (
    event_id BIGINT NULL,
    artist VARCHAR NULL,
    auth VARCHAR NULL,
    firstName VARCHAR NULL,
    gender VARCHAR NULL,
    itemInSession INTEGER NULL,
    lastName VARCHAR NULL,
    length DECIMAL(9) NULL,
    level VARCHAR NULL,
    location VARCHAR NULL,
    method VARCHAR NULL,
    page VARCHAR NULL,
    registration VARCHAR NULL,
    sessionId INTEGER NOT NULL SORTKEY DISTKEY,
    song VARCHAR NULL,
    status INTEGER NULL,
    ts BIGINT NOT NULL,
    userAgent VARCHAR NULL,
    userId INTEGER NULL
) diststyle key;";

const CREATE_STAGING_SONGS: &str = "CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs INTEGER NULL,
    artist_id VARCHAR NULL,
    artist_latitude DECIMAL(9) NULL,
    artist_longitude DECIMAL(9) NULL,
    artist_location VARCHAR NULL,
    artist_name VARCHAR NULL,
    song_id VARCHAR NULL SORTKEY DISTKEY,
    title VARCHAR NULL,
    duration DECIMAL(9) NULL,
    year INTEGER NULL
) diststyle key;";

// songplay_id is generated; the insert below does not supply it
const CREATE_SONGPLAYS: &str = "CREATE TABLE IF NOT EXISTS songplays (
    songplay_id INTEGER IDENTITY(0,1) PRIMARY KEY SORTKEY,
    start_time TIMESTAMP NOT NULL,
    user_id VARCHAR NOT NULL,
    level VARCHAR NOT NULL,
    song_id VARCHAR NOT NULL DISTKEY,
    artist_id VARCHAR NOT NULL,
    session_id VARCHAR NOT NULL,
    location VARCHAR NULL,
    user_agent VARCHAR NULL
) diststyle key;";

const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY SORTKEY,
    first_name VARCHAR NULL,
    last_name VARCHAR NULL,
    gender VARCHAR(1) NULL,
    level VARCHAR NULL
) diststyle all;";

const CREATE_SONGS: &str = "CREATE TABLE IF NOT EXISTS songs (
    song_id VARCHAR PRIMARY KEY SORTKEY DISTKEY,
    title VARCHAR NOT NULL,
    artist_id VARCHAR NOT NULL,
    year INTEGER NOT NULL,
    duration DECIMAL(9) NOT NULL
) diststyle key;";

const CREATE_ARTISTS: &str = "CREATE TABLE IF NOT EXISTS artists (
    artist_id VARCHAR PRIMARY KEY SORTKEY,
    name VARCHAR NULL,
    location VARCHAR NULL,
    latitude DECIMAL(9) NULL,
    longitude DECIMAL(9) NULL
) diststyle all;";

const CREATE_TIME: &str = "CREATE TABLE IF NOT EXISTS time (
    start_time TIMESTAMP PRIMARY KEY SORTKEY,
    hour SMALLINT NULL,
    day SMALLINT NULL,
    week SMALLINT NULL,
    month SMALLINT NULL,
    year SMALLINT NULL,
    weekday SMALLINT NULL
) diststyle all;";

const INSERT_SONGPLAYS: &str = "INSERT INTO songplays (
    start_time,
    user_id,
    level,
    song_id,
    artist_id,
    session_id,
    location,
    user_agent
)
SELECT DISTINCT
    TIMESTAMP 'epoch' + se.ts/1000 * INTERVAL '1 second' AS start_time,
    se.userId AS user_id,
    se.level AS level,
    ss.song_id AS song_id,
    ss.artist_id AS artist_id,
    se.sessionId AS session_id,
    se.location AS location,
    se.userAgent AS user_agent
FROM staging_events AS se
INNER JOIN staging_songs AS ss
    ON se.artist = ss.artist_name
    AND se.song = ss.title
    AND se.length = ss.duration
WHERE se.page = 'NextSong';";

const INSERT_USERS: &str = "INSERT INTO users (
    user_id,
    first_name,
    last_name,
    gender,
    level
)
SELECT DISTINCT
    se.userId AS user_id,
    se.firstName AS first_name,
    se.lastName AS last_name,
    se.gender AS gender,
    se.level AS level
FROM staging_events AS se
WHERE se.page = 'NextSong';";

const INSERT_SONGS: &str = "INSERT INTO songs
SELECT DISTINCT
    song_id,
    title,
    artist_id,
    year,
    duration
FROM staging_songs;";

const INSERT_ARTISTS: &str = "INSERT INTO artists
SELECT DISTINCT
    artist_id,
    artist_name,
    artist_location,
    artist_latitude,
    artist_longitude
FROM staging_songs;";

// weekday is the day of the week (dow), not the week number
const INSERT_TIME: &str = "INSERT INTO time
SELECT DISTINCT
    TIMESTAMP 'epoch' + se.ts/1000 * INTERVAL '1 second' AS start_time,
    EXTRACT(hour FROM start_time) AS hour,
    EXTRACT(day FROM start_time) AS day,
    EXTRACT(week FROM start_time) AS week,
    EXTRACT(month FROM start_time) AS month,
    EXTRACT(year FROM start_time) AS year,
    EXTRACT(dow FROM start_time) AS weekday
FROM staging_events AS se
WHERE se.page = 'NextSong';";

/// Every statement the pipeline runs, with S3 locations and the role ARN
/// already interpolated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementCatalog {
    copy: Vec<Statement>,
}

impl StatementCatalog {
    /// Build the catalog; fails if a COPY statement cannot be rendered
    pub fn new(s3: &S3Config, role_arn: &str, region: &str) -> Result<Self, SqlError> {
        let copy = vec![
            CopyStatement::new(
                tables::STAGING_EVENTS,
                s3.log_data.as_str(),
                role_arn,
                JsonFormat::from_option(s3.log_jsonpath.as_deref()),
                region,
            )
            .to_statement()?,
            CopyStatement::new(
                tables::STAGING_SONGS,
                s3.song_data.as_str(),
                role_arn,
                JsonFormat::Auto,
                region,
            )
            .to_statement()?,
        ];

        Ok(Self { copy })
    }

    /// `DROP TABLE IF EXISTS` for every table
    pub fn drop_tables() -> Vec<Statement> {
        tables::ALL
            .iter()
            .map(|table| {
                Statement::new(StatementKind::Drop, *table, format!("DROP TABLE IF EXISTS {};", table))
            })
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` for every table
    pub fn create_tables() -> Vec<Statement> {
        [
            (tables::STAGING_EVENTS, CREATE_STAGING_EVENTS),
            (tables::STAGING_SONGS, CREATE_STAGING_SONGS),
            (tables::SONGPLAYS, CREATE_SONGPLAYS),
            (tables::USERS, CREATE_USERS),
            (tables::SONGS, CREATE_SONGS),
            (tables::ARTISTS, CREATE_ARTISTS),
            (tables::TIME, CREATE_TIME),
        ]
        .into_iter()
        .map(|(table, sql)| Statement::new(StatementKind::Create, table, sql))
        .collect()
    }

    /// Staging loads: events, then songs
    pub fn copy_tables(&self) -> Vec<Statement> {
        self.copy.clone()
    }

    /// Star-schema inserts: fact table first, then dimensions
    pub fn insert_tables() -> Vec<Statement> {
        [
            (tables::SONGPLAYS, INSERT_SONGPLAYS),
            (tables::USERS, INSERT_USERS),
            (tables::SONGS, INSERT_SONGS),
            (tables::ARTISTS, INSERT_ARTISTS),
            (tables::TIME, INSERT_TIME),
        ]
        .into_iter()
        .map(|(table, sql)| Statement::new(StatementKind::InsertTransform, table, sql))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s3(jsonpath: Option<&str>) -> S3Config {
        S3Config {
            log_data: "s3://udacity-dend/log_data".into(),
            log_jsonpath: jsonpath.map(String::from),
            song_data: "s3://udacity-dend/song_data".into(),
        }
    }

    fn tables_of(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(|s| s.table.as_str()).collect()
    }

    #[test]
    fn test_drop_list_covers_every_table() {
        let drops = StatementCatalog::drop_tables();
        assert_eq!(tables_of(&drops), tables::ALL.to_vec());
        assert_eq!(drops[0].sql, "DROP TABLE IF EXISTS staging_events;");
        assert!(drops.iter().all(|s| s.kind == StatementKind::Drop));
    }

    #[test]
    fn test_create_list_order_and_kind() {
        let creates = StatementCatalog::create_tables();
        assert_eq!(tables_of(&creates), tables::ALL.to_vec());
        for stmt in &creates {
            assert_eq!(stmt.kind, StatementKind::Create);
            assert!(stmt.sql.starts_with(&format!("CREATE TABLE IF NOT EXISTS {} (", stmt.table)));
        }
    }

    #[test]
    fn test_copy_list_events_then_songs() {
        let catalog = StatementCatalog::new(
            &s3(Some("s3://udacity-dend/log_json_path.json")),
            "arn:aws:iam::123456789012:role/dwhRole",
            "us-west-2",
        )
        .unwrap();
        let copies = catalog.copy_tables();

        assert_eq!(tables_of(&copies), vec![tables::STAGING_EVENTS, tables::STAGING_SONGS]);
        assert!(copies[0].sql.contains("format as json 's3://udacity-dend/log_json_path.json'"));
        assert!(copies[1].sql.contains("format as json 'auto'"));
    }

    #[test]
    fn test_events_fall_back_to_auto_without_jsonpaths() {
        let catalog = StatementCatalog::new(&s3(None), "arn:aws:iam::1:role/r", "eu-west-1").unwrap();
        let copies = catalog.copy_tables();
        assert!(copies[0].sql.contains("format as json 'auto'"));
        assert!(copies[0].sql.ends_with("region 'eu-west-1';"));
    }

    #[test]
    fn test_bad_role_arn_fails_catalog() {
        let err = StatementCatalog::new(&s3(None), "", "us-west-2").unwrap_err();
        assert!(matches!(err, SqlError::InvalidLiteral(_)));
    }

    #[test]
    fn test_insert_list_fact_first() {
        let inserts = StatementCatalog::insert_tables();
        assert_eq!(
            tables_of(&inserts),
            vec![tables::SONGPLAYS, tables::USERS, tables::SONGS, tables::ARTISTS, tables::TIME]
        );
        assert!(inserts.iter().all(|s| s.kind == StatementKind::InsertTransform));
        assert!(inserts.iter().all(|s| s.sql.starts_with(&format!("INSERT INTO {}", s.table))));
    }

    #[test]
    fn test_generated_songplay_id_and_day_of_week() {
        let creates = StatementCatalog::create_tables();
        let songplays = creates.iter().find(|s| s.table == tables::SONGPLAYS).unwrap();
        assert!(songplays.sql.contains("songplay_id INTEGER IDENTITY(0,1)"));

        let inserts = StatementCatalog::insert_tables();
        let time = inserts.iter().find(|s| s.table == tables::TIME).unwrap();
        assert!(time.sql.contains("EXTRACT(dow FROM start_time) AS weekday"));
        assert!(time.sql.contains("EXTRACT(week FROM start_time) AS week,"));
    }

    #[test]
    fn test_event_inserts_only_keep_song_plays() {
        for stmt in StatementCatalog::insert_tables() {
            if stmt.sql.contains("FROM staging_events") {
                assert!(stmt.sql.contains("WHERE se.page = 'NextSong'"), "{}", stmt.table);
            }
        }
    }
}
