//! SQL templates (Redshift dialect)
//!
//! `{name}` placeholders are resolved once by
//! [`StatementCatalog::load`](super::StatementCatalog::load); resolved values
//! are emitted as quoted string literals.

use super::{Phase, Template};

// ============================================================================
// Catalog scan
// ============================================================================

const SCAN_EXISTING_TABLES: &str = "
SELECT DISTINCT tablename
  FROM PG_TABLE_DEF
 WHERE schemaname = 'public';";

// ============================================================================
// Create tables
// ============================================================================

const STAGING_EVENTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_events (
  artist VARCHAR,
  auth VARCHAR,
  firstName VARCHAR,
  gender VARCHAR(5),
  itemInSession INTEGER,
  lastName VARCHAR,
  length DECIMAL,
  level VARCHAR(10),
  location VARCHAR,
  method VARCHAR(10),
  page VARCHAR(20),
  registration VARCHAR,
  sessionId INTEGER,
  song VARCHAR,
  status INTEGER,
  ts BIGINT,
  userAgent VARCHAR,
  userId INTEGER
);";

const STAGING_SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_songs (
  num_songs INT,
  artist_id VARCHAR,
  artist_latitude DECIMAL,
  artist_longitude DECIMAL,
  artist_location VARCHAR,
  artist_name VARCHAR,
  song_id VARCHAR,
  title VARCHAR,
  duration DECIMAL,
  year INTEGER
);";

const SONGPLAYS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songplays (
  songplay_id INTEGER IDENTITY (1,1) PRIMARY KEY SORTKEY,
  start_time TIMESTAMP NOT NULL,
  user_id INTEGER NOT NULL,
  level VARCHAR,
  song_id VARCHAR NOT NULL DISTKEY,
  artist_id VARCHAR NOT NULL,
  session_id VARCHAR NOT NULL,
  location VARCHAR,
  user_agent VARCHAR
);";

const USERS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS users (
  user_id INTEGER PRIMARY KEY SORTKEY,
  first_name VARCHAR,
  last_name VARCHAR,
  gender VARCHAR,
  level VARCHAR
)
DISTSTYLE ALL;";

const SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songs (
  song_id VARCHAR PRIMARY KEY DISTKEY SORTKEY,
  title VARCHAR,
  artist_id VARCHAR,
  year INTEGER,
  duration NUMERIC
);";

const ARTISTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS artists (
  artist_id VARCHAR PRIMARY KEY SORTKEY,
  name VARCHAR,
  location VARCHAR,
  latitude DECIMAL,
  longitude DECIMAL
)
DISTSTYLE ALL;";

const TIME_CREATE: &str = "
CREATE TABLE IF NOT EXISTS time (
  start_time TIMESTAMP PRIMARY KEY SORTKEY,
  hour INTEGER,
  day INTEGER,
  week INTEGER,
  month INTEGER,
  year INTEGER,
  weekday INTEGER
)
DISTSTYLE ALL;";

// ============================================================================
// Load staging
// ============================================================================

const STAGING_EVENTS_COPY: &str = "
COPY staging_events FROM {log_data}
    CREDENTIALS {iam_credentials}
    JSON {log_jsonpath}
    REGION {region};";

const STAGING_SONGS_COPY: &str = "
COPY staging_songs FROM {song_data}
    CREDENTIALS {iam_credentials}
    JSON 'auto'
    REGION {region};";

// ============================================================================
// Star schema
// ============================================================================

const SONGPLAYS_INSERT: &str = "
INSERT INTO songplays (start_time, user_id, level, song_id,
                       artist_id, session_id, location, user_agent)
SELECT TIMESTAMP 'epoch' + CAST(e.ts / 1000 AS BIGINT) * INTERVAL '1 second' AS start_time,
       e.userId,
       e.level,
       s.song_id,
       s.artist_id,
       e.sessionId,
       e.location,
       e.userAgent
  FROM staging_events AS e
  JOIN staging_songs AS s
    ON s.title = e.song
   AND s.artist_name = e.artist
   AND s.duration = e.length
 WHERE e.page = 'NextSong';";

const USERS_INSERT: &str = "
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT DISTINCT(userId) AS user_id,
       firstName,
       lastName,
       gender,
       level
  FROM staging_events AS s1
 WHERE userId IS NOT NULL
   AND ts = (SELECT MAX(ts)
               FROM staging_events AS s2
              WHERE s2.userId = s1.userId);";

const SONGS_INSERT: &str = "
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT DISTINCT(song_id) AS song_id,
       title,
       artist_id,
       year,
       duration
  FROM staging_songs
 WHERE song_id IS NOT NULL;";

const ARTISTS_INSERT: &str = "
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT DISTINCT(artist_id) AS artist_id,
       artist_name,
       artist_location,
       artist_latitude,
       artist_longitude
  FROM staging_songs
 WHERE artist_id IS NOT NULL;";

const TIME_INSERT: &str = "
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
WITH timetable AS (
    SELECT TIMESTAMP 'epoch' + CAST(ts / 1000 AS BIGINT) * INTERVAL '1 second' AS start_time
      FROM staging_events
)
SELECT DISTINCT(start_time) AS start_time,
       DATEPART('hour', start_time) AS hour,
       DATEPART('day', start_time) AS day,
       DATEPART('week', start_time) AS week,
       DATEPART('month', start_time) AS month,
       DATEPART('year', start_time) AS year,
       DATEPART('dayofweek', start_time) AS weekday
  FROM timetable;";

// ============================================================================
// Clean
// ============================================================================

const DETECT_YEAR_ZERO: &str = "
SELECT song_id,
       year
  FROM songs
 WHERE year = 0
 LIMIT 5;";

const SET_YEAR_NULL: &str = "
UPDATE songs
   SET year = NULL
 WHERE year = 0;";

// ============================================================================
// Duplicates
// ============================================================================

const USERS_CHECK_DUPLICATES: &str = "
SELECT COUNT(*) AS num_duplicates,
       user_id
  FROM users
 GROUP BY user_id
HAVING COUNT(*) > 1
 ORDER BY num_duplicates DESC, user_id
 LIMIT 5;";

const SONGS_CHECK_DUPLICATES: &str = "
SELECT COUNT(*) AS num_duplicates,
       song_id
  FROM songs
 GROUP BY song_id
HAVING COUNT(*) > 1
 ORDER BY num_duplicates DESC, song_id
 LIMIT 5;";

/// Every row of every duplicated (artist_id, name) group, in survivor order.
const ARTISTS_CHECK_DUPLICATES: &str = "
WITH duplicates AS (
    SELECT COUNT(*) OVER (PARTITION BY artist_id, name) AS num_duplicates,
           artist_id,
           name,
           location,
           latitude,
           longitude
      FROM artists
)
SELECT num_duplicates,
       artist_id,
       name,
       location,
       latitude,
       longitude
  FROM duplicates
 WHERE num_duplicates > 1
 ORDER BY num_duplicates DESC,
          name ASC,
          latitude ASC,
          longitude ASC,
          location DESC;";

const TIME_CHECK_DUPLICATES: &str = "
SELECT COUNT(*) AS num_duplicates,
       start_time
  FROM time
 GROUP BY start_time
HAVING COUNT(*) > 1
 ORDER BY num_duplicates DESC
 LIMIT 5;";

const SONGPLAYS_CHECK_DUPLICATES: &str = "
SELECT COUNT(songplay_id) AS num_duplicates,
       start_time
  FROM songplays
 GROUP BY start_time
HAVING COUNT(songplay_id) > 1
 ORDER BY num_duplicates DESC
 LIMIT 5;";

const ARTISTS_DROP_SURVIVORS_IF_EXISTS: &str = "
DROP TABLE IF EXISTS artists_survivors;";

/// Row number 1 per (artist_id, name) under the survivor ordering.
const ARTISTS_SELECT_SURVIVORS: &str = "
SELECT artist_id,
       name,
       location,
       latitude,
       longitude
  INTO artists_survivors
  FROM (
        SELECT COUNT(*) OVER (PARTITION BY artist_id, name) AS total_duplicates,
               ROW_NUMBER() OVER (PARTITION BY artist_id, name
                                  ORDER BY name ASC,
                                           latitude ASC,
                                           longitude ASC,
                                           location DESC) AS duplicate_row_number,
               artist_id,
               name,
               location,
               latitude,
               longitude
          FROM artists
       ) AS ranked
 WHERE total_duplicates > 1
   AND duplicate_row_number = 1;";

const ARTISTS_DELETE_DUPLICATES: &str = "
DELETE FROM artists
 USING artists_survivors
 WHERE artists_survivors.artist_id = artists.artist_id
   AND artists_survivors.name = artists.name;";

const ARTISTS_REINSERT_SURVIVORS: &str = "
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT artist_id,
       name,
       location,
       latitude,
       longitude
  FROM artists_survivors;";

const ARTISTS_DROP_SURVIVORS: &str = "
DROP TABLE artists_survivors;";

// ============================================================================
// Analytics
// ============================================================================

/// Most played artists
const SONGPLAYS_PER_ARTIST: &str = "
SELECT artists.name,
       COUNT(songplays.start_time) AS plays
  FROM songplays
  JOIN artists
    ON songplays.artist_id = artists.artist_id
 GROUP BY artists.name
 ORDER BY COUNT(songplays.start_time) DESC
 LIMIT 5;";

// ============================================================================
// Phase table
// ============================================================================

const fn t(name: &'static str, table: Option<&'static str>, sql: &'static str) -> Template {
    Template { name, table, sql }
}

/// Every phase with its statements in execution order.
pub(super) const PHASES: &[(Phase, &[Template])] = &[
    (
        Phase::ExistingTables,
        &[t("scan_existing_tables", None, SCAN_EXISTING_TABLES)],
    ),
    (
        Phase::DropTables,
        &[
            t("drop_staging_events", Some("staging_events"), "DROP TABLE IF EXISTS staging_events;"),
            t("drop_staging_songs", Some("staging_songs"), "DROP TABLE IF EXISTS staging_songs;"),
            t("drop_songplays", Some("songplays"), "DROP TABLE IF EXISTS songplays;"),
            t("drop_users", Some("users"), "DROP TABLE IF EXISTS users CASCADE;"),
            t("drop_songs", Some("songs"), "DROP TABLE IF EXISTS songs CASCADE;"),
            t("drop_artists", Some("artists"), "DROP TABLE IF EXISTS artists CASCADE;"),
            t("drop_time", Some("time"), "DROP TABLE IF EXISTS time CASCADE;"),
        ],
    ),
    (
        Phase::CreateTables,
        &[
            t("create_staging_events", Some("staging_events"), STAGING_EVENTS_CREATE),
            t("create_staging_songs", Some("staging_songs"), STAGING_SONGS_CREATE),
            t("create_songplays", Some("songplays"), SONGPLAYS_CREATE),
            t("create_users", Some("users"), USERS_CREATE),
            t("create_songs", Some("songs"), SONGS_CREATE),
            t("create_artists", Some("artists"), ARTISTS_CREATE),
            t("create_time", Some("time"), TIME_CREATE),
        ],
    ),
    (
        Phase::CopyStaging,
        &[
            t("copy_staging_events", Some("staging_events"), STAGING_EVENTS_COPY),
            t("copy_staging_songs", Some("staging_songs"), STAGING_SONGS_COPY),
        ],
    ),
    (
        Phase::InsertStarSchema,
        &[
            t("insert_songplays", Some("songplays"), SONGPLAYS_INSERT),
            t("insert_users", Some("users"), USERS_INSERT),
            t("insert_songs", Some("songs"), SONGS_INSERT),
            t("insert_artists", Some("artists"), ARTISTS_INSERT),
            t("insert_time", Some("time"), TIME_INSERT),
        ],
    ),
    (
        Phase::DetectYearZero,
        &[t("detect_year_zero", Some("songs"), DETECT_YEAR_ZERO)],
    ),
    (
        Phase::CleanYearZero,
        &[t("set_year_null", Some("songs"), SET_YEAR_NULL)],
    ),
    (
        Phase::CheckDuplicates,
        &[
            t("users_check_duplicates", Some("users"), USERS_CHECK_DUPLICATES),
            t("songs_check_duplicates", Some("songs"), SONGS_CHECK_DUPLICATES),
            t("artists_check_duplicates", Some("artists"), ARTISTS_CHECK_DUPLICATES),
            t("time_check_duplicates", Some("time"), TIME_CHECK_DUPLICATES),
            t("songplays_check_duplicates", Some("songplays"), SONGPLAYS_CHECK_DUPLICATES),
        ],
    ),
    (
        Phase::RemoveArtistDuplicates,
        &[
            t("drop_stale_survivors", Some("artists"), ARTISTS_DROP_SURVIVORS_IF_EXISTS),
            t("select_survivors", Some("artists"), ARTISTS_SELECT_SURVIVORS),
            t("delete_duplicates", Some("artists"), ARTISTS_DELETE_DUPLICATES),
            t("reinsert_survivors", Some("artists"), ARTISTS_REINSERT_SURVIVORS),
            t("drop_survivors", Some("artists"), ARTISTS_DROP_SURVIVORS),
        ],
    ),
    (
        Phase::TruncateTables,
        &[
            t("truncate_staging_events", Some("staging_events"), "TRUNCATE TABLE staging_events;"),
            t("truncate_staging_songs", Some("staging_songs"), "TRUNCATE TABLE staging_songs;"),
            t("truncate_songplays", Some("songplays"), "TRUNCATE TABLE songplays;"),
            t("truncate_users", Some("users"), "TRUNCATE TABLE users;"),
            t("truncate_songs", Some("songs"), "TRUNCATE TABLE songs;"),
            t("truncate_artists", Some("artists"), "TRUNCATE TABLE artists;"),
            t("truncate_time", Some("time"), "TRUNCATE TABLE time;"),
        ],
    ),
    (
        Phase::DropStagingTables,
        &[
            t("drop_staging_events", Some("staging_events"), "DROP TABLE IF EXISTS staging_events;"),
            t("drop_staging_songs", Some("staging_songs"), "DROP TABLE IF EXISTS staging_songs;"),
        ],
    ),
    (
        Phase::Analytics,
        &[t("songplays_per_artist", None, SONGPLAYS_PER_ARTIST)],
    ),
];
