use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use tracing::debug;

use crate::app::{NewsError, Result};
use crate::domain::{BookmarkedArticle, CachedArticle, FeedKey, PageKey};
use crate::store::{
    ArticleCache, BookmarkStore, ChangeCallback, ChangeTracking, InvalidationTracker,
    PageKeyStore, PageWrite, PagingStore, PreferenceStore, Subscription, Table,
};

const ARTICLE_COLUMNS: &str = "a.url, a.title, a.description, a.image_url, a.source_name, \
     a.published_at, a.content, a.category, a.cached_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    tracker: Arc<InvalidationTracker>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            tracker: InvalidationTracker::new(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| NewsError::Migration(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(lock_error)
    }

    /// Run raw SQL against the connection, e.g. to install failure triggers.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}

fn lock_error<E: Display>(e: E) -> NewsError {
    NewsError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(1),
        Some(e.to_string()),
    ))
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| s.parse::<DateTime<Utc>>().ok())
}

/// `%query%` with LIKE wildcards in the query escaped by `\`.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn article_from_row(row: &Row) -> rusqlite::Result<CachedArticle> {
    Ok(CachedArticle {
        url: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        source_name: row.get(4)?,
        published_at: row.get(5)?,
        content: row.get(6)?,
        category: row.get(7)?,
        cached_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn page_key_from_row(row: &Row) -> rusqlite::Result<PageKey> {
    Ok(PageKey {
        article_url: row.get(0)?,
        prev_key: row.get(1)?,
        next_key: row.get(2)?,
        category: row.get(3)?,
        page: row.get(4)?,
        position: row.get(5)?,
    })
}

fn bookmark_from_row(row: &Row) -> rusqlite::Result<BookmarkedArticle> {
    Ok(BookmarkedArticle {
        url: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        source_name: row.get(4)?,
        published_at: row.get(5)?,
        bookmarked_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn upsert_article_rows(conn: &Connection, articles: &[CachedArticle]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO cached_articles
             (url, title, description, image_url, source_name, published_at, content, category, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(url) DO UPDATE SET
             title = excluded.title,
             description = excluded.description,
             image_url = excluded.image_url,
             source_name = excluded.source_name,
             published_at = excluded.published_at,
             content = excluded.content,
             category = excluded.category,
             cached_at = excluded.cached_at",
    )?;

    let mut count = 0;
    for article in articles {
        count += stmt.execute(params![
            article.url,
            article.title,
            article.description,
            article.image_url,
            article.source_name,
            article.published_at,
            article.content,
            article.category,
            format_timestamp(&article.cached_at),
        ])?;
    }
    Ok(count)
}

fn upsert_page_key_rows(conn: &Connection, keys: &[PageKey]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO page_keys (article_url, prev_key, next_key, category, page, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(article_url) DO UPDATE SET
             prev_key = excluded.prev_key,
             next_key = excluded.next_key,
             category = excluded.category,
             page = excluded.page,
             position = excluded.position",
    )?;

    let mut count = 0;
    for key in keys {
        count += stmt.execute(params![
            key.article_url,
            key.prev_key,
            key.next_key,
            key.category,
            key.page,
            key.position,
        ])?;
    }
    Ok(count)
}

impl ArticleCache for SqliteStore {
    fn upsert_articles(&self, articles: &[CachedArticle]) -> Result<usize> {
        let count = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let count = upsert_article_rows(&tx, articles)?;
            tx.commit()?;
            count
        };

        self.tracker.notify(&[Table::CachedArticles]);
        Ok(count)
    }

    fn get_article(&self, url: &str) -> Result<Option<CachedArticle>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM cached_articles a WHERE a.url = ?1",
            ARTICLE_COLUMNS
        );
        let article = conn
            .query_row(&sql, params![url], article_from_row)
            .optional()?;
        Ok(article)
    }

    fn list_articles(
        &self,
        key: &FeedKey,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<CachedArticle>> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let offset = offset as i64;
        let partition = key.partition();

        // Keyed rows follow remote page order; rows cached without keys come last.
        let articles = match key.query() {
            None => {
                let sql = format!(
                    "SELECT {} FROM cached_articles a
                     LEFT JOIN page_keys k ON k.article_url = a.url
                     WHERE a.category = ?1
                     ORDER BY k.page IS NULL, k.page, k.position, a.cached_at DESC, a.url
                     LIMIT ?2 OFFSET ?3",
                    ARTICLE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![partition, limit, offset], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            Some(query) => {
                let sql = format!(
                    r"SELECT {} FROM cached_articles a
                     LEFT JOIN page_keys k ON k.article_url = a.url
                     WHERE a.category = ?1
                        OR a.title LIKE ?2 ESCAPE '\'
                        OR a.description LIKE ?2 ESCAPE '\'
                     ORDER BY a.category != ?1, k.page IS NULL, k.page, k.position,
                              a.cached_at DESC, a.url
                     LIMIT ?3 OFFSET ?4",
                    ARTICLE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![partition, like_pattern(query), limit, offset],
                        article_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(articles)
    }

    fn search_articles(&self, query: &str) -> Result<Vec<CachedArticle>> {
        let conn = self.conn()?;
        let sql = format!(
            r"SELECT {} FROM cached_articles a
             WHERE a.title LIKE ?1 ESCAPE '\' OR a.description LIKE ?1 ESCAPE '\'
             ORDER BY a.cached_at DESC, a.url",
            ARTICLE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let articles = stmt
            .query_map(params![like_pattern(query)], article_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(articles)
    }

    fn delete_by_category(&self, category: &str) -> Result<usize> {
        let count = self.conn()?.execute(
            "DELETE FROM cached_articles WHERE category = ?1",
            params![category],
        )?;

        if count > 0 {
            self.tracker
                .notify(&[Table::CachedArticles, Table::PageKeys]);
        }
        Ok(count)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let count = self.conn()?.execute(
            "DELETE FROM cached_articles WHERE cached_at < ?1",
            params![format_timestamp(&cutoff)],
        )?;

        if count > 0 {
            debug!("Swept {} cached articles older than {}", count, cutoff);
            self.tracker
                .notify(&[Table::CachedArticles, Table::PageKeys]);
        }
        Ok(count)
    }

    fn clear_all(&self) -> Result<()> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM page_keys", [])?;
            tx.execute("DELETE FROM cached_articles", [])?;
            tx.commit()?;
        }

        self.tracker
            .notify(&[Table::CachedArticles, Table::PageKeys]);
        Ok(())
    }

    fn last_cache_time(&self, category: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(cached_at) FROM cached_articles WHERE category = ?1",
            params![category],
            |row| row.get(0),
        )?;
        Ok(latest.and_then(|s| parse_timestamp(&s)))
    }

    fn has_articles(&self, category: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cached_articles WHERE category = ?1)",
            params![category],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl PageKeyStore for SqliteStore {
    fn upsert_page_keys(&self, keys: &[PageKey]) -> Result<usize> {
        let count = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let count = upsert_page_key_rows(&tx, keys)?;
            tx.commit()?;
            count
        };

        self.tracker.notify(&[Table::PageKeys]);
        Ok(count)
    }

    fn page_key(&self, article_url: &str) -> Result<Option<PageKey>> {
        let conn = self.conn()?;
        let key = conn
            .query_row(
                "SELECT article_url, prev_key, next_key, category, page, position
                 FROM page_keys WHERE article_url = ?1",
                params![article_url],
                page_key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    fn clear_page_keys(&self, category: &str) -> Result<usize> {
        let count = self.conn()?.execute(
            "DELETE FROM page_keys WHERE category = ?1",
            params![category],
        )?;

        if count > 0 {
            self.tracker.notify(&[Table::PageKeys]);
        }
        Ok(count)
    }
}

impl ChangeTracking for SqliteStore {
    fn subscribe(&self, tables: &[Table], callback: ChangeCallback) -> Subscription {
        self.tracker.subscribe(tables, callback)
    }
}

impl PagingStore for SqliteStore {
    fn apply_page(&self, write: &PageWrite) -> Result<usize> {
        let count = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;

            if write.replace_partition {
                tx.execute(
                    "DELETE FROM page_keys WHERE category = ?1",
                    params![write.partition],
                )?;
                tx.execute(
                    "DELETE FROM cached_articles WHERE category = ?1",
                    params![write.partition],
                )?;
            }

            let count = upsert_article_rows(&tx, &write.articles)?;
            upsert_page_key_rows(&tx, &write.page_keys())?;
            tx.commit()?;
            count
        };

        self.tracker
            .notify(&[Table::CachedArticles, Table::PageKeys]);
        Ok(count)
    }
}

impl BookmarkStore for SqliteStore {
    fn insert_bookmark(&self, bookmark: &BookmarkedArticle) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO bookmarked_articles
                 (url, title, description, image_url, source_name, published_at, bookmarked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bookmark.url,
                bookmark.title,
                bookmark.description,
                bookmark.image_url,
                bookmark.source_name,
                bookmark.published_at,
                format_timestamp(&bookmark.bookmarked_at),
            ],
        )?;

        self.tracker.notify(&[Table::Bookmarks]);
        Ok(())
    }

    fn delete_bookmark(&self, url: &str) -> Result<bool> {
        let count = self.conn()?.execute(
            "DELETE FROM bookmarked_articles WHERE url = ?1",
            params![url],
        )?;

        if count > 0 {
            self.tracker.notify(&[Table::Bookmarks]);
        }
        Ok(count > 0)
    }

    fn is_bookmarked(&self, url: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM bookmarked_articles WHERE url = ?1)",
            params![url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn all_bookmarks(&self) -> Result<Vec<BookmarkedArticle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, title, description, image_url, source_name, published_at, bookmarked_at
             FROM bookmarked_articles ORDER BY bookmarked_at DESC, rowid DESC",
        )?;
        let bookmarks = stmt
            .query_map([], bookmark_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookmarks)
    }

    fn toggle_bookmark(&self, bookmark: &BookmarkedArticle) -> Result<bool> {
        let bookmarked = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM bookmarked_articles WHERE url = ?1",
                params![bookmark.url],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO bookmarked_articles
                         (url, title, description, image_url, source_name, published_at, bookmarked_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        bookmark.url,
                        bookmark.title,
                        bookmark.description,
                        bookmark.image_url,
                        bookmark.source_name,
                        bookmark.published_at,
                        format_timestamp(&bookmark.bookmarked_at),
                    ],
                )?;
            }
            tx.commit()?;
            removed == 0
        };

        self.tracker.notify(&[Table::Bookmarks]);
        Ok(bookmarked)
    }
}

impl PreferenceStore for SqliteStore {
    fn get_preference(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_preference(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO preferences (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, key, value],
        )?;

        self.tracker.notify(&[Table::Preferences]);
        Ok(())
    }
}
